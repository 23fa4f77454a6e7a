pub mod identifier;
pub mod modifier;
pub mod node;
pub mod path;
pub mod project;
pub mod value;
