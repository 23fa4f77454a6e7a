//! Registry seams for the collaborators the engine does not implement itself:
//! file formats and processors.

pub mod manager;
pub mod repository;
pub mod traits;

pub use manager::{PluginInfo, PluginManager};
pub use traits::{FileFormat, FormatContext, Plugin, Processor, ProcessorFactory};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PluginCategory {
    Format,
    Processor,
}
