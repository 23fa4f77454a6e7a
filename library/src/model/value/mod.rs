//! Self-describing value trees held by graph nodes.

mod changes;
mod scalar;
mod tree;

pub use changes::ChangeFlags;
pub use scalar::{Rational, Scalar, ScalarKind, Symbol};
pub use tree::{Array, Leaf, Record, RecordField, ValueNode};
