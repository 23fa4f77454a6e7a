//! Built-in plugin implementations.

use std::sync::Arc;

use crate::plugin::PluginManager;

pub mod formats;
pub mod processors;

pub use formats::{INTEGER_TEXT_FORMAT, IntegerTextFormat, JSON_TREE_FORMAT, JsonTreeFormat};
pub use processors::{
    SEQUENCE_PROCESSOR, SUM_PROCESSOR, SequenceProcessorFactory, SumProcessorFactory,
};

pub fn register_builtins(manager: &PluginManager) {
    manager.register_format(Arc::new(IntegerTextFormat));
    manager.register_format(Arc::new(JsonTreeFormat));
    manager.register_processor(Arc::new(SequenceProcessorFactory));
    manager.register_processor(Arc::new(SumProcessorFactory));
}
