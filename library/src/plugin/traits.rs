//! Core plugin traits.

use std::io::{Read, Write};
use std::path::Path as FsPath;

use uuid::Uuid;

use crate::error::LibraryError;
use crate::model::value::ValueNode;
use crate::plugin::PluginCategory;

/// Base trait for all plugins.
///
/// The name/UUID pair is interned into an `Identifier` when the plugin is
/// registered; `version` is recorded with serialized graphs.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &'static str;
    fn uuid(&self) -> Uuid;
    fn version(&self) -> u32;
    fn category(&self) -> PluginCategory;
    fn display_name(&self) -> String {
        self.name().to_string()
    }
}

/// Where a format is reading from or writing to.
pub struct FormatContext<'a> {
    pub location: &'a FsPath,
}

/// Load/save contract for one file format.
pub trait FileFormat: Plugin {
    /// Tree shape accepted by targets of this format, also used as the
    /// substitute tree of a source that failed to load.
    fn prototype(&self) -> ValueNode;

    fn load(&self, reader: &mut dyn Read, context: &FormatContext) -> Result<ValueNode, LibraryError>;

    fn save(
        &self,
        value: &ValueNode,
        writer: &mut dyn Write,
        context: &FormatContext,
    ) -> Result<(), LibraryError>;
}

/// A transformation from an input tree to an output tree.
pub trait Processor: Send {
    fn input_prototype(&self) -> ValueNode;
    fn output_prototype(&self) -> ValueNode;
    fn process(&mut self, input: &ValueNode) -> Result<ValueNode, LibraryError>;
}

pub trait ProcessorFactory: Plugin {
    fn create(&self) -> Box<dyn Processor>;
}
