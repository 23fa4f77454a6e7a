//! Builtin file formats.

use std::io::{Read, Write};

use log::debug;
use uuid::Uuid;

use crate::error::LibraryError;
use crate::model::value::ValueNode;
use crate::plugin::PluginCategory;
use crate::plugin::traits::{FileFormat, FormatContext, Plugin};

pub const INTEGER_TEXT_FORMAT: &str = "format.integer_text";
pub const JSON_TREE_FORMAT: &str = "format.json_tree";

/// A text file holding a single decimal integer.
pub struct IntegerTextFormat;

impl Plugin for IntegerTextFormat {
    fn name(&self) -> &'static str {
        INTEGER_TEXT_FORMAT
    }

    fn uuid(&self) -> Uuid {
        Uuid::from_u128(0x6f1d_3a52_0c8e_4b7a_9e21_5d40_7c33_a001)
    }

    fn version(&self) -> u32 {
        1
    }

    fn category(&self) -> PluginCategory {
        PluginCategory::Format
    }

    fn display_name(&self) -> String {
        "Integer Text".to_string()
    }
}

impl FileFormat for IntegerTextFormat {
    fn prototype(&self) -> ValueNode {
        ValueNode::integer(0)
    }

    fn load(&self, reader: &mut dyn Read, context: &FormatContext) -> Result<ValueNode, LibraryError> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        let value: i64 = text.trim().parse().map_err(|e| {
            LibraryError::Parse(format!(
                "'{}' does not hold an integer: {}",
                context.location.display(),
                e
            ))
        })?;
        debug!("IntegerTextFormat: read {} from {}", value, context.location.display());
        Ok(ValueNode::integer(value))
    }

    fn save(
        &self,
        value: &ValueNode,
        writer: &mut dyn Write,
        _context: &FormatContext,
    ) -> Result<(), LibraryError> {
        let value = value.as_integer().ok_or_else(|| {
            LibraryError::model(format!("cannot write a {} as an integer", value.kind_name()))
        })?;
        writeln!(writer, "{}", value)?;
        Ok(())
    }
}

/// Stores a whole value tree, including defaults and prototypes, as JSON.
pub struct JsonTreeFormat;

impl Plugin for JsonTreeFormat {
    fn name(&self) -> &'static str {
        JSON_TREE_FORMAT
    }

    fn uuid(&self) -> Uuid {
        Uuid::from_u128(0x6f1d_3a52_0c8e_4b7a_9e21_5d40_7c33_a002)
    }

    fn version(&self) -> u32 {
        1
    }

    fn category(&self) -> PluginCategory {
        PluginCategory::Format
    }

    fn display_name(&self) -> String {
        "JSON Tree".to_string()
    }
}

impl FileFormat for JsonTreeFormat {
    fn prototype(&self) -> ValueNode {
        ValueNode::empty_record()
    }

    fn load(&self, reader: &mut dyn Read, _context: &FormatContext) -> Result<ValueNode, LibraryError> {
        Ok(serde_json::from_reader(reader)?)
    }

    fn save(
        &self,
        value: &ValueNode,
        writer: &mut dyn Write,
        _context: &FormatContext,
    ) -> Result<(), LibraryError> {
        serde_json::to_writer_pretty(&mut *writer, value)?;
        writeln!(writer)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::value::Record;
    use std::path::Path as FsPath;

    fn context() -> FormatContext<'static> {
        FormatContext {
            location: FsPath::new("memory"),
        }
    }

    #[test]
    fn test_integer_text_load_and_save() {
        let format = IntegerTextFormat;
        let value = format.load(&mut " 42\n".as_bytes(), &context()).unwrap();
        assert_eq!(value.as_integer(), Some(42));

        let mut out = Vec::new();
        format.save(&ValueNode::integer(-7), &mut out, &context()).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "-7\n");
    }

    #[test]
    fn test_integer_text_rejects_garbage() {
        let format = IntegerTextFormat;
        let err = format.load(&mut "four".as_bytes(), &context()).unwrap_err();
        assert!(matches!(err, LibraryError::Parse(_)));

        let mut out = Vec::new();
        let err = format
            .save(&ValueNode::empty_record(), &mut out, &context())
            .unwrap_err();
        assert!(matches!(err, LibraryError::Model(_)));
    }

    #[test]
    fn test_json_tree_keeps_shape() {
        let format = JsonTreeFormat;
        let tree: ValueNode = Record::new()
            .with_field("items", ValueNode::array(ValueNode::integer(1), 3))
            .with_optional("note", ValueNode::leaf("n/a"))
            .into();
        let mut out = Vec::new();
        format.save(&tree, &mut out, &context()).unwrap();
        let loaded = format.load(&mut out.as_slice(), &context()).unwrap();
        assert_eq!(loaded, tree);

        let err = format.load(&mut "{".as_bytes(), &context()).unwrap_err();
        assert!(matches!(err, LibraryError::Json(_)));
    }
}
