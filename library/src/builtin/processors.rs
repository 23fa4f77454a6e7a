//! Builtin processors.

use uuid::Uuid;

use crate::error::LibraryError;
use crate::model::path::Path;
use crate::model::value::{Array, Record, ValueNode};
use crate::plugin::PluginCategory;
use crate::plugin::traits::{Plugin, Processor, ProcessorFactory};

pub const SEQUENCE_PROCESSOR: &str = "processor.sequence";
pub const SUM_PROCESSOR: &str = "processor.sum";

fn integer_at(input: &ValueNode, field: &str) -> Result<i64, LibraryError> {
    let path = Path::root().field(field);
    input
        .follow(&path)?
        .as_integer()
        .ok_or_else(|| LibraryError::model(format!("'{}' is not an integer", path)))
}

/// `{ value, count }` to `[value, value + 1, ..]` with `count` entries.
pub struct SequenceProcessor;

impl Processor for SequenceProcessor {
    fn input_prototype(&self) -> ValueNode {
        Record::new()
            .with_field("value", ValueNode::integer(0))
            .with_field("count", ValueNode::integer(2))
            .into()
    }

    fn output_prototype(&self) -> ValueNode {
        ValueNode::array(ValueNode::integer(0), 0)
    }

    fn process(&mut self, input: &ValueNode) -> Result<ValueNode, LibraryError> {
        let value = integer_at(input, "value")?;
        let count = integer_at(input, "count")?;
        let count = usize::try_from(count).map_err(|_| {
            LibraryError::InvalidArgument(format!("sequence length {} is negative", count))
        })?;
        let elements = (0..count)
            .map(|i| {
                value
                    .checked_add(i as i64)
                    .map(ValueNode::integer)
                    .ok_or_else(|| LibraryError::model("sequence overflows an integer"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Array::from_elements(ValueNode::integer(0), elements).into())
    }
}

pub struct SequenceProcessorFactory;

impl Plugin for SequenceProcessorFactory {
    fn name(&self) -> &'static str {
        SEQUENCE_PROCESSOR
    }

    fn uuid(&self) -> Uuid {
        Uuid::from_u128(0x6f1d_3a52_0c8e_4b7a_9e21_5d40_7c33_b001)
    }

    fn version(&self) -> u32 {
        1
    }

    fn category(&self) -> PluginCategory {
        PluginCategory::Processor
    }

    fn display_name(&self) -> String {
        "Sequence".to_string()
    }
}

impl ProcessorFactory for SequenceProcessorFactory {
    fn create(&self) -> Box<dyn Processor> {
        Box::new(SequenceProcessor)
    }
}

/// `{ values: [..] }` to the sum of the values.
pub struct SumProcessor;

impl Processor for SumProcessor {
    fn input_prototype(&self) -> ValueNode {
        Record::new()
            .with_field("values", ValueNode::array(ValueNode::integer(0), 0))
            .into()
    }

    fn output_prototype(&self) -> ValueNode {
        ValueNode::integer(0)
    }

    fn process(&mut self, input: &ValueNode) -> Result<ValueNode, LibraryError> {
        let values = input
            .follow(&Path::root().field("values"))?
            .as_array()
            .ok_or_else(|| LibraryError::model("'values' is not an array"))?;
        let mut total: i64 = 0;
        for element in values.elements() {
            let value = element
                .as_integer()
                .ok_or_else(|| LibraryError::model("sum input holds a non-integer"))?;
            total = total
                .checked_add(value)
                .ok_or_else(|| LibraryError::model("sum overflows an integer"))?;
        }
        Ok(ValueNode::integer(total))
    }
}

pub struct SumProcessorFactory;

impl Plugin for SumProcessorFactory {
    fn name(&self) -> &'static str {
        SUM_PROCESSOR
    }

    fn uuid(&self) -> Uuid {
        Uuid::from_u128(0x6f1d_3a52_0c8e_4b7a_9e21_5d40_7c33_b002)
    }

    fn version(&self) -> u32 {
        1
    }

    fn category(&self) -> PluginCategory {
        PluginCategory::Processor
    }

    fn display_name(&self) -> String {
        "Sum".to_string()
    }
}

impl ProcessorFactory for SumProcessorFactory {
    fn create(&self) -> Box<dyn Processor> {
        Box::new(SumProcessor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::value::Scalar;

    #[test]
    fn test_sequence_counts_up_from_value() {
        let mut processor = SequenceProcessor;
        let mut input = processor.input_prototype();
        input
            .follow_mut(&Path::root().field("value"))
            .unwrap()
            .set_scalar(&Scalar::Integer(3))
            .unwrap();
        let output = processor.process(&input).unwrap();
        let values: Vec<_> = output
            .as_array()
            .unwrap()
            .elements()
            .iter()
            .map(|e| e.as_integer().unwrap())
            .collect();
        assert_eq!(values, [3, 4]);
    }

    #[test]
    fn test_sequence_rejects_negative_count() {
        let mut processor = SequenceProcessor;
        let mut input = processor.input_prototype();
        input
            .follow_mut(&Path::root().field("count"))
            .unwrap()
            .set_scalar(&Scalar::Integer(-1))
            .unwrap();
        assert!(matches!(
            processor.process(&input),
            Err(LibraryError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_sum_adds_entries() {
        let mut processor = SumProcessor;
        let mut input = processor.input_prototype();
        let values = input
            .follow_mut(&Path::root().field("values"))
            .unwrap()
            .as_array_mut()
            .unwrap();
        values.insert_entries(0, 3).unwrap();
        for (i, element) in [1i64, 2, 39].iter().enumerate() {
            values.get_mut(i).unwrap().set_scalar(&Scalar::Integer(*element)).unwrap();
        }
        assert_eq!(processor.process(&input).unwrap().as_integer(), Some(42));
    }
}
