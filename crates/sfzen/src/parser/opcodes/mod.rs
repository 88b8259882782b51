/// SFZ Opcodes Module
///
/// Typed access to opcode values. Opcodes in SFZ are `name=value` pairs whose values
/// are plain text; the traits here convert them to the types a consumer expects.
///
/// The access traits are implemented for every [`SfzOpcodes`] source: a single
/// [`SfzSection`] sees only its own opcodes, while an
/// [`EffectiveRegion`](crate::inheritance::EffectiveRegion) sees the opcodes it
/// inherits as well.
///
/// # Example SFZ file with opcodes
///
/// ```text
/// <control>
/// default_path=samples/piano/
///
/// <group>
/// lovel=64
/// hivel=127
///
/// <region>
/// sample=C4.wav
/// key=c4
/// ```
mod order;
mod values;
pub mod categories;

pub use self::order::{name_sorted, opcode_rank, OPCODE_SORT_ORDER};
pub use self::values::*;
pub use categories::*;

use std::result::Result as StdResult;

use crate::parser::error::Error;
type Result<T> = StdResult<T, Error>;
use crate::parser::types::SfzSection;

/// Trait for type-safe access to SFZ opcodes
///
/// # Example
///
/// ```
/// use sfzen::parser::{SfzOpcodes, SfzSection, SfzSectionType, RegionLogicOpcodes};
///
/// let mut section = SfzSection::new(SfzSectionType::Region);
/// section.add_opcode("key", "c4");
/// section.add_opcode("volume", "-6");
///
/// assert_eq!(section.key().unwrap(), 60);
/// assert_eq!(section.get_opcode::<f32>("volume").unwrap(), -6.0);
/// ```
pub trait SfzOpcodes {
    /// Get an opcode value as a string
    fn get_opcode_str(&self, name: &str) -> Option<&str>;

    /// Get a typed opcode value
    ///
    /// Fails with [`Error::MissingOpcode`] when the opcode is absent and with
    /// [`Error::InvalidOpcodeValue`] when it cannot be converted.
    fn get_opcode<T: OpcodeValue>(&self, name: &str) -> Result<T> {
        match self.get_opcode_str(name) {
            Some(value_str) => OpcodeValue::parse_opcode(value_str),
            None => Err(Error::MissingOpcode(name.to_string())),
        }
    }

    /// Get an opcode holding a MIDI note, written as a number or a note name
    fn get_note(&self, name: &str) -> Result<u8> {
        let value = self
            .get_opcode_str(name)
            .ok_or_else(|| Error::MissingOpcode(name.to_string()))?;
        parse_midi_note(value).ok_or_else(|| Error::InvalidOpcodeValue(value.to_string(), "MIDI note".to_string()))
    }
}

impl SfzOpcodes for SfzSection {
    fn get_opcode_str(&self, name: &str) -> Option<&str> {
        self.opcode(name).map(|opcode| opcode.value.as_str())
    }
}
