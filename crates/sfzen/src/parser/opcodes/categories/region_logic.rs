use crate::parser::error::Error;
use crate::parser::opcodes::{SfzOpcodes, TriggerMode};

type Result<T> = std::result::Result<T, Error>;

/// Trait for region logic opcodes that control how regions are selected
///
/// Region logic opcodes determine when a particular region should play based on
/// the MIDI key, velocity and channel of a note. Key opcodes accept note numbers
/// and note names (`c4` = 60).
pub trait RegionLogicOpcodes: SfzOpcodes {
    /// Gets the lowest key in the key range
    ///
    /// Example: `lokey=60` (Middle C)
    fn lokey(&self) -> Result<u8> {
        self.get_note("lokey")
    }

    /// Gets the highest key in the key range
    ///
    /// Example: `hikey=c5`
    fn hikey(&self) -> Result<u8> {
        self.get_note("hikey")
    }

    /// Gets the single key of the region
    ///
    /// Equivalent to setting `lokey`, `hikey` and `pitch_keycenter` to the same value.
    ///
    /// Example: `key=36`
    fn key(&self) -> Result<u8> {
        self.get_note("key")
    }

    /// Example: `lovel=64`
    fn lovel(&self) -> Result<u8> {
        self.get_opcode("lovel")
    }

    /// Example: `hivel=127`
    fn hivel(&self) -> Result<u8> {
        self.get_opcode("hivel")
    }

    fn lochan(&self) -> Result<u8> {
        self.get_opcode("lochan")
    }

    fn hichan(&self) -> Result<u8> {
        self.get_opcode("hichan")
    }

    /// Random round-robin range, 0.0 to 1.0
    fn lorand(&self) -> Result<f32> {
        self.get_opcode("lorand")
    }

    fn hirand(&self) -> Result<f32> {
        self.get_opcode("hirand")
    }

    fn seq_length(&self) -> Result<u32> {
        self.get_opcode("seq_length")
    }

    fn seq_position(&self) -> Result<u32> {
        self.get_opcode("seq_position")
    }

    /// Example: `trigger=release`
    fn trigger(&self) -> Result<TriggerMode> {
        self.get_opcode("trigger")
    }

    /// Exclusive group number
    fn group(&self) -> Result<i64> {
        self.get_opcode("group")
    }

    /// Group whose voices this region silences
    fn off_by(&self) -> Result<i64> {
        self.get_opcode("off_by")
    }

    /// Keyswitch that last has to be pressed for this region to play
    fn sw_last(&self) -> Result<u8> {
        self.get_note("sw_last")
    }

    /// The key range this region answers to
    ///
    /// `key` takes precedence over `lokey`/`hikey`. Missing or unreadable bounds
    /// default to the full range 0-127.
    fn key_range(&self) -> (u8, u8) {
        match self.key() {
            Ok(key) => (key, key),
            Err(_) => (self.lokey().unwrap_or(0), self.hikey().unwrap_or(127)),
        }
    }

    /// The velocity range this region answers to, defaulting to 1-127
    fn velocity_range(&self) -> (u8, u8) {
        (self.lovel().unwrap_or(1), self.hivel().unwrap_or(127))
    }
}

impl<T: SfzOpcodes + ?Sized> RegionLogicOpcodes for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::types::{SfzSection, SfzSectionType};

    #[test]
    fn test_key_range() {
        let mut section = SfzSection::new(SfzSectionType::Region);
        assert_eq!(section.key_range(), (0, 127));

        section.add_opcode("lokey", "c3");
        section.add_opcode("hikey", "50");
        assert_eq!(section.key_range(), (48, 50));

        section.add_opcode("key", "f#3");
        assert_eq!(section.key_range(), (54, 54));
    }

    #[test]
    fn test_velocity_and_trigger() {
        let mut section = SfzSection::new(SfzSectionType::Region);
        section.add_opcode("hivel", "64");
        section.add_opcode("trigger", "release");
        assert_eq!(section.velocity_range(), (1, 64));
        assert_eq!(section.trigger().unwrap(), TriggerMode::Release);
        assert!(matches!(section.lovel(), Err(Error::MissingOpcode(_))));
    }
}
