use std::path::PathBuf;

use crate::parser::error::Error;
use crate::parser::opcodes::{LoopMode, SfzOpcodes};

type Result<T> = std::result::Result<T, Error>;

/// Trait for sample playback opcodes
///
/// Sample playback opcodes name the sample file and control where playback
/// starts, where it loops and where it ends. Positions are measured in sample
/// frames, which is why [`resample`](crate::resample) rescales them when a sample
/// is converted to another rate.
pub trait SamplePlaybackOpcodes: SfzOpcodes {
    /// Gets the sample file path
    ///
    /// Relative paths are interpreted against `default_path` and the instrument
    /// directory, see [`resolve_sample`](crate::samples::resolve_sample).
    ///
    /// Example: `sample=piano_C4.wav`
    fn sample(&self) -> Result<PathBuf> {
        self.get_opcode("sample")
    }

    /// Example: `default_path=samples/piano/`
    fn default_path(&self) -> Result<String> {
        self.get_opcode("default_path")
    }

    /// Key at which the sample plays at its recorded pitch
    fn pitch_keycenter(&self) -> Result<u8> {
        self.get_note("pitch_keycenter")
    }

    /// Example: `offset=2048` (skip the first 2048 frames)
    fn offset(&self) -> Result<i64> {
        self.get_opcode("offset")
    }

    fn offset_random(&self) -> Result<i64> {
        self.get_opcode("offset_random")
    }

    /// Last frame to play
    fn end(&self) -> Result<i64> {
        self.get_opcode("end")
    }

    /// Example: `loop_mode=loop_sustain`
    fn loop_mode(&self) -> Result<LoopMode> {
        self.get_opcode("loop_mode")
    }

    /// Loop start in frames; also accepts the older `loopstart` spelling
    fn loop_start(&self) -> Result<i64> {
        self.get_opcode("loop_start").or_else(|_| self.get_opcode("loopstart"))
    }

    /// Loop end in frames; also accepts the older `loopend` spelling
    fn loop_end(&self) -> Result<i64> {
        self.get_opcode("loop_end").or_else(|_| self.get_opcode("loopend"))
    }

    fn count(&self) -> Result<u32> {
        self.get_opcode("count")
    }

    fn transpose(&self) -> Result<i32> {
        self.get_opcode("transpose")
    }

    /// Fine tuning in cents
    fn tune(&self) -> Result<i32> {
        self.get_opcode("tune")
    }

    /// Example: `volume=-6.0` (decibels)
    fn volume(&self) -> Result<f32> {
        self.get_opcode("volume")
    }

    fn pan(&self) -> Result<f32> {
        self.get_opcode("pan")
    }
}

impl<T: SfzOpcodes + ?Sized> SamplePlaybackOpcodes for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::types::{SfzSection, SfzSectionType};

    #[test]
    fn test_sample_playback_opcodes() {
        let mut section = SfzSection::new(SfzSectionType::Region);
        section.add_opcode("sample", "Piano\\C4.wav");
        section.add_opcode("loopstart", "100");
        section.add_opcode("loop_end", "2000");
        section.add_opcode("loop_mode", "one_shot");

        assert_eq!(section.sample().unwrap(), PathBuf::from("Piano/C4.wav"));
        assert_eq!(section.loop_start().unwrap(), 100);
        assert_eq!(section.loop_end().unwrap(), 2000);
        assert_eq!(section.loop_mode().unwrap(), LoopMode::OneShot);
        assert!(section.offset().is_err());
    }
}
