use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::Result;
use crate::parser::error::Error;
use crate::parser::path_utils::normalize_path;

/// Trait for parsing opcode values
///
/// In SFZ, all values are represented as strings in the file, but they need to be
/// interpreted as the appropriate type. This trait provides that conversion, with
/// proper error handling for invalid values.
///
/// # SFZ Value Types
///
/// - **Strings**: sample paths, labels (`sample=piano_C4.wav`)
/// - **Integers**: key numbers, sample offsets (`key=60`, `offset=2048`)
/// - **Floats**: volume levels, envelope times (`volume=-6.5`)
/// - **Enums**: values from a predefined set (`trigger=release`)
pub trait OpcodeValue: Sized {
    /// Parse an opcode value from string
    fn parse_opcode(s: &str) -> Result<Self>;
}

impl OpcodeValue for String {
    fn parse_opcode(s: &str) -> Result<Self> {
        Ok(s.to_string())
    }
}

macro_rules! numeric_opcode_value {
    ($($ty:ty => $label:literal),* $(,)?) => {
        $(
            impl OpcodeValue for $ty {
                fn parse_opcode(s: &str) -> Result<Self> {
                    s.trim()
                        .parse::<$ty>()
                        .map_err(|_| Error::InvalidOpcodeValue(s.to_string(), $label.to_string()))
                }
            }
        )*
    };
}

numeric_opcode_value! {
    u8 => "integer (0-255)",
    i32 => "integer",
    u32 => "unsigned integer",
    i64 => "integer",
    f32 => "float",
    f64 => "float",
}

impl OpcodeValue for bool {
    /// Boolean values are written as yes/no, true/false, on/off or 1/0
    fn parse_opcode(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "yes" | "true" | "1" | "on" => Ok(true),
            "no" | "false" | "0" | "off" => Ok(false),
            _ => Err(Error::InvalidOpcodeValue(s.to_string(), "boolean".to_string())),
        }
    }
}

impl OpcodeValue for PathBuf {
    /// Paths are returned with backslashes converted to forward slashes
    fn parse_opcode(s: &str) -> Result<Self> {
        Ok(PathBuf::from(normalize_path(s)))
    }
}

/// Parse a MIDI note written as a number (`60`) or a note name (`c4`, `f#3`, `eb2`)
///
/// Note names use `c4` = 60, so `c-1` is note 0. Returns `None` for anything that is
/// not a note in the range 0-127.
pub fn parse_midi_note(s: &str) -> Option<u8> {
    let s = s.trim();
    if let Ok(number) = s.parse::<i32>() {
        return u8::try_from(number).ok().filter(|note| *note <= 127);
    }

    let mut chars = s.chars();
    let pitch_class: i32 = match chars.next()?.to_ascii_lowercase() {
        'c' => 0,
        'd' => 2,
        'e' => 4,
        'f' => 5,
        'g' => 7,
        'a' => 9,
        'b' => 11,
        _ => return None,
    };
    let rest = chars.as_str();
    let (accidental, octave) = if let Some(octave) = rest.strip_prefix('#') {
        (1, octave)
    } else if let Some(octave) = rest.strip_prefix('b') {
        (-1, octave)
    } else {
        (0, rest)
    };
    let octave: i32 = octave.parse().ok()?;
    let note = (octave + 1) * 12 + pitch_class + accidental;
    u8::try_from(note).ok().filter(|note| *note <= 127)
}

/// Loop modes for sample playback
///
/// # Examples in SFZ
///
/// ```text
/// loop_mode=no_loop
/// loop_mode=one_shot
/// loop_mode=loop_continuous
/// loop_mode=loop_sustain
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    /// The sample plays once and stops
    NoLoop,
    /// The sample plays to the end, ignoring note-off
    OneShot,
    /// The loop repeats until the voice ends
    LoopContinuous,
    /// The loop repeats while the key is held, then playback continues to the end
    LoopSustain,
}

impl LoopMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoopMode::NoLoop => "no_loop",
            LoopMode::OneShot => "one_shot",
            LoopMode::LoopContinuous => "loop_continuous",
            LoopMode::LoopSustain => "loop_sustain",
        }
    }
}

impl fmt::Display for LoopMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoopMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "no_loop" | "noloop" => Ok(LoopMode::NoLoop),
            "one_shot" | "oneshot" => Ok(LoopMode::OneShot),
            "loop_continuous" | "loop" => Ok(LoopMode::LoopContinuous),
            "loop_sustain" => Ok(LoopMode::LoopSustain),
            _ => Err(Error::InvalidOpcodeValue(s.to_string(), "LoopMode".to_string())),
        }
    }
}

impl OpcodeValue for LoopMode {
    fn parse_opcode(s: &str) -> Result<Self> {
        s.parse()
    }
}

/// Trigger modes for region playback
///
/// # Trigger Modes in SFZ
///
/// - **attack**: plays on note-on (the default)
/// - **release**: plays on note-off
/// - **first**: plays only when no other key is held
/// - **legato**: plays only when another key is held
/// - **release_key**: plays on note-off, ignoring the sustain pedal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerMode {
    Attack,
    Release,
    First,
    Legato,
    ReleaseKey,
}

impl FromStr for TriggerMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "attack" => Ok(TriggerMode::Attack),
            "release" => Ok(TriggerMode::Release),
            "first" => Ok(TriggerMode::First),
            "legato" => Ok(TriggerMode::Legato),
            "release_key" => Ok(TriggerMode::ReleaseKey),
            _ => Err(Error::InvalidOpcodeValue(s.to_string(), "TriggerMode".to_string())),
        }
    }
}

impl OpcodeValue for TriggerMode {
    fn parse_opcode(s: &str) -> Result<Self> {
        s.parse()
    }
}
