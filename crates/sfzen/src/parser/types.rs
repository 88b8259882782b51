use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::parser::encoding::{DocumentEncoding, SourceEncoding};
use crate::parser::token::{FileId, Origin};

/// A parsed SFZ document
///
/// The document keeps its sections as a flat list in the order they were
/// encountered, with every `#include` already inlined and every macro expanded.
/// The hierarchy used for inheritance (global, master, group, region) is derived
/// from that order, see [`SfzHierarchy`](crate::inheritance::SfzHierarchy).
///
/// # SFZ Hierarchy
///
/// - `<control>`: instrument-wide settings such as `default_path`
/// - `<global>`: settings that apply to all regions
/// - `<master>`: settings that apply to the groups that follow it
/// - `<group>`: settings that apply to the regions that follow it
/// - `<region>`: the basic playable unit, usually one sample
/// - `<curve>`, `<effect>`: definitions that take no part in inheritance
///
/// # Edits
///
/// Every mutable access goes through the document so that it can count edits.
/// [`EffectiveRegion`](crate::inheritance::EffectiveRegion) values remember the
/// generation they were computed from and report themselves stale afterwards.
#[derive(Debug, Clone, Default)]
pub struct SfzDocument {
    sections: Vec<SfzSection>,

    /// Files the document was read from: the root file first, then included files
    /// in the order they were first read. [`Origin::file`] indexes this list.
    pub sources: Vec<PathBuf>,

    /// The encoding used to decode opcode values
    pub encoding: DocumentEncoding,

    /// Non-fatal findings of the preprocessor
    pub diagnostics: Vec<Diagnostic>,

    generation: u64,
}

impl SfzDocument {
    /// Creates a new empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a document from already parsed parts
    pub fn from_parts(
        sections: Vec<SfzSection>,
        sources: Vec<PathBuf>,
        encoding: DocumentEncoding,
        diagnostics: Vec<Diagnostic>,
    ) -> Self {
        Self { sections, sources, encoding, diagnostics, generation: 0 }
    }

    /// The root file, if the document was read from disk
    pub fn source_file(&self) -> Option<&Path> {
        self.sources
            .first()
            .map(PathBuf::as_path)
            .filter(|path| !path.as_os_str().is_empty())
    }

    /// The path of a source file by id
    pub fn source_path(&self, file: FileId) -> Option<&Path> {
        self.sources.get(file).map(PathBuf::as_path)
    }

    /// All sections in document order
    pub fn sections(&self) -> &[SfzSection] {
        &self.sections
    }

    pub fn section(&self, index: usize) -> Option<&SfzSection> {
        self.sections.get(index)
    }

    /// Mutable access to one section; counts as an edit
    pub fn section_mut(&mut self, index: usize) -> Option<&mut SfzSection> {
        let section = self.sections.get_mut(index)?;
        self.generation += 1;
        Some(section)
    }

    /// Regions with their section index, in document order
    pub fn regions(&self) -> impl Iterator<Item = (usize, &SfzSection)> + '_ {
        self.sections
            .iter()
            .enumerate()
            .filter(|(_, section)| section.section_type == SfzSectionType::Region)
    }

    /// Returns true if this document contains at least one region
    pub fn has_regions(&self) -> bool {
        self.regions().next().is_some()
    }

    /// The last `<control>` section, which is the one in effect at the end of the file
    pub fn control(&self) -> Option<&SfzSection> {
        self.sections
            .iter()
            .rev()
            .find(|section| section.section_type == SfzSectionType::Control)
    }

    /// Append a section and return its index
    pub fn push_section(&mut self, section: SfzSection) -> usize {
        self.sections.push(section);
        self.generation += 1;
        self.sections.len() - 1
    }

    /// Set an opcode in a section, encoding the value in the document encoding
    ///
    /// Characters the encoding cannot represent become `?`. An existing opcode keeps
    /// its position and provenance. Returns `false` when no section has that index.
    pub fn set_opcode(&mut self, section: usize, name: &str, value: &str) -> bool {
        let raw = self.encoding.encoding.encode_lossy(value);
        let Some(target) = self.sections.get_mut(section) else {
            return false;
        };
        let origin = target.opcode(name).map(|opcode| opcode.origin).unwrap_or_default();
        target.insert(Opcode::from_raw(name, raw, self.encoding.encoding, origin));
        self.generation += 1;
        true
    }

    /// Remove an opcode from a section
    pub fn remove_opcode(&mut self, section: usize, name: &str) -> Option<Opcode> {
        let removed = self.sections.get_mut(section)?.remove_opcode(name)?;
        self.generation += 1;
        Some(removed)
    }

    /// Number of edits made since the document was parsed
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Every opcode name that appears literally in some section
    pub fn opcodes_used(&self) -> BTreeSet<String> {
        self.sections
            .iter()
            .flat_map(|section| section.opcodes.iter().map(|opcode| opcode.name.clone()))
            .collect()
    }

    /// Number of sections that define `name` literally
    pub fn opcode_count(&self, name: &str) -> usize {
        self.sections.iter().filter(|section| section.opcode(name).is_some()).count()
    }
}

/// Types of SFZ sections
///
/// Header names are matched case-insensitively. Headers this crate does not know
/// are kept as [`SfzSectionType::Unknown`] with their original spelling, so that
/// they survive a round trip through the serializer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SfzSectionType {
    /// Settings that apply to all regions
    Global,

    /// Instrument-wide settings such as `default_path`
    Control,

    /// Intermediate level between global and group
    Master,

    /// Settings for a related collection of regions
    Group,

    /// A single sample and how it is played
    Region,

    /// A custom response curve
    Curve,

    /// Audio effect settings
    Effect,

    /// A header this crate does not interpret, with its spelling as written
    Unknown(String),
}

impl SfzSectionType {
    /// Returns the section type for a header name (without the angle brackets)
    pub fn from_header(header: &str) -> Self {
        match header.to_lowercase().as_str() {
            "global" => Self::Global,
            "control" => Self::Control,
            "master" => Self::Master,
            "group" => Self::Group,
            "region" => Self::Region,
            "curve" => Self::Curve,
            "effect" => Self::Effect,
            _ => Self::Unknown(header.to_string()),
        }
    }

    /// The header name without angle brackets
    pub fn name(&self) -> &str {
        match self {
            Self::Global => "global",
            Self::Control => "control",
            Self::Master => "master",
            Self::Group => "group",
            Self::Region => "region",
            Self::Curve => "curve",
            Self::Effect => "effect",
            Self::Unknown(name) => name,
        }
    }

    /// The header as it appears in an SFZ file, e.g. `<region>`
    pub fn header_str(&self) -> String {
        format!("<{}>", self.name())
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown(_))
    }
}

impl fmt::Display for SfzSectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.name())
    }
}

/// One `name=value` pair
///
/// `raw` holds the value bytes exactly as read (after macro expansion); `value` is
/// their decoding in the document encoding, lossy when the bytes are invalid.
/// Equality compares name and decoded value only, so that the same content read from
/// differently encoded files, or at different places, compares equal.
#[derive(Debug, Clone, Eq)]
pub struct Opcode {
    pub name: String,
    pub value: String,
    pub raw: Vec<u8>,
    pub origin: Origin,
}

impl Opcode {
    /// Creates an opcode with a UTF-8 value and no provenance
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        Self { name: name.into(), raw: value.as_bytes().to_vec(), value, origin: Origin::default() }
    }

    /// Creates an opcode from raw bytes read in `encoding`
    pub fn from_raw(name: impl Into<String>, raw: Vec<u8>, encoding: SourceEncoding, origin: Origin) -> Self {
        Self { name: name.into(), value: encoding.decode_lossy(&raw), raw, origin }
    }
}

impl PartialEq for Opcode {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.value == other.value
    }
}

/// A section of an SFZ file with its opcodes
///
/// Opcodes are kept in the order they were first defined. Defining an opcode a
/// second time keeps its position and replaces its value.
#[derive(Debug, Clone)]
pub struct SfzSection {
    /// The type of section (global, region, etc.)
    pub section_type: SfzSectionType,

    /// The opcodes of this section in definition order
    pub opcodes: Vec<Opcode>,

    /// Where the header was written
    pub origin: Origin,

    /// Set on the headerless section that collects opcodes written before the first
    /// header, see [`OrphanPolicy`](crate::parser::OrphanPolicy)
    pub implicit: bool,
}

impl PartialEq for SfzSection {
    fn eq(&self, other: &Self) -> bool {
        self.section_type == other.section_type
            && self.implicit == other.implicit
            && self.opcodes == other.opcodes
    }
}

impl SfzSection {
    /// Creates a new section with the specified type and no opcodes
    pub fn new(section_type: SfzSectionType) -> Self {
        Self { section_type, opcodes: Vec::new(), origin: Origin::default(), implicit: false }
    }

    pub fn with_origin(section_type: SfzSectionType, origin: Origin) -> Self {
        Self { origin, ..Self::new(section_type) }
    }

    /// Adds an opcode with a UTF-8 value
    pub fn add_opcode(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.insert(Opcode::new(name, value));
    }

    /// Adds an opcode; an existing opcode of the same name is replaced in place
    pub fn insert(&mut self, opcode: Opcode) {
        match self.opcodes.iter_mut().find(|existing| existing.name == opcode.name) {
            Some(existing) => *existing = opcode,
            None => self.opcodes.push(opcode),
        }
    }

    pub fn opcode(&self, name: &str) -> Option<&Opcode> {
        self.opcodes.iter().find(|opcode| opcode.name == name)
    }

    /// Gets an opcode value as a string slice if it exists
    pub fn get_opcode_str(&self, name: &str) -> Option<&str> {
        self.opcode(name).map(|opcode| opcode.value.as_str())
    }

    pub fn remove_opcode(&mut self, name: &str) -> Option<Opcode> {
        let index = self.opcodes.iter().position(|opcode| opcode.name == name)?;
        Some(self.opcodes.remove(index))
    }

    pub fn len(&self) -> usize {
        self.opcodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.opcodes.is_empty()
    }
}

/// A non-fatal finding recorded while reading a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// `$NAME` was used without a matching `#define`; the text was kept as written
    UnknownMacro { name: String, origin: Origin },
}

impl Diagnostic {
    pub fn origin(&self) -> Origin {
        match self {
            Diagnostic::UnknownMacro { origin, .. } => *origin,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UnknownMacro { name, origin } => {
                write!(f, "unknown macro ${} at line {}", name, origin.line)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_keeps_first_position_and_last_value() {
        let mut section = SfzSection::new(SfzSectionType::Region);
        section.add_opcode("sample", "a.wav");
        section.add_opcode("key", "60");
        section.add_opcode("sample", "b.wav");

        let names: Vec<_> = section.opcodes.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["sample", "key"]);
        assert_eq!(section.get_opcode_str("sample"), Some("b.wav"));
    }

    #[test]
    fn test_section_type_from_header() {
        assert_eq!(SfzSectionType::from_header("REGION"), SfzSectionType::Region);
        assert_eq!(
            SfzSectionType::from_header("Midi"),
            SfzSectionType::Unknown("Midi".to_string())
        );
        assert_eq!(SfzSectionType::from_header("Midi").header_str(), "<Midi>");
    }

    #[test]
    fn test_edits_bump_generation() {
        let mut doc = SfzDocument::new();
        let region = doc.push_section(SfzSection::new(SfzSectionType::Region));
        let start = doc.generation();

        assert!(doc.set_opcode(region, "sample", "kick.wav"));
        assert!(!doc.set_opcode(7, "sample", "kick.wav"));
        assert_eq!(doc.generation(), start + 1);

        assert!(doc.remove_opcode(region, "missing").is_none());
        assert_eq!(doc.generation(), start + 1);
        assert!(doc.remove_opcode(region, "sample").is_some());
        assert_eq!(doc.generation(), start + 2);
    }

    #[test]
    fn test_set_opcode_encodes_in_document_encoding() {
        let mut doc = SfzDocument::new();
        doc.encoding = DocumentEncoding::declared(SourceEncoding::Latin1);
        let region = doc.push_section(SfzSection::new(SfzSectionType::Region));
        doc.set_opcode(region, "sample", "café.wav");

        let opcode = doc.sections()[region].opcode("sample").unwrap();
        assert_eq!(opcode.raw, b"caf\xE9.wav".to_vec());
        assert_eq!(opcode.value, "café.wav");
    }

    #[test]
    fn test_opcodes_used_and_count() {
        let mut doc = SfzDocument::new();
        let mut group = SfzSection::new(SfzSectionType::Group);
        group.add_opcode("amp_veltrack", "100");
        let mut region = SfzSection::new(SfzSectionType::Region);
        region.add_opcode("amp_veltrack", "50");
        region.add_opcode("sample", "a.wav");
        doc.push_section(group);
        doc.push_section(region);

        let used: Vec<_> = doc.opcodes_used().into_iter().collect();
        assert_eq!(used, vec!["amp_veltrack".to_string(), "sample".to_string()]);
        assert_eq!(doc.opcode_count("amp_veltrack"), 2);
        assert_eq!(doc.opcode_count("sample"), 1);
    }
}
