//! Opcode inheritance.
//!
//! Parameters cascade down the SFZ hierarchy: a region sees the opcodes of the
//! nearest preceding `<group>`, the `<master>` that group belongs to and the
//! `<global>` above it, with the more specific scope winning on conflicts. A broader
//! header closes every narrower scope that is still open, so a new `<master>` ends
//! the current group and a new `<global>` ends the current master and group.
//!
//! ```text
//! <global> ampeg_release=0.5      // inherited by both regions
//! <group>  lovel=64
//! <region> sample=a.wav           // ampeg_release=0.5 lovel=64 sample=a.wav
//! <master> volume=-6              // closes the group
//! <region> sample=b.wav           // ampeg_release=0.5 volume=-6 sample=b.wav
//! ```
//!
//! `<control>` takes no part in the cascade except for `default_path`, which falls
//! back to the active control value when no inheritance scope defines it.

use std::collections::BTreeMap;

use crate::parser::{
    Opcode, Origin, RegionLogicOpcodes, SfzDocument, SfzOpcodes, SfzSection, SfzSectionType, SourceEncoding,
};

/// The opcode that falls back to the `<control>` section
const DEFAULT_PATH: &str = "default_path";

/// The scope an effective opcode was taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scope {
    Control,
    Global,
    Master,
    Group,
    Region,
}

impl Scope {
    pub fn of(section_type: &SfzSectionType) -> Option<Scope> {
        match section_type {
            SfzSectionType::Control => Some(Scope::Control),
            SfzSectionType::Global => Some(Scope::Global),
            SfzSectionType::Master => Some(Scope::Master),
            SfzSectionType::Group => Some(Scope::Group),
            SfzSectionType::Region => Some(Scope::Region),
            _ => None,
        }
    }
}

/// One opcode of an [`EffectiveRegion`] with the place it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveOpcode {
    pub value: String,
    pub raw: Vec<u8>,
    pub scope: Scope,
    /// Index of the contributing section
    pub section: usize,
    pub origin: Origin,
}

impl EffectiveOpcode {
    fn new(opcode: &Opcode, scope: Scope, section: usize) -> Self {
        Self { value: opcode.value.clone(), raw: opcode.raw.clone(), scope, section, origin: opcode.origin }
    }
}

/// The complete opcode set of one region, inherited opcodes included
///
/// This is a snapshot: it does not change when the document is edited. Use
/// [`EffectiveRegion::is_stale`] to find out whether it has to be recomputed.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveRegion {
    /// Section index of the region
    pub region: usize,
    pub opcodes: BTreeMap<String, EffectiveOpcode>,
    /// Encoding of the document the region was taken from
    pub encoding: SourceEncoding,
    /// Where the region header was written
    pub origin: Origin,
    generation: u64,
}

impl EffectiveRegion {
    pub fn get(&self, name: &str) -> Option<&EffectiveOpcode> {
        self.opcodes.get(name)
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.opcodes.get(name).map(|opcode| opcode.value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.opcodes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.opcodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.opcodes.is_empty()
    }

    /// The document generation this region was computed from
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True if `doc` has been edited since this region was computed
    pub fn is_stale(&self, doc: &SfzDocument) -> bool {
        doc.generation() != self.generation
    }

    /// Sort key by key range: `lokey * 128 + hikey`
    ///
    /// `key` counts as both bounds; missing bounds default to 1 and 127.
    pub fn sort_key(&self) -> u32 {
        let (lokey, hikey) = match self.key() {
            Ok(key) => (key, key),
            Err(_) => (self.lokey().unwrap_or(1), self.hikey().unwrap_or(127)),
        };
        u32::from(lokey) * 128 + u32::from(hikey)
    }

    /// True if this region covers every bound given in `query`
    ///
    /// Bounds the region does not define never exclude it; an empty query matches
    /// every region.
    pub fn is_triggered_by(&self, query: &TriggerQuery) -> bool {
        let (lokey, hikey) = match self.key() {
            Ok(key) => (Some(key), Some(key)),
            Err(_) => (self.lokey().ok(), self.hikey().ok()),
        };
        let below = |bound: Option<u8>, wanted: Option<u8>| matches!((bound, wanted), (Some(b), Some(w)) if b > w);
        let above = |bound: Option<u8>, wanted: Option<u8>| matches!((bound, wanted), (Some(b), Some(w)) if b < w);

        !(below(lokey, query.lokey)
            || above(hikey, query.hikey)
            || below(self.lovel().ok(), query.lovel)
            || above(self.hivel().ok(), query.hivel))
    }
}

impl SfzOpcodes for EffectiveRegion {
    fn get_opcode_str(&self, name: &str) -> Option<&str> {
        self.value(name)
    }
}

/// Key and velocity criteria for [`EffectiveRegion::is_triggered_by`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriggerQuery {
    pub lokey: Option<u8>,
    pub hikey: Option<u8>,
    pub lovel: Option<u8>,
    pub hivel: Option<u8>,
}

impl TriggerQuery {
    /// Regions that play a single key
    pub fn key(key: u8) -> Self {
        Self { lokey: Some(key), hikey: Some(key), ..Self::default() }
    }

    /// Regions that cover a whole key range
    pub fn keys(lokey: u8, hikey: u8) -> Self {
        Self { lokey: Some(lokey), hikey: Some(hikey), ..Self::default() }
    }

    /// Additionally require a velocity range
    pub fn velocity(self, lovel: u8, hivel: u8) -> Self {
        Self { lovel: Some(lovel), hivel: Some(hivel), ..self }
    }
}

/// Open sections while walking a document front to back
#[derive(Debug, Default)]
struct ScopeTracker {
    global: Option<usize>,
    master: Option<usize>,
    group: Option<usize>,
    control: Option<usize>,
}

impl ScopeTracker {
    /// Enter section `index`, returning its parent
    fn enter(&mut self, index: usize, section_type: &SfzSectionType) -> Option<usize> {
        match section_type {
            SfzSectionType::Global => {
                self.global = Some(index);
                self.master = None;
                self.group = None;
                None
            }
            SfzSectionType::Master => {
                self.master = Some(index);
                self.group = None;
                self.global
            }
            SfzSectionType::Group => {
                self.group = Some(index);
                self.master.or(self.global)
            }
            SfzSectionType::Region => self.group.or(self.master).or(self.global),
            SfzSectionType::Control => {
                self.control = Some(index);
                None
            }
            _ => None,
        }
    }

    /// The open inheritance scopes, broadest first
    fn chain(&self) -> impl Iterator<Item = usize> {
        [self.global, self.master, self.group].into_iter().flatten()
    }
}

fn effective_region(doc: &SfzDocument, tracker: &ScopeTracker, index: usize, region: &SfzSection) -> EffectiveRegion {
    let mut opcodes = BTreeMap::new();
    let sections = doc.sections();

    for scope_index in tracker.chain() {
        let section = &sections[scope_index];
        if let Some(scope) = Scope::of(&section.section_type) {
            for opcode in &section.opcodes {
                opcodes.insert(opcode.name.clone(), EffectiveOpcode::new(opcode, scope, scope_index));
            }
        }
    }
    for opcode in &region.opcodes {
        opcodes.insert(opcode.name.clone(), EffectiveOpcode::new(opcode, Scope::Region, index));
    }

    if !opcodes.contains_key(DEFAULT_PATH) {
        if let Some(control_index) = tracker.control {
            if let Some(opcode) = sections[control_index].opcode(DEFAULT_PATH) {
                opcodes.insert(
                    DEFAULT_PATH.to_string(),
                    EffectiveOpcode::new(opcode, Scope::Control, control_index),
                );
            }
        }
    }

    EffectiveRegion {
        region: index,
        opcodes,
        encoding: doc.encoding.encoding,
        origin: region.origin,
        generation: doc.generation(),
    }
}

/// Compute the effective opcode set of every region, in document order
pub fn resolve(doc: &SfzDocument) -> Vec<EffectiveRegion> {
    let mut tracker = ScopeTracker::default();
    let mut regions = Vec::new();

    for (index, section) in doc.sections().iter().enumerate() {
        tracker.enter(index, &section.section_type);
        if section.section_type == SfzSectionType::Region {
            regions.push(effective_region(doc, &tracker, index, section));
        }
    }

    regions
}

/// Compute the effective opcode set of the region at section `index`
pub fn resolve_region(doc: &SfzDocument, index: usize) -> Option<EffectiveRegion> {
    let region = doc.section(index).filter(|section| section.section_type == SfzSectionType::Region)?;
    let mut tracker = ScopeTracker::default();
    for (position, section) in doc.sections()[..=index].iter().enumerate() {
        tracker.enter(position, &section.section_type);
    }
    Some(effective_region(doc, &tracker, index, region))
}

/// Effective regions that cover the criteria of `query`
pub fn regions_triggered_by(doc: &SfzDocument, query: &TriggerQuery) -> Vec<EffectiveRegion> {
    resolve(doc).into_iter().filter(|region| region.is_triggered_by(query)).collect()
}

/// Tree view of a document: the parent and children of every section
///
/// Sections outside the cascade (`<control>`, `<curve>`, `<effect>` and unknown
/// headers) have neither.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SfzHierarchy {
    parents: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
    controls: Vec<Option<usize>>,
}

impl SfzHierarchy {
    pub fn new(doc: &SfzDocument) -> Self {
        let count = doc.sections().len();
        let mut tracker = ScopeTracker::default();
        let mut parents = Vec::with_capacity(count);
        let mut children = vec![Vec::new(); count];
        let mut controls = Vec::with_capacity(count);

        for (index, section) in doc.sections().iter().enumerate() {
            let parent = tracker.enter(index, &section.section_type);
            if let Some(parent) = parent {
                children[parent].push(index);
            }
            parents.push(parent);
            controls.push(tracker.control);
        }

        Self { parents, children, controls }
    }

    pub fn parent(&self, section: usize) -> Option<usize> {
        self.parents.get(section).copied().flatten()
    }

    pub fn children(&self, section: usize) -> &[usize] {
        self.children.get(section).map_or(&[], Vec::as_slice)
    }

    /// Parent, grandparent and so on, nearest first
    pub fn ancestors(&self, section: usize) -> Vec<usize> {
        std::iter::successors(self.parent(section), |&current| self.parent(current)).collect()
    }

    /// The `<control>` section in effect at `section`
    pub fn control(&self, section: usize) -> Option<usize> {
        self.controls.get(section).copied().flatten()
    }

    /// Sections without a parent, in document order
    pub fn roots(&self) -> Vec<usize> {
        (0..self.parents.len()).filter(|&index| self.parents[index].is_none()).collect()
    }

    /// Every region contained in `section`, recursively, in document order
    ///
    /// For a region this is the region itself.
    pub fn regions_under(&self, doc: &SfzDocument, section: usize) -> Vec<usize> {
        let mut regions = Vec::new();
        let mut pending = vec![section];
        while let Some(current) = pending.pop() {
            if doc.section(current).map(|s| &s.section_type) == Some(&SfzSectionType::Region) {
                regions.push(current);
            }
            pending.extend(self.children(current).iter().rev());
        }
        regions.sort_unstable();
        regions
    }
}

impl SfzDocument {
    /// Look up an opcode for a section, following inheritance
    ///
    /// The section's own value wins, then its group, master and global. For
    /// `default_path` the active `<control>` section is the last fallback.
    pub fn opcode(&self, section: usize, name: &str) -> Option<&Opcode> {
        let hierarchy = SfzHierarchy::new(self);
        let sections = self.sections();

        let own = std::iter::once(section).chain(hierarchy.ancestors(section));
        let found = own.filter_map(|index| sections.get(index)?.opcode(name)).next();
        if found.is_some() || name != DEFAULT_PATH {
            return found;
        }
        let control = hierarchy.control(section)?;
        sections[control].opcode(name)
    }
}
