//! SFZ instrument parsing, inheritance and serialization.
//!
//! This crate reads SFZ instrument definitions, including `#define` macros and
//! `#include` files, into a flat [`SfzDocument`], and writes them back out. On top
//! of the document it provides:
//! - Inheritance resolution: the effective opcodes of every region
//! - Sample path resolution and auditing
//! - Opcode usage reports over many files, processed in parallel
//! - Resampling support and instrument copying
//!
//! # Example
//!
//! ```
//! use sfzen::{parse_sfz_str, resolve, serialize, ParseOptions};
//!
//! let doc = parse_sfz_str(
//!     "#define $VOL -6\n<global> volume=$VOL\n<region> sample=kick.wav key=36\n",
//!     &ParseOptions::default(),
//! )?;
//!
//! let regions = resolve(&doc);
//! assert_eq!(regions[0].value("volume"), Some("-6"));
//! assert_eq!(serialize(&doc), "<global>\nvolume=-6\n\n<region>\nsample=kick.wav\nkey=36\n");
//! # Ok::<(), sfzen::Error>(())
//! ```

pub mod batch;
pub mod inheritance;
pub mod parser;
pub mod relocate;
pub mod resample;
pub mod samples;
pub mod serialize;

pub use batch::{count_opcode_usage, process_batch, BatchOutcome, UsageReport};
pub use inheritance::{
    regions_triggered_by, resolve, resolve_region, EffectiveOpcode, EffectiveRegion, Scope, SfzHierarchy,
    TriggerQuery,
};
pub use parser::{
    parse_sfz_bytes, parse_sfz_file, parse_sfz_str, parse_with_resolver, Diagnostic, DocumentEncoding, Error,
    LoopMode, Opcode, OrphanPolicy, ParseOptions, RegionLogicOpcodes, Result, SamplePlaybackOpcodes, SfzDocument,
    SfzOpcodes, SfzSection, SfzSectionType, SourceEncoding, TriggerMode,
};
pub use relocate::{copy_instrument, CopyPlan, CopyReport};
pub use resample::{apply_conversion, plan_resample, probe_sample_format, SampleFormat, TargetFormat};
pub use samples::{audit_samples, locate_sample, resolve_sample, ResolvedSamplePath, SampleAudit, SampleIssue};
pub use serialize::{serialize, serialize_bytes, serialize_with, write_sfz, OpcodeOrder, SerializeOptions};
