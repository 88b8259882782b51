//! Preferred order of opcodes, used for canonical output and usage reports.

/// Opcodes in the order they are conventionally written; anything else follows
/// in its original order
pub const OPCODE_SORT_ORDER: &[&str] = &[
    "lokey",
    "hikey",
    "lovel",
    "hivel",
    "lochan",
    "hichan",
    "sample",
    "pitch_keycenter",
    "loop_mode",
    "loop_start",
    "loop_end",
    "offset",
    "group",
    "off_by",
    "ampeg_attack",
    "ampeg_decay",
    "ampeg_delay",
    "ampeg_hold",
    "ampeg_release",
    "ampeg_sustain",
    "amplfo_delay",
    "amplfo_depth",
    "amplfo_freq",
    "volume",
    "pan",
    "cutoff",
    "resonance",
    "transpose",
    "tune",
    "pitch_keytrack",
    "pitch_veltrack",
    "fileg_delay",
    "fileg_attack",
    "fileg_decay",
    "fileg_depth",
    "fileg_sustain",
    "fileg_release",
    "fileg_hold",
    "fil_type",
    "fil_veltrack",
    "fillfo_delay",
    "fillfo_depth",
    "fillfo_freq",
    "effect1",
    "effect2",
    "pitcheg_delay",
    "pitcheg_attack",
    "pitcheg_decay",
    "pitcheg_depth",
    "pitcheg_sustain",
    "pitcheg_release",
    "pitcheg_hold",
    "pitchlfo_delay",
    "pitchlfo_depth",
    "pitchlfo_freq",
];

/// Position of `name` in [`OPCODE_SORT_ORDER`]; unlisted names share the last rank
pub fn opcode_rank(name: &str) -> usize {
    OPCODE_SORT_ORDER
        .iter()
        .position(|candidate| *candidate == name)
        .unwrap_or(OPCODE_SORT_ORDER.len())
}

/// Sort opcode names by preferred order; the sort is stable
pub fn name_sorted<S: AsRef<str>>(names: impl IntoIterator<Item = S>) -> Vec<S> {
    let mut names: Vec<S> = names.into_iter().collect();
    names.sort_by_key(|name| opcode_rank(name.as_ref()));
    names
}
