mod region_logic;
mod sample_playback;

pub use region_logic::RegionLogicOpcodes;
pub use sample_playback::SamplePlaybackOpcodes;
