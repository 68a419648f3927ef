mod audio;
mod ids;
mod processing;
mod track;

pub use audio::{db_to_linear, linear_to_db, AudioBuffer, AudioFormat, SampleRate};
pub use ids::{PresetName, TrackId};
pub use processing::{
    ParameterBounds, ProcessingParameters, CRITICAL_BAND_FREQUENCIES, EQ_BAND_COUNT,
};
pub use track::{FileSignature, TrackInfo};
