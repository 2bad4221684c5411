//! Audio staging: turning a request's audio into a bounded local file.

mod acquire;
mod normalize;
mod staging;

pub use acquire::{AudioFetcher, suffix_for};
pub use normalize::AudioTrimmer;
pub use staging::StagedAudio;
