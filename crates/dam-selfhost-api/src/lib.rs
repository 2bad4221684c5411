pub mod schemas;

pub use schemas::*;

/// Provider name reported on every prediction response.
pub const PROVIDER: &str = "dam-selfhost";
/// Upstream model identifier reported on every prediction response.
pub const MODEL: &str = "KintsugiHealth/dam";
