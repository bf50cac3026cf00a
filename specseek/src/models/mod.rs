pub mod bundle;
pub mod peak;
pub mod spectrum;

pub use bundle::{
    ModelBundle,
    ModelManifest,
};
pub use peak::{
    DetectedPeak,
    Peak,
};
pub use spectrum::{
    Spectrum,
    SpectrumRecord,
};
