pub mod data_sources;
pub mod errors;
pub mod features;
pub mod ml;
pub mod models;
pub mod service;

pub use errors::{
    Result,
    SpecSeekError,
};
pub use features::{
    extract_features,
    FeatureConfig,
    SpectrumFeatures,
};
pub use models::{
    ModelBundle,
    Spectrum,
    SpectrumRecord,
};
pub use service::{
    PredictionResponse,
    PredictionService,
};
