use serde::{
    Deserialize,
    Serialize,
};
use specseek::errors::Result;
use specseek::models::Spectrum;
use specseek::service::{
    PredictionResponse,
    PredictionService,
};

/// One prediction request: either parallel energy/intensity arrays, or a
/// raw two-column delimited file body (comma or tab).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredictRequest {
    Arrays {
        energy: Vec<f64>,
        intensity: Vec<f64>,
    },
    Raw {
        raw: String,
    },
}

impl PredictRequest {
    /// A small but realistic request, printed at startup and used for the
    /// warm-up self check.
    pub fn sample() -> Self {
        let energy: Vec<f64> = (0..9).map(|i| 1.3 + 0.05 * i as f64).collect();
        let intensity = vec![0.0, 0.2, 1.0, 0.3, 0.0, 0.1, 0.4, 0.1, 0.0];
        PredictRequest::Arrays { energy, intensity }
    }

    pub fn predict(self, service: &PredictionService) -> Result<PredictionResponse> {
        match self {
            PredictRequest::Arrays { energy, intensity } => {
                let spectrum = Spectrum::try_new(energy, intensity)?;
                service.predict_spectrum(&spectrum)
            }
            PredictRequest::Raw { raw } => service.predict_delimited(&raw),
        }
    }
}
