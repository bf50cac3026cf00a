use serde::{
    Deserialize,
    Serialize,
};

/// A local maximum accepted by the prominence filter, before any feature
/// post-processing: its sample index plus the energy/intensity values at
/// that index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectedPeak {
    pub index: usize,
    pub center: f64,
    pub amplitude: f64,
}

/// A peak as consumed by the vectorizer. `fwhm` is only populated when the
/// feature configuration asks for the three-feature layout.
///
/// Peaks only live for the duration of one extraction call; they are never
/// persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    pub center: f64,
    pub amplitude: f64,
    pub fwhm: Option<f64>,
}

impl Peak {
    pub fn new(center: f64, amplitude: f64) -> Self {
        Self {
            center,
            amplitude,
            fwhm: None,
        }
    }
}
