use crate::errors::DataProcessingError;
use serde::{
    Deserialize,
    Serialize,
};

/// A single measured spectrum: paired energy/intensity samples sharing an
/// index. Energy is in ascending order as produced by the lab-file
/// converter; intensities are non-negative in arbitrary units.
///
/// Deserialization does not run the shape checks, so every entry point of
/// the feature pipeline calls [`Spectrum::validate`] before touching the
/// data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spectrum {
    pub energy: Vec<f64>,
    pub intensity: Vec<f64>,
}

impl Spectrum {
    pub fn try_new(energy: Vec<f64>, intensity: Vec<f64>) -> Result<Self, DataProcessingError> {
        let out = Self { energy, intensity };
        out.validate()?;
        Ok(out)
    }

    /// Fails loudly on a mismatched-length pair or empty input instead of
    /// letting garbage reach the vectorizer.
    pub fn validate(&self) -> Result<(), DataProcessingError> {
        if self.energy.len() != self.intensity.len() {
            return Err(DataProcessingError::ExpectedSlicesSameLength {
                expected: self.energy.len(),
                other: self.intensity.len(),
                context: "Spectrum energy/intensity".to_string(),
            });
        }
        if self.energy.is_empty() {
            return Err(DataProcessingError::ExpectedNonEmptyData {
                context: Some("Spectrum".to_string()),
            });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.energy.len()
    }

    pub fn is_empty(&self) -> bool {
        self.energy.is_empty()
    }
}

/// A labeled spectrum as stored in the converted dataset.
///
/// `qd_id` identifies the quantum dot the acquisition came from, `id` is a
/// random per-acquisition identifier and `label` is the classification
/// target parsed from the lab directory's marker file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpectrumRecord {
    pub qd_id: String,
    pub id: String,
    pub label: String,
    #[serde(flatten)]
    pub spectrum: Spectrum,
}
