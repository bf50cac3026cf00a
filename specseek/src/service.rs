//! The prediction service: an explicitly constructed, read-only pairing of
//! a trained model with the extraction parameters it was trained under.
//!
//! Predictions always run the extraction with the bundle's own
//! configuration, so a served model can never be fed features from a
//! mismatched extraction.

use crate::data_sources::delimited::parse_delimited_spectrum;
use crate::errors::{
    DataProcessingError,
    Result,
};
use crate::features::{
    extract_features,
    FeatureConfig,
};
use crate::models::{
    ModelBundle,
    Spectrum,
};
use serde::Serialize;
use std::path::Path;

/// Response payload for one classified spectrum: the predicted label plus
/// the peak diagnostics the features were built from.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionResponse {
    pub prediction: String,
    pub dominant_peak_energy: f64,
    pub peak_centers: Vec<f64>,
    pub peak_amplitudes: Vec<f64>,
}

pub struct PredictionService {
    bundle: ModelBundle,
}

impl PredictionService {
    pub fn new(bundle: ModelBundle) -> Self {
        Self { bundle }
    }

    pub fn from_dir(path: &Path) -> Result<Self> {
        Ok(Self::new(ModelBundle::load(path)?))
    }

    pub fn feature_config(&self) -> &FeatureConfig {
        self.bundle.feature_config()
    }

    pub fn labels(&self) -> &[String] {
        self.bundle.classifier.labels()
    }

    /// Classifies one spectrum.
    ///
    /// A spectrum with no detectable peaks is refused with
    /// [`DataProcessingError::DegenerateSpectrum`]: an all-zero feature
    /// vector carries no evidence and would only produce a nonsense
    /// prediction.
    pub fn predict_spectrum(&self, spectrum: &Spectrum) -> Result<PredictionResponse> {
        let features = extract_features(spectrum, self.bundle.feature_config())?;
        let summary = features
            .summary
            .ok_or_else(|| DataProcessingError::DegenerateSpectrum {
                context: "no peaks above the prominence threshold; no usable signal".to_string(),
            })?;
        let prediction = self.bundle.classifier.predict(&features.vector)?;
        Ok(PredictionResponse {
            prediction: self
                .bundle
                .classifier
                .label_name(prediction.label_idx)
                .to_string(),
            dominant_peak_energy: summary.dominant_energy,
            peak_centers: summary.relative_centers,
            peak_amplitudes: summary.amplitudes,
        })
    }

    /// Classifies a raw two-column delimited payload (comma, then tab).
    pub fn predict_delimited(&self, text: &str) -> Result<PredictionResponse> {
        let spectrum = parse_delimited_spectrum(text)?;
        self.predict_spectrum(&spectrum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SpecSeekError;
    use crate::features::extract_feature_rows;
    use crate::ml::{
        GBMConfig,
        SpectrumClassifier,
        TrainingRow,
    };
    use crate::models::SpectrumRecord;

    /// Records with the dominant peak's satellite at a label-dependent
    /// offset, so the classes are separable from peak features alone.
    fn synthetic_records() -> Vec<SpectrumRecord> {
        let mut records = Vec::new();
        for i in 0..24 {
            let (label, satellite) = if i % 2 == 0 { ("near", 2) } else { ("far", 6) };
            let mut intensity = vec![0.0; 12];
            intensity[3] = 10.0 + (i % 5) as f64 * 0.1;
            intensity[3 + satellite] = 4.0;
            let energy = (0..12).map(|j| j as f64 * 0.5).collect();
            records.push(SpectrumRecord {
                qd_id: "QD-1".to_string(),
                id: format!("r{}", i),
                label: label.to_string(),
                spectrum: Spectrum::try_new(energy, intensity).unwrap(),
            });
        }
        records
    }

    fn config() -> FeatureConfig {
        FeatureConfig {
            prominence: 0.1,
            max_peaks: 4,
            include_fwhm: false,
        }
    }

    fn fitted_service() -> PredictionService {
        let records = synthetic_records();
        let feature_config = config();
        let features = extract_feature_rows(&records, &feature_config).unwrap();
        let labels = vec!["far".to_string(), "near".to_string()];
        let rows: Vec<TrainingRow> = records
            .iter()
            .zip(features.iter())
            .map(|(record, feats)| TrainingRow {
                features: feats.vector.clone(),
                label_idx: if record.label == "far" { 0 } else { 1 },
            })
            .collect();
        let gbm = GBMConfig::default();
        let classifier = SpectrumClassifier::fit(labels, &rows, &gbm).unwrap();
        PredictionService::new(ModelBundle::new(feature_config, classifier))
    }

    #[test]
    fn test_predict_returns_label_and_diagnostics() {
        let service = fitted_service();
        let mut intensity = vec![0.0; 12];
        intensity[3] = 9.0;
        intensity[9] = 4.0;
        let energy: Vec<f64> = (0..12).map(|j| j as f64 * 0.5).collect();
        let spectrum = Spectrum::try_new(energy, intensity).unwrap();

        let response = service.predict_spectrum(&spectrum).unwrap();
        assert_eq!(response.prediction, "far");
        assert_eq!(response.dominant_peak_energy, 1.5);
        assert_eq!(response.peak_centers[0], 0.0);
        assert_eq!(response.peak_amplitudes[0], 9.0);
    }

    #[test]
    fn test_degenerate_spectrum_is_refused() {
        let service = fitted_service();
        let spectrum =
            Spectrum::try_new(vec![0.0, 1.0, 2.0, 3.0], vec![1.0, 1.0, 1.0, 1.0]).unwrap();
        let res = service.predict_spectrum(&spectrum);
        assert!(matches!(
            res,
            Err(SpecSeekError::DataProcessingError(
                DataProcessingError::DegenerateSpectrum { .. }
            ))
        ));
    }

    #[test]
    fn test_predict_delimited_with_tab_payload() {
        let service = fitted_service();
        let mut lines = String::new();
        let mut intensity = vec![0.0; 12];
        intensity[3] = 9.0;
        intensity[5] = 4.0;
        for (j, &v) in intensity.iter().enumerate() {
            lines.push_str(&format!("{}\t{}\n", j as f64 * 0.5, v));
        }
        let response = service.predict_delimited(&lines).unwrap();
        assert_eq!(response.prediction, "near");
    }
}
