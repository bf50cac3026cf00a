//! The feature pipeline: raw (energy, intensity) curve in, fixed-length
//! order-invariant vector out. This transform is the contract shared by
//! training, validation and serving; all three must run it with the same
//! configuration as the model they pair with.

pub mod peak_detection;
pub mod vectorize;

use crate::errors::DataProcessingError;
use crate::models::{
    Peak,
    Spectrum,
    SpectrumRecord,
};
use peak_detection::{
    fwhm_at,
    PeakDetector,
};
use rayon::prelude::*;
use serde::{
    Deserialize,
    Serialize,
};
pub use vectorize::{
    vectorize,
    PeakSummary,
    SpectrumFeatures,
};

/// Extraction parameters. These are part of a trained model's schema and
/// are persisted in the model manifest: serving a model with different
/// values silently degrades accuracy, so they travel together.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Prominence threshold as a fraction of the curve's maximum intensity.
    pub prominence: f64,
    /// Number of peak slots in the output vector.
    pub max_peaks: usize,
    /// Whether each peak contributes a FWHM feature as well.
    #[serde(default)]
    pub include_fwhm: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            prominence: 0.05,
            max_peaks: 15,
            include_fwhm: false,
        }
    }
}

impl FeatureConfig {
    pub fn validate(&self) -> Result<(), DataProcessingError> {
        if !(self.prominence > 0.0) || !self.prominence.is_finite() {
            return Err(DataProcessingError::InvalidParameter {
                param: "prominence",
                context: format!("must be a finite value > 0, got {}", self.prominence),
            });
        }
        if self.max_peaks == 0 {
            return Err(DataProcessingError::InvalidParameter {
                param: "max_peaks",
                context: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn features_per_peak(&self) -> usize {
        if self.include_fwhm {
            3
        } else {
            2
        }
    }

    /// Length of every vector produced under this configuration.
    pub fn feature_len(&self) -> usize {
        self.max_peaks * self.features_per_peak()
    }
}

/// Extracts the feature vector for one spectrum.
///
/// Pure and deterministic: same input and configuration, bit-identical
/// output. Errors only on a shape precondition violation; a spectrum with
/// no detectable peaks is NOT an error here, it comes back as a zero
/// vector with no summary and the caller decides what degenerate means at
/// its boundary.
pub fn extract_features(
    spectrum: &Spectrum,
    config: &FeatureConfig,
) -> Result<SpectrumFeatures, DataProcessingError> {
    config.validate()?;
    spectrum.validate()?;
    let detected = PeakDetector::new(config.prominence).detect(spectrum);
    let peaks: Vec<Peak> = detected
        .into_iter()
        .map(|d| Peak {
            center: d.center,
            amplitude: d.amplitude,
            fwhm: if config.include_fwhm {
                Some(fwhm_at(&spectrum.energy, &spectrum.intensity, d.index))
            } else {
                None
            },
        })
        .collect();
    Ok(vectorize(&peaks, config.max_peaks, config.include_fwhm))
}

/// Batch form used by the training pipeline. Each call owns its inputs and
/// allocates its output, so records are processed in parallel with no
/// coordination; output order matches input order.
pub fn extract_feature_rows(
    records: &[SpectrumRecord],
    config: &FeatureConfig,
) -> Result<Vec<SpectrumFeatures>, DataProcessingError> {
    records
        .par_iter()
        .map(|record| {
            extract_features(&record.spectrum, config)
                .map_err(|e| e.append_to_context(&format!(" (record id {})", record.id)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spectrum(energy: Vec<f64>, intensity: Vec<f64>) -> Spectrum {
        Spectrum::try_new(energy, intensity).unwrap()
    }

    #[test]
    fn test_three_peak_scenario() {
        let sp = spectrum(
            vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            vec![0.0, 1.0, 0.0, 5.0, 0.0, 2.0, 0.0],
        );
        let config = FeatureConfig {
            prominence: 0.1,
            max_peaks: 3,
            include_fwhm: false,
        };
        let out = extract_features(&sp, &config).unwrap();
        assert_eq!(out.vector, vec![0.0, 5.0, 2.0, 2.0, -2.0, 1.0]);
        assert!(!out.is_degenerate());
    }

    #[test]
    fn test_flat_intensity_is_degenerate_zero_vector() {
        let sp = spectrum(vec![0.0, 1.0, 2.0, 3.0], vec![1.0, 1.0, 1.0, 1.0]);
        let config = FeatureConfig {
            prominence: 0.1,
            max_peaks: 4,
            include_fwhm: false,
        };
        let out = extract_features(&sp, &config).unwrap();
        assert_eq!(out.vector, vec![0.0; 8]);
        assert!(out.is_degenerate());
    }

    #[test]
    fn test_single_peak_padded_to_five_slots() {
        let sp = spectrum(
            vec![0.0, 1.0, 2.0, 3.0, 4.0],
            vec![0.0, 0.5, 3.0, 0.5, 0.0],
        );
        let config = FeatureConfig {
            prominence: 0.1,
            max_peaks: 5,
            include_fwhm: false,
        };
        let out = extract_features(&sp, &config).unwrap();
        assert_eq!(out.vector.len(), 10);
        assert_eq!(&out.vector[..2], &[0.0, 3.0]);
        assert!(out.vector[2..].iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_deterministic_across_calls() {
        let sp = spectrum(
            vec![0.5, 1.5, 2.5, 3.5, 4.5, 5.5, 6.5],
            vec![0.1, 2.3, 0.2, 7.7, 0.3, 4.1, 0.1],
        );
        let config = FeatureConfig::default();
        let a = extract_features(&sp, &config).unwrap();
        let b = extract_features(&sp, &config).unwrap();
        assert_eq!(a.vector, b.vector);
        assert_eq!(a.summary, b.summary);
    }

    #[test]
    fn test_mismatched_lengths_fail_loudly() {
        let sp = Spectrum {
            energy: vec![0.0, 1.0, 2.0],
            intensity: vec![0.0, 1.0],
        };
        let res = extract_features(&sp, &FeatureConfig::default());
        assert!(matches!(
            res,
            Err(DataProcessingError::ExpectedSlicesSameLength { .. })
        ));
    }

    #[test]
    fn test_config_validation() {
        assert!(FeatureConfig::default().validate().is_ok());
        let bad_prom = FeatureConfig {
            prominence: 0.0,
            ..Default::default()
        };
        assert!(bad_prom.validate().is_err());
        let bad_slots = FeatureConfig {
            max_peaks: 0,
            ..Default::default()
        };
        assert!(bad_slots.validate().is_err());
    }

    #[test]
    fn test_feature_len_tracks_fwhm() {
        let mut config = FeatureConfig::default();
        assert_eq!(config.feature_len(), 30);
        config.include_fwhm = true;
        assert_eq!(config.feature_len(), 45);
    }

    #[test]
    fn test_batch_order_matches_input() {
        let records: Vec<SpectrumRecord> = (0..8)
            .map(|i| SpectrumRecord {
                qd_id: "SQ-01".to_string(),
                id: format!("r{}", i),
                label: "1".to_string(),
                spectrum: spectrum(
                    vec![0.0, 1.0, 2.0, 3.0, 4.0],
                    vec![0.0, i as f64 + 1.0, 0.0, 2.0, 0.0],
                ),
            })
            .collect();
        let config = FeatureConfig {
            prominence: 0.01,
            max_peaks: 2,
            include_fwhm: false,
        };
        let rows = extract_feature_rows(&records, &config).unwrap();
        assert_eq!(rows.len(), records.len());
        for (i, row) in rows.iter().enumerate() {
            let single = extract_features(&records[i].spectrum, &config).unwrap();
            assert_eq!(row.vector, single.vector);
        }
    }
}
