//! End-to-end pipeline: synthetic labeled spectra through feature
//! extraction, cross-validation, training, bundle persistence and the
//! prediction service.

use specseek::data_sources::dataset::{
    FeatureRecord,
    TrainingSet,
};
use specseek::features::{
    extract_feature_rows,
    FeatureConfig,
};
use specseek::ml::cv::cross_validate;
use specseek::ml::{
    GBMConfig,
    SpectrumClassifier,
};
use specseek::models::{
    ModelBundle,
    Spectrum,
    SpectrumRecord,
};
use specseek::service::PredictionService;

/// Two quantum-dot classes distinguished by where the satellite peak sits
/// relative to the dominant emission line.
fn synthetic_records() -> Vec<SpectrumRecord> {
    let mut records = Vec::new();
    for i in 0..30 {
        for (label, satellite_offset) in [("near", 2usize), ("far", 7usize)] {
            let mut intensity = vec![0.0; 16];
            intensity[4] = 8.0 + (i % 6) as f64 * 0.2;
            intensity[4 + satellite_offset] = 3.0 + (i % 3) as f64 * 0.1;
            let energy: Vec<f64> = (0..16).map(|j| 1.2 + 0.05 * j as f64).collect();
            records.push(SpectrumRecord {
                qd_id: format!("QD-{}", label),
                id: format!("{}{}", label, i),
                label: label.to_string(),
                spectrum: Spectrum::try_new(energy, intensity).unwrap(),
            });
        }
    }
    records
}

fn scratch_dir(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("specseek-{}-{}", name, std::process::id()));
    if dir.exists() {
        std::fs::remove_dir_all(&dir).unwrap();
    }
    dir
}

#[test]
fn test_extract_train_save_load_predict() {
    let records = synthetic_records();
    let feature_config = FeatureConfig {
        prominence: 0.1,
        max_peaks: 5,
        include_fwhm: false,
    };

    let features = extract_feature_rows(&records, &feature_config).unwrap();
    let training = TrainingSet {
        feature_config,
        records: records
            .iter()
            .zip(features.iter())
            .map(|(record, feats)| {
                assert!(!feats.is_degenerate());
                FeatureRecord {
                    qd_id: record.qd_id.clone(),
                    id: record.id.clone(),
                    label: record.label.clone(),
                    features: feats.vector.clone(),
                }
            })
            .collect(),
    };

    let (labels, rows) = training.to_rows();
    assert_eq!(labels, vec!["far".to_string(), "near".to_string()]);
    assert!(rows.iter().all(|r| r.features.len() == feature_config.feature_len()));

    let gbm = GBMConfig::default();
    let report = cross_validate(&labels, &rows, &gbm, 3, 42).unwrap();
    assert!(
        report.mean_accuracy() > 0.9,
        "separable classes should cross-validate well, got {}",
        report.mean_accuracy()
    );

    let classifier = SpectrumClassifier::fit(labels, &rows, &gbm).unwrap();
    let bundle = ModelBundle::new(feature_config, classifier);

    let dir = scratch_dir("pipeline");
    bundle.save(&dir).unwrap();
    let service = PredictionService::from_dir(&dir).unwrap();
    assert_eq!(service.feature_config(), &feature_config);

    // A fresh "far" spectrum never seen in training.
    let mut intensity = vec![0.0; 16];
    intensity[4] = 7.5;
    intensity[11] = 3.3;
    let energy: Vec<f64> = (0..16).map(|j| 1.2 + 0.05 * j as f64).collect();
    let spectrum = Spectrum::try_new(energy, intensity).unwrap();

    let response = service.predict_spectrum(&spectrum).unwrap();
    assert_eq!(response.prediction, "far");
    assert_eq!(response.peak_centers[0], 0.0);
    assert_eq!(response.peak_amplitudes[0], 7.5);
    assert!((response.dominant_peak_energy - 1.4).abs() < 1e-12);

    // The loaded model and the in-memory one agree.
    let direct = PredictionService::new(bundle);
    let direct_response = direct.predict_spectrum(&spectrum).unwrap();
    assert_eq!(direct_response.prediction, response.prediction);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_training_set_file_roundtrip() {
    let records = synthetic_records();
    let feature_config = FeatureConfig {
        prominence: 0.1,
        max_peaks: 4,
        include_fwhm: true,
    };
    let features = extract_feature_rows(&records, &feature_config).unwrap();
    let training = TrainingSet {
        feature_config,
        records: records
            .iter()
            .zip(features.iter())
            .map(|(record, feats)| FeatureRecord {
                qd_id: record.qd_id.clone(),
                id: record.id.clone(),
                label: record.label.clone(),
                features: feats.vector.clone(),
            })
            .collect(),
    };

    let dir = scratch_dir("training-set");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("training.json");
    training.write(&path).unwrap();
    let back = TrainingSet::from_file(&path).unwrap();
    assert_eq!(back.feature_config, training.feature_config);
    assert_eq!(back.records.len(), training.records.len());
    assert_eq!(back.records[0].features, training.records[0].features);

    std::fs::remove_dir_all(&dir).ok();
}
