//! Dataset files exchanged between the pipeline stages.
//!
//! `convert` writes a JSON array of labeled spectra; `extract` turns that
//! into a training set whose header carries the feature configuration it
//! was extracted with, so `train` persists the exact same configuration
//! into the model bundle.

use crate::errors::{
    Result,
    SpecSeekError,
};
use crate::features::FeatureConfig;
use crate::ml::TrainingRow;
use crate::models::SpectrumRecord;
use rand::Rng;
use regex::Regex;
use serde::{
    Deserialize,
    Serialize,
};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use std::sync::OnceLock;

pub const RECORD_ID_LEN: usize = 6;

/// One extracted feature row of the training set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub qd_id: String,
    pub id: String,
    pub label: String,
    pub features: Vec<f64>,
}

/// The training set file: feature rows plus the configuration that
/// produced them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSet {
    pub feature_config: FeatureConfig,
    pub records: Vec<FeatureRecord>,
}

impl TrainingSet {
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| SpecSeekError::Io {
            source: e,
            path: Some(path.to_path_buf()),
        })?;
        Ok(serde_json::from_reader(file)?)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| SpecSeekError::Io {
            source: e,
            path: Some(path.to_path_buf()),
        })?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    /// Builds the classifier inputs: the sorted label table and one
    /// training row per record.
    pub fn to_rows(&self) -> (Vec<String>, Vec<TrainingRow>) {
        let mut label_table: BTreeMap<&str, usize> = BTreeMap::new();
        for record in &self.records {
            let next = label_table.len();
            label_table.entry(record.label.as_str()).or_insert(next);
        }
        // BTreeMap iteration is sorted; re-number so indices follow the
        // sorted label order.
        let labels: Vec<String> = label_table.keys().map(|k| k.to_string()).collect();
        for (idx, (_, slot)) in label_table.iter_mut().enumerate() {
            *slot = idx;
        }
        let rows = self
            .records
            .iter()
            .map(|record| TrainingRow {
                features: record.features.clone(),
                label_idx: label_table[record.label.as_str()],
            })
            .collect();
        (labels, rows)
    }

    /// Per-label record counts, for the extraction summary log.
    pub fn label_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            *counts.entry(record.label.clone()).or_insert(0) += 1;
        }
        counts
    }
}

pub fn read_converted(path: &Path) -> Result<Vec<SpectrumRecord>> {
    let file = File::open(path).map_err(|e| SpecSeekError::Io {
        source: e,
        path: Some(path.to_path_buf()),
    })?;
    Ok(serde_json::from_reader(file)?)
}

pub fn write_converted(path: &Path, records: &[SpectrumRecord]) -> Result<()> {
    let file = File::create(path).map_err(|e| SpecSeekError::Io {
        source: e,
        path: Some(path.to_path_buf()),
    })?;
    serde_json::to_writer_pretty(file, records)?;
    Ok(())
}

/// File name a record is exported under; the label travels in the name so
/// validation can recover the ground truth without a sidecar file.
pub fn spectrum_file_name(record: &SpectrumRecord) -> String {
    format!(
        "{}_label_{}_id_{}.txt",
        record.qd_id, record.label, record.id
    )
}

/// Recovers the ground-truth label from an exported file name, or `None`
/// when the name does not follow the `*_label_<value>_id_<id>.txt`
/// convention.
pub fn label_from_file_name(name: &str) -> Option<String> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| Regex::new(r"_label_(.*?)_id_").expect("static pattern"));
    re.captures(name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Random 6-character alphanumeric record id.
pub fn random_record_id(rng: &mut impl Rng) -> String {
    (0..RECORD_ID_LEN)
        .map(|_| char::from(rng.sample(rand::distr::Alphanumeric)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Spectrum;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn record(label: &str, features: Vec<f64>) -> FeatureRecord {
        FeatureRecord {
            qd_id: "SQ-01".to_string(),
            id: "abc123".to_string(),
            label: label.to_string(),
            features,
        }
    }

    #[test]
    fn test_file_name_roundtrip() {
        let rec = SpectrumRecord {
            qd_id: "SQ-01".to_string(),
            id: "YnaJBO".to_string(),
            label: "3".to_string(),
            spectrum: Spectrum::try_new(vec![1.0, 2.0], vec![0.0, 1.0]).unwrap(),
        };
        let name = spectrum_file_name(&rec);
        assert_eq!(name, "SQ-01_label_3_id_YnaJBO.txt");
        assert_eq!(label_from_file_name(&name), Some("3".to_string()));
    }

    #[test]
    fn test_label_from_unconventional_name() {
        assert_eq!(label_from_file_name("whatever.txt"), None);
        // Labels are not constrained to digits.
        assert_eq!(
            label_from_file_name("Square 5_label_1b_id_YnaJBO.txt"),
            Some("1b".to_string())
        );
    }

    #[test]
    fn test_to_rows_sorted_label_table() {
        let set = TrainingSet {
            feature_config: FeatureConfig::default(),
            records: vec![
                record("2", vec![1.0]),
                record("1", vec![2.0]),
                record("2", vec![3.0]),
            ],
        };
        let (labels, rows) = set.to_rows();
        assert_eq!(labels, vec!["1".to_string(), "2".to_string()]);
        assert_eq!(rows[0].label_idx, 1);
        assert_eq!(rows[1].label_idx, 0);
        assert_eq!(rows[2].label_idx, 1);
    }

    #[test]
    fn test_label_counts() {
        let set = TrainingSet {
            feature_config: FeatureConfig::default(),
            records: vec![
                record("1", vec![]),
                record("1", vec![]),
                record("2", vec![]),
            ],
        };
        let counts = set.label_counts();
        assert_eq!(counts["1"], 2);
        assert_eq!(counts["2"], 1);
    }

    #[test]
    fn test_random_record_id_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        let id = random_record_id(&mut rng);
        assert_eq!(id.len(), RECORD_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
