//! Persisted model layout: a directory holding `manifest.json` plus one
//! serialized booster per label.
//!
//! The manifest pins the feature extraction parameters next to the trained
//! boosters, so validation and serving can never silently run a different
//! extraction than the one the model was trained with.

use crate::errors::{
    ModelError,
    Result,
    SpecSeekError,
};
use crate::features::FeatureConfig;
use crate::ml::SpectrumClassifier;
use forust_ml::GradientBooster;
use serde::{
    Deserialize,
    Serialize,
};
use std::fs::File;
use std::path::Path;
use tracing::info;

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelManifest {
    pub feature_config: FeatureConfig,
    pub labels: Vec<String>,
    /// Booster file names, one per label, in label order.
    pub boosters: Vec<String>,
}

/// A loaded model plus the extraction parameters it was trained with.
/// Read-only after load; safe to share behind an `Arc`.
pub struct ModelBundle {
    pub manifest: ModelManifest,
    pub classifier: SpectrumClassifier,
}

impl ModelBundle {
    pub fn new(feature_config: FeatureConfig, classifier: SpectrumClassifier) -> Self {
        let manifest = ModelManifest {
            feature_config,
            labels: classifier.labels().to_vec(),
            boosters: (0..classifier.labels().len())
                .map(|i| format!("booster_{}.json", i))
                .collect(),
        };
        Self {
            manifest,
            classifier,
        }
    }

    pub fn feature_config(&self) -> &FeatureConfig {
        &self.manifest.feature_config
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir).map_err(|e| SpecSeekError::Io {
            source: e,
            path: Some(dir.to_path_buf()),
        })?;

        let manifest_path = dir.join(MANIFEST_FILE);
        let file = File::create(&manifest_path).map_err(|e| SpecSeekError::Io {
            source: e,
            path: Some(manifest_path.clone()),
        })?;
        serde_json::to_writer_pretty(file, &self.manifest)?;

        for (name, booster) in self
            .manifest
            .boosters
            .iter()
            .zip(self.classifier.boosters().iter())
        {
            let path = dir.join(name);
            booster
                .save_booster(path.to_str().ok_or_else(|| SpecSeekError::ParseError {
                    msg: format!("non-utf8 model path: {:?}", path),
                })?)
                .map_err(|source| ModelError::BoosterError {
                    source,
                    context: format!("saving {}", name),
                })?;
        }
        info!("saved model bundle to {:?}", dir);
        Ok(())
    }

    pub fn load(dir: &Path) -> Result<Self> {
        let manifest_path = dir.join(MANIFEST_FILE);
        let file = File::open(&manifest_path).map_err(|e| SpecSeekError::Io {
            source: e,
            path: Some(manifest_path),
        })?;
        let manifest: ModelManifest =
            serde_json::from_reader(file).map_err(|source| ModelError::ManifestParsingError {
                source,
                context: "model manifest",
            })?;
        manifest.feature_config.validate()?;
        if manifest.labels.len() != manifest.boosters.len() {
            return Err(ModelError::InconsistentBundle {
                labels: manifest.labels.len(),
                boosters: manifest.boosters.len(),
            }
            .into());
        }

        let mut boosters = Vec::with_capacity(manifest.boosters.len());
        for name in manifest.boosters.iter() {
            let path = dir.join(name);
            let booster = GradientBooster::load_booster(path.to_str().ok_or_else(|| {
                SpecSeekError::ParseError {
                    msg: format!("non-utf8 model path: {:?}", path),
                }
            })?)
            .map_err(|source| ModelError::BoosterError {
                source,
                context: format!("loading {}", name),
            })?;
            boosters.push(booster);
        }

        let classifier = SpectrumClassifier::from_parts(
            manifest.labels.clone(),
            boosters,
            manifest.feature_config.feature_len(),
        )?;
        info!(
            "loaded model bundle from {:?} ({} labels, {} features)",
            dir,
            manifest.labels.len(),
            manifest.feature_config.feature_len()
        );
        Ok(Self {
            manifest,
            classifier,
        })
    }
}
