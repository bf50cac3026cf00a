//! Gradient-boosted classifier over peak feature vectors.
//!
//! Multi-class prediction is one-vs-rest: one binary LogLoss booster per
//! label, argmax of the per-class raw scores at prediction time.

pub mod cv;

use crate::errors::{
    DataProcessingError,
    ModelError,
    Result,
};
use forust_ml::constraints::ConstraintMap;
use forust_ml::errors::ForustError;
use forust_ml::gradientbooster::{
    GrowPolicy,
    MissingNodeTreatment,
};
use forust_ml::metric::Metric;
use forust_ml::objective::ObjectiveType;
use forust_ml::sampler::SampleMethod;
use forust_ml::{
    GradientBooster,
    Matrix,
};
use std::collections::HashSet;
use tracing::debug;

/// One training sample: a feature vector plus the index of its label in
/// the classifier's label table.
#[derive(Debug, Clone)]
pub struct TrainingRow {
    pub features: Vec<f64>,
    pub label_idx: usize,
}

/// Booster hyperparameters. `GradientBooster::new` takes everything
/// positionally, so the full parameter set lives here with defaults sized
/// for small tabular spectra datasets.
pub struct GBMConfig {
    iterations: usize,
    learning_rate: f32,
    max_depth: usize,
    max_leaves: usize,
    l1: f32,
    l2: f32,
    gamma: f32,
    max_delta_step: f32,
    min_leaf_weight: f32,
    base_score: f64,
    nbins: u16,
    parallel: bool,
    allow_missing_splits: bool,
    monotone_constraints: Option<ConstraintMap>,
    subsample: f32,
    top_rate: f64,
    other_rate: f64,
    colsample_bytree: f64,
    seed: u64,
    missing: f64,
    create_missing_branch: bool,
    sample_method: SampleMethod,
    grow_policy: GrowPolicy,
    evaluation_metric: Option<Metric>,
    early_stopping_rounds: Option<usize>,
    initialize_base_score: bool,
    terminate_missing_features: HashSet<usize>,
    missing_node_treatment: MissingNodeTreatment,
    log_iterations: usize,
    force_children_to_bound_parent: bool,
}

impl Clone for GBMConfig {
    fn clone(&self) -> Self {
        let Self {
            iterations,
            learning_rate,
            max_depth,
            max_leaves,
            l1,
            l2,
            gamma,
            max_delta_step,
            min_leaf_weight,
            base_score,
            nbins,
            parallel,
            allow_missing_splits,
            monotone_constraints,
            subsample,
            top_rate,
            other_rate,
            colsample_bytree,
            seed,
            missing,
            create_missing_branch,
            sample_method,
            grow_policy,
            evaluation_metric,
            early_stopping_rounds,
            initialize_base_score,
            terminate_missing_features,
            missing_node_treatment,
            log_iterations,
            force_children_to_bound_parent,
        } = self;

        Self {
            iterations: *iterations,
            learning_rate: *learning_rate,
            max_depth: *max_depth,
            max_leaves: *max_leaves,
            l1: *l1,
            l2: *l2,
            gamma: *gamma,
            max_delta_step: *max_delta_step,
            min_leaf_weight: *min_leaf_weight,
            base_score: *base_score,
            nbins: *nbins,
            parallel: *parallel,
            allow_missing_splits: *allow_missing_splits,
            monotone_constraints: monotone_constraints.clone(),
            subsample: *subsample,
            top_rate: *top_rate,
            other_rate: *other_rate,
            colsample_bytree: *colsample_bytree,
            seed: *seed,
            missing: *missing,
            create_missing_branch: *create_missing_branch,
            sample_method: match sample_method {
                SampleMethod::None => SampleMethod::None,
                SampleMethod::Random => SampleMethod::Random,
                SampleMethod::Goss => SampleMethod::Goss,
            },
            grow_policy: match grow_policy {
                GrowPolicy::DepthWise => GrowPolicy::DepthWise,
                GrowPolicy::LossGuide => GrowPolicy::LossGuide,
            },
            evaluation_metric: *evaluation_metric,
            early_stopping_rounds: *early_stopping_rounds,
            initialize_base_score: *initialize_base_score,
            terminate_missing_features: terminate_missing_features.clone(),
            missing_node_treatment: *missing_node_treatment,
            log_iterations: *log_iterations,
            force_children_to_bound_parent: *force_children_to_bound_parent,
        }
    }
}

impl Default for GBMConfig {
    fn default() -> Self {
        GBMConfig {
            iterations: 300,
            learning_rate: 0.1,
            max_depth: 5,
            max_leaves: usize::MAX,
            l1: 0.,
            l2: 1.,
            gamma: 0.,
            max_delta_step: 0.,
            min_leaf_weight: 2.,
            base_score: 0.5,
            nbins: 128,
            parallel: true,
            allow_missing_splits: true,
            monotone_constraints: None,
            subsample: 1.0,
            top_rate: 0.1,
            other_rate: 0.2,
            colsample_bytree: 1.0,
            seed: 42,
            missing: f64::NAN,
            create_missing_branch: false,
            sample_method: SampleMethod::None,
            grow_policy: GrowPolicy::DepthWise,
            evaluation_metric: None,
            early_stopping_rounds: None,
            initialize_base_score: true,
            terminate_missing_features: HashSet::new(),
            missing_node_treatment: MissingNodeTreatment::AssignToParent,
            log_iterations: 50,
            force_children_to_bound_parent: false,
        }
    }
}

impl GBMConfig {
    fn try_build(&self) -> std::result::Result<GradientBooster, ForustError> {
        let Self {
            iterations,
            learning_rate,
            max_depth,
            max_leaves,
            l1,
            l2,
            gamma,
            max_delta_step,
            min_leaf_weight,
            base_score,
            nbins,
            parallel,
            allow_missing_splits,
            monotone_constraints,
            subsample,
            top_rate,
            other_rate,
            colsample_bytree,
            seed,
            missing,
            create_missing_branch,
            sample_method,
            grow_policy,
            evaluation_metric,
            early_stopping_rounds,
            initialize_base_score,
            terminate_missing_features,
            missing_node_treatment,
            log_iterations,
            force_children_to_bound_parent,
        } = self;

        GradientBooster::new(
            ObjectiveType::LogLoss,
            *iterations,
            *learning_rate,
            *max_depth,
            *max_leaves,
            *l1,
            *l2,
            *gamma,
            *max_delta_step,
            *min_leaf_weight,
            *base_score,
            *nbins,
            *parallel,
            *allow_missing_splits,
            monotone_constraints.clone(),
            *subsample,
            *top_rate,
            *other_rate,
            *colsample_bytree,
            *seed,
            *missing,
            *create_missing_branch,
            match sample_method {
                SampleMethod::None => SampleMethod::None,
                SampleMethod::Random => SampleMethod::Random,
                SampleMethod::Goss => SampleMethod::Goss,
            },
            match grow_policy {
                GrowPolicy::DepthWise => GrowPolicy::DepthWise,
                GrowPolicy::LossGuide => GrowPolicy::LossGuide,
            },
            *evaluation_metric,
            *early_stopping_rounds,
            *initialize_base_score,
            terminate_missing_features.clone(),
            *missing_node_treatment,
            *log_iterations,
            *force_children_to_bound_parent,
        )
    }
}

/// Reusable feature-major matrix buffer. `forust` matrices are
/// column-major views over a flat slice, so samples are written
/// transposed; reusing the buffer avoids reallocating once per class and
/// per fold.
#[derive(Default)]
pub struct DataBuffer {
    value_buffer: Vec<f64>,
    response_buffer: Vec<f64>,
    nrows: usize,
    ncols: usize,
}

impl DataBuffer {
    fn fill(
        &mut self,
        rows: &[TrainingRow],
        mask: &[bool],
        positive_label: usize,
    ) -> std::result::Result<(), DataProcessingError> {
        debug_assert_eq!(rows.len(), mask.len());
        self.value_buffer.clear();
        self.response_buffer.clear();
        self.nrows = mask.iter().filter(|&&keep| keep).count();
        if self.nrows == 0 {
            return Err(DataProcessingError::ExpectedNonEmptyData {
                context: Some("no rows selected for training".to_string()),
            });
        }
        self.ncols = rows[0].features.len();
        self.value_buffer.resize(self.nrows * self.ncols, 0.0);

        let mut sample_idx = 0;
        for (row, &keep) in rows.iter().zip(mask.iter()) {
            if !keep {
                continue;
            }
            if row.features.len() != self.ncols {
                return Err(DataProcessingError::ExpectedVectorLength {
                    real: row.features.len(),
                    expected: self.ncols,
                    context: "training rows must share one feature length".to_string(),
                });
            }
            for (feature_idx, &val) in row.features.iter().enumerate() {
                self.value_buffer[feature_idx * self.nrows + sample_idx] = val;
            }
            self.response_buffer
                .push(if row.label_idx == positive_label { 1.0 } else { 0.0 });
            sample_idx += 1;
        }
        Ok(())
    }

    fn as_matrix(&self) -> (Matrix<'_, f64>, &'_ [f64]) {
        let mat = Matrix::new(self.value_buffer.as_slice(), self.nrows, self.ncols);
        (mat, self.response_buffer.as_slice())
    }
}

/// The result of classifying one feature vector: the winning label index
/// plus the raw per-class scores in label-table order.
#[derive(Debug, Clone)]
pub struct Prediction {
    pub label_idx: usize,
    pub scores: Vec<f64>,
}

/// One-vs-rest multi-class classifier: `labels[i]` pairs with
/// `boosters[i]`. Read-only after fit/load, so it is safe to share across
/// prediction threads.
pub struct SpectrumClassifier {
    labels: Vec<String>,
    boosters: Vec<GradientBooster>,
    n_features: usize,
}

impl SpectrumClassifier {
    pub fn fit(labels: Vec<String>, rows: &[TrainingRow], config: &GBMConfig) -> Result<Self> {
        let mask = vec![true; rows.len()];
        Self::fit_masked(labels, rows, &mask, config)
    }

    /// Fits on the subset of `rows` where `mask` is true; the
    /// cross-validation harness uses this to hold folds out.
    pub(crate) fn fit_masked(
        labels: Vec<String>,
        rows: &[TrainingRow],
        mask: &[bool],
        config: &GBMConfig,
    ) -> Result<Self> {
        if labels.is_empty() || rows.is_empty() {
            return Err(DataProcessingError::ExpectedNonEmptyData {
                context: Some("classifier fit needs labels and rows".to_string()),
            }
            .into());
        }

        let mut buffer = DataBuffer::default();
        let mut boosters = Vec::with_capacity(labels.len());
        for (class_idx, label) in labels.iter().enumerate() {
            buffer.fill(rows, mask, class_idx)?;
            let (matrix, response) = buffer.as_matrix();
            let mut model = config.try_build()?;
            model.fit_unweighted(&matrix, response, None)?;
            debug!("fitted one-vs-rest booster for label '{}'", label);
            boosters.push(model);
        }

        Ok(Self {
            labels,
            boosters,
            n_features: buffer.ncols,
        })
    }

    /// Reassembles a classifier from persisted parts.
    pub fn from_parts(
        labels: Vec<String>,
        boosters: Vec<GradientBooster>,
        n_features: usize,
    ) -> std::result::Result<Self, ModelError> {
        if labels.len() != boosters.len() {
            return Err(ModelError::InconsistentBundle {
                labels: labels.len(),
                boosters: boosters.len(),
            });
        }
        Ok(Self {
            labels,
            boosters,
            n_features,
        })
    }

    pub fn predict(&self, features: &[f64]) -> Result<Prediction> {
        if features.len() != self.n_features {
            return Err(ModelError::SchemaMismatch {
                expected: self.n_features,
                real: features.len(),
            }
            .into());
        }
        // A single row is the same slice in row- and column-major order.
        let matrix = Matrix::new(features, 1, self.n_features);
        let scores: Vec<f64> = self
            .boosters
            .iter()
            .map(|booster| booster.predict(&matrix, false)[0])
            .collect();

        let mut label_idx = 0;
        for (i, &score) in scores.iter().enumerate() {
            if score > scores[label_idx] {
                label_idx = i;
            }
        }
        Ok(Prediction { label_idx, scores })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn label_name(&self, idx: usize) -> &str {
        &self.labels[idx]
    }

    pub fn boosters(&self) -> &[GradientBooster] {
        &self.boosters
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }
}
