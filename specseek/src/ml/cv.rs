//! Stratified k-fold cross-validation for the one-vs-rest classifier.

use super::{
    GBMConfig,
    SpectrumClassifier,
    TrainingRow,
};
use crate::errors::{
    DataProcessingError,
    Result,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::fmt::Display;
use tracing::info;

/// Cross-validated evaluation: one held-out accuracy per fold plus the
/// pooled confusion matrix (`confusion[truth][predicted]`) over all
/// held-out predictions.
#[derive(Debug, Clone)]
pub struct CvReport {
    pub labels: Vec<String>,
    pub fold_accuracies: Vec<f64>,
    pub confusion: Vec<Vec<usize>>,
}

impl CvReport {
    pub fn mean_accuracy(&self) -> f64 {
        if self.fold_accuracies.is_empty() {
            return 0.0;
        }
        self.fold_accuracies.iter().sum::<f64>() / self.fold_accuracies.len() as f64
    }

    pub fn n_samples(&self) -> usize {
        self.confusion.iter().map(|row| row.iter().sum::<usize>()).sum()
    }

    fn per_label_stats(&self, idx: usize) -> (f64, f64, f64, usize) {
        let support: usize = self.confusion[idx].iter().sum();
        let predicted: usize = self.confusion.iter().map(|row| row[idx]).sum();
        let hits = self.confusion[idx][idx];
        let precision = if predicted > 0 {
            hits as f64 / predicted as f64
        } else {
            0.0
        };
        let recall = if support > 0 {
            hits as f64 / support as f64
        } else {
            0.0
        };
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        (precision, recall, f1, support)
    }
}

impl Display for CvReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{:>12} {:>10} {:>8} {:>8} {:>8}",
            "label", "precision", "recall", "f1", "support"
        )?;
        for (idx, label) in self.labels.iter().enumerate() {
            let (precision, recall, f1, support) = self.per_label_stats(idx);
            writeln!(
                f,
                "{:>12} {:>10.3} {:>8.3} {:>8.3} {:>8}",
                label, precision, recall, f1, support
            )?;
        }
        let hits: usize = (0..self.labels.len()).map(|i| self.confusion[i][i]).sum();
        let total = self.n_samples();
        let overall = if total > 0 {
            hits as f64 / total as f64
        } else {
            0.0
        };
        writeln!(f, "overall accuracy: {:.3} over {} samples", overall, total)?;
        write!(
            f,
            "fold accuracies: {:?} (mean {:.3})",
            self.fold_accuracies
                .iter()
                .map(|a| (a * 1000.0).round() / 1000.0)
                .collect::<Vec<f64>>(),
            self.mean_accuracy()
        )
    }
}

/// Runs stratified k-fold cross-validation.
///
/// Rows are shuffled with a fixed seed within each label group and dealt
/// round-robin across folds, so every label with at least `n_folds`
/// samples appears in every fold. For each fold a fresh classifier is
/// fitted on the remaining folds and scored on the held-out one.
pub fn cross_validate(
    labels: &[String],
    rows: &[TrainingRow],
    config: &GBMConfig,
    n_folds: usize,
    seed: u64,
) -> Result<CvReport> {
    if labels.is_empty() || rows.is_empty() {
        return Err(DataProcessingError::ExpectedNonEmptyData {
            context: Some("cross_validate needs labels and rows".to_string()),
        }
        .into());
    }
    if n_folds < 2 {
        return Err(DataProcessingError::InvalidParameter {
            param: "n_folds",
            context: format!("must be at least 2, got {}", n_folds),
        }
        .into());
    }
    if rows.len() < n_folds {
        return Err(DataProcessingError::InsufficientData {
            real: rows.len(),
            expected: n_folds,
            context: "fewer rows than folds".to_string(),
        }
        .into());
    }

    let mut by_label: Vec<Vec<usize>> = vec![Vec::new(); labels.len()];
    for (i, row) in rows.iter().enumerate() {
        by_label[row.label_idx].push(i);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut fold_of = vec![0usize; rows.len()];
    let mut next_fold = 0;
    for group in by_label.iter_mut() {
        group.shuffle(&mut rng);
        for &row_idx in group.iter() {
            fold_of[row_idx] = next_fold;
            next_fold = (next_fold + 1) % n_folds;
        }
    }

    let mut fold_accuracies = Vec::with_capacity(n_folds);
    let mut confusion = vec![vec![0usize; labels.len()]; labels.len()];

    for fold in 0..n_folds {
        let train_mask: Vec<bool> = fold_of.iter().map(|&f| f != fold).collect();
        let clf = SpectrumClassifier::fit_masked(labels.to_vec(), rows, &train_mask, config)?;

        let mut hits = 0usize;
        let mut held_out = 0usize;
        for (row, &assigned) in rows.iter().zip(fold_of.iter()) {
            if assigned != fold {
                continue;
            }
            held_out += 1;
            let pred = clf.predict(&row.features)?;
            confusion[row.label_idx][pred.label_idx] += 1;
            if pred.label_idx == row.label_idx {
                hits += 1;
            }
        }
        let accuracy = hits as f64 / held_out as f64;
        info!(
            "fold {}/{}: accuracy {:.3} ({} held-out rows)",
            fold + 1,
            n_folds,
            accuracy,
            held_out
        );
        fold_accuracies.push(accuracy);
    }

    Ok(CvReport {
        labels: labels.to_vec(),
        fold_accuracies,
        confusion,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::tests::separable_rows;

    #[test]
    fn test_cv_on_separable_data() {
        let (labels, rows) = separable_rows();
        let config = GBMConfig {
            iterations: 30,
            nbins: 32,
            ..Default::default()
        };
        let report = cross_validate(&labels, &rows, &config, 3, 42).unwrap();
        assert_eq!(report.fold_accuracies.len(), 3);
        assert_eq!(report.n_samples(), rows.len());
        // Fully separable clusters should classify close to perfectly.
        assert!(
            report.mean_accuracy() > 0.9,
            "mean accuracy {}",
            report.mean_accuracy()
        );
        // Render the report; mostly checks the formatting never panics.
        let rendered = format!("{}", report);
        assert!(rendered.contains("overall accuracy"));
    }

    #[test]
    fn test_cv_rejects_single_fold() {
        let (labels, rows) = separable_rows();
        let res = cross_validate(&labels, &rows, &GBMConfig::default(), 1, 42);
        assert!(res.is_err());
    }
}
