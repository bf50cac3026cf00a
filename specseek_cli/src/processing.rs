use crate::cli::{
    DEFAULT_MAX_PEAKS,
    DEFAULT_PROMINENCE,
};
use crate::errors::CliError;
use indicatif::{
    ParallelProgressIterator,
    ProgressIterator,
    ProgressStyle,
};
use rayon::prelude::*;
use serde::Serialize;
use specseek::data_sources::dataset::{
    self,
    FeatureRecord,
    TrainingSet,
};
use specseek::data_sources::delimited::{
    read_delimited_spectrum,
    write_delimited_spectrum,
};
use specseek::data_sources::labfile::{
    find_sibling_label,
    qd_id_from_path,
    LabFile,
    DEFAULT_ACQUISITIONS,
};
use specseek::errors::SpecSeekError;
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
use std::collections::BTreeMap;
use std::path::{
    Path,
    PathBuf,
};
use std::time::Instant;
use tracing::{
    debug,
    error,
    info,
    warn,
};
use walkdir::WalkDir;

const EXTRACT_CHUNK_SIZE: usize = 256;

fn progress_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})",
    )
    .unwrap()
}

fn io_error(e: std::io::Error, path: &Path) -> CliError {
    CliError::Io {
        source: e.to_string(),
        path: Some(path.to_string_lossy().to_string()),
    }
}

/// Scans `input_dir` recursively for power/rotator lab files, converts
/// every labeled acquisition to a spectrum record and writes the converted
/// dataset.
pub fn convert(
    input_dir: &Path,
    output_file: &Path,
    limit: Option<usize>,
) -> Result<(), CliError> {
    let start = Instant::now();
    let mut lab_paths: Vec<PathBuf> = WalkDir::new(input_dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            let name = entry.file_name().to_string_lossy().to_lowercase();
            name.ends_with(".dat") && (name.contains("power") || name.contains("rotator"))
        })
        .map(|entry| entry.into_path())
        .collect();
    lab_paths.sort();
    if let Some(limit) = limit {
        lab_paths.truncate(limit);
    }
    info!("Found {} lab files in {:?}", lab_paths.len(), input_dir);

    let mut rng = rand::rng();
    let mut records: Vec<SpectrumRecord> = Vec::new();
    let mut unlabeled = 0usize;
    for path in lab_paths.iter().progress_with_style(progress_style()) {
        let dir = match path.parent() {
            Some(dir) => dir,
            None => continue,
        };
        let label = match find_sibling_label(dir)? {
            Some(label) => label,
            None => {
                debug!("No label marker next to {:?}, skipping", path);
                unlabeled += 1;
                continue;
            }
        };
        let lab = match LabFile::from_file(path, DEFAULT_ACQUISITIONS) {
            Ok(lab) => lab,
            Err(e) => {
                error!("Skipping unreadable lab file {:?}: {}", path, e);
                continue;
            }
        };
        let qd_id = qd_id_from_path(path);
        let LabFile {
            energy,
            acquisitions,
            ..
        } = lab;
        for trace in acquisitions.into_iter() {
            let spectrum =
                Spectrum::try_new(energy.clone(), trace).map_err(SpecSeekError::from)?;
            records.push(SpectrumRecord {
                qd_id: qd_id.clone(),
                id: dataset::random_record_id(&mut rng),
                label: label.clone(),
                spectrum,
            });
        }
    }
    if unlabeled > 0 {
        warn!("Skipped {} lab files without a label marker", unlabeled);
    }

    if let Some(parent) = output_file.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_error(e, parent))?;
    }
    dataset::write_converted(output_file, &records)?;
    info!(
        "Saved {} spectra to {:?} in {:?}",
        records.len(),
        output_file,
        start.elapsed()
    );
    Ok(())
}

/// Writes each converted spectrum out as a two-column text file named
/// after its label and record id.
pub fn export(input_file: &Path, output_dir: &Path) -> Result<(), CliError> {
    let records = dataset::read_converted(input_file)?;
    if output_dir.exists() {
        let mut entries = std::fs::read_dir(output_dir).map_err(|e| io_error(e, output_dir))?;
        if entries.next().is_some() {
            return Err(CliError::Config {
                source: format!(
                    "output directory {:?} already exists and is not empty",
                    output_dir
                ),
            });
        }
    }
    std::fs::create_dir_all(output_dir).map_err(|e| io_error(e, output_dir))?;

    for record in records.iter().progress_with_style(progress_style()) {
        let path = output_dir.join(dataset::spectrum_file_name(record));
        write_delimited_spectrum(&path, &record.spectrum)?;
    }
    info!("Exported {} spectra to {:?}", records.len(), output_dir);
    Ok(())
}

/// Extracts peak features for every converted spectrum and writes the
/// training set, with the extraction configuration in its header.
///
/// Spectra with no detectable peaks are dropped here rather than entering
/// the training matrix as all-zero rows.
pub fn extract(
    input_file: &Path,
    output_file: &Path,
    feature_config: FeatureConfig,
) -> Result<(), CliError> {
    feature_config.validate().map_err(SpecSeekError::from)?;
    let records = dataset::read_converted(input_file)?;
    info!("Processing {} spectra from {:?}", records.len(), input_file);

    let mut features = Vec::with_capacity(records.len());
    for chunk in records
        .chunks(EXTRACT_CHUNK_SIZE)
        .progress_with_style(progress_style())
    {
        features.extend(extract_feature_rows(chunk, &feature_config).map_err(SpecSeekError::from)?);
    }

    let mut kept = Vec::new();
    let mut degenerate = 0usize;
    for (record, feats) in records.iter().zip(features.into_iter()) {
        if feats.is_degenerate() {
            debug!(
                "No peaks in spectrum {} (qd {}), dropping it",
                record.id, record.qd_id
            );
            degenerate += 1;
            continue;
        }
        kept.push(FeatureRecord {
            qd_id: record.qd_id.clone(),
            id: record.id.clone(),
            label: record.label.clone(),
            features: feats.vector,
        });
    }
    if degenerate > 0 {
        warn!(
            "Dropped {} degenerate spectra with no usable signal",
            degenerate
        );
    }

    let training = TrainingSet {
        feature_config,
        records: kept,
    };
    info!("Counts of unique target labels:");
    for (label, count) in training.label_counts() {
        info!("  {}: {}", label, count);
    }
    training.write(output_file)?;
    info!(
        "Saved {} feature rows to {:?}",
        training.records.len(),
        output_file
    );
    Ok(())
}

/// Cross-validates, reports, fits on the full training set and saves the
/// model bundle together with the extraction configuration.
pub fn train(
    input_file: &Path,
    output_dir: &Path,
    folds: usize,
    seed: u64,
) -> Result<(), CliError> {
    let start = Instant::now();
    let training = TrainingSet::from_file(input_file)?;
    training
        .feature_config
        .validate()
        .map_err(SpecSeekError::from)?;
    info!(
        "Read {} feature rows from {:?}",
        training.records.len(),
        input_file
    );

    let (labels, rows) = training.to_rows();
    if labels.len() < 2 {
        return Err(CliError::Config {
            source: format!("need at least two labels to train, got {:?}", labels),
        });
    }

    let gbm = GBMConfig::default();
    let report = cross_validate(&labels, &rows, &gbm, folds, seed)?;
    println!("{}", report);
    info!("Mean CV accuracy: {:.2}%", report.mean_accuracy() * 100.0);

    let classifier = SpectrumClassifier::fit(labels, &rows, &gbm)?;
    let bundle = ModelBundle::new(training.feature_config, classifier);
    bundle.save(output_dir)?;
    info!("Model saved to {:?} in {:?}", output_dir, start.elapsed());
    Ok(())
}

#[derive(Debug, Serialize)]
struct ValidationRecord {
    filename: String,
    ground_truth: Option<String>,
    prediction: Option<String>,
    outcome: String,
}

/// Predicts every exported spectrum in `input_dir` and scores the
/// predictions against the labels encoded in the file names.
pub fn validate(model_dir: &Path, input_dir: &Path) -> Result<(), CliError> {
    let service = PredictionService::from_dir(model_dir)?;
    info!(
        "Validating with extraction config {:?}",
        service.feature_config()
    );

    let mut files: Vec<PathBuf> = std::fs::read_dir(input_dir)
        .map_err(|e| io_error(e, input_dir))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case("txt"))
                    .unwrap_or(false)
        })
        .collect();
    files.sort();
    info!("Found {} spectra in {:?}", files.len(), input_dir);

    let records: Vec<ValidationRecord> = files
        .par_iter()
        .progress_count(files.len() as u64)
        .map(|path| {
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let ground_truth = match dataset::label_from_file_name(&filename) {
                Some(label) => label,
                None => {
                    return ValidationRecord {
                        filename,
                        ground_truth: None,
                        prediction: None,
                        outcome: "ERROR: no label in file name".to_string(),
                    };
                }
            };
            match read_delimited_spectrum(path)
                .and_then(|spectrum| service.predict_spectrum(&spectrum))
            {
                Ok(response) => {
                    let outcome = if response.prediction == ground_truth {
                        "MATCH"
                    } else {
                        "MISMATCH"
                    };
                    ValidationRecord {
                        filename,
                        ground_truth: Some(ground_truth),
                        prediction: Some(response.prediction),
                        outcome: outcome.to_string(),
                    }
                }
                Err(e) => ValidationRecord {
                    filename,
                    ground_truth: Some(ground_truth),
                    prediction: None,
                    outcome: format!("ERROR: {}", e),
                },
            }
        })
        .collect();

    // Per-label match percentages, mirroring what the record list holds.
    let mut per_label: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    let mut errors = 0usize;
    for record in &records {
        if record.outcome.starts_with("ERROR") {
            errors += 1;
            debug!(
                "{}",
                serde_json::to_string(record).unwrap_or_else(|_| record.outcome.clone())
            );
            continue;
        }
        let label = record.ground_truth.clone().unwrap_or_default();
        let entry = per_label.entry(label).or_insert((0, 0));
        entry.1 += 1;
        if record.outcome == "MATCH" {
            entry.0 += 1;
        }
    }

    println!("Match rate per ground-truth label:");
    let mut total_hits = 0usize;
    let mut total = 0usize;
    for (label, (hits, count)) in &per_label {
        total_hits += hits;
        total += count;
        println!(
            "  {:>8}: {:>5.1}% ({}/{})",
            label,
            100.0 * *hits as f64 / *count as f64,
            hits,
            count
        );
    }
    if total > 0 {
        println!(
            "Overall: {:.1}% ({}/{}), {} errors",
            100.0 * total_hits as f64 / total as f64,
            total_hits,
            total,
            errors
        );
    } else {
        println!("No scorable spectra found ({} errors)", errors);
    }
    Ok(())
}

/// The whole pipeline with the default layout: convert, extract, train.
pub fn run_all(input_dir: &Path, output_dir: &Path) -> Result<(), CliError> {
    let converted = output_dir.join("converted.json");
    let training = output_dir.join("training.json");
    convert(input_dir, &converted, None)?;
    extract(
        &converted,
        &training,
        FeatureConfig {
            prominence: DEFAULT_PROMINENCE,
            max_peaks: DEFAULT_MAX_PEAKS,
            include_fwhm: false,
        },
    )?;
    train(&training, output_dir, 5, 42)
}
