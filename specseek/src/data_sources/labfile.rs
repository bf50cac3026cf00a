//! Raw instrument lab files.
//!
//! A lab file is a whitespace-delimited numeric matrix: the first row
//! carries the excitation power sweep (readings at the odd-indexed
//! columns), the first column (from the second row down) carries the
//! wavelength axis in nanometres, and each odd-indexed column from the
//! second row down is one acquisition's intensity trace. Even-indexed data
//! columns are instrument bookkeeping and are dropped.

use crate::errors::{
    DataProcessingError,
    Result,
    SpecSeekError,
};
use std::path::Path;

/// Number of acquisitions kept per lab file.
pub const DEFAULT_ACQUISITIONS: usize = 23;

const PLANCK_J_S: f64 = 6.62607015e-34;
const SPEED_OF_LIGHT_M_S: f64 = 3.0e8;
const ELECTRON_VOLT_J: f64 = 1.60218e-19;

/// Photon energy in eV for a wavelength in nanometres.
fn wavelength_nm_to_ev(wavelength_nm: f64) -> f64 {
    (PLANCK_J_S * SPEED_OF_LIGHT_M_S) / (wavelength_nm * 1e-9 * ELECTRON_VOLT_J)
}

/// One parsed lab file: the shared (ascending) energy axis, the kept
/// acquisitions as normalized intensity rows, and the normalized power
/// sweep values aligned with the acquisitions.
#[derive(Debug, Clone)]
pub struct LabFile {
    pub filename: String,
    pub label: String,
    pub energy: Vec<f64>,
    pub acquisitions: Vec<Vec<f64>>,
    pub power_values: Vec<f64>,
}

impl LabFile {
    pub fn from_file(path: &Path, max_acquisitions: usize) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| SpecSeekError::Io {
            source: e,
            path: Some(path.to_path_buf()),
        })?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Self::parse(&text, &filename, max_acquisitions)
    }

    pub fn parse(text: &str, filename: &str, max_acquisitions: usize) -> Result<Self> {
        let mut rows: Vec<Vec<f64>> = Vec::new();
        for (line_idx, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let fields: std::result::Result<Vec<f64>, _> =
                line.split_whitespace().map(|f| f.parse::<f64>()).collect();
            let fields = fields.map_err(|e| SpecSeekError::ParseError {
                msg: format!("{}: line {}: {}", filename, line_idx + 1, e),
            })?;
            rows.push(fields);
        }

        if rows.len() < 2 {
            return Err(DataProcessingError::MalformedShape {
                context: format!("{}: need a power row plus wavelength rows", filename),
            }
            .into());
        }
        let width = rows[0].len();
        if width < 2 || rows.iter().any(|r| r.len() != width) {
            return Err(DataProcessingError::MalformedShape {
                context: format!("{}: ragged or too-narrow matrix", filename),
            }
            .into());
        }

        // Wavelength axis, converted to eV. The file stores ascending
        // wavelengths, so the whole axis (and every acquisition with it)
        // is reversed below to make energy ascending.
        let mut energy = Vec::with_capacity(rows.len() - 1);
        for row in &rows[1..] {
            let wavelength_nm = row[0];
            if !(wavelength_nm > 0.0) {
                return Err(DataProcessingError::MalformedShape {
                    context: format!("{}: non-positive wavelength {}", filename, wavelength_nm),
                }
                .into());
            }
            energy.push(wavelength_nm_to_ev(wavelength_nm));
        }
        energy.reverse();

        let kept_columns: Vec<usize> = (1..width)
            .step_by(2)
            .take(max_acquisitions)
            .collect();
        let mut acquisitions: Vec<Vec<f64>> = kept_columns
            .iter()
            .map(|&col| {
                let mut trace: Vec<f64> = rows[1..].iter().map(|row| row[col]).collect();
                trace.reverse();
                trace
            })
            .collect();

        // File-global intensity normalization.
        let max_intensity = acquisitions
            .iter()
            .flat_map(|trace| trace.iter().cloned())
            .fold(f64::NEG_INFINITY, f64::max);
        if max_intensity > 0.0 {
            for trace in acquisitions.iter_mut() {
                for v in trace.iter_mut() {
                    *v /= max_intensity;
                }
            }
        }

        let all_power: Vec<f64> = (1..width).step_by(2).map(|col| rows[0][col]).collect();
        let max_power = all_power.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let mut power_values: Vec<f64> = all_power
            .into_iter()
            .take(kept_columns.len())
            .collect();
        if max_power > 0.0 {
            for v in power_values.iter_mut() {
                *v /= max_power;
            }
        }

        let label = filename.split('.').next().unwrap_or(filename).to_string();
        Ok(Self {
            filename: filename.to_string(),
            label,
            energy,
            acquisitions,
            power_values,
        })
    }
}

/// Finds the class label for a lab directory: the marker file named
/// `label2_#<value>.txt` next to the lab files. Returns the first marker
/// in name order; `None` means the directory is unlabeled and its files
/// are skipped.
pub fn find_sibling_label(dir: &Path) -> Result<Option<String>> {
    const LABEL_PREFIX: &str = "label2_#";
    let entries = std::fs::read_dir(dir).map_err(|e| SpecSeekError::Io {
        source: e,
        path: Some(dir.to_path_buf()),
    })?;
    let mut markers: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().to_str().map(|s| s.to_string()))
        .filter(|name| name.starts_with(LABEL_PREFIX))
        .collect();
    markers.sort();
    Ok(markers.first().map(|name| {
        name.trim_start_matches(LABEL_PREFIX)
            .trim_end_matches(".txt")
            .to_string()
    }))
}

/// The quantum-dot id is the name of the directory two levels above the
/// lab file.
pub fn qd_id_from_path(path: &Path) -> String {
    path.parent()
        .and_then(|p| p.parent())
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "0.0 10.0 1.0 20.0 2.0\n\
                          500.0 1.0 9.0 3.0 9.0\n\
                          600.0 2.0 9.0 4.0 9.0\n";

    #[test]
    fn test_parse_layout() {
        let lab = LabFile::parse(SAMPLE, "SQ-01.dat", DEFAULT_ACQUISITIONS).unwrap();
        assert_eq!(lab.label, "SQ-01");
        assert_eq!(lab.acquisitions.len(), 2);
        assert_eq!(lab.energy.len(), 2);
        // Acquisitions are reversed with the energy axis and normalized by
        // the file-global max (4.0).
        assert_eq!(lab.acquisitions[0], vec![0.5, 0.25]);
        assert_eq!(lab.acquisitions[1], vec![1.0, 0.75]);
        // Power sweep normalized by its own max.
        assert_eq!(lab.power_values, vec![0.5, 1.0]);
    }

    #[test]
    fn test_energy_is_ascending_ev() {
        let lab = LabFile::parse(SAMPLE, "SQ-01.dat", DEFAULT_ACQUISITIONS).unwrap();
        assert!(lab.energy[0] < lab.energy[1]);
        // 500 nm is about 2.4815 eV with these constants.
        assert!((lab.energy[1] - 2.4815).abs() < 1e-3);
    }

    #[test]
    fn test_acquisition_cap() {
        let lab = LabFile::parse(SAMPLE, "SQ-01.dat", 1).unwrap();
        assert_eq!(lab.acquisitions.len(), 1);
        assert_eq!(lab.power_values.len(), 1);
        // The power max is still taken over the full sweep.
        assert_eq!(lab.power_values[0], 0.5);
    }

    #[test]
    fn test_ragged_matrix_rejected() {
        let res = LabFile::parse("0.0 1.0\n500.0\n", "bad.dat", DEFAULT_ACQUISITIONS);
        assert!(res.is_err());
    }

    #[test]
    fn test_qd_id_two_levels_up() {
        let path = Path::new("data/raw/SQ-07/scan1/power_sweep.dat");
        assert_eq!(qd_id_from_path(path), "SQ-07");
    }
}
