//! Two-column `energy,intensity` text files.
//!
//! The inference path accepts files delimited by comma or tab: parsing is
//! attempted with a comma first and retried once with a tab, and only then
//! reported as a parse error naming the underlying cause. A single leading
//! non-numeric row is tolerated as a header.

use crate::errors::{
    DataProcessingError,
    Result,
    SpecSeekError,
};
use crate::models::Spectrum;
use std::path::Path;

/// Parses a delimited two-column spectrum from text.
///
/// A file with fewer than two data rows is rejected as malformed (a single
/// row is indistinguishable from a transposed or truncated export), as is
/// any row with fewer than two columns. Extra columns are ignored.
pub fn parse_delimited_spectrum(text: &str) -> Result<Spectrum> {
    let (energy, intensity) = match parse_with_delimiter(text, b',') {
        Ok(cols) => cols,
        Err(_) => parse_with_delimiter(text, b'\t').map_err(|tab_err| {
            SpecSeekError::ParseError {
                msg: format!(
                    "spectrum is neither comma- nor tab-delimited: {}",
                    tab_err
                ),
            }
        })?,
    };
    if energy.len() < 2 {
        return Err(DataProcessingError::MalformedShape {
            context: format!(
                "expected at least two (energy, intensity) rows, got {}",
                energy.len()
            ),
        }
        .into());
    }
    Ok(Spectrum::try_new(energy, intensity)?)
}

fn parse_with_delimiter(text: &str, delimiter: u8) -> Result<(Vec<f64>, Vec<f64>)> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut energy = Vec::new();
    let mut intensity = Vec::new();
    for (row_idx, record) in reader.records().enumerate() {
        let record = record?;
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        match parse_row(&record) {
            Ok((e, i)) => {
                energy.push(e);
                intensity.push(i);
            }
            Err(err) => {
                // Tolerate one header row, nothing else.
                if row_idx == 0 && energy.is_empty() {
                    continue;
                }
                return Err(err);
            }
        }
    }
    Ok((energy, intensity))
}

fn parse_row(record: &csv::StringRecord) -> Result<(f64, f64)> {
    if record.len() < 2 {
        return Err(SpecSeekError::ParseError {
            msg: format!("expected two delimited columns, got {}", record.len()),
        });
    }
    let energy: f64 = record.get(0).unwrap_or("").parse()?;
    let intensity: f64 = record.get(1).unwrap_or("").parse()?;
    Ok((energy, intensity))
}

pub fn read_delimited_spectrum(path: &Path) -> Result<Spectrum> {
    let text = std::fs::read_to_string(path).map_err(|e| SpecSeekError::Io {
        source: e,
        path: Some(path.to_path_buf()),
    })?;
    parse_delimited_spectrum(&text)
}

/// Writes a spectrum as comma-delimited two-column text, the format the
/// validation pipeline reads back.
pub fn write_delimited_spectrum(path: &Path, spectrum: &Spectrum) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    for (e, i) in spectrum.energy.iter().zip(spectrum.intensity.iter()) {
        writer.serialize((e, i))?;
    }
    writer.flush().map_err(|e| SpecSeekError::Io {
        source: e,
        path: Some(path.to_path_buf()),
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_comma_delimited() {
        let sp = parse_delimited_spectrum("1.0,0.5\n2.0,0.25\n3.0,0.125\n").unwrap();
        assert_eq!(sp.energy, vec![1.0, 2.0, 3.0]);
        assert_eq!(sp.intensity, vec![0.5, 0.25, 0.125]);
    }

    #[test]
    fn test_retries_with_tab_delimiter() {
        let sp = parse_delimited_spectrum("1.0\t0.5\n2.0\t0.25\n").unwrap();
        assert_eq!(sp.energy, vec![1.0, 2.0]);
        assert_eq!(sp.intensity, vec![0.5, 0.25]);
    }

    #[test]
    fn test_skips_single_header_row() {
        let sp = parse_delimited_spectrum("energy,intensity\n1.0,0.5\n2.0,0.25\n").unwrap();
        assert_eq!(sp.energy, vec![1.0, 2.0]);
    }

    #[test]
    fn test_single_data_row_is_malformed() {
        let res = parse_delimited_spectrum("1.0,0.5\n");
        assert!(matches!(
            res,
            Err(SpecSeekError::DataProcessingError(
                DataProcessingError::MalformedShape { .. }
            ))
        ));
    }

    #[test]
    fn test_garbage_reports_parse_error() {
        let res = parse_delimited_spectrum("not a spectrum\nat all\n");
        assert!(matches!(res, Err(SpecSeekError::ParseError { .. })));
    }

    #[test]
    fn test_bad_row_in_the_middle_fails() {
        let res = parse_delimited_spectrum("1.0,0.5\nbroken\n3.0,0.125\n");
        assert!(matches!(res, Err(SpecSeekError::ParseError { .. })));
    }

    #[test]
    fn test_extra_columns_ignored() {
        let sp = parse_delimited_spectrum("1.0,0.5,9.9\n2.0,0.25,9.9\n").unwrap();
        assert_eq!(sp.intensity, vec![0.5, 0.25]);
    }

    #[test]
    fn test_blank_lines_skipped() {
        let sp = parse_delimited_spectrum("1.0,0.5\n\n2.0,0.25\n\n").unwrap();
        assert_eq!(sp.energy.len(), 2);
    }
}
