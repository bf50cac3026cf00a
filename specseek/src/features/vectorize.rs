//! Conversion of a detected peak list into the fixed-length feature layout
//! consumed by the classifier.

use crate::models::Peak;
use serde::Serialize;
use std::cmp::Ordering;

/// Human-readable diagnostics for the peaks that made it into the feature
/// vector, in the same (amplitude-descending) order and without padding.
/// The serving layer echoes these back to the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeakSummary {
    pub dominant_energy: f64,
    pub relative_centers: Vec<f64>,
    pub amplitudes: Vec<f64>,
}

/// The fixed-length feature encoding of one spectrum.
///
/// `summary` is `None` when no peaks were detected; the vector is then all
/// zeros and callers must treat the spectrum as degenerate instead of
/// feeding it to a model.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumFeatures {
    pub vector: Vec<f64>,
    pub summary: Option<PeakSummary>,
}

impl SpectrumFeatures {
    pub fn is_degenerate(&self) -> bool {
        self.summary.is_none()
    }
}

/// Builds the flat feature vector from detected peaks.
///
/// The dominant (highest-amplitude) peak anchors the energy axis: every
/// center is re-expressed relative to it, so calibration drift between
/// instrument runs does not move the feature distribution. Ties for the
/// dominant peak go to the earliest index (lowest energy). Peaks are then
/// stably sorted by amplitude descending (ties keep detection order),
/// truncated to `max_peaks` and right-padded with zeros.
///
/// Layout: `[rel_center_1, amplitude_1, ..]`, with `fwhm` appended per
/// peak when `include_fwhm` is set. Output length is always
/// `max_peaks * 2` (or `* 3` with FWHM).
pub fn vectorize(peaks: &[Peak], max_peaks: usize, include_fwhm: bool) -> SpectrumFeatures {
    let per_peak = if include_fwhm { 3 } else { 2 };
    let len = max_peaks * per_peak;

    if peaks.is_empty() {
        return SpectrumFeatures {
            vector: vec![0.0; len],
            summary: None,
        };
    }

    let mut dominant = &peaks[0];
    for peak in &peaks[1..] {
        if peak.amplitude > dominant.amplitude {
            dominant = peak;
        }
    }
    let dominant_energy = dominant.center;

    let mut ordered: Vec<Peak> = peaks
        .iter()
        .map(|p| Peak {
            center: p.center - dominant_energy,
            ..*p
        })
        .collect();
    // Stable sort: equal amplitudes keep their detection order.
    ordered.sort_by(|a, b| {
        b.amplitude
            .partial_cmp(&a.amplitude)
            .unwrap_or(Ordering::Equal)
    });
    ordered.truncate(max_peaks);

    let mut vector = Vec::with_capacity(len);
    for peak in &ordered {
        vector.push(peak.center);
        vector.push(peak.amplitude);
        if include_fwhm {
            vector.push(peak.fwhm.unwrap_or(0.0));
        }
    }
    vector.resize(len, 0.0);

    SpectrumFeatures {
        vector,
        summary: Some(PeakSummary {
            dominant_energy,
            relative_centers: ordered.iter().map(|p| p.center).collect(),
            amplitudes: ordered.iter().map(|p| p.amplitude).collect(),
        }),
    }
}
