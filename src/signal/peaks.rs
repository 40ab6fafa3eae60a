//! Turning point (local extremum) detection.
//!
//! Peaks are local maxima, plateaus resolved to their midpoint. Candidates
//! are thinned by minimum index distance (highest first) and then kept only if
//! their prominence reaches the threshold. Valleys are the peaks of the
//! negated signal under the same rules.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakParams {
    /// Minimum vertical drop on both sides of an extremum
    pub prominence: f64,
    /// Minimum index separation between two extrema of the same kind
    pub distance: usize,
}

impl Default for PeakParams {
    fn default() -> Self {
        Self {
            prominence: 0.1,
            distance: 150,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TurningPointDetector {
    params: PeakParams,
}

impl TurningPointDetector {
    pub fn new(params: PeakParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &PeakParams {
        &self.params
    }

    /// Sorted indices of all peaks and valleys of `signal`.
    pub fn detect(&self, signal: &[f64]) -> Vec<usize> {
        find_turning_points(signal, self.params.prominence, self.params.distance)
    }
}

/// Peaks and valleys merged in index order. Only same-kind neighbours are
/// held to `distance`.
pub fn find_turning_points(signal: &[f64], prominence: f64, distance: usize) -> Vec<usize> {
    let mut points = find_peaks(signal, prominence, distance);

    let negated: Vec<f64> = signal.iter().map(|v| -v).collect();
    points.extend(find_peaks(&negated, prominence, distance));

    points.sort_unstable();
    points.dedup();
    points
}

/// Local maxima of `signal` satisfying the distance and prominence constraints.
pub fn find_peaks(signal: &[f64], prominence: f64, distance: usize) -> Vec<usize> {
    let candidates = local_maxima(signal);
    let spaced = select_by_distance(signal, &candidates, distance.max(1));
    spaced
        .into_iter()
        .filter(|&peak| peak_prominence(signal, peak) >= prominence)
        .collect()
}

/// Strict local maxima; a flat top counts once, at its (lower) middle index.
fn local_maxima(signal: &[f64]) -> Vec<usize> {
    let n = signal.len();
    let mut maxima = Vec::new();
    if n < 3 {
        return maxima;
    }

    let mut i = 1;
    while i < n - 1 {
        if signal[i - 1] < signal[i] {
            let mut ahead = i + 1;
            while ahead < n - 1 && signal[ahead] == signal[i] {
                ahead += 1;
            }
            if signal[ahead] < signal[i] {
                let left = i;
                let right = ahead - 1;
                maxima.push((left + right) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    maxima
}

/// Keep the highest peaks first, discarding any neighbour closer than `distance`.
fn select_by_distance(signal: &[f64], peaks: &[usize], distance: usize) -> Vec<usize> {
    if peaks.len() < 2 || distance <= 1 {
        return peaks.to_vec();
    }

    let mut keep = vec![true; peaks.len()];

    // 按峰值高度排序，高度相同时靠后的位置优先
    let mut order: Vec<usize> = (0..peaks.len()).collect();
    order.sort_by(|&a, &b| {
        signal[peaks[a]]
            .partial_cmp(&signal[peaks[b]])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    for &j in order.iter().rev() {
        if !keep[j] {
            continue;
        }

        let mut k = j;
        while k > 0 && peaks[j] - peaks[k - 1] < distance {
            k -= 1;
            keep[k] = false;
        }

        let mut k = j + 1;
        while k < peaks.len() && peaks[k] - peaks[j] < distance {
            keep[k] = false;
            k += 1;
        }
    }

    peaks
        .iter()
        .zip(keep)
        .filter_map(|(&peak, kept)| kept.then_some(peak))
        .collect()
}

/// Height of a peak above the higher of the two lowest points reached before
/// the signal rises above the peak on either side (or hits the border).
fn peak_prominence(signal: &[f64], peak: usize) -> f64 {
    let height = signal[peak];

    let mut left_min = height;
    let mut i = peak;
    loop {
        if signal[i] > height {
            break;
        }
        left_min = left_min.min(signal[i]);
        if i == 0 {
            break;
        }
        i -= 1;
    }

    let mut right_min = height;
    for &value in &signal[peak..] {
        if value > height {
            break;
        }
        right_min = right_min.min(value);
    }

    height - left_min.max(right_min)
}
