//! Digital Butterworth filters and zero-phase (forward-backward) filtering.
//!
//! Filters are designed from the analog Butterworth prototype through the
//! bilinear transform and stored as cascaded second-order sections, which
//! stay numerically stable even for very low normalized cutoffs such as the
//! 0.1 Hz drift removal at 60 Hz sampling.

use std::f64::consts::PI;

use rustfft::num_complex::Complex64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    LowPass,
    HighPass,
}

/// One second-order section in transposed direct form II, `a[0] == 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    pub b: [f64; 3],
    pub a: [f64; 3],
}

impl Biquad {
    /// Steady-state initial conditions for a unit step input.
    fn step_initial_state(&self) -> [f64; 2] {
        let [b0, b1, b2] = self.b;
        let [_, a1, a2] = self.a;
        let rhs0 = b1 - a1 * b0;
        let rhs1 = b2 - a2 * b0;
        let z0 = (rhs0 + rhs1) / (1.0 + a1 + a2);
        let z1 = rhs1 - a2 * z0;
        [z0, z1]
    }

    fn dc_gain(&self) -> f64 {
        self.b.iter().sum::<f64>() / self.a.iter().sum::<f64>()
    }

    fn gain_at(&self, z: f64) -> f64 {
        let num = self.b[0] + self.b[1] * z + self.b[2] * z * z;
        let den = self.a[0] + self.a[1] * z + self.a[2] * z * z;
        num / den
    }
}

/// A Butterworth filter as a cascade of biquads.
#[derive(Debug, Clone)]
pub struct Butterworth {
    sections: Vec<Biquad>,
    order: usize,
}

impl Butterworth {
    /// Design a filter of `order` with `normalized_cutoff = cutoff / nyquist`.
    ///
    /// Returns `None` when the cutoff is outside `(0, 1)` or the order is 0;
    /// callers treat that as a pass-through stage.
    pub fn design(order: usize, normalized_cutoff: f64, kind: FilterKind) -> Option<Self> {
        if order == 0 || !(normalized_cutoff > 0.0 && normalized_cutoff < 1.0) {
            return None;
        }

        // 预畸变，采样率按 2 归一化（双线性变换中 2*fs = 4）
        let warped = 4.0 * (PI * normalized_cutoff / 2.0).tan();
        let four = Complex64::new(4.0, 0.0);

        let mut complex_poles = Vec::new();
        let mut real_poles = Vec::new();
        for k in 0..order {
            let theta = PI * (2 * k + order + 1) as f64 / (2 * order) as f64;
            let prototype = Complex64::new(theta.cos(), theta.sin());
            let analog = match kind {
                FilterKind::LowPass => prototype * warped,
                FilterKind::HighPass => Complex64::new(warped, 0.0) / prototype,
            };
            let digital = (four + analog) / (four - analog);
            if digital.im.abs() < 1e-12 {
                real_poles.push(digital.re);
            } else if digital.im > 0.0 {
                complex_poles.push(digital);
            }
        }

        let zero = match kind {
            FilterKind::LowPass => -1.0,
            FilterKind::HighPass => 1.0,
        };
        let mut sections = Vec::with_capacity(order.div_ceil(2));
        for pole in complex_poles {
            sections.push(Biquad {
                b: [1.0, -2.0 * zero, zero * zero],
                a: [1.0, -2.0 * pole.re, pole.norm_sqr()],
            });
        }
        for pole in real_poles {
            sections.push(Biquad {
                b: [1.0, -zero, 0.0],
                a: [1.0, -pole, 0.0],
            });
        }

        // 每一节在通带处归一化为单位增益
        let reference = match kind {
            FilterKind::LowPass => 1.0,
            FilterKind::HighPass => -1.0,
        };
        for section in &mut sections {
            let gain = section.gain_at(reference);
            for coefficient in &mut section.b {
                *coefficient /= gain;
            }
        }

        Some(Self { sections, order })
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn sections(&self) -> &[Biquad] {
        &self.sections
    }

    /// Edge padding used by [`Butterworth::filtfilt`]: `min(len - 1, 3 * (filter_len - 1))`
    /// where `filter_len = order + 1` is the length of the transfer-function polynomials.
    pub fn padlen(&self, len: usize) -> usize {
        len.saturating_sub(1).min(3 * self.order)
    }

    fn initial_states(&self) -> Vec<[f64; 2]> {
        let mut scale = 1.0;
        self.sections
            .iter()
            .map(|section| {
                let [z0, z1] = section.step_initial_state();
                let state = [z0 * scale, z1 * scale];
                scale *= section.dc_gain();
                state
            })
            .collect()
    }

    /// Causal filtering starting from the steady state for a constant input `x0`.
    fn filter_from_steady_state(&self, data: &[f64], x0: f64) -> Vec<f64> {
        let mut states: Vec<[f64; 2]> = self
            .initial_states()
            .into_iter()
            .map(|[z0, z1]| [z0 * x0, z1 * x0])
            .collect();

        data.iter()
            .map(|&sample| {
                let mut x = sample;
                for (section, state) in self.sections.iter().zip(states.iter_mut()) {
                    let y = section.b[0] * x + state[0];
                    state[0] = section.b[1] * x - section.a[1] * y + state[1];
                    state[1] = section.b[2] * x - section.a[2] * y;
                    x = y;
                }
                x
            })
            .collect()
    }

    /// Zero-phase filtering: odd-extend the edges, filter forward, filter the
    /// reversed result, reverse back and drop the padding.
    pub fn filtfilt(&self, data: &[f64]) -> Vec<f64> {
        if data.is_empty() {
            return Vec::new();
        }

        let padlen = self.padlen(data.len());
        let extended = odd_extend(data, padlen);

        let forward = self.filter_from_steady_state(&extended, extended[0]);
        let mut reversed: Vec<f64> = forward.into_iter().rev().collect();
        let start = reversed[0];
        reversed = self.filter_from_steady_state(&reversed, start);
        reversed.reverse();

        reversed[padlen..padlen + data.len()].to_vec()
    }
}

/// Point-symmetric extension of both edges by `padlen` samples.
fn odd_extend(data: &[f64], padlen: usize) -> Vec<f64> {
    let n = data.len();
    let first = data[0];
    let last = data[n - 1];

    let mut extended = Vec::with_capacity(n + 2 * padlen);
    extended.extend((1..=padlen).rev().map(|i| 2.0 * first - data[i]));
    extended.extend_from_slice(data);
    extended.extend((1..=padlen).map(|i| 2.0 * last - data[n - 1 - i]));
    extended
}

/// Zero-phase filter `data` with a Butterworth design, or return it
/// unchanged when `cutoff / nyquist` is not below 1.
pub fn zero_phase_filter(data: &[f64], cutoff: f64, fs: f64, order: usize, kind: FilterKind) -> Vec<f64> {
    let nyquist = 0.5 * fs;
    let normalized = cutoff / nyquist;
    match Butterworth::design(order, normalized, kind) {
        Some(filter) => filter.filtfilt(data),
        None => data.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, fs: f64, n: usize, amplitude: f64) -> Vec<f64> {
        (0..n)
            .map(|i| amplitude * (2.0 * PI * freq * i as f64 / fs).sin())
            .collect()
    }

    fn rms(data: &[f64]) -> f64 {
        (data.iter().map(|v| v * v).sum::<f64>() / data.len() as f64).sqrt()
    }

    #[test]
    fn test_design_section_count() {
        let filter = Butterworth::design(5, 0.2, FilterKind::LowPass).unwrap();
        assert_eq!(filter.sections().len(), 3);
        assert_eq!(filter.order(), 5);

        let filter = Butterworth::design(4, 0.2, FilterKind::HighPass).unwrap();
        assert_eq!(filter.sections().len(), 2);
    }

    #[test]
    fn test_design_rejects_invalid_cutoff() {
        assert!(Butterworth::design(5, 1.0, FilterKind::LowPass).is_none());
        assert!(Butterworth::design(5, 1.5, FilterKind::HighPass).is_none());
        assert!(Butterworth::design(5, 0.0, FilterKind::LowPass).is_none());
        assert!(Butterworth::design(0, 0.3, FilterKind::LowPass).is_none());
    }

    #[test]
    fn test_lowpass_half_power_at_cutoff() {
        let filter = Butterworth::design(5, 0.2, FilterKind::LowPass).unwrap();
        // |H(e^{jw})| at w = 0.2*pi should be 1/sqrt(2)
        let w = 0.2 * PI;
        let z = Complex64::new(w.cos(), w.sin());
        let mut response = Complex64::new(1.0, 0.0);
        for s in filter.sections() {
            let zi = z.inv();
            let num = s.b[0] + s.b[1] * zi + s.b[2] * zi * zi;
            let den = s.a[0] + s.a[1] * zi + s.a[2] * zi * zi;
            response *= num / den;
        }
        assert!((response.norm() - 0.5f64.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_lowpass_keeps_constant() {
        let data = vec![3.5; 200];
        let filtered = zero_phase_filter(&data, 6.0, 60.0, 5, FilterKind::LowPass);
        assert_eq!(filtered.len(), data.len());
        for value in filtered {
            assert!((value - 3.5).abs() < 1e-9);
        }
    }

    #[test]
    fn test_highpass_removes_offset() {
        let data: Vec<f64> = sine(2.0, 60.0, 600, 1.0).iter().map(|v| v + 10.0).collect();
        let filtered = zero_phase_filter(&data, 0.1, 60.0, 5, FilterKind::HighPass);
        let mean = filtered[100..500].iter().sum::<f64>() / 400.0;
        assert!(mean.abs() < 0.05, "mean {} should be near zero", mean);
        assert!((rms(&filtered[100..500]) - 0.5f64.sqrt()).abs() < 0.05);
    }

    #[test]
    fn test_lowpass_attenuates_high_frequency() {
        let slow = sine(1.0, 60.0, 600, 1.0);
        let fast = sine(20.0, 60.0, 600, 1.0);
        let mixed: Vec<f64> = slow.iter().zip(&fast).map(|(a, b)| a + b).collect();

        let filtered = zero_phase_filter(&mixed, 6.0, 60.0, 5, FilterKind::LowPass);
        let residual: Vec<f64> = filtered.iter().zip(&slow).map(|(f, s)| f - s).collect();
        assert!(rms(&residual[50..550]) < 0.02);
    }

    #[test]
    fn test_zero_phase_has_no_lag() {
        let data = sine(1.0, 60.0, 600, 1.0);
        let filtered = zero_phase_filter(&data, 6.0, 60.0, 5, FilterKind::LowPass);
        // 1 Hz 正弦的峰值位置不应移动
        let peak_in = (60..120).max_by(|&a, &b| data[a].partial_cmp(&data[b]).unwrap()).unwrap();
        let peak_out = (60..120).max_by(|&a, &b| filtered[a].partial_cmp(&filtered[b]).unwrap()).unwrap();
        assert_eq!(peak_in, peak_out);
    }

    #[test]
    fn test_cutoff_at_nyquist_passes_through() {
        let data = vec![1.0, -2.0, 4.0, 0.5];
        assert_eq!(zero_phase_filter(&data, 30.0, 60.0, 5, FilterKind::LowPass), data);
        assert_eq!(zero_phase_filter(&data, 45.0, 60.0, 5, FilterKind::HighPass), data);
    }

    #[test]
    fn test_short_inputs_use_reduced_padding() {
        let filter = Butterworth::design(5, 0.2, FilterKind::LowPass).unwrap();
        assert_eq!(filter.padlen(1000), 15);
        assert_eq!(filter.padlen(4), 3);
        assert_eq!(filter.padlen(1), 0);

        assert_eq!(filter.filtfilt(&[2.0]).len(), 1);
        assert_eq!(filter.filtfilt(&[1.0, 2.0, 3.0]).len(), 3);
        assert!(filter.filtfilt(&[]).is_empty());
    }
}
