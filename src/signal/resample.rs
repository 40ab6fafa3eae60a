//! Band-limited (Fourier) resampling.
//!
//! The signal is treated as one period of a periodic sequence: its spectrum is
//! zero-padded (upsampling) or truncated (downsampling) and transformed back.

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

/// Resample `data` to exactly `num` points.
pub fn resample(data: &[f64], num: usize) -> Vec<f64> {
    let n = data.len();
    if n == 0 || num == 0 {
        return Vec::new();
    }
    if num == n {
        return data.to_vec();
    }

    let mut planner = FftPlanner::<f64>::new();

    let mut spectrum: Vec<Complex<f64>> = data.iter().map(|&v| Complex::new(v, 0.0)).collect();
    planner.plan_fft_forward(n).process(&mut spectrum);

    let mut output = vec![Complex::new(0.0, 0.0); num];
    let kept = n.min(num);
    let half = kept / 2;

    // 正频率（含直流）
    for k in 0..=half.min(kept - 1) {
        output[k] = spectrum[k];
    }
    // 负频率
    for k in 1..=(kept - 1) / 2 {
        output[num - k] = spectrum[n - k];
    }

    // 偶数长度时的奈奎斯特分量需要拆分或合并
    if kept % 2 == 0 && half > 0 {
        if num > n {
            let nyquist = spectrum[half] * 0.5;
            output[half] = nyquist;
            output[num - half] = nyquist;
        } else {
            output[half] = spectrum[half] + spectrum[n - half];
        }
    }

    planner.plan_fft_inverse(num).process(&mut output);

    // rustfft 不做归一化：1/num 的逆变换缩放与 num/n 的幅度补偿合并为 1/n
    let scale = 1.0 / n as f64;
    output.into_iter().map(|c| c.re * scale).collect()
}

/// `num` evenly spaced values over `[start, end]`, both ends included.
pub fn linspace(start: f64, end: f64, num: usize) -> Vec<f64> {
    match num {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (num - 1) as f64;
            (0..num).map(|i| start + step * i as f64).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_output_length() {
        let data: Vec<f64> = (0..37).map(|i| (i as f64).sin()).collect();
        assert_eq!(resample(&data, 370).len(), 370);
        assert_eq!(resample(&data, 12).len(), 12);
        assert_eq!(resample(&data, 37), data);
        assert!(resample(&[], 10).is_empty());
    }

    #[test]
    fn test_upsampled_sine_matches_dense_sine() {
        // 整数个周期的正弦，上采样后应与直接在细网格上采样一致
        let n = 60;
        let data: Vec<f64> = (0..n).map(|i| (2.0 * PI * 3.0 * i as f64 / n as f64).sin()).collect();
        let up = resample(&data, n * 10);
        for (i, value) in up.iter().enumerate() {
            let expected = (2.0 * PI * 3.0 * i as f64 / (n * 10) as f64).sin();
            assert!((value - expected).abs() < 1e-9, "index {}: {} vs {}", i, value, expected);
        }
    }

    #[test]
    fn test_upsampling_preserves_original_samples() {
        let data = vec![1.0, 4.0, -2.0, 0.5, 3.0, -1.0, 2.0, 0.0];
        let up = resample(&data, 40);
        for (i, value) in data.iter().enumerate() {
            assert!((up[i * 5] - value).abs() < 1e-9);
        }
    }

    #[test]
    fn test_constant_signal_stays_constant() {
        let up = resample(&[2.5; 7], 70);
        assert!(up.iter().all(|v| (v - 2.5).abs() < 1e-12));
        let down = resample(&[2.5; 70], 7);
        assert!(down.iter().all(|v| (v - 2.5).abs() < 1e-12));
    }

    #[test]
    fn test_linspace() {
        assert_eq!(linspace(0.0, 1.0, 5), vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(linspace(3.0, 9.0, 1), vec![3.0]);
        assert!(linspace(0.0, 1.0, 0).is_empty());
    }
}
