//! Window functions for the Welch PSD estimator.

use std::f64::consts::PI;

/// Window shapes recognized by the PSD engine's session configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowType {
    Rectangular,
    Hann,
    Hamming,
    Blackman,
    FlatTop,
    Kaiser,
    Tukey,
    Bartlett,
}

impl WindowType {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s.to_ascii_lowercase().as_str() {
            "rectangular" => WindowType::Rectangular,
            "hann" => WindowType::Hann,
            "hamming" => WindowType::Hamming,
            "blackman" => WindowType::Blackman,
            "flattop" => WindowType::FlatTop,
            "kaiser" => WindowType::Kaiser,
            "tukey" => WindowType::Tukey,
            "bartlett" => WindowType::Bartlett,
            _ => return None,
        })
    }

    /// Equivalent noise bandwidth factor, used to size `nperseg` from a
    /// target resolution bandwidth. Only the four named factors are
    /// specified; every other window defaults to 1.0.
    pub fn enbw_factor(self) -> f64 {
        match self {
            WindowType::Rectangular => 1.000,
            WindowType::Hamming => 1.363,
            WindowType::Hann => 1.500,
            WindowType::Blackman => 1.730,
            _ => 1.0,
        }
    }

    /// Generates the `n`-sample window coefficients.
    pub fn generate(self, n: usize) -> Vec<f64> {
        if n == 0 {
            return Vec::new();
        }
        if n == 1 {
            return vec![1.0];
        }
        let nm1 = (n - 1) as f64;
        match self {
            WindowType::Rectangular => vec![1.0; n],
            WindowType::Hann => (0..n)
                .map(|k| 0.5 * (1.0 - (2.0 * PI * k as f64 / nm1).cos()))
                .collect(),
            WindowType::Hamming => (0..n)
                .map(|k| 0.54 - 0.46 * (2.0 * PI * k as f64 / nm1).cos())
                .collect(),
            WindowType::Blackman => (0..n)
                .map(|k| {
                    let x = 2.0 * PI * k as f64 / nm1;
                    0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos()
                })
                .collect(),
            WindowType::Bartlett => (0..n)
                .map(|k| 1.0 - (2.0 * k as f64 / nm1 - 1.0).abs())
                .collect(),
            WindowType::FlatTop => {
                let (a0, a1, a2, a3, a4) = (0.21557895, 0.41663158, 0.277263158, 0.083578947, 0.006947368);
                (0..n)
                    .map(|k| {
                        let x = 2.0 * PI * k as f64 / nm1;
                        a0 - a1 * x.cos() + a2 * (2.0 * x).cos() - a3 * (3.0 * x).cos()
                            + a4 * (4.0 * x).cos()
                    })
                    .collect()
            }
            WindowType::Tukey => {
                let alpha = 0.5_f64;
                let edge = (alpha * nm1 / 2.0).floor() as usize;
                (0..n)
                    .map(|k| {
                        if k < edge {
                            0.5 * (1.0 + (PI * (2.0 * k as f64 / (alpha * nm1) - 1.0)).cos())
                        } else if k >= n - edge {
                            let k2 = (n - 1 - k) as f64;
                            0.5 * (1.0 + (PI * (2.0 * k2 / (alpha * nm1) - 1.0)).cos())
                        } else {
                            1.0
                        }
                    })
                    .collect()
            }
            WindowType::Kaiser => {
                let beta = 8.0_f64;
                let i0_beta = bessel_i0(beta);
                (0..n)
                    .map(|k| {
                        let r = 2.0 * k as f64 / nm1 - 1.0;
                        bessel_i0(beta * (1.0 - r * r).max(0.0).sqrt()) / i0_beta
                    })
                    .collect()
            }
        }
    }
}

/// Zeroth-order modified Bessel function of the first kind, via its power
/// series. Converges quickly for the beta values used by a Kaiser window.
fn bessel_i0(x: f64) -> f64 {
    let mut sum = 1.0;
    let mut term = 1.0;
    let half_x_sq = (x / 2.0) * (x / 2.0);
    for k in 1..32 {
        term *= half_x_sq / (k as f64 * k as f64);
        sum += term;
        if term < 1e-14 * sum {
            break;
        }
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hann_window_is_zero_at_edges() {
        let w = WindowType::Hann.generate(8);
        assert!(w[0].abs() < 1e-9);
        assert!(w[7].abs() < 1e-9);
    }

    #[test]
    fn rectangular_window_is_all_ones() {
        let w = WindowType::Rectangular.generate(5);
        assert_eq!(w, vec![1.0; 5]);
    }

    #[test]
    fn enbw_factors_match_named_windows() {
        assert_eq!(WindowType::Hamming.enbw_factor(), 1.363);
        assert_eq!(WindowType::Kaiser.enbw_factor(), 1.0);
    }

    #[test]
    fn parse_recognizes_all_eight_names() {
        for name in [
            "rectangular",
            "hann",
            "hamming",
            "blackman",
            "flattop",
            "kaiser",
            "tukey",
            "bartlett",
        ] {
            assert!(WindowType::parse(name).is_some(), "{name} should parse");
        }
        assert!(WindowType::parse("bogus").is_none());
    }
}
