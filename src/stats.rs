//! Streaming statistics helpers: mean/std, Pearson correlation, and a
//! Jarque-Bera normality test substituting for Shapiro-Wilk (see
//! SPEC_FULL.md §12 — no Shapiro-Wilk implementation exists in the crates
//! available to this repo; statrs's `ChiSquared` distribution gives us a
//! calibrated p-value from skewness/kurtosis instead).

use statrs::distribution::{ChiSquared, ContinuousCDF};

pub fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Population standard deviation (ddof = 0), matching `numpy.std`'s default
/// used throughout the reference implementation.
pub fn population_std(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let m = mean(xs);
    let variance = xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / xs.len() as f64;
    variance.sqrt()
}

/// Pearson correlation coefficient of two equal-length series. Returns
/// `f64::NAN` if either series has zero variance.
pub fn pearson_correlation(xs: &[f64], ys: &[f64]) -> f64 {
    debug_assert_eq!(xs.len(), ys.len());
    if xs.len() < 2 {
        return f64::NAN;
    }
    let mx = mean(xs);
    let my = mean(ys);
    let mut cov = 0.0;
    let mut vx = 0.0;
    let mut vy = 0.0;
    for (x, y) in xs.iter().zip(ys.iter()) {
        let dx = x - mx;
        let dy = y - my;
        cov += dx * dy;
        vx += dx * dx;
        vy += dy * dy;
    }
    if vx <= 0.0 || vy <= 0.0 {
        return f64::NAN;
    }
    cov / (vx.sqrt() * vy.sqrt())
}

/// Jarque-Bera normality test p-value: `JB = n/6 * (S^2 + K^2/4)` where `S`
/// is sample skewness and `K` is excess kurtosis, referred against a
/// chi-squared(2) distribution. Returns `0.0` on degenerate input (zero
/// variance, too few samples) rather than propagating NaN.
pub fn jarque_bera_p_value(xs: &[f64]) -> f64 {
    let n = xs.len();
    if n < 8 {
        return 0.0;
    }
    let m = mean(xs);
    let variance = xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / n as f64;
    if variance <= 1e-12 {
        return 0.0;
    }
    let std_dev = variance.sqrt();
    let n_f = n as f64;

    let skew = xs.iter().map(|x| ((x - m) / std_dev).powi(3)).sum::<f64>() / n_f;
    let kurtosis = xs.iter().map(|x| ((x - m) / std_dev).powi(4)).sum::<f64>() / n_f;
    let excess_kurtosis = kurtosis - 3.0;

    let jb = (n_f / 6.0) * (skew.powi(2) + excess_kurtosis.powi(2) / 4.0);
    if !jb.is_finite() {
        return 0.0;
    }

    match ChiSquared::new(2.0) {
        Ok(dist) => {
            let p = 1.0 - dist.cdf(jb);
            if p.is_nan() {
                0.0
            } else {
                p.clamp(0.0, 1.0)
            }
        }
        Err(_) => 0.0,
    }
}
