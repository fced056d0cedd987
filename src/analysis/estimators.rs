//! Free-energy estimators from nonequilibrium work samples (reduced units).
//!
//! Reference: Shirts, Bair, Hooker & Pande (2003) "Equilibrium free energies from
//! nonequilibrium measurements using maximum-likelihood methods",
//! Phys. Rev. Lett. 91, 140601

use crate::sams::log_sum_exp;

/// One-sided exponential averaging (Jarzynski): ΔF = −ln ⟨exp(−W)⟩.
///
/// Returns (ΔF, standard error by the delta method). Empty input gives NaN.
pub fn exp_estimate(works: &[f64]) -> (f64, f64) {
    let n = works.len();
    if n == 0 {
        return (f64::NAN, f64::NAN);
    }
    let neg: Vec<f64> = works.iter().map(|w| -w).collect();
    let log_mean = log_sum_exp(&neg) - (n as f64).ln();
    let delta_f = -log_mean;

    if n < 2 {
        return (delta_f, 0.0);
    }
    // x = exp(−W) / ⟨exp(−W)⟩, so ⟨x⟩ = 1 and SE(ΔF) = std(x)/√n.
    let x: Vec<f64> = neg.iter().map(|v| (v - log_mean).exp()).collect();
    let var = x.iter().map(|xi| (xi - 1.0).powi(2)).sum::<f64>() / (n - 1) as f64;
    (delta_f, (var / n as f64).sqrt())
}

/// Fermi function 1/(1 + eˣ) without overflow.
fn fermi(x: f64) -> f64 {
    if x > 0.0 {
        let e = (-x).exp();
        e / (1.0 + e)
    } else {
        1.0 / (1.0 + x.exp())
    }
}

/// Bennett acceptance ratio from forward works (0 → 1) and reverse works (1 → 0).
///
/// Returns (ΔF, asymptotic standard error), or `None` if either set is empty.
pub fn bar_estimate(forward: &[f64], reverse: &[f64]) -> Option<(f64, f64)> {
    if forward.is_empty() || reverse.is_empty() {
        return None;
    }
    let n_f = forward.len() as f64;
    let n_r = reverse.len() as f64;
    let m = (n_f / n_r).ln();

    let residual = |delta_f: f64| -> f64 {
        let fwd: f64 = forward.iter().map(|w| fermi(m + w - delta_f)).sum();
        let rev: f64 = reverse.iter().map(|w| fermi(-m + w + delta_f)).sum();
        fwd - rev
    };

    // residual is increasing in ΔF; bracket, then bisect.
    let span = forward
        .iter()
        .chain(reverse.iter())
        .fold(1.0f64, |acc, w| acc.max(w.abs()));
    let mut lo = -span - 1.0;
    let mut hi = span + 1.0;
    while residual(lo) > 0.0 {
        lo -= span;
    }
    while residual(hi) < 0.0 {
        hi += span;
    }
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        if residual(mid) < 0.0 {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo < 1e-12 {
            break;
        }
    }
    let delta_f = 0.5 * (lo + hi);

    let moments = |values: Vec<f64>| -> (f64, f64) {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let mean_sq = values.iter().map(|v| v * v).sum::<f64>() / n;
        (mean, mean_sq)
    };
    let (af, af2) = moments(forward.iter().map(|w| fermi(m + w - delta_f)).collect());
    let (ar, ar2) = moments(reverse.iter().map(|w| fermi(-m + w + delta_f)).collect());
    let variance = af2 / (af * af) / n_f + ar2 / (ar * ar) / n_r - (n_f + n_r) / (n_f * n_r);

    Some((delta_f, variance.max(0.0).sqrt()))
}
