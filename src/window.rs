//! Window functions and FIR/RRC kernel generators (component A).
//!
//! These generators are the leaf layer everything else in the crate is
//! built from: the AFSK mark/space correlators, the PSK and baseband
//! lowpass filters, and the 9600-baud polyphase upsampler kernel are all
//! produced here and then owned as plain `Vec<f32>` by their respective
//! demodulator state.

use std::f64::consts::PI;

use crate::error::{ModemError, Result};

/// Upper bound on any single filter kernel's tap count. Configurations that
/// would need more are rejected (or clamped, if the caller opts in) rather
/// than silently allocating without bound.
pub const MAX_FILTER_TAPS: usize = 480;

/// Window functions applied to the ideal (infinite) sinc response before
/// truncating it to `N` taps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Window {
    /// Rectangular window (all taps weighted 1).
    #[default]
    Truncated,
    Cosine,
    Hamming,
    Blackman,
    Flattop,
}

impl Window {
    /// Weight of tap `j` (0-indexed) out of `n` total taps. Window types
    /// outside the enumerated set are not representable in the enum, so the
    /// "default to TRUNCATED" contract from the spec is satisfied by
    /// `Window::default()`.
    fn weight(self, j: usize, n: usize) -> f64 {
        let jf = j as f64;
        let nf = (n - 1) as f64;
        match self {
            Window::Truncated => 1.0,
            Window::Cosine => (PI * jf / nf).sin(),
            Window::Hamming => 0.54 - 0.46 * (2.0 * PI * jf / nf).cos(),
            Window::Blackman => {
                0.42 - 0.5 * (2.0 * PI * jf / nf).cos() + 0.08 * (4.0 * PI * jf / nf).cos()
            }
            Window::Flattop => {
                let w = 2.0 * PI * jf / nf;
                1.0 - 1.93 * w.cos() + 1.29 * (2.0 * w).cos() - 0.388 * (3.0 * w).cos()
                    + 0.032 * (4.0 * w).cos()
            }
        }
    }
}

/// Resolve a requested filter length against [`MAX_FILTER_TAPS`].
///
/// When `clamp` is false (the default, §7), an oversized request is a hard
/// error. When `clamp` is true, it is instead clamped down to
/// `MAX_FILTER_TAPS - 1` rounded to the nearest odd tap count, with a
/// `log::warn!` noting the degraded filter response.
fn check_len(n: usize, clamp: bool) -> Result<usize> {
    if n > MAX_FILTER_TAPS {
        if clamp {
            let clamped = (MAX_FILTER_TAPS - 1) | 1;
            log::warn!(
                "filter length {n} exceeds MAX_FILTER_TAPS ({MAX_FILTER_TAPS}); clamping to {clamped}"
            );
            return Ok(clamped);
        }
        return Err(ModemError::FilterTooLarge {
            filter: "generic",
            needed: n,
            max: MAX_FILTER_TAPS,
        });
    }
    if n < 3 {
        return Err(ModemError::FilterTooLarge {
            filter: "generic",
            needed: n,
            max: MAX_FILTER_TAPS,
        });
    }
    Ok(n)
}

/// Generate a windowed-sinc lowpass kernel with cutoff `fc` (as a fraction
/// of the sample rate, in `(0, 0.5)`) into a freshly allocated `n`-tap
/// vector, normalized for unity DC gain. `clamp_oversized` selects the §7
/// oversized-filter policy; see [`check_len`].
pub fn gen_lowpass(fc: f64, n: usize, window: Window, clamp_oversized: bool) -> Result<Vec<f32>> {
    let n = check_len(n, clamp_oversized)?;
    debug_assert!(fc > 0.0 && fc < 0.5);
    let center = (n - 1) as f64 / 2.0;
    let mut out = vec![0.0_f64; n];
    for j in 0..n {
        let d = j as f64 - center;
        let sinc = if d == 0.0 {
            2.0 * fc
        } else {
            (2.0 * PI * fc * d).sin() / (PI * d)
        };
        out[j] = sinc * window.weight(j, n);
    }
    let sum: f64 = out.iter().sum();
    if sum.abs() > 1e-12 {
        for v in out.iter_mut() {
            *v /= sum;
        }
    }
    Ok(out.into_iter().map(|v| v as f32).collect())
}

/// Generate a windowed-sinc bandpass kernel passing `[f1, f2]` (as fractions
/// of the sample rate), normalized so the gain at the center frequency
/// `(f1+f2)/2` is unity.
pub fn gen_bandpass(
    f1: f64,
    f2: f64,
    n: usize,
    window: Window,
    clamp_oversized: bool,
) -> Result<Vec<f32>> {
    let n = check_len(n, clamp_oversized)?;
    debug_assert!(f1 < f2 && f2 < 0.5);
    let center = (n - 1) as f64 / 2.0;
    let mut out = vec![0.0_f64; n];
    for j in 0..n {
        let d = j as f64 - center;
        let sinc = if d == 0.0 {
            2.0 * (f2 - f1)
        } else {
            ((2.0 * PI * f2 * d).sin() - (2.0 * PI * f1 * d).sin()) / (PI * d)
        };
        out[j] = sinc * window.weight(j, n);
    }
    let fc = (f1 + f2) / 2.0;
    let omega = 2.0 * PI * fc;
    let mut gain = 0.0_f64;
    for j in 0..n {
        gain += 2.0 * out[j] * (omega * (j as f64 - center)).cos();
    }
    if gain.abs() > 1e-12 {
        for v in out.iter_mut() {
            *v /= gain;
        }
    }
    Ok(out.into_iter().map(|v| v as f32).collect())
}

/// Generate a root-raised-cosine pulse-shaping kernel with roll-off `alpha`
/// at `samples_per_symbol` samples/symbol, normalized for unit peak
/// response. Handles the two removable singularities (`t = 0` and
/// `|t| = Ts / (4*alpha)`) explicitly.
pub fn gen_rrc(
    alpha: f64,
    samples_per_symbol: f64,
    n: usize,
    clamp_oversized: bool,
) -> Result<Vec<f32>> {
    let n = check_len(n, clamp_oversized)?;
    debug_assert!(alpha >= 0.0 && alpha <= 1.0);
    let ts = samples_per_symbol;
    let center = (n - 1) as f64 / 2.0;
    let mut out = vec![0.0_f64; n];
    for j in 0..n {
        let t = (j as f64 - center) / ts;
        out[j] = if t.abs() < 1e-8 {
            1.0 - alpha + 4.0 * alpha / PI
        } else if alpha > 0.0 && (4.0 * alpha * t.abs() - 1.0).abs() < 1e-8 {
            let s = (1.0 + 2.0 / PI) * (PI / (4.0 * alpha)).sin();
            let c = (1.0 - 2.0 / PI) * (PI / (4.0 * alpha)).cos();
            (alpha / 2.0_f64.sqrt()) * (s + c)
        } else {
            let num = (PI * t * (1.0 - alpha)).sin()
                + 4.0 * alpha * t * (PI * t * (1.0 + alpha)).cos();
            let den = PI * t * (1.0 - (4.0 * alpha * t).powi(2));
            num / den
        };
    }
    let peak = out.iter().cloned().fold(0.0_f64, f64::max);
    if peak > 1e-12 {
        for v in out.iter_mut() {
            *v /= peak;
        }
    }
    Ok(out.into_iter().map(|v| v as f32).collect())
}

/// Generate a gain-normalized mark/space correlator pair: `(cos, sin)`
/// kernels at frequency `freq_hz`, normalized so a unit-amplitude tone at
/// `freq_hz` yields a correlation magnitude of 1.
pub fn gen_correlator(
    freq_hz: f64,
    sample_rate_hz: f64,
    n: usize,
    clamp_oversized: bool,
) -> Result<(Vec<f32>, Vec<f32>)> {
    let n = check_len(n, clamp_oversized)?;
    let omega = 2.0 * PI * freq_hz / sample_rate_hz;
    let mut cos_k = vec![0.0_f64; n];
    let mut sin_k = vec![0.0_f64; n];
    for j in 0..n {
        cos_k[j] = (omega * j as f64).cos();
        sin_k[j] = (omega * j as f64).sin();
    }
    // Energy of a pure cosine/sine over n samples is n/2 (for n not tiny);
    // normalize so the correlator responds with magnitude 1 to a
    // unit-amplitude tone at freq_hz.
    let norm = 2.0 / n as f64;
    for v in cos_k.iter_mut().chain(sin_k.iter_mut()) {
        *v *= norm;
    }
    Ok((
        cos_k.into_iter().map(|v| v as f32).collect(),
        sin_k.into_iter().map(|v| v as f32).collect(),
    ))
}

/// Split a single long lowpass kernel of length `n` into `phases`
/// interleaved polyphase sub-kernels, so that upsampling by `phases` can be
/// done without multiplying by zero-stuffed samples. Sub-kernel `p` holds
/// taps `p, p+phases, p+2*phases, ...` of the parent kernel, reversed so
/// each can be convolved directly against the (non-upsampled) input history
/// in left-to-right order.
pub fn polyphase_split(kernel: &[f32], phases: usize) -> Vec<Vec<f32>> {
    let mut banks = vec![Vec::new(); phases];
    for (i, &tap) in kernel.iter().enumerate() {
        banks[i % phases].push(tap);
    }
    banks
}
