//! Small numeric helpers shared across the demodulators.
//!
//! Kept deliberately thin: the demodulators work in `f32` and `i32`/`u32`
//! directly rather than through a generic `Float` abstraction, since every
//! quantity here (sample rate, baud, phase accumulator width) is a concrete
//! runtime value, not a compile-time type parameter.

use std::f32::consts::PI;

/// Two times pi, spelled out because `std::f32::consts::TAU` reads less
/// clearly next to the phase-accumulator math below.
pub const TAU: f32 = 2.0 * PI;

/// Wrap a phase accumulator increment in unsigned 32-bit arithmetic and
/// reinterpret the result as signed. The reference implementation relies on
/// implementation-defined signed-overflow wraparound; we instead perform the
/// add on the unsigned bit pattern, which is portable and has exactly the
/// same wraparound behavior.
#[inline]
pub fn wrapping_add_i32(a: i32, b: i32) -> i32 {
    (a as u32).wrapping_add(b as u32) as i32
}

/// Unwrap an angle difference into `(-pi, pi]`.
#[inline]
pub fn wrap_angle(mut a: f32) -> f32 {
    while a > PI {
        a -= TAU;
    }
    while a <= -PI {
        a += TAU;
    }
    a
}

/// `round(2^32 * freq / sample_rate)`, the phase-accumulator increment used
/// by every oscillator (AFSK tones, PSK carrier, tone generator) in this
/// crate. Computed in `f64` because `2^32` does not fit `f32` precision.
#[inline]
pub fn phase_increment(freq_hz: f64, sample_rate_hz: f64) -> u32 {
    let ratio = freq_hz / sample_rate_hz;
    (ratio * 4294967296.0_f64).round() as i64 as u32
}

/// Round `x` to the nearest odd integer >= 3, used to size symmetric FIR
/// kernels so they have a well-defined center tap.
#[inline]
pub fn round_up_odd(x: f64) -> usize {
    let n = x.round().max(3.0) as usize;
    if n % 2 == 0 {
        n + 1
    } else {
        n
    }
}

/// Number of taps needed to span `symbol_span` symbol periods at
/// `sample_rate_hz / baud`, rounded to an odd count.
pub fn taps_for_symbol_span(sample_rate_hz: f64, baud: f64, symbol_span: f64) -> usize {
    let samples_per_symbol = sample_rate_hz / baud;
    round_up_odd(samples_per_symbol * symbol_span)
}

/// Population count convenience wrapper, used throughout the DCD scoring in
/// [`crate::dpll`].
#[inline]
pub fn popcount32(x: u32) -> u32 {
    x.count_ones()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_increment_roundtrips_full_scale() {
        // A 1200 Hz tone at 44100 Hz should complete one cycle in
        // sample_rate / freq samples; walking the accumulator that many
        // times should land back near zero (mod 2^32).
        let inc = phase_increment(1200.0, 44100.0);
        let steps = (44100.0 / 1200.0).round() as u32;
        let total = inc.wrapping_mul(steps);
        let err = (total as i64).min((u32::MAX as i64 + 1) - total as i64);
        assert!(err < (inc as i64) * 2);
    }

    #[test]
    fn round_up_odd_is_always_odd_and_at_least_three() {
        for x in [0.0, 1.0, 2.0, 2.5, 4.0, 100.0] {
            let n = round_up_odd(x);
            assert!(n >= 3);
            assert_eq!(n % 2, 1);
        }
    }

    #[test]
    fn wrap_angle_stays_in_range() {
        for a in [-10.0_f32, -4.0, 0.0, 3.0, 10.0] {
            let w = wrap_angle(a);
            assert!(w > -PI - 1e-4 && w <= PI + 1e-4);
        }
    }
}
