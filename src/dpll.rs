//! Digital phase-locked loop and slicer (component B).
//!
//! One [`Dpll`] runs per slicer. It owns a 32-bit signed phase accumulator
//! that overflows from large-positive to negative once per symbol; that
//! overflow is the sample instant. Between overflows, observed bit
//! transitions nudge the phase toward the true symbol clock, with separate
//! "searching" and "locked" inertia so acquisition is fast but steady-state
//! jitter is low.

use crate::math::{popcount32, wrapping_add_i32};

/// Data-carrier-detect thresholds, parameterized because the 9600 baud path
/// uses wider/looser values than AFSK/PSK (§4.B).
#[derive(Debug, Clone, Copy)]
pub struct DcdThresholds {
    /// Popcount of the 32-bit `score` register at/above which DCD turns on.
    pub on: u32,
    /// Popcount of `score` at/below which DCD turns off.
    pub off: u32,
    /// A transition is "good" when `|pll| < good_width * 1024 * 1024`.
    pub good_width: i64,
}

impl DcdThresholds {
    /// Defaults for AFSK/PSK (§4.B): on=30, off=6, width=512.
    pub const AFSK_PSK: DcdThresholds = DcdThresholds {
        on: 30,
        off: 6,
        good_width: 512,
    };

    /// Defaults for 9600 baud (§4.B): on=32, off=8, width=1024.
    pub const BASEBAND: DcdThresholds = DcdThresholds {
        on: 32,
        off: 8,
        good_width: 1024,
    };
}

/// Kind of nudge applied to the phase accumulator on an observed transition.
/// AFSK/PSK multiply the phase toward zero; the 9600 path instead
/// interpolates a zero-crossing target from the two surrounding demod
/// outputs (§4.B step 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NudgeKind {
    Multiplicative,
    ZeroCrossing,
}

/// Outcome of feeding one audio sample to a [`Dpll`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SymbolEvent {
    pub bit: bool,
    /// Slicing-margin quality in `0..=100`, or `None` when not available
    /// (e.g. zero envelope amplitude).
    pub quality: Option<u8>,
}

/// Per-slicer DPLL + data-carrier-detect state (§3, §4.B).
#[derive(Debug, Clone)]
pub struct Dpll {
    pll: i32,
    prev_pll: i32,
    step_per_sample: i32,
    prev_bit: bool,
    prev_demod_out: f32,
    inertia_locked: f32,
    inertia_searching: f32,
    nudge_kind: NudgeKind,
    thresholds: DcdThresholds,

    good_flag: bool,
    bad_flag: bool,
    good_hist: u8,
    bad_hist: u8,
    score: u32,
    data_detect: bool,
}

impl Dpll {
    /// `step_per_sample` is `round(2^32 / samples_per_symbol)`, computed
    /// once from `sample_rate / baud`. `inertia_locked`/`inertia_searching`
    /// are in `0..1`: the fraction of the phase that survives a transition
    /// nudge (closer to 1 = slower, steadier correction).
    pub fn new(
        step_per_sample: i32,
        inertia_locked: f32,
        inertia_searching: f32,
        nudge_kind: NudgeKind,
        thresholds: DcdThresholds,
    ) -> Self {
        debug_assert!(step_per_sample > 0 && (step_per_sample as i64) < (1_i64 << 31));
        Self {
            pll: i32::MIN,
            prev_pll: i32::MIN,
            step_per_sample,
            prev_bit: false,
            prev_demod_out: 0.0,
            inertia_locked,
            inertia_searching,
            nudge_kind,
            thresholds,
            good_flag: false,
            bad_flag: false,
            good_hist: 0,
            bad_hist: 0,
            score: 0,
            data_detect: false,
        }
    }

    /// Derive `step_per_sample` from a sample rate and baud.
    pub fn step_for(sample_rate_hz: f64, baud: f64) -> i32 {
        let samples_per_symbol = sample_rate_hz / baud;
        ((1_i64 << 32) as f64 / samples_per_symbol).round() as i64 as i32
    }

    pub fn data_detect(&self) -> bool {
        self.data_detect
    }

    pub fn pll(&self) -> i32 {
        self.pll
    }

    /// Feed one demodulated sample (`demod_out`, already sliced into
    /// `bit`). `envelope_amplitude` is used to scale the slicing-margin
    /// quality; pass `0.0` when unavailable. Returns `Some(event)` on a
    /// symbol-sample instant (overflow), else `None`.
    pub fn step(&mut self, demod_out: f32, bit: bool, envelope_amplitude: f32) -> Option<SymbolEvent> {
        self.prev_pll = self.pll;
        self.pll = wrapping_add_i32(self.pll, self.step_per_sample);

        let overflowed = if self.nudge_kind == NudgeKind::ZeroCrossing {
            self.prev_pll > 1_000_000_000 && self.pll < -1_000_000_000
        } else {
            self.pll < 0 && self.prev_pll > 0
        };

        let event = if overflowed {
            let quality = if envelope_amplitude > 1e-6 {
                Some(((demod_out.abs() * 100.0 / envelope_amplitude).clamp(0.0, 100.0)) as u8)
            } else {
                None
            };
            Some(SymbolEvent { bit, quality })
        } else {
            None
        };

        if event.is_some() {
            self.dcd_each_symbol();
        }

        if bit != self.prev_bit {
            let good = (self.pll.unsigned_abs() as i64) < self.thresholds.good_width * 1024 * 1024;
            if good {
                self.good_flag = true;
            } else {
                self.bad_flag = true;
            }

            match self.nudge_kind {
                NudgeKind::ZeroCrossing => {
                    let denom = demod_out - self.prev_demod_out;
                    if denom.abs() > 1e-9 {
                        let target = self.step_per_sample as f32 * demod_out / denom;
                        let inertia = self.inertia();
                        let blended = self.pll as f32 * inertia + target * (1.0 - inertia);
                        self.pll = blended.floor() as i32;
                    }
                }
                NudgeKind::Multiplicative => {
                    let inertia = self.inertia();
                    self.pll = (self.pll as f32 * inertia).floor() as i32;
                }
            }
        }

        self.prev_bit = bit;
        self.prev_demod_out = demod_out;
        event
    }

    fn inertia(&self) -> f32 {
        if self.data_detect {
            self.inertia_locked
        } else {
            self.inertia_searching
        }
    }

    fn dcd_each_symbol(&mut self) {
        self.good_hist = (self.good_hist << 1) | self.good_flag as u8;
        self.bad_hist = (self.bad_hist << 1) | self.bad_flag as u8;
        self.good_flag = false;
        self.bad_flag = false;

        let good_n = self.good_hist.count_ones();
        let bad_n = self.bad_hist.count_ones();
        let set_bit = good_n >= bad_n + 2;

        self.score = (self.score << 1) | set_bit as u32;
        let s = popcount32(self.score);

        if !self.data_detect && s >= self.thresholds.on {
            self.data_detect = true;
        } else if self.data_detect && s <= self.thresholds.off {
            self.data_detect = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_never_flips_on_nudge() {
        // Isolate the nudge from the overflow by stepping manually: apply
        // the accumulator add, skip samples that overflowed (those are the
        // legitimate symbol-clock wrap, not a nudge), and on every
        // transition sample check that the nudge itself preserved sign.
        let mut dpll = Dpll::new(
            Dpll::step_for(44100.0, 300.0),
            0.74,
            0.5,
            NudgeKind::Multiplicative,
            DcdThresholds::AFSK_PSK,
        );
        let mut bit = false;
        for _ in 0..50_000 {
            bit = !bit;
            let prev_pll = dpll.pll;
            let prev_bit = dpll.prev_bit;
            let overflowed_before_nudge = {
                let stepped = wrapping_add_i32(prev_pll, dpll.step_per_sample);
                stepped < 0 && prev_pll > 0
            };
            let _ = dpll.step(if bit { 1.0 } else { -1.0 }, bit, 1.0);
            if bit != prev_bit && !overflowed_before_nudge {
                let post_add = wrapping_add_i32(prev_pll, dpll.step_per_sample);
                if post_add != 0 && dpll.pll != 0 {
                    assert_eq!(
                        post_add.signum(),
                        dpll.pll.signum(),
                        "nudge must not cross zero: post_add={post_add} nudged={}",
                        dpll.pll
                    );
                }
            }
        }
    }

    #[test]
    fn symbol_rate_matches_sample_rate_over_baud() {
        let sample_rate = 44100.0;
        let baud = 1200.0;
        let mut dpll = Dpll::new(
            Dpll::step_for(sample_rate, baud),
            0.74,
            0.5,
            NudgeKind::Multiplicative,
            DcdThresholds::AFSK_PSK,
        );
        let mut last_overflow: Option<usize> = None;
        let mut gaps = Vec::new();
        let mut bit = false;
        for i in 0..200_000 {
            bit = !bit;
            if let Some(_ev) = dpll.step(if bit { 1.0 } else { -1.0 }, bit, 1.0) {
                if let Some(prev) = last_overflow {
                    gaps.push(i - prev);
                }
                last_overflow = Some(i);
            }
        }
        assert!(gaps.len() > 1000, "expected many symbols, got {}", gaps.len());
        let avg = gaps.iter().sum::<usize>() as f64 / gaps.len() as f64;
        let expected = sample_rate / baud;
        assert!(
            (avg - expected).abs() / expected < 0.005,
            "avg={avg} expected={expected}"
        );
    }

    #[test]
    fn dcd_locks_on_clean_alternating_signal() {
        let mut dpll = Dpll::new(
            Dpll::step_for(44100.0, 1200.0),
            0.74,
            0.5,
            NudgeKind::Multiplicative,
            DcdThresholds::AFSK_PSK,
        );
        let mut bit = false;
        let mut symbol_count = 0;
        let mut locked_at = None;
        'outer: for _ in 0..50 {
            for s in 0..37 {
                let target_bit = (s % 2) == 1;
                let _ = bit; // silence unused on first iterations
                bit = target_bit;
                if let Some(_ev) = dpll.step(if bit { 1.0 } else { -1.0 }, bit, 1.0) {
                    symbol_count += 1;
                    if dpll.data_detect() && locked_at.is_none() {
                        locked_at = Some(symbol_count);
                        break 'outer;
                    }
                }
            }
        }
        assert!(locked_at.is_some(), "DCD never locked");
        assert!(locked_at.unwrap() <= 256, "locked too late: {:?}", locked_at);
    }

    #[test]
    fn dcd_stays_unlocked_without_transitions() {
        let mut dpll = Dpll::new(
            Dpll::step_for(44100.0, 1200.0),
            0.74,
            0.5,
            NudgeKind::Multiplicative,
            DcdThresholds::AFSK_PSK,
        );
        for _ in 0..20000 {
            let _ = dpll.step(1.0, true, 1.0);
        }
        assert!(!dpll.data_detect());
    }
}
