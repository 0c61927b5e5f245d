//! QPSK / 8-PSK demodulator (component D).
//!
//! Both sub-profiles (self-correlation and local-oscillator) reduce to the
//! same shape: mix the input down to a baseband `(I, Q)` pair every sample,
//! derive a continuous scalar from it to drive a [`crate::dpll::Dpll`] for
//! symbol timing, and — whenever that DPLL reports a symbol boundary —
//! reread the current inter-symbol phase shift and classify it against the
//! Gray-coded constellation to emit `log2(N)` bits.
//!
//! The DPLL's own bit decision exists only to recover the symbol clock from
//! phase transitions; the payload bits always come from [`classify_symbol`],
//! not from the DPLL.

use std::f32::consts::PI;

use crate::config::{ModulationOrder, PskProfile, V26Variant};
use crate::convolve::FirFilter;
use crate::delay::DelayLine;
use crate::dpll::{DcdThresholds, Dpll, NudgeKind};
use crate::error::Result;
use crate::math::{round_up_odd, taps_for_symbol_span, wrap_angle, TAU};
use crate::oscillator::Nco;
use crate::window::{gen_bandpass, gen_lowpass, Window};

/// Gray code for each of the 4 QPSK constellation positions (§4.D, §4.G).
pub const PHASE_TO_GRAY_V26: [u8; 4] = [0, 1, 3, 2];
/// Gray code for each of the 8 8-PSK (V.27) constellation positions.
pub const PHASE_TO_GRAY_V27: [u8; 8] = [1, 0, 2, 3, 7, 6, 4, 5];

/// Invert a `phase -> gray` table into `gray -> phase`, used by the tone
/// generator (§4.G) and exercised here only to prove invertibility.
pub fn invert_gray(table: &[u8]) -> Vec<u8> {
    let mut inv = vec![0u8; table.len()];
    for (phase, &gray) in table.iter().enumerate() {
        inv[gray as usize] = phase as u8;
    }
    inv
}

fn gray_table(order: ModulationOrder) -> &'static [u8] {
    match order {
        ModulationOrder::Four => &PHASE_TO_GRAY_V26,
        ModulationOrder::Eight => &PHASE_TO_GRAY_V27,
    }
}

/// Constant phase offset realigning the self-correlation angle estimate
/// with the constellation (§4.D).
fn self_correlation_offset(order: ModulationOrder, v26: V26Variant) -> f32 {
    match order {
        ModulationOrder::Four => match v26 {
            V26Variant::A => -3.0 * PI / 4.0,
            V26Variant::B => PI / 2.0,
        },
        ModulationOrder::Eight => 3.0 * PI / 2.0,
    }
}

/// Constant phase offset for the local-oscillator variant. The spec gives
/// `-pi/4` for V.26B explicitly and leaves the rest as "etc."; the other
/// entries here are this crate's own extrapolation, recorded as a design
/// decision rather than a literal requirement.
fn local_oscillator_offset(order: ModulationOrder, v26: V26Variant) -> f32 {
    match order {
        ModulationOrder::Four => match v26 {
            V26Variant::A => 0.0,
            V26Variant::B => -PI / 4.0,
        },
        ModulationOrder::Eight => PI / 4.0,
    }
}

/// Classify an inter-symbol phase shift `phi` against an `order`-point
/// Gray-coded constellation, returning `(bit, quality)` for each of
/// `order.bits_per_symbol()` bit positions, least significant first (§4.D).
pub fn classify_symbol(phi: f32, order: ModulationOrder, gray: &[u8]) -> Vec<(bool, u8)> {
    let n = order.points() as i64;
    let s = phi * order.points() as f32 / TAU;
    let i = s.floor() as i64;
    let f = s - i as f32;
    let idx = i.rem_euclid(n) as usize;
    let idx_next = (i + 1).rem_euclid(n) as usize;

    (0..order.bits_per_symbol())
        .map(|b| {
            let g0 = ((gray[idx] >> b) & 1) as f32;
            let g1 = ((gray[idx_next] >> b) & 1) as f32;
            let soft = g0 * (1.0 - f) + g1 * f;
            let bit = soft >= 0.5;
            let quality = (100.0 * 2.0 * (soft - 0.5).abs()).round().clamp(0.0, 100.0) as u8;
            (bit, quality)
        })
        .collect()
}

/// Construction parameters for one [`PskDemod`] instance (§4.D).
#[derive(Debug, Clone)]
pub struct PskConfig {
    pub profile: PskProfile,
    pub order: ModulationOrder,
    pub v26_variant: V26Variant,
    pub sample_rate_hz: f64,
    pub baud: f64,
    /// Fixed at 1800 Hz per §4.D; kept configurable for testing.
    pub carrier_hz: f64,
    /// §7 oversized-filter policy; see [`crate::window`].
    pub clamp_oversized_filters: bool,
}

enum Frontend {
    SelfCorrelation {
        delay: DelayLine,
        coffs: usize,
        soffs: usize,
        lp_i: FirFilter,
        lp_q: FirFilter,
    },
    LocalOscillator {
        osc: Nco,
        lp_i: FirFilter,
        lp_q: FirFilter,
        angle_delay: DelayLine,
        boffs: usize,
    },
}

/// PSK demodulator state for one channel/subchannel (§4.D). Produces one
/// symbol's worth of bits at a time, gated by an internal DPLL.
pub struct PskDemod {
    prefilter: Option<FirFilter>,
    frontend: Frontend,
    order: ModulationOrder,
    offset: f32,
    dpll: Dpll,
    gray: &'static [u8],
}

impl PskDemod {
    pub fn new(cfg: &PskConfig) -> Result<Self> {
        let sps = cfg.sample_rate_hz / cfg.baud;

        let use_prefilter = matches!(
            cfg.profile,
            PskProfile::SelfCorrelationFiltered | PskProfile::LocalOscillatorFiltered
        );
        let prefilter = if use_prefilter {
            let half_width = 0.6 * cfg.baud;
            let n = taps_for_symbol_span(cfg.sample_rate_hz, cfg.baud, 8.0);
            let f1 = ((cfg.carrier_hz - half_width).max(1.0)) / cfg.sample_rate_hz;
            let f2 = ((cfg.carrier_hz + half_width) / cfg.sample_rate_hz).min(0.499);
            Some(FirFilter::new(gen_bandpass(
                f1,
                f2,
                n,
                Window::Hamming,
                cfg.clamp_oversized_filters,
            )?))
        } else {
            None
        };

        let lp_n = taps_for_symbol_span(cfg.sample_rate_hz, cfg.baud, 2.0);
        let lp_cutoff = (0.5 * cfg.baud / cfg.sample_rate_hz).min(0.499);
        let lp_kernel = gen_lowpass(lp_cutoff, lp_n, Window::Hamming, cfg.clamp_oversized_filters)?;

        let local_osc = matches!(
            cfg.profile,
            PskProfile::LocalOscillator | PskProfile::LocalOscillatorFiltered
        );

        let (frontend, offset) = if local_osc {
            let boffs = sps.round().max(1.0) as usize;
            (
                Frontend::LocalOscillator {
                    osc: Nco::new(cfg.carrier_hz, cfg.sample_rate_hz),
                    lp_i: FirFilter::new(lp_kernel.clone()),
                    lp_q: FirFilter::new(lp_kernel),
                    angle_delay: DelayLine::new(boffs + 1),
                    boffs,
                },
                local_oscillator_offset(cfg.order, cfg.v26_variant),
            )
        } else {
            let coffs = (11.0 / 12.0 * sps).round() as usize;
            let soffs = (13.0 / 12.0 * sps).round() as usize;
            let delay_len = round_up_odd(1.5 * sps).max(soffs + 2).max(coffs + 2);
            (
                Frontend::SelfCorrelation {
                    delay: DelayLine::new(delay_len),
                    coffs,
                    soffs,
                    lp_i: FirFilter::new(lp_kernel.clone()),
                    lp_q: FirFilter::new(lp_kernel),
                },
                self_correlation_offset(cfg.order, cfg.v26_variant),
            )
        };

        let step = Dpll::step_for(cfg.sample_rate_hz, cfg.baud);
        let dpll = Dpll::new(step, 0.74, 0.5, NudgeKind::Multiplicative, DcdThresholds::AFSK_PSK);

        Ok(Self {
            prefilter,
            frontend,
            order: cfg.order,
            offset,
            dpll,
            gray: gray_table(cfg.order),
        })
    }

    /// Process one normalized audio sample. Returns the symbol's bits (LSB
    /// first, with per-bit quality) when this sample completes a symbol,
    /// else `None`.
    pub fn process_sample(&mut self, sample: f32) -> Option<Vec<(bool, u8)>> {
        let input = match self.prefilter.as_mut() {
            Some(f) => f.process(sample),
            None => sample,
        };

        let (phi, demod_out) = match &mut self.frontend {
            Frontend::SelfCorrelation {
                delay,
                coffs,
                soffs,
                lp_i,
                lp_q,
            } => {
                delay.push(input);
                let c = input * delay.tap(*coffs);
                let s = input * delay.tap(*soffs);
                let i = lp_i.process(c);
                let q = lp_q.process(s);
                let phi = wrap_angle(i.atan2(q) + self.offset);
                (phi, q)
            }
            Frontend::LocalOscillator {
                osc,
                lp_i,
                lp_q,
                angle_delay,
                boffs,
            } => {
                let (c, s) = osc.tick();
                let i = lp_i.process(input * c);
                let q = lp_q.process(input * s);
                let a = i.atan2(q);
                angle_delay.push(a);
                let delayed = angle_delay.tap(*boffs);
                let delta = wrap_angle(a - delayed);
                let phi = wrap_angle(delta + self.offset);
                (phi, q)
            }
        };

        let bit = demod_out > 0.0;
        let envelope = demod_out.abs().max(1e-6);
        self.dpll.step(demod_out, bit, envelope).map(|_| classify_symbol(phi, self.order, self.gray))
    }

    pub fn data_detect(&self) -> bool {
        self.dpll.data_detect()
    }
}
