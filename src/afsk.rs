//! AFSK demodulator (component C): two mandatory profiles sharing one
//! front-end shape — an optional bandpass prefilter, a per-tone mixer, a
//! shared lowpass, then one [`crate::dpll::Dpll`] per slicer.
//!
//! Profile A (coherent I/Q correlator) and profile B (FM discriminator) are
//! different ways of turning the mixed-down signal into a signed
//! `demod_out` per sample; everything from the hysteresis slicer onward is
//! identical between them, so [`AfskDemod::process_sample`] handles both
//! through one slicing loop.

use crate::agc::{Agc, LevelMeter};
use crate::config::AfskProfile;
use crate::convolve::FirFilter;
use crate::dpll::{DcdThresholds, Dpll, NudgeKind, SymbolEvent};
use crate::error::Result;
use crate::math::{taps_for_symbol_span, wrap_angle};
use crate::oscillator::Nco;
use crate::window::{gen_bandpass, gen_lowpass, Window};

/// Slicing hysteresis for the coherent single-slicer path (§4.C): a
/// `demod_out` inside `[-HYSTERESIS, HYSTERESIS]` keeps the previous bit
/// rather than re-deciding from a near-zero (noisy) value.
const HYSTERESIS: f32 = 0.05;

/// AGC attack/decay used to normalize mark/space amplitude for slicing.
const SLICER_AGC: (f32, f32) = (0.3, 0.01);
/// Attack/decay used for the long-term signal-level meters (§4.C, §6).
const LEVEL_METER: (f32, f32) = (0.1, 0.001);
/// DPLL inertia, shared with the PSK demodulator (§4.B).
const INERTIA_LOCKED: f32 = 0.74;
const INERTIA_SEARCHING: f32 = 0.5;

/// Construction parameters for one [`AfskDemod`] instance (one per
/// channel/subchannel). EAS uses this same struct with its fractional baud
/// and tone pair (§4.C).
#[derive(Debug, Clone)]
pub struct AfskConfig {
    pub profile: AfskProfile,
    pub sample_rate_hz: f64,
    pub baud: f64,
    pub mark_freq_hz: f64,
    pub space_freq_hz: f64,
    pub num_slicers: usize,
    pub use_prefilter: bool,
    /// §7 oversized-filter policy; see [`crate::window`].
    pub clamp_oversized_filters: bool,
}

enum Frontend {
    Coherent {
        m_osc: Nco,
        s_osc: Nco,
        mi: FirFilter,
        mq: FirFilter,
        si: FirFilter,
        sq: FirFilter,
        agc_mark: Agc,
        agc_space: Agc,
    },
    FmDiscriminator {
        osc: Nco,
        li: FirFilter,
        lq: FirFilter,
        prev_angle: f32,
        /// `sample_rate / (0.5 * |mark - space| * 2*pi)`, normalizing the
        /// unwrapped phase rate to roughly +-1 at mark/space.
        scale: f32,
    },
}

/// AFSK demodulator state for one channel/subchannel (§4.C).
pub struct AfskDemod {
    prefilter: Option<FirFilter>,
    frontend: Frontend,
    dplls: Vec<Dpll>,
    prev_bit: Vec<bool>,
    /// Per-slicer gain applied to the space amplitude (coherent multi-slicer
    /// path) or phase-rate offset (FM-discriminator multi-slicer path).
    /// Length 1 (value unused) when `num_slicers == 1`, since that path uses
    /// the normalizing single-slicer logic instead.
    slice_params: Vec<f32>,
    level_mark: LevelMeter,
    level_space: LevelMeter,
}

/// Geometric series from `first` to `last` across `n` points (§4.C
/// `space_gain`); degenerates to a single unit entry for `n <= 1`, since
/// that case takes the normalizing single-slicer path instead.
fn geometric_series(first: f32, last: f32, n: usize) -> Vec<f32> {
    if n <= 1 {
        return vec![1.0];
    }
    let ratio = (last / first).powf(1.0 / (n - 1) as f32);
    (0..n).map(|k| first * ratio.powi(k as i32)).collect()
}

/// Linear span from `-0.5` to `+0.5` across `n` points (§4.C FM-discriminator
/// multi-slicer offsets).
fn linear_span(n: usize) -> Vec<f32> {
    if n <= 1 {
        return vec![0.0];
    }
    (0..n).map(|k| -0.5 + k as f32 / (n - 1) as f32).collect()
}

impl AfskDemod {
    pub fn new(cfg: &AfskConfig) -> Result<Self> {
        let prefilter = if cfg.use_prefilter {
            let lo = cfg.mark_freq_hz.min(cfg.space_freq_hz) - 0.15 * cfg.baud;
            let hi = cfg.mark_freq_hz.max(cfg.space_freq_hz) + 0.15 * cfg.baud;
            let n = taps_for_symbol_span(cfg.sample_rate_hz, cfg.baud, 8.0);
            let f1 = lo.max(1.0) / cfg.sample_rate_hz;
            let f2 = (hi / cfg.sample_rate_hz).min(0.499);
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

        let lp_n = taps_for_symbol_span(cfg.sample_rate_hz, cfg.baud, 2.8);
        let lp_cutoff = (0.14 * cfg.baud / cfg.sample_rate_hz).min(0.499);
        let lp_kernel = gen_lowpass(lp_cutoff, lp_n, Window::Hamming, cfg.clamp_oversized_filters)?;

        let frontend = match cfg.profile {
            AfskProfile::Coherent => Frontend::Coherent {
                m_osc: Nco::new(cfg.mark_freq_hz, cfg.sample_rate_hz),
                s_osc: Nco::new(cfg.space_freq_hz, cfg.sample_rate_hz),
                mi: FirFilter::new(lp_kernel.clone()),
                mq: FirFilter::new(lp_kernel.clone()),
                si: FirFilter::new(lp_kernel.clone()),
                sq: FirFilter::new(lp_kernel.clone()),
                agc_mark: Agc::new(SLICER_AGC.0, SLICER_AGC.1),
                agc_space: Agc::new(SLICER_AGC.0, SLICER_AGC.1),
            },
            AfskProfile::FmDiscriminator => {
                let center = (cfg.mark_freq_hz + cfg.space_freq_hz) / 2.0;
                let half_shift = 0.5 * (cfg.mark_freq_hz - cfg.space_freq_hz).abs();
                let scale = (cfg.sample_rate_hz / (half_shift * std::f64::consts::TAU)) as f32;
                Frontend::FmDiscriminator {
                    osc: Nco::new(center, cfg.sample_rate_hz),
                    li: FirFilter::new(lp_kernel.clone()),
                    lq: FirFilter::new(lp_kernel),
                    prev_angle: 0.0,
                    scale,
                }
            }
        };

        let step = Dpll::step_for(cfg.sample_rate_hz, cfg.baud);
        let dplls = (0..cfg.num_slicers.max(1))
            .map(|_| {
                Dpll::new(
                    step,
                    INERTIA_LOCKED,
                    INERTIA_SEARCHING,
                    NudgeKind::Multiplicative,
                    DcdThresholds::AFSK_PSK,
                )
            })
            .collect();

        let slice_params = match cfg.profile {
            AfskProfile::Coherent => geometric_series(0.5, 4.0, cfg.num_slicers.max(1)),
            AfskProfile::FmDiscriminator => linear_span(cfg.num_slicers.max(1)),
        };

        Ok(Self {
            prefilter,
            frontend,
            dplls,
            prev_bit: vec![false; cfg.num_slicers.max(1)],
            slice_params,
            level_mark: LevelMeter::new(LEVEL_METER.0, LEVEL_METER.1),
            level_space: LevelMeter::new(LEVEL_METER.0, LEVEL_METER.1),
        })
    }

    /// Process one normalized (`[-1.0, 1.0]`) audio sample, returning the
    /// `(slice, event)` pairs for every slicer whose DPLL overflowed on this
    /// sample (usually zero or one).
    pub fn process_sample(&mut self, sample: f32) -> Vec<(usize, SymbolEvent)> {
        let input = match self.prefilter.as_mut() {
            Some(f) => f.process(sample),
            None => sample,
        };

        let single_slicer = self.dplls.len() == 1;
        let (demod_outs, envelope) = match &mut self.frontend {
            Frontend::Coherent {
                m_osc,
                s_osc,
                mi,
                mq,
                si,
                sq,
                agc_mark,
                agc_space,
            } => {
                let (mc, ms) = m_osc.tick();
                let (sc, ss) = s_osc.tick();
                let m_i = mi.process(input * mc);
                let m_q = mq.process(input * ms);
                let s_i = si.process(input * sc);
                let s_q = sq.process(input * ss);
                let m_amp = m_i.hypot(m_q);
                let s_amp = s_i.hypot(s_q);
                self.level_mark.update(m_amp);
                self.level_space.update(s_amp);
                let envelope = (m_amp + s_amp) * 0.5;

                let outs = if single_slicer {
                    let m_norm = agc_mark.normalize(m_amp);
                    let s_norm = agc_space.normalize(s_amp);
                    vec![m_norm - s_norm]
                } else {
                    self.slice_params
                        .iter()
                        .map(|&gain| m_amp - s_amp * gain)
                        .collect()
                };
                (outs, envelope)
            }
            Frontend::FmDiscriminator {
                osc,
                li,
                lq,
                prev_angle,
                scale,
            } => {
                let (c, s) = osc.tick();
                let i = li.process(input * c);
                let q = lq.process(input * s);
                let angle = q.atan2(i);
                let rate = wrap_angle(angle - *prev_angle);
                *prev_angle = angle;
                let norm = rate * *scale;
                let envelope = i.hypot(q);
                self.level_mark.update(envelope);
                self.level_space.update(envelope);

                let outs = if single_slicer {
                    vec![norm]
                } else {
                    self.slice_params.iter().map(|&off| norm - off).collect()
                };
                (outs, envelope)
            }
        };

        let mut events = Vec::new();
        for (k, &demod_out) in demod_outs.iter().enumerate() {
            let mut bit = demod_out > 0.0;
            if demod_out.abs() < HYSTERESIS {
                bit = self.prev_bit[k];
            }
            self.prev_bit[k] = bit;
            if let Some(ev) = self.dplls[k].step(demod_out, bit, envelope) {
                events.push((k, ev));
            }
        }
        events
    }

    pub fn data_detect(&self, slice: usize) -> bool {
        self.dplls[slice].data_detect()
    }

    pub fn num_slicers(&self) -> usize {
        self.dplls.len()
    }

    /// `(mark_level, space_level)`, each scaled to ~`0..100` (§6).
    pub fn levels(&self) -> (f32, f32) {
        (self.level_mark.level_0_100(), self.level_space.level_0_100())
    }
}
