//! 9600 baud G3RUH baseband demodulator (component E).
//!
//! Audio is upsampled through a polyphase lowpass so the symbol-timing DPLL
//! has enough samples per symbol to interpolate zero crossings accurately,
//! then each upsampled sample is AGC-normalized, signed-sliced, and fed to a
//! [`crate::dpll::Dpll`] running the zero-crossing nudge variant. Emitted
//! bits are optionally run through the G3RUH descrambler before being
//! handed off.

use crate::agc::Agc;
use crate::convolve::PolyphaseBank;
use crate::dpll::{DcdThresholds, Dpll, NudgeKind};
use crate::error::Result;
use crate::lfsr::Lfsr17;
use crate::math::taps_for_symbol_span;
use crate::window::{gen_lowpass, polyphase_split, Window};

/// Target minimum samples-per-symbol after upsampling, used to auto-select
/// the upsample factor when the caller leaves it at 0 (§4.E).
const MIN_SAMPLES_PER_SYMBOL_UPSAMPLED: f64 = 5.0;

/// Polyphase kernel cutoff relative to `baud`, at the upsampled rate.
const LPF_BAUD: f64 = 1.0;

/// Construction parameters for one [`BasebandDemod`] instance.
#[derive(Debug, Clone)]
pub struct BasebandConfig {
    pub sample_rate_hz: f64,
    pub baud: f64,
    /// `2..=4`, or `0` to auto-select from `sample_rate_hz`/`baud` (§4.E).
    pub upsample: u32,
    /// Whether the bit stream should be run through the G3RUH descrambler
    /// (`modem_kind == Scramble`); left off for raw baseband and AIS.
    pub descramble: bool,
    pub num_slicers: usize,
    /// §7 oversized-filter policy; see [`crate::window`].
    pub clamp_oversized_filters: bool,
}

/// One descrambled (or raw) bit emitted by a [`BasebandDemod`] slicer.
#[derive(Debug, Clone, Copy)]
pub struct BasebandEvent {
    pub slice: usize,
    pub bit: bool,
    pub is_scrambled: bool,
    pub quality: Option<u8>,
}

fn auto_upsample(sample_rate_hz: f64, baud: f64) -> u32 {
    for factor in [2_u32, 3, 4] {
        if sample_rate_hz * factor as f64 / baud >= MIN_SAMPLES_PER_SYMBOL_UPSAMPLED {
            return factor;
        }
    }
    4
}

/// Offsets of `0.02 * (k - (n-1)/2)` around zero for the `n` multi-slicers
/// (§4.E).
fn slice_offsets(n: usize) -> Vec<f32> {
    if n <= 1 {
        return vec![0.0];
    }
    let mid = (n - 1) as f32 / 2.0;
    (0..n).map(|k| 0.02 * (k as f32 - mid)).collect()
}

/// G3RUH baseband demodulator state for one channel/subchannel (§4.E).
pub struct BasebandDemod {
    poly: PolyphaseBank,
    agc: Agc,
    dplls: Vec<Dpll>,
    offsets: Vec<f32>,
    descramblers: Vec<Option<Lfsr17>>,
    is_scrambled: bool,
    upsample_buf: Vec<f32>,
}

impl BasebandDemod {
    pub fn new(cfg: &BasebandConfig) -> Result<Self> {
        let upsample = if cfg.upsample == 0 {
            auto_upsample(cfg.sample_rate_hz, cfg.baud)
        } else {
            cfg.upsample.clamp(2, 4)
        };
        let upsampled_rate = cfg.sample_rate_hz * upsample as f64;
        let cutoff = (cfg.baud * LPF_BAUD / upsampled_rate).min(0.499);
        let n = taps_for_symbol_span(upsampled_rate, cfg.baud, 1.0);
        let kernel = gen_lowpass(cutoff, n, Window::Hamming, cfg.clamp_oversized_filters)?;
        let banks = polyphase_split(&kernel, upsample as usize);
        let poly = PolyphaseBank::new(banks);

        let step = Dpll::step_for(upsampled_rate, cfg.baud);
        let num_slicers = cfg.num_slicers.max(1);
        let dplls = (0..num_slicers)
            .map(|_| Dpll::new(step, 0.74, 0.5, NudgeKind::ZeroCrossing, DcdThresholds::BASEBAND))
            .collect();
        let descramblers = (0..num_slicers)
            .map(|_| if cfg.descramble { Some(Lfsr17::new()) } else { None })
            .collect();

        Ok(Self {
            poly,
            agc: Agc::new(0.2, 0.001),
            dplls,
            offsets: slice_offsets(num_slicers),
            descramblers,
            is_scrambled: cfg.descramble,
            upsample_buf: Vec::with_capacity(4),
        })
    }

    /// Process one normalized audio sample, returning the bit events
    /// produced across all of its upsampled sub-samples and slicers.
    pub fn process_sample(&mut self, sample: f32) -> Vec<BasebandEvent> {
        self.poly.process(sample, &mut self.upsample_buf);
        let mut events = Vec::new();
        for i in 0..self.upsample_buf.len() {
            let u = self.upsample_buf[i];
            self.agc.update(u.abs());
            let scale = self.agc.amplitude().max(1e-6);
            let norm = (u / scale).clamp(-1.0, 1.0);

            for (k, &offset) in self.offsets.iter().enumerate() {
                let demod_out = norm + offset;
                let bit = demod_out > 0.0;
                if let Some(ev) = self.dplls[k].step(demod_out, bit, 1.0) {
                    let bit = match &mut self.descramblers[k] {
                        Some(lfsr) => lfsr.descramble_bit(ev.bit),
                        None => ev.bit,
                    };
                    events.push(BasebandEvent {
                        slice: k,
                        bit,
                        is_scrambled: self.is_scrambled,
                        quality: ev.quality,
                    });
                }
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
}
