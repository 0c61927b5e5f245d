//! Tone generator (component G): the transmit-side inverse of §4.C-E.
//!
//! Each generator consumes one data bit at a time and returns the 16-bit
//! PCM samples needed to represent it (or, for multi-bit-per-symbol PSK,
//! returns samples only once a full symbol's worth of bits has
//! accumulated — the `WAIT_BIT0`/`WAIT_BIT1`[`/WAIT_BIT2`] state machine
//! from §4.G is exactly `pending_bits.len()`).

use std::f32::consts::PI;

use crate::config::{ModulationOrder, V26Variant};
use crate::lfsr::Lfsr17;
use crate::math::{phase_increment, TAU};
use crate::oscillator::sin_u32;
use crate::psk::{invert_gray, PHASE_TO_GRAY_V26, PHASE_TO_GRAY_V27};
use crate::sample::pack_le16;

/// Saturate to the transmit sample range, emitting `ClippingWarn` once per
/// offending sample (§7) rather than failing.
#[inline]
fn clamp_to_i16(v: f32) -> i16 {
    if !(-32767.0..=32767.0).contains(&v) {
        log::warn!("transmit sample {v} exceeds +-32767, saturating");
    }
    v.clamp(-32767.0, 32767.0) as i16
}

/// AFSK/EAS tone generator: a single phase accumulator, retuned to `mark` or
/// `space` increment each bit (§4.G).
#[derive(Debug, Clone)]
pub struct AfskTone {
    phase: u32,
    mark_inc: u32,
    space_inc: u32,
    samples_per_bit: usize,
}

impl AfskTone {
    pub fn new(mark_freq_hz: f64, space_freq_hz: f64, sample_rate_hz: f64, baud: f64) -> Self {
        Self {
            phase: 0,
            mark_inc: phase_increment(mark_freq_hz, sample_rate_hz),
            space_inc: phase_increment(space_freq_hz, sample_rate_hz),
            samples_per_bit: (sample_rate_hz / baud).round().max(1.0) as usize,
        }
    }

    /// Emit the audio samples for one bit.
    pub fn push_bit(&mut self, bit: bool) -> Vec<i16> {
        let inc = if bit { self.mark_inc } else { self.space_inc };
        (0..self.samples_per_bit)
            .map(|_| {
                self.phase = self.phase.wrapping_add(inc);
                clamp_to_i16(sin_u32(self.phase) * 32767.0)
            })
            .collect()
    }
}

fn gray_table(order: ModulationOrder) -> &'static [u8] {
    match order {
        ModulationOrder::Four => &PHASE_TO_GRAY_V26,
        ModulationOrder::Eight => &PHASE_TO_GRAY_V27,
    }
}

/// QPSK/8-PSK tone generator (§4.G): accumulates `bits_per_symbol` bits,
/// looks the resulting value up through the inverse Gray table, and adds
/// the corresponding phase delta (plus the V.26B 45-degree bias) to a
/// running constellation phase offset riding on the free-running carrier.
#[derive(Debug, Clone)]
pub struct PskTone {
    order: ModulationOrder,
    gray2phase: Vec<u8>,
    carrier_phase: u32,
    carrier_inc: u32,
    phase_offset: u32,
    bias_rad: f32,
    samples_per_symbol: usize,
    pending_bits: Vec<bool>,
}

impl PskTone {
    pub fn new(
        order: ModulationOrder,
        v26_variant: V26Variant,
        sample_rate_hz: f64,
        symbol_rate_hz: f64,
        carrier_hz: f64,
    ) -> Self {
        let gray2phase = invert_gray(gray_table(order));
        let bias_rad = match (order, v26_variant) {
            (ModulationOrder::Four, V26Variant::B) => PI / 4.0,
            _ => 0.0,
        };
        Self {
            order,
            gray2phase,
            carrier_phase: 0,
            carrier_inc: phase_increment(carrier_hz, sample_rate_hz),
            phase_offset: 0,
            bias_rad,
            samples_per_symbol: (sample_rate_hz / symbol_rate_hz).round().max(1.0) as usize,
            pending_bits: Vec::new(),
        }
    }

    /// Latch one bit. Returns `Some(samples)` once a full symbol's bits
    /// have accumulated (the dibit/tribit is complete), else `None`.
    pub fn push_bit(&mut self, bit: bool) -> Option<Vec<i16>> {
        self.pending_bits.push(bit);
        if self.pending_bits.len() < self.order.bits_per_symbol() as usize {
            return None;
        }

        let value = self
            .pending_bits
            .drain(..)
            .enumerate()
            .fold(0u8, |acc, (b, bit)| acc | ((bit as u8) << b));

        let phase_index = self.gray2phase[value as usize];
        let n = self.order.points() as f32;
        let delta_rad = (phase_index as f32 * TAU / n + self.bias_rad).rem_euclid(TAU);
        let delta_u32 = ((delta_rad as f64 / (TAU as f64) * 4294967296.0) as i64) as u32;
        self.phase_offset = self.phase_offset.wrapping_add(delta_u32);

        let samples = (0..self.samples_per_symbol)
            .map(|_| {
                self.carrier_phase = self.carrier_phase.wrapping_add(self.carrier_inc);
                let total = self.carrier_phase.wrapping_add(self.phase_offset);
                clamp_to_i16(sin_u32(total) * 32767.0)
            })
            .collect();
        Some(samples)
    }
}

/// 9600 baud baseband (optionally G3RUH-scrambled) tone generator (§4.G).
///
/// Rather than reproducing the reference's explicit
/// alternating-half-sine/hold waveform table plus a separate
/// upsample-then-lowpass-then-downsample stage, each symbol is rendered as
/// a raised-cosine ramp from the previous symbol's level to the new one:
/// a level repeat collapses to a flat hold (matching the "same bits" case)
/// and a level flip produces a smooth half-cycle transition (matching the
/// "alternating bits" case), with no discontinuity either way — a
/// simplification recorded in DESIGN.md.
#[derive(Debug, Clone)]
pub struct BasebandTone {
    lfsr: Option<Lfsr17>,
    samples_per_symbol: usize,
    level: f32,
}

impl BasebandTone {
    pub fn new(sample_rate_hz: f64, baud: f64, scramble: bool) -> Self {
        Self {
            lfsr: scramble.then(Lfsr17::new),
            samples_per_symbol: (sample_rate_hz / baud).round().max(1.0) as usize,
            level: -1.0,
        }
    }

    pub fn push_bit(&mut self, bit: bool) -> Vec<i16> {
        let encoded = match &mut self.lfsr {
            Some(lfsr) => lfsr.scramble_bit(bit),
            None => bit,
        };
        let target = if encoded { 1.0 } else { -1.0 };
        let start = self.level;
        let out = (1..=self.samples_per_symbol)
            .map(|i| {
                let t = i as f32 / self.samples_per_symbol as f32;
                let raised = 0.5 - 0.5 * (PI * t).cos();
                let level = start + (target - start) * raised;
                clamp_to_i16(level * 32767.0)
            })
            .collect();
        self.level = target;
        out
    }
}

/// Pack a batch of transmit samples to little-endian bytes for `audio_put`
/// (§6).
pub fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        out.extend_from_slice(&pack_le16(s));
    }
    out
}
