//! Demod dispatcher (component F): owns one channel's subchannel demod
//! instances, decimation accumulator, mute flag, and signal-level meters,
//! and fans each incoming audio sample out to the right algorithm (§4.F).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::afsk::{AfskConfig, AfskDemod};
use crate::agc::LevelMeter;
use crate::baseband::{BasebandConfig, BasebandDemod};
use crate::config::{ModemKind, ModulationOrder, Profile, ValidatedConfig};
use crate::error::{ModemError, Result};
use crate::psk::{PskConfig, PskDemod};
use crate::sample::AudioSample;
use crate::sink::BitEvent;

/// Fixed PSK carrier frequency (§4.D).
const PSK_CARRIER_HZ: f64 = 1800.0;

enum Subchannel {
    Afsk(AfskDemod),
    Psk(PskDemod),
    Baseband(BasebandDemod),
    Off,
}

fn num_slicers(sub: &Subchannel) -> usize {
    match sub {
        Subchannel::Afsk(d) => d.num_slicers(),
        Subchannel::Psk(_) => 1,
        Subchannel::Baseband(d) => d.num_slicers(),
        Subchannel::Off => 0,
    }
}

fn dcd_states(sub: &Subchannel) -> Vec<bool> {
    match sub {
        Subchannel::Afsk(d) => (0..d.num_slicers()).map(|k| d.data_detect(k)).collect(),
        Subchannel::Psk(d) => vec![d.data_detect()],
        Subchannel::Baseband(d) => (0..d.num_slicers()).map(|k| d.data_detect(k)).collect(),
        Subchannel::Off => Vec::new(),
    }
}

fn process_subchannel(sub: &mut Subchannel, chan: usize, subchan: usize, sample: f32) -> Vec<BitEvent> {
    match sub {
        Subchannel::Afsk(d) => d
            .process_sample(sample)
            .into_iter()
            .map(|(slice, ev)| BitEvent::Bit {
                chan,
                subchan,
                slice,
                bit: ev.bit,
                is_scrambled: false,
                quality: ev.quality,
            })
            .collect(),
        Subchannel::Psk(d) => d
            .process_sample(sample)
            .into_iter()
            .flat_map(|bits| bits.into_iter().enumerate())
            .map(|(slice, (bit, quality))| BitEvent::Bit {
                chan,
                subchan,
                slice,
                bit,
                is_scrambled: false,
                quality: Some(quality),
            })
            .collect(),
        Subchannel::Baseband(d) => d
            .process_sample(sample)
            .into_iter()
            .map(|ev| BitEvent::Bit {
                chan,
                subchan,
                slice: ev.slice,
                bit: ev.bit,
                is_scrambled: ev.is_scrambled,
                quality: ev.quality,
            })
            .collect(),
        Subchannel::Off => Vec::new(),
    }
}

fn build_subchannel(validated: &ValidatedConfig, freq_offset_hz: f64) -> Result<Subchannel> {
    let raw = &validated.raw;
    // The dispatcher averages `decimate` raw samples into one before handing
    // it to the subchannel demods (§4.F), so every oscillator/DPLL here must
    // be built against the decimated rate, not the raw input rate.
    let sample_rate_hz = raw.sample_rate_hz / raw.decimate.max(1) as f64;
    match raw.modem_kind {
        ModemKind::Off => Ok(Subchannel::Off),
        ModemKind::Afsk | ModemKind::Eas => {
            let profile = match raw.profile {
                Profile::Afsk(p) => p,
                _ => {
                    return Err(ModemError::ConfigInvalid(
                        "AFSK/EAS modem kind requires an AFSK profile letter".to_string(),
                    ))
                }
            };
            let cfg = AfskConfig {
                profile,
                sample_rate_hz,
                baud: raw.baud,
                mark_freq_hz: raw.mark_freq_hz + freq_offset_hz,
                space_freq_hz: raw.space_freq_hz + freq_offset_hz,
                num_slicers: raw.num_slicers,
                use_prefilter: true,
                clamp_oversized_filters: raw.clamp_oversized_filters,
            };
            Ok(Subchannel::Afsk(AfskDemod::new(&cfg)?))
        }
        ModemKind::Qpsk | ModemKind::Psk8 => {
            let profile = match raw.profile {
                Profile::Psk(p) => p,
                _ => {
                    return Err(ModemError::ConfigInvalid(
                        "QPSK/8PSK modem kind requires a PSK profile letter".to_string(),
                    ))
                }
            };
            let order = if raw.modem_kind == ModemKind::Qpsk {
                ModulationOrder::Four
            } else {
                ModulationOrder::Eight
            };
            let symbol_rate = raw.baud / order.bits_per_symbol() as f64;
            let cfg = PskConfig {
                profile,
                order,
                v26_variant: validated.v26_variant,
                sample_rate_hz,
                baud: symbol_rate,
                carrier_hz: PSK_CARRIER_HZ + freq_offset_hz,
                clamp_oversized_filters: raw.clamp_oversized_filters,
            };
            Ok(Subchannel::Psk(PskDemod::new(&cfg)?))
        }
        ModemKind::Baseband | ModemKind::Scramble | ModemKind::Ais => {
            let cfg = BasebandConfig {
                sample_rate_hz,
                baud: raw.baud,
                upsample: raw.upsample,
                descramble: raw.modem_kind == ModemKind::Scramble,
                num_slicers: raw.num_slicers,
                clamp_oversized_filters: raw.clamp_oversized_filters,
            };
            Ok(Subchannel::Baseband(BasebandDemod::new(&cfg)?))
        }
    }
}

/// Construction parameters for one [`Channel`] (§3, §4.F).
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub chan: usize,
    pub validated: ValidatedConfig,
    /// Hz spacing between staggered subchannels (`num_freq`/`offset` in
    /// §6); subchannel `k` of `n` is offset by
    /// `(k - (n-1)/2) * freq_step_hz` from the configured center.
    pub freq_step_hz: f64,
}

/// One radio channel's full receive-side state: subchannel demodulators,
/// decimation accumulator, mute flag, and signal-level meters (§4.F, §5).
pub struct Channel {
    chan: usize,
    subchannels: Vec<Subchannel>,
    prev_dcd: Vec<Vec<bool>>,
    mute: Arc<AtomicBool>,
    level_rec: LevelMeter,
    decimate: u32,
    decim_acc: f32,
    decim_count: u32,
}

impl Channel {
    pub fn new(cfg: ChannelConfig) -> Result<Self> {
        let num_subchan = cfg.validated.raw.num_subchan.max(1);
        let mut subchannels = Vec::with_capacity(num_subchan);
        for k in 0..num_subchan {
            let offset = (k as f64 - (num_subchan - 1) as f64 / 2.0) * cfg.freq_step_hz;
            subchannels.push(build_subchannel(&cfg.validated, offset)?);
        }
        let prev_dcd = subchannels.iter().map(|s| vec![false; num_slicers(s)]).collect();

        Ok(Self {
            chan: cfg.chan,
            subchannels,
            prev_dcd,
            mute: Arc::new(AtomicBool::new(false)),
            level_rec: LevelMeter::new(0.1, 0.001),
            decimate: cfg.validated.raw.decimate.max(1),
            decim_acc: 0.0,
            decim_count: 0,
        })
    }

    /// A cloneable handle for a half-duplex PTT thread to mute this
    /// channel's input without touching demodulator state directly (§5).
    pub fn mute_handle(&self) -> Arc<AtomicBool> {
        self.mute.clone()
    }

    /// `demod_mute_input` (§4.F): force input to zero while transmitting.
    /// Demodulators keep running, so DCD naturally drops.
    pub fn mute_input(&self, mute: bool) {
        self.mute.store(mute, Ordering::Relaxed);
    }

    /// Process one inbound audio sample, returning every bit/DCD event it
    /// produced (usually zero or one, occasionally more with multiple
    /// subchannels/slicers sharing a sample instant).
    pub fn process_sample(&mut self, raw: AudioSample) -> Vec<BitEvent> {
        let sample = if self.mute.load(Ordering::Relaxed) {
            0.0
        } else {
            raw.to_f32()
        };
        self.level_rec.update(sample.abs());

        let to_process = if self.decimate > 1 {
            self.decim_acc += sample;
            self.decim_count += 1;
            if self.decim_count < self.decimate {
                return Vec::new();
            }
            let avg = self.decim_acc / self.decimate as f32;
            self.decim_acc = 0.0;
            self.decim_count = 0;
            avg
        } else {
            sample
        };

        let mut events = Vec::new();
        for (subchan, sub) in self.subchannels.iter_mut().enumerate() {
            events.extend(process_subchannel(sub, self.chan, subchan, to_process));

            let dcd_now = dcd_states(sub);
            let prev = &mut self.prev_dcd[subchan];
            for (slice, &locked) in dcd_now.iter().enumerate() {
                if prev[slice] != locked {
                    prev[slice] = locked;
                    events.push(BitEvent::Dcd {
                        chan: self.chan,
                        subchan,
                        slice,
                        locked,
                    });
                }
            }
        }
        events
    }

    /// `demod_get_audio_level(chan, subchan)` (§4.F): `(rec, mark, space)`
    /// scaled to ~`0..100`. `mark`/`space` are `0.0` for non-AFSK
    /// subchannels, which have no such notion.
    pub fn audio_level(&self, subchan: usize) -> (f32, f32, f32) {
        let rec = self.level_rec.level_0_100();
        let (mark, space) = match self.subchannels.get(subchan) {
            Some(Subchannel::Afsk(d)) => d.levels(),
            _ => (0.0, 0.0),
        };
        (rec, mark, space)
    }
}
