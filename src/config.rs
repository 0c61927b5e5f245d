//! Typed configuration surface (§6) and validation (§3.1, §7).
//!
//! Textual profile letters and `"A+"`-style flags from the historical
//! reference are parsed once, here, into an enum + bitflag shape (§9
//! design notes) so the hot path never touches a string.

use crate::error::{ModemError, Result};

/// Top-level modulation selection (`modem_type` in §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModemKind {
    Off,
    Afsk,
    Eas,
    Qpsk,
    Psk8,
    Baseband,
    Scramble,
    Ais,
}

/// AFSK demodulator profile (§4.C). `Coherent` is the I/Q correlator
/// (historical letters A/C/E); `FmDiscriminator` is the rate-of-phase-change
/// profile (historical letters B/D/F).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfskProfile {
    Coherent,
    FmDiscriminator,
}

/// PSK demodulator profile (§4.D).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PskProfile {
    SelfCorrelation,
    SelfCorrelationFiltered,
    LocalOscillator,
    LocalOscillatorFiltered,
}

/// PSK constellation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModulationOrder {
    Four,
    Eight,
}

impl ModulationOrder {
    pub fn bits_per_symbol(self) -> u32 {
        match self {
            ModulationOrder::Four => 2,
            ModulationOrder::Eight => 3,
        }
    }

    pub fn points(self) -> u32 {
        match self {
            ModulationOrder::Four => 4,
            ModulationOrder::Eight => 8,
        }
    }
}

/// V.26 alternative selection for QPSK (§4.D).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum V26Variant {
    A,
    B,
}

/// A parsed demodulator profile: which algorithm, plus whether '+' was
/// appended requesting multi-slicer fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Afsk(AfskProfile),
    Psk(PskProfile),
}

/// Historical profile letters (§4.C, §4.D, §6), parsed once at config time.
pub fn parse_profile_letter(letter: char) -> Result<Profile> {
    match letter {
        'A' | 'C' | 'E' => Ok(Profile::Afsk(AfskProfile::Coherent)),
        'B' | 'D' | 'F' => Ok(Profile::Afsk(AfskProfile::FmDiscriminator)),
        'P' | 'T' => Ok(Profile::Psk(PskProfile::SelfCorrelation)),
        'Q' | 'U' => Ok(Profile::Psk(PskProfile::SelfCorrelationFiltered)),
        'R' | 'V' => Ok(Profile::Psk(PskProfile::LocalOscillator)),
        'S' | 'W' => Ok(Profile::Psk(PskProfile::LocalOscillatorFiltered)),
        other => Err(ModemError::ConfigInvalid(format!(
            "unknown profile letter '{other}'"
        ))),
    }
}

/// Forwarded-but-not-interpreted HDLC options (§3, §7): `fix_bits` and
/// `passall` are opaque to this crate and simply carried through
/// validation, which forces them off for EAS/AIS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FixBits(pub u8);

pub const MAX_SLICERS: usize = 9;
pub const MAX_SUBCHAN: usize = 9;

/// One radio channel's demodulator configuration (§3), as supplied by the
/// caller before validation.
#[derive(Debug, Clone)]
pub struct DemodulatorConfig {
    pub modem_kind: ModemKind,
    pub sample_rate_hz: f64,
    pub baud: f64,
    pub mark_freq_hz: f64,
    pub space_freq_hz: f64,
    pub profile: Profile,
    pub v26_variant: Option<V26Variant>,
    pub num_subchan: usize,
    pub num_slicers: usize,
    pub multi_slicer: bool,
    pub decimate: u32,
    pub upsample: u32,
    pub fix_bits: FixBits,
    pub passall: bool,
    /// If true, an oversized filter is clamped to `MAX_FILTER_TAPS - 1`
    /// (rounded odd) with a warning instead of being a hard error (§7).
    pub clamp_oversized_filters: bool,
}

impl Default for DemodulatorConfig {
    fn default() -> Self {
        Self {
            modem_kind: ModemKind::Afsk,
            sample_rate_hz: 44100.0,
            baud: 1200.0,
            mark_freq_hz: 1200.0,
            space_freq_hz: 2200.0,
            profile: Profile::Afsk(AfskProfile::Coherent),
            v26_variant: None,
            num_subchan: 1,
            num_slicers: 1,
            multi_slicer: false,
            decimate: 1,
            upsample: 0,
            fix_bits: FixBits::default(),
            passall: false,
            clamp_oversized_filters: false,
        }
    }
}

/// A validated, immutable configuration ready to build per-channel state
/// from (§3.1). Produced only by [`DemodulatorConfig::validate`].
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub raw: DemodulatorConfig,
    pub v26_variant: V26Variant,
}

impl DemodulatorConfig {
    /// Validate once, at channel-open time (§3.1, §7). Resolves
    /// `v26_variant` (defaulting to B with a log notice if unset on a QPSK
    /// config) and forces `fix_bits`/`passall` off for EAS/AIS.
    pub fn validate(mut self) -> Result<ValidatedConfig> {
        if self.sample_rate_hz < 8000.0 || self.sample_rate_hz > 192_000.0 {
            return Err(ModemError::ConfigInvalid(format!(
                "sample_rate_hz {} out of range 8000..=192000",
                self.sample_rate_hz
            )));
        }
        if self.baud < 100.0 || self.baud > 40_000.0 {
            return Err(ModemError::ConfigInvalid(format!(
                "baud {} out of range 100..=40000",
                self.baud
            )));
        }
        if self.sample_rate_hz < 2.0 * self.baud {
            return Err(ModemError::ConfigInvalid(format!(
                "sample_rate_hz {} must be at least 2x baud {}",
                self.sample_rate_hz, self.baud
            )));
        }
        if self.num_slicers == 0 || self.num_slicers > MAX_SLICERS {
            return Err(ModemError::ConfigInvalid(format!(
                "num_slicers {} out of range 1..={MAX_SLICERS}",
                self.num_slicers
            )));
        }
        if self.num_subchan == 0 || self.num_subchan > MAX_SUBCHAN {
            return Err(ModemError::ConfigInvalid(format!(
                "num_subchan {} out of range 1..={MAX_SUBCHAN}",
                self.num_subchan
            )));
        }
        if self.num_subchan > 1 && self.num_slicers > 1 && !self.multi_slicer {
            return Err(ModemError::ConfigInvalid(
                "multiple subchannels combined with multiple slicers requires the '+' flag"
                    .to_string(),
            ));
        }
        if !(1..=4).contains(&self.decimate) {
            return Err(ModemError::ConfigInvalid(format!(
                "decimate {} out of range 1..=4",
                self.decimate
            )));
        }
        if self.upsample > 4 {
            return Err(ModemError::ConfigInvalid(format!(
                "upsample {} out of range 0..=4",
                self.upsample
            )));
        }

        let v26_variant = match (self.modem_kind, self.v26_variant) {
            (ModemKind::Qpsk, None) => {
                log::info!("V.26 variant unspecified, defaulting to V26_B");
                V26Variant::B
            }
            (_, Some(v)) => v,
            (_, None) => V26Variant::B,
        };

        if matches!(self.modem_kind, ModemKind::Eas | ModemKind::Ais) {
            if self.fix_bits.0 != 0 {
                log::warn!("fix_bits is not permitted with EAS/AIS, forcing off");
                self.fix_bits = FixBits::default();
            }
            if self.passall {
                log::warn!("passall is not permitted with EAS/AIS, forcing off");
                self.passall = false;
            }
        }

        Ok(ValidatedConfig {
            raw: self,
            v26_variant,
        })
    }
}
