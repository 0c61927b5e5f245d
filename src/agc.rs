//! Automatic gain control envelope tracking, shared by the AFSK tone
//! amplitudes, the baseband slicer, and the long-term signal-level meter.
//!
//! Two independent trackers are provided, both following the same
//! peak/valley attack-decay shape the spec calls for in §3: a fast one used
//! to normalize the signal for slicing, and a slow one used only for
//! reporting (`alevel_mark_peak` etc.).

/// Peak/valley envelope follower with independent attack and decay rates.
/// After warmup, `valley <= in <= peak` for every subsequent sample (the
/// AGC invariant from §3): on every call the envelope is nudged toward the
/// current sample, fast in the direction that would otherwise violate the
/// bound and slow in the other direction.
#[derive(Debug, Clone)]
pub struct Agc {
    peak: f32,
    valley: f32,
    fast_attack: f32,
    slow_decay: f32,
}

impl Agc {
    /// `fast_attack` and `slow_decay` are per-sample IIR coefficients in
    /// `(0, 1]`; smaller is slower. Typical values track many symbols for
    /// decay and a few samples for attack.
    pub fn new(fast_attack: f32, slow_decay: f32) -> Self {
        Self {
            peak: 0.0,
            valley: 0.0,
            fast_attack,
            slow_decay,
        }
    }

    /// Feed one sample of a (non-negative) amplitude/envelope signal,
    /// updating peak and valley trackers.
    pub fn update(&mut self, amp: f32) {
        if amp > self.peak {
            self.peak += (amp - self.peak) * self.fast_attack;
        } else {
            self.peak += (amp - self.peak) * self.slow_decay;
        }
        if amp < self.valley {
            self.valley += (amp - self.valley) * self.fast_attack;
        } else {
            self.valley += (amp - self.valley) * self.slow_decay;
        }
    }

    /// Current peak estimate.
    pub fn peak(&self) -> f32 {
        self.peak
    }

    /// Current valley estimate.
    pub fn valley(&self) -> f32 {
        self.valley
    }

    /// Midpoint between peak and valley, i.e. the DC bias of the envelope.
    pub fn mid(&self) -> f32 {
        (self.peak + self.valley) * 0.5
    }

    /// Half the peak-to-valley span, i.e. the normalizing amplitude.
    pub fn amplitude(&self) -> f32 {
        (self.peak - self.valley) * 0.5
    }

    /// Normalize `amp` to roughly `[-0.5, 0.5]` given the tracked envelope.
    /// Returns `0.0` while the amplitude estimate is still negligible
    /// (startup, or silence) to avoid dividing by ~zero.
    pub fn normalize(&mut self, amp: f32) -> f32 {
        self.update(amp);
        let span = self.amplitude();
        if span < 1e-6 {
            0.0
        } else {
            (amp - self.mid()) / (span * 2.0)
        }
    }
}

/// Long-term peak/valley meter used purely for signal-level reporting
/// (`demod_get_audio_level`), with its own slower `quick_attack` /
/// `sluggish_decay` pair independent of the slicing AGC above.
#[derive(Debug, Clone)]
pub struct LevelMeter {
    agc: Agc,
}

impl LevelMeter {
    pub fn new(quick_attack: f32, sluggish_decay: f32) -> Self {
        Self {
            agc: Agc::new(quick_attack, sluggish_decay),
        }
    }

    pub fn update(&mut self, amp: f32) {
        self.agc.update(amp);
    }

    /// Reported level scaled to approximately `0..100`.
    pub fn level_0_100(&self) -> f32 {
        (self.agc.amplitude() * 200.0).clamp(0.0, 100.0)
    }

    pub fn peak(&self) -> f32 {
        self.agc.peak()
    }
}
