//! Runtime-length FIR convolution over a circular input history.
//!
//! Every demodulator filter in this crate (mark/space correlators, lowpass
//! envelope filters, RRC pulse shaping, the 9600 polyphase banks) is an
//! instance of this one small engine: a fixed-capacity history buffer and a
//! tap vector, convolved left-to-right so that sum order — and therefore
//! the output bit stream — is identical across platforms (§9 design
//! notes: "floating-point determinism").

/// A single FIR filter with its own circular input history.
#[derive(Debug, Clone)]
pub struct FirFilter {
    taps: Vec<f32>,
    history: Vec<f32>,
    /// Index of the oldest sample in `history`.
    pos: usize,
}

impl FirFilter {
    pub fn new(taps: Vec<f32>) -> Self {
        let n = taps.len();
        Self {
            taps,
            history: vec![0.0; n],
            pos: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.taps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taps.is_empty()
    }

    pub fn reset(&mut self) {
        self.history.iter_mut().for_each(|v| *v = 0.0);
        self.pos = 0;
    }

    /// Push one new sample and return the convolution output. Taps are
    /// applied oldest-to-newest, left to right, matching the order the
    /// kernel generators in [`crate::window`] produce their taps.
    #[inline]
    pub fn process(&mut self, sample: f32) -> f32 {
        let n = self.taps.len();
        self.history[self.pos] = sample;
        let mut acc = 0.0_f32;
        // history[pos] holds the newest sample; walking backward from pos
        // (oldest first, wrapping) visits samples in the same oldest-first
        // order the symmetric kernel taps were generated in.
        let mut idx = (self.pos + 1) % n;
        for &w in self.taps.iter() {
            acc += w * self.history[idx];
            idx = (idx + 1) % n;
        }
        self.pos = (self.pos + 1) % n;
        acc
    }
}

/// A bank of polyphase sub-filters sharing one input history, used by the
/// 9600-baud upsampler (§4.E): one input sample produces `phases` outputs,
/// one per sub-kernel, without ever multiplying by a zero-stuffed sample.
#[derive(Debug, Clone)]
pub struct PolyphaseBank {
    banks: Vec<FirFilter>,
}

impl PolyphaseBank {
    pub fn new(sub_kernels: Vec<Vec<f32>>) -> Self {
        Self {
            banks: sub_kernels.into_iter().map(FirFilter::new).collect(),
        }
    }

    pub fn phases(&self) -> usize {
        self.banks.len()
    }

    /// Push one input sample through every phase, in order, producing
    /// `phases()` upsampled output samples.
    pub fn process(&mut self, sample: f32, out: &mut Vec<f32>) {
        out.clear();
        for bank in self.banks.iter_mut() {
            out.push(bank.process(sample));
        }
    }

    pub fn reset(&mut self) {
        for b in self.banks.iter_mut() {
            b.reset();
        }
    }
}
