//! The outbound interface to the HDLC/framing collaborator (§6, §9).
//!
//! The reference implementation hardcodes a callback into HDLC. This crate
//! exposes both styles the spec allows: a [`BitSink`] trait object for
//! callback-style consumers, and [`BitEvent`] records that the dispatcher
//! collects per sample so a caller preferring a pull-based iterator can
//! drain them instead.

/// One emitted demodulated bit, or a DCD state change, tagged with the
/// (channel, subchannel, slicer) triple that produced it (§3 invariant:
/// each unique triple is an independent bit stream).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitEvent {
    Bit {
        chan: usize,
        subchan: usize,
        slice: usize,
        bit: bool,
        is_scrambled: bool,
        /// `0..=100`, or `None` when not available (§6: `-1` in the
        /// reference's C-flavored API).
        quality: Option<u8>,
    },
    Dcd {
        chan: usize,
        subchan: usize,
        slice: usize,
        locked: bool,
    },
}

/// Callback-style sink, mirroring `hdlc_rec_bit` / `dcd_change` from §6.
/// `dcd` defaults to a no-op so a minimal sink only needs `bit`.
pub trait BitSink {
    fn bit(&mut self, chan: usize, subchan: usize, slice: usize, bit: bool, is_scrambled: bool, quality: Option<u8>);

    fn dcd(&mut self, _chan: usize, _subchan: usize, _slice: usize, _locked: bool) {}
}

/// Dispatch a batch of [`BitEvent`]s (as produced by one sample's worth of
/// processing) to a [`BitSink`], in emission order.
pub fn dispatch_events(sink: &mut dyn BitSink, events: &[BitEvent]) {
    for ev in events {
        match *ev {
            BitEvent::Bit {
                chan,
                subchan,
                slice,
                bit,
                is_scrambled,
                quality,
            } => sink.bit(chan, subchan, slice, bit, is_scrambled, quality),
            BitEvent::Dcd {
                chan,
                subchan,
                slice,
                locked,
            } => sink.dcd(chan, subchan, slice, locked),
        }
    }
}

/// A [`BitSink`] that simply records every event, for tests and for callers
/// who prefer to drain a `Vec` (the pull-based style) rather than implement
/// the trait.
#[derive(Debug, Clone, Default)]
pub struct VecSink {
    pub events: Vec<BitEvent>,
}

impl BitSink for VecSink {
    fn bit(&mut self, chan: usize, subchan: usize, slice: usize, bit: bool, is_scrambled: bool, quality: Option<u8>) {
        self.events.push(BitEvent::Bit {
            chan,
            subchan,
            slice,
            bit,
            is_scrambled,
            quality,
        });
    }

    fn dcd(&mut self, chan: usize, subchan: usize, slice: usize, locked: bool) {
        self.events.push(BitEvent::Dcd {
            chan,
            subchan,
            slice,
            locked,
        });
    }
}

impl VecSink {
    /// Just the data bits, in emission order, dropping DCD events — the
    /// common case for tests comparing recovered data against a source
    /// bit stream.
    pub fn bits(&self) -> Vec<bool> {
        self.events
            .iter()
            .filter_map(|ev| match *ev {
                BitEvent::Bit { bit, .. } => Some(bit),
                BitEvent::Dcd { .. } => None,
            })
            .collect()
    }
}
