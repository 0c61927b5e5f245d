//! Convenience re-export of the crate's public surface.

pub use crate::afsk::{AfskConfig, AfskDemod};
pub use crate::baseband::{BasebandConfig, BasebandDemod, BasebandEvent};
pub use crate::config::{
    AfskProfile, DemodulatorConfig, ModemKind, ModulationOrder, Profile, PskProfile,
    V26Variant, ValidatedConfig,
};
pub use crate::dispatch::{Channel, ChannelConfig};
pub use crate::error::{ModemError, Result};
pub use crate::psk::{PskConfig, PskDemod};
pub use crate::sample::AudioSample;
pub use crate::sink::{BitEvent, BitSink, VecSink};
pub use crate::tone::{AfskTone, BasebandTone, PskTone};
