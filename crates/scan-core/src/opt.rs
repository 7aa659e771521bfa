//! Canonical option names and values.
//!
//! After normalization, every source exposes its settings under these
//! names, whatever the underlying driver calls them.

pub const SOURCE: &str = "source";
pub const FEEDER_ENABLED: &str = "feeder_enabled";
pub const RESOLUTION: &str = "resolution";
pub const MODE: &str = "mode";
pub const TL_X: &str = "tl-x";
pub const TL_Y: &str = "tl-y";
pub const BR_X: &str = "br-x";
pub const BR_Y: &str = "br-y";
pub const PREVIEW: &str = "preview";
pub const LAMP_SWITCH: &str = "lamp-switch";

pub const MODE_COLOR: &str = "Color";
pub const MODE_GRAYSCALE: &str = "Gray";
pub const MODE_BW: &str = "LineArt";

pub const SOURCE_FLATBED: &str = "flatbed";
pub const SOURCE_ADF: &str = "feeder";
