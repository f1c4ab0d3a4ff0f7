//! fwgen library
//!
//! Build-step generators for the dual display billboard firmware. Each module is
//! a one-shot transformation run before or after the firmware is compiled:
//!
//! - [`splash`] converts a PNG into an RGB565 splash screen header
//! - [`bundle`] packs the static web portal into `webcontent.h`
//! - [`build_info`] computes the build date, daily build number and version defines
//! - [`archive`] copies production firmware into the distribution folder
//! - [`hooks`] wires the above into pre/post build phases

pub mod archive;
pub mod build_info;
pub mod bundle;
pub mod config;
pub mod hooks;
pub mod splash;

pub use bundle::{bundle_dir, Asset, AssetIndex, BundleError, Policy};
pub use config::{ConfigSource, EnvSource, MapSource, Settings};
pub use hooks::{HookContext, HookScheduler, Phase};
pub use splash::{convert_image, rgb565, DisplayTag};
