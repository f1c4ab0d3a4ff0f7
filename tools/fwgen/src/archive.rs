//! Copy production firmware into the distribution folder.
//!
//! Debug builds stay in the build directory. Production builds are copied to
//! `firmware/<platform>_<display>_production.bin` for OTA updates.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::{ConfigSource, Settings};

/// Environments archived are those whose name contains this marker
const PRODUCTION_MARKER: &str = "production";

/// Platform name used in the archive file name
pub fn platform_of(env_name: &str) -> &'static str {
    if env_name.contains("esp32dev") {
        "esp32"
    } else if env_name.contains("esp32s3") {
        "esp32s3"
    } else {
        "unknown"
    }
}

/// Display name used in the archive file name
pub fn display_of(env_name: &str) -> &'static str {
    if env_name.contains("st7735") {
        "ST7735"
    } else if env_name.contains("st7789") {
        "ST7789"
    } else {
        "unknown"
    }
}

/// Archive file name for an environment, `None` for non-production builds.
pub fn firmware_name(env_name: &str) -> Option<String> {
    if !env_name.contains(PRODUCTION_MARKER) {
        return None;
    }
    Some(format!(
        "{}_{}_{}.bin",
        platform_of(env_name),
        display_of(env_name),
        PRODUCTION_MARKER
    ))
}

/// Copy `firmware` into the archive folder when the environment is a
/// production build. Returns the destination path.
pub fn archive_firmware(
    config: &dyn ConfigSource,
    settings: &Settings,
    firmware: &Path,
) -> Result<Option<PathBuf>> {
    let env_name = config.env_name();
    let Some(name) = firmware_name(&env_name) else {
        tracing::info!(
            "Debug build detected ({}), skipping firmware archival",
            env_name
        );
        return Ok(None);
    };

    let dir = settings.resolve(&settings.firmware.dir);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    let dest = dir.join(&name);
    std::fs::copy(firmware, &dest).with_context(|| {
        format!(
            "Failed to copy {} to {}",
            firmware.display(),
            dest.display()
        )
    })?;

    tracing::info!("Firmware copied to: {}", dest.display());
    Ok(Some(dest))
}
