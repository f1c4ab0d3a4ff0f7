//! Pick the splash image for the build environment and regenerate only when stale.

use anyhow::{Context, Result};
use std::io::Read;
use std::path::{Path, PathBuf};

use super::{convert_image, DisplayTag};
use crate::config::{ConfigSource, Settings, KEY_BUILD_FLAGS};

/// Bytes of an existing header inspected for its provenance comment.
const PROVENANCE_WINDOW: u64 = 500;

/// Result of comparing an existing header against its source image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    UpToDate,
    Stale(String),
}

impl Freshness {
    pub fn is_up_to_date(&self) -> bool {
        matches!(self, Freshness::UpToDate)
    }
}

/// Detect which display the current build targets.
///
/// The environment name wins, then the build flags; ST7735 is the fallback.
pub fn detect_display(config: &dyn ConfigSource) -> DisplayTag {
    let env_name = config.env_name().to_lowercase();
    if env_name.contains("st7789") {
        return DisplayTag::St7789;
    }
    if env_name.contains("st7735") {
        return DisplayTag::St7735;
    }

    if let Some(flags) = config.value(KEY_BUILD_FLAGS) {
        if flags.contains("DISPLAY_TYPE_ST7789") {
            return DisplayTag::St7789;
        }
        if flags.contains("DISPLAY_TYPE_ST7735") {
            return DisplayTag::St7735;
        }
    }

    tracing::warn!("Could not detect display type, defaulting to ST7735");
    DisplayTag::St7735
}

/// Check whether `header` was generated from `image` for `tag` and is
/// not older than the image.
pub fn check_up_to_date(header: &Path, image: &Path, tag: DisplayTag) -> Freshness {
    if !header.exists() {
        return Freshness::Stale("Output file doesn't exist".to_string());
    }

    match read_provenance(header, image, tag) {
        Ok(freshness) => freshness,
        Err(e) => Freshness::Stale(format!("Error checking file: {:#}", e)),
    }
}

fn read_provenance(header: &Path, image: &Path, tag: DisplayTag) -> Result<Freshness> {
    let mut head = Vec::new();
    std::fs::File::open(header)?
        .take(PROVENANCE_WINDOW)
        .read_to_end(&mut head)?;
    let head = String::from_utf8_lossy(&head);

    let image_name = image
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    if !head.contains(&format!("Generated from {}", image_name)) {
        return Ok(Freshness::Stale(format!(
            "Generated from different source (not {})",
            image_name
        )));
    }

    if !head.contains(&format!("Target display: {}", tag)) {
        return Ok(Freshness::Stale(format!(
            "Generated for different display type (not {})",
            tag
        )));
    }

    let image_mtime = std::fs::metadata(image)?.modified()?;
    let header_mtime = std::fs::metadata(header)?.modified()?;
    if image_mtime > header_mtime {
        return Ok(Freshness::Stale("PNG file is newer than header file".to_string()));
    }

    Ok(Freshness::UpToDate)
}

/// Regenerate the splash header for the configured environment.
///
/// Returns the header path, or `None` when the existing header was current.
pub fn update_for_environment(
    config: &dyn ConfigSource,
    settings: &Settings,
    force: bool,
) -> Result<Option<PathBuf>> {
    let tag = detect_display(config);
    tracing::info!("Detected display type: {}", tag);

    let image = settings.resolve(settings.splash.image_for(tag));
    let output = settings.resolve(&settings.splash.output);

    if !image.exists() {
        anyhow::bail!("PNG file not found: {}", image.display());
    }

    if !force {
        match check_up_to_date(&output, &image, tag) {
            Freshness::UpToDate => {
                tracing::info!("Splash screen already up to date for {}", tag);
                return Ok(None);
            }
            Freshness::Stale(reason) => {
                tracing::info!("Regenerating splash screen: {}", reason);
            }
        }
    }

    convert_image(&image, &output, Some(tag))
        .with_context(|| format!("Failed to generate splash screen for {}", tag))?;

    Ok(Some(output))
}
