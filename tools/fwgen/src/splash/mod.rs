//! Splash screen conversion: PNG/JPEG to RGB565 C header.
//!
//! The firmware draws the boot splash straight from flash, so the image is
//! baked into `splash_screen.h` as a `uint16_t` array in the panel's native
//! RGB565 format.

mod header;
mod select;

pub use header::{render_header, SplashHeader, BITMAP_SYMBOL, VALUES_PER_LINE};
pub use select::{check_up_to_date, detect_display, update_for_environment, Freshness};

use anyhow::{Context, Result};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Pack an RGB888 pixel into RGB565 (`RRRRRGGG GGGBBBBB`).
///
/// Plain truncation of the low bits, no rounding.
pub fn rgb565(r: u8, g: u8, b: u8) -> u16 {
    let r5 = (r >> 3) as u16;
    let g6 = (g >> 2) as u16;
    let b5 = (b >> 3) as u16;
    (r5 << 11) | (g6 << 5) | b5
}

/// Target display profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisplayTag {
    /// 80x160 ST7735 (either orientation)
    St7735,
    /// 240x240 ST7789
    St7789,
    /// ST7735 mounted landscape (160x80)
    St7735Rotated,
    /// Any other size, no dimension validation
    Custom,
}

impl DisplayTag {
    pub const ALL: [DisplayTag; 4] = [
        DisplayTag::St7735,
        DisplayTag::St7789,
        DisplayTag::St7735Rotated,
        DisplayTag::Custom,
    ];

    /// Detect the display profile from image dimensions.
    pub fn detect(width: u32, height: u32) -> Self {
        match (width, height) {
            (80, 160) => DisplayTag::St7735,
            (240, 240) => DisplayTag::St7789,
            (160, 80) => DisplayTag::St7735Rotated,
            _ => DisplayTag::Custom,
        }
    }

    /// Name written into generated headers.
    pub fn as_str(self) -> &'static str {
        match self {
            DisplayTag::St7735 => "ST7735",
            DisplayTag::St7789 => "ST7789",
            DisplayTag::St7735Rotated => "ST7735_ROTATED",
            DisplayTag::Custom => "CUSTOM",
        }
    }

    /// Dimensions this display accepts. Empty means anything goes.
    pub fn expected_dimensions(self) -> &'static [(u32, u32)] {
        match self {
            DisplayTag::St7735 => &[(80, 160), (160, 80)],
            DisplayTag::St7789 => &[(240, 240)],
            DisplayTag::St7735Rotated => &[(160, 80)],
            DisplayTag::Custom => &[],
        }
    }

    /// Describe a dimension mismatch, if any. Mismatches are never fatal.
    pub fn validate(self, width: u32, height: u32) -> Option<String> {
        let expected = self.expected_dimensions();
        if expected.is_empty() || expected.contains(&(width, height)) {
            return None;
        }

        let list = expected
            .iter()
            .map(|(w, h)| format!("{}x{}", w, h))
            .collect::<Vec<_>>()
            .join(", ");
        Some(format!(
            "Unexpected dimensions for {}: expected {}, got {}x{}",
            self, list, width, height
        ))
    }
}

impl fmt::Display for DisplayTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DisplayTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        DisplayTag::ALL
            .into_iter()
            .find(|tag| tag.as_str() == upper)
            .ok_or_else(|| {
                format!(
                    "unknown display type '{}' (expected ST7735, ST7789, ST7735_ROTATED or CUSTOM)",
                    s
                )
            })
    }
}

/// Load an image and normalize it to RGB888.
///
/// Grayscale, palette, alpha and 16-bit images are converted; only a decode
/// failure is an error.
pub fn load_rgb(path: &Path) -> Result<image::RgbImage> {
    let img =
        image::open(path).with_context(|| format!("Failed to load image: {}", path.display()))?;

    if !matches!(img.color(), image::ColorType::Rgb8) {
        tracing::info!("Converting from {:?} to RGB", img.color());
    }

    Ok(img.to_rgb8())
}

/// Pack an RGB888 image into RGB565 values in row-major order.
pub fn encode_pixels(img: &image::RgbImage) -> Vec<u16> {
    img.pixels()
        .map(|p| rgb565(p[0], p[1], p[2]))
        .collect()
}

/// Convert an image file into a splash screen header.
///
/// The display profile is auto-detected from the image size unless given.
pub fn convert_image(
    input: &Path,
    output: &Path,
    display: Option<DisplayTag>,
) -> Result<SplashHeader> {
    if !input.exists() {
        anyhow::bail!("Input file '{}' not found", input.display());
    }

    tracing::info!("Opening image: {}", input.display());
    let img = load_rgb(input)?;
    let (width, height) = img.dimensions();
    tracing::info!("Image size: {}x{}", width, height);

    let tag = match display {
        Some(tag) => tag,
        None => {
            let detected = DisplayTag::detect(width, height);
            tracing::info!("Auto-detected display type: {}", detected);
            detected
        }
    };

    if let Some(warning) = tag.validate(width, height) {
        tracing::warn!("{}", warning);
    }

    let source_name = input
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let splash = SplashHeader {
        source_name,
        display: tag,
        width,
        height,
        pixels: encode_pixels(&img),
    };

    if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    }

    let text = render_header(&splash)?;
    std::fs::write(output, text)
        .with_context(|| format!("Failed to write header: {}", output.display()))?;

    tracing::info!(
        "Generated {} ({} uint16_t values, {} bytes)",
        output.display(),
        splash.pixels.len(),
        splash.byte_size()
    );

    Ok(splash)
}
