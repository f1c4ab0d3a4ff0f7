//! fwgen.toml settings and build-environment configuration values
//!
//! Two kinds of configuration feed the generators:
//!
//! - [`Settings`] - project layout read from `fwgen.toml` (every field optional)
//! - [`ConfigSource`] - string values provided by the build tool at run time
//!   (`PIOENV`, `PROJECT_DIR`, `BUILD_FLAGS`)
//!
//! # Settings file
//!
//! ```toml
//! [project]
//! dir = "."
//!
//! [splash]
//! output = "include/splash_screen.h"
//! st7735 = "test_images/splash_screen_80X160.png"
//! st7789 = "test_images/splash_screen_240X240.png"
//!
//! [web]
//! source = "data"
//! output = "include/webcontent.h"
//! portal = "portal.html"
//!
//! [build]
//! version = "v0.9"
//! counter = ".pio/build_counter.json"
//! header = "include/build_info.h"
//!
//! [firmware]
//! dir = "firmware"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::splash::DisplayTag;

/// Build environment name (e.g. `esp32dev-st7735-production`)
pub const KEY_ENV_NAME: &str = "PIOENV";
/// Project root as seen by the build tool
pub const KEY_PROJECT_DIR: &str = "PROJECT_DIR";
/// Raw compiler flags of the current environment
pub const KEY_BUILD_FLAGS: &str = "BUILD_FLAGS";

/// Read-only string configuration provided by the build tool.
pub trait ConfigSource {
    /// Look up a configuration value by key.
    fn value(&self, key: &str) -> Option<String>;

    /// Environment name, empty when the build tool did not provide one.
    fn env_name(&self) -> String {
        self.value(KEY_ENV_NAME).unwrap_or_default()
    }
}

/// Configuration values taken from the process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSource;

impl ConfigSource for EnvSource {
    fn value(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }
}

/// In-memory configuration values.
#[derive(Debug, Default, Clone)]
pub struct MapSource {
    values: BTreeMap<String, String>,
}

impl MapSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }
}

impl ConfigSource for MapSource {
    fn value(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// fwgen.toml structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub project: ProjectSection,
    pub splash: SplashSection,
    pub web: WebSection,
    pub build: BuildSection,
    pub firmware: FirmwareSection,
}

/// Project root section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProjectSection {
    /// Project root, relative to the settings file
    pub dir: PathBuf,
}

impl Default for ProjectSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
        }
    }
}

/// Splash screen images and generated header
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SplashSection {
    pub output: PathBuf,
    /// Splash image used for ST7735 (80x160) builds
    pub st7735: PathBuf,
    /// Splash image used for ST7789 (240x240) builds
    pub st7789: PathBuf,
}

impl Default for SplashSection {
    fn default() -> Self {
        Self {
            output: PathBuf::from("include/splash_screen.h"),
            st7735: PathBuf::from("test_images/splash_screen_80X160.png"),
            st7789: PathBuf::from("test_images/splash_screen_240X240.png"),
        }
    }
}

impl SplashSection {
    /// Splash image configured for a display. Rotated and custom layouts
    /// share the ST7735 image.
    pub fn image_for(&self, tag: DisplayTag) -> &Path {
        match tag {
            DisplayTag::St7789 => &self.st7789,
            DisplayTag::St7735 | DisplayTag::St7735Rotated | DisplayTag::Custom => &self.st7735,
        }
    }
}

/// Static web portal sources and generated header
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebSection {
    pub source: PathBuf,
    pub output: PathBuf,
    /// Asset served by the `getPortalHTML()` shortcut
    pub portal: String,
}

impl Default for WebSection {
    fn default() -> Self {
        Self {
            source: PathBuf::from("data"),
            output: PathBuf::from("include/webcontent.h"),
            portal: "portal.html".to_string(),
        }
    }
}

/// Version and build number bookkeeping
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BuildSection {
    /// Base firmware version (e.g. "v0.9")
    pub version: String,
    /// JSON file holding the daily build counter
    pub counter: PathBuf,
    /// Generated constants header
    pub header: PathBuf,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            version: "v0.9".to_string(),
            counter: PathBuf::from(".pio/build_counter.json"),
            header: PathBuf::from("include/build_info.h"),
        }
    }
}

/// Distribution folder for production firmware
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FirmwareSection {
    pub dir: PathBuf,
}

impl Default for FirmwareSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("firmware"),
        }
    }
}

impl Settings {
    /// Load settings from file. A missing file yields the defaults, rooted at
    /// the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let base = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut settings = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read settings: {}", path.display()))?;
            Self::parse(&content)?
        } else {
            tracing::debug!("No settings file at {}, using defaults", path.display());
            Self::default()
        };

        settings.project.dir = base.join(&settings.project.dir);
        Ok(settings)
    }

    /// Parse settings from string
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse fwgen.toml")
    }

    /// Root all relative paths under `dir`.
    pub fn with_project_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.project.dir = dir.into();
        self
    }

    /// Apply build-tool overrides. `PROJECT_DIR` replaces the configured root.
    pub fn apply(mut self, config: &dyn ConfigSource) -> Self {
        if let Some(dir) = config.value(KEY_PROJECT_DIR) {
            self.project.dir = PathBuf::from(dir);
        }
        self
    }

    /// Resolve a project-relative path. Absolute paths are returned unchanged.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.project.dir.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_uses_defaults() {
        let settings = Settings::parse("").unwrap();
        assert_eq!(settings.web.source, PathBuf::from("data"));
        assert_eq!(settings.web.portal, "portal.html");
        assert_eq!(settings.build.version, "v0.9");
        assert_eq!(settings.firmware.dir, PathBuf::from("firmware"));
        assert_eq!(settings.splash.output, PathBuf::from("include/splash_screen.h"));
    }

    #[test]
    fn test_parse_partial_sections() {
        let settings = Settings::parse(
            r#"
[web]
source = "www"

[build]
version = "v1.2"
"#,
        )
        .unwrap();
        assert_eq!(settings.web.source, PathBuf::from("www"));
        assert_eq!(settings.web.output, PathBuf::from("include/webcontent.h"));
        assert_eq!(settings.build.version, "v1.2");
        assert_eq!(settings.build.header, PathBuf::from("include/build_info.h"));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(Settings::parse("[web\nsource = ").is_err());
    }

    #[test]
    fn test_missing_file_roots_defaults_at_parent() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("fwgen.toml")).unwrap();
        assert_eq!(settings.project.dir, dir.path().join("."));
        assert_eq!(
            settings.resolve(&settings.web.output),
            dir.path().join(".").join("include/webcontent.h")
        );
    }

    #[test]
    fn test_project_dir_override() {
        let config = MapSource::new().with(KEY_PROJECT_DIR, "/work/billboard");
        let settings = Settings::default().apply(&config);
        assert_eq!(settings.project.dir, PathBuf::from("/work/billboard"));
    }

    #[test]
    fn test_splash_image_selection() {
        let splash = SplashSection::default();
        assert_eq!(
            splash.image_for(DisplayTag::St7789),
            Path::new("test_images/splash_screen_240X240.png")
        );
        assert_eq!(
            splash.image_for(DisplayTag::St7735),
            Path::new("test_images/splash_screen_80X160.png")
        );
    }

    #[test]
    fn test_map_source_env_name() {
        let config = MapSource::new().with(KEY_ENV_NAME, "esp32s3-st7789-debug");
        assert_eq!(config.env_name(), "esp32s3-st7789-debug");
        assert_eq!(MapSource::new().env_name(), "");
    }
}
