//! Build date, daily build number and firmware version defines
//!
//! Every build gets a number of the form `YYMMDDx`, where `x` counts the builds
//! made on that day. The counter lives in a small JSON file inside the build
//! directory:
//!
//! ```json
//! { "date": "251019", "count": 2, "flags_pending": false }
//! ```
//!
//! The values reach the firmware twice: as `-D` flags consumed by the build
//! tool, and as a generated header for code that includes it directly.
//!
//! A build that evaluates `fwgen build-info` for its flags and then runs the
//! pre hook counts once. The flag step marks its count as pending and the
//! pre hook takes it over instead of bumping again.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt::Write as FmtWrite;
use std::fs;
use std::io::Write as IoWrite;
use std::path::Path;

use crate::config::{ConfigSource, Settings};

/// The build number keeps a single digit for the daily count
pub const MAX_DAILY_COUNT: u32 = 9;

/// Build step asking for build info
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// `fwgen build-info`, evaluated by the build tool for its `-D` flags
    Flags,
    /// Pre-build hook
    PreHook,
}

/// Persistent per-day build counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCounter {
    /// Build date (`YYMMDD`) the count belongs to
    pub date: String,
    pub count: u32,
    /// Set when the count went out as `-D` flags and no pre hook has used it yet
    #[serde(default)]
    pub flags_pending: bool,
}

impl DailyCounter {
    /// Read the counter file. Missing or unreadable files start a fresh count.
    pub fn load(path: &Path) -> Option<Self> {
        let content = fs::read_to_string(path).ok()?;
        match serde_json::from_str(&content) {
            Ok(counter) => Some(counter),
            Err(e) => {
                tracing::warn!(
                    "Ignoring corrupt build counter {}: {}",
                    path.display(),
                    e
                );
                None
            }
        }
    }

    /// Counter for the next build on `date`.
    pub fn next(previous: Option<&Self>, date: &str) -> Self {
        let count = match previous {
            Some(prev) if prev.date == date => {
                if prev.count >= MAX_DAILY_COUNT {
                    tracing::warn!(
                        "More than {} builds today, build number stays at {}{}",
                        MAX_DAILY_COUNT + 1,
                        date,
                        MAX_DAILY_COUNT
                    );
                    MAX_DAILY_COUNT
                } else {
                    prev.count + 1
                }
            }
            _ => 0,
        };
        Self {
            date: date.to_string(),
            count,
            flags_pending: false,
        }
    }

    /// Write the counter via a temporary file and rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(self)?;
        let tmp_path = path.with_extension("json.tmp");
        {
            let mut f = fs::File::create(&tmp_path)
                .with_context(|| format!("Failed to create {}", tmp_path.display()))?;
            f.write_all(json.as_bytes())?;
            f.sync_all()?;
        }

        #[cfg(windows)]
        {
            if path.exists() {
                // Windows rename fails if destination exists.
                fs::remove_file(path)?;
            }
        }

        fs::rename(&tmp_path, path)
            .with_context(|| format!("Failed to update build counter: {}", path.display()))?;
        Ok(())
    }

    /// Count for the build on `date` that `step` belongs to.
    ///
    /// The flag step always advances the counter. The pre hook reuses a
    /// pending count from the same day and advances otherwise.
    pub fn claim(path: &Path, date: &str, step: Step) -> Result<u32> {
        let previous = Self::load(path);
        let counter = match previous {
            Some(prev) if step == Step::PreHook && prev.flags_pending && prev.date == date => {
                tracing::debug!("Using build count {} from the flag step", prev.count);
                Self {
                    flags_pending: false,
                    ..prev
                }
            }
            previous => Self {
                flags_pending: step == Step::Flags,
                ..Self::next(previous.as_ref(), date)
            },
        };
        counter.save(path)?;
        Ok(counter.count)
    }
}

/// Value of a preprocessor define
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefineValue {
    Str(String),
    Int(u32),
}

/// A single `NAME=value` preprocessor define
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Define {
    pub name: &'static str,
    pub value: DefineValue,
}

impl Define {
    fn string(name: &'static str, value: impl Into<String>) -> Self {
        Self {
            name,
            value: DefineValue::Str(value.into()),
        }
    }

    /// Command line form, with string quotes escaped for the build tool's
    /// shell-style flag parser
    pub fn to_flag(&self) -> String {
        match &self.value {
            DefineValue::Str(s) => format!("-D{}=\\\"{}\\\"", self.name, s),
            DefineValue::Int(n) => format!("-D{}={}", self.name, n),
        }
    }

    /// Right-hand side of a `#define`
    pub fn literal(&self) -> String {
        match &self.value {
            DefineValue::Str(s) => format!("\"{}\"", s),
            DefineValue::Int(n) => n.to_string(),
        }
    }
}

/// Everything known about the current build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    pub version: String,
    /// `YYMMDD`
    pub date: String,
    pub daily_count: u32,
    /// `YYYY-MM-DD HH:MM:SS`
    pub timestamp: String,
    pub environment: String,
}

impl BuildInfo {
    pub fn new(
        version: impl Into<String>,
        now: NaiveDateTime,
        daily_count: u32,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            version: version.into(),
            date: build_date(now),
            daily_count,
            timestamp: now.format("%Y-%m-%d %H:%M:%S").to_string(),
            environment: environment.into(),
        }
    }

    /// `YYMMDD` followed by the daily count
    pub fn build_number(&self) -> String {
        format!("{}{}", self.date, self.daily_count)
    }

    /// `<version>-build.<build number>`
    pub fn full_version(&self) -> String {
        format!("{}-build.{}", self.version, self.build_number())
    }

    pub fn defines(&self) -> Vec<Define> {
        vec![
            Define::string("BUILD_DATE", &self.date),
            Define::string("BUILD_NUMBER", self.build_number()),
            Define::string("BUILD_TIMESTAMP", &self.timestamp),
            Define::string("BUILD_ENVIRONMENT", &self.environment),
            Define::string("FIRMWARE_VERSION", &self.version),
            Define::string("FIRMWARE_VERSION_FULL", self.full_version()),
            Define {
                name: "DAILY_BUILD_COUNT",
                value: DefineValue::Int(self.daily_count),
            },
        ]
    }

    /// One `-D` flag per line
    pub fn render_flags(&self) -> String {
        self.defines()
            .iter()
            .map(|d| d.to_flag() + "\n")
            .collect()
    }
}

/// Build date in `YYMMDD` form
pub fn build_date(now: NaiveDateTime) -> String {
    now.format("%y%m%d").to_string()
}

/// Render the constants header.
pub fn render_header(info: &BuildInfo) -> Result<String> {
    let mut output = String::new();

    writeln!(output, "// GENERATED FILE - DO NOT EDIT")?;
    writeln!(output, "// Build information generated by fwgen")?;
    writeln!(output)?;
    writeln!(output, "#pragma once")?;

    for define in info.defines() {
        writeln!(output)?;
        writeln!(output, "#ifndef {}", define.name)?;
        writeln!(output, "#define {} {}", define.name, define.literal())?;
        writeln!(output, "#endif")?;
    }

    Ok(output)
}

/// Claim a daily count for `step` and describe the build happening at `now`.
pub fn collect(
    config: &dyn ConfigSource,
    settings: &Settings,
    now: NaiveDateTime,
    step: Step,
) -> Result<BuildInfo> {
    let date = build_date(now);
    let counter_path = settings.resolve(&settings.build.counter);
    let count = DailyCounter::claim(&counter_path, &date, step)?;

    let environment = match config.env_name() {
        name if name.is_empty() => "unknown".to_string(),
        name => name,
    };

    Ok(BuildInfo::new(
        settings.build.version.clone(),
        now,
        count,
        environment,
    ))
}

/// Write the constants header. Failure is logged and does not stop the build.
pub fn write_header(info: &BuildInfo, settings: &Settings) -> bool {
    let path = settings.resolve(&settings.build.header);
    let result = render_header(info).and_then(|header| {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, header)?;
        Ok(())
    });

    match result {
        Ok(()) => {
            tracing::debug!("Wrote {}", path.display());
            true
        }
        Err(e) => {
            tracing::warn!("Could not update {}: {:#}", path.display(), e);
            false
        }
    }
}

/// Compute build info for the current local time and refresh the header.
pub fn generate(config: &dyn ConfigSource, settings: &Settings, step: Step) -> Result<BuildInfo> {
    let now = chrono::Local::now().naive_local();
    let info = collect(config, settings, now, step)?;
    write_header(&info, settings);

    tracing::info!("Build date: {}", info.date);
    tracing::info!("Build number: {}", info.build_number());
    tracing::info!("Firmware version: {}", info.full_version());
    Ok(info)
}
