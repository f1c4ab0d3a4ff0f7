//! Web portal asset bundling.
//!
//! Every file in the web source directory becomes a named array in
//! `webcontent.h`, plus one entry in the `assets[]` lookup table the firmware's
//! HTTP server searches by file name. There is no filesystem on the device, so
//! the header is the only way the portal reaches the browser.
//!
//! Processing is split in three steps:
//!
//! 1. [`Policy::classify`] picks a preprocessing policy from the file name
//! 2. [`Policy::apply`] turns the raw file into the stored payload
//! 3. [`AssetIndex::push`] accumulates the result, rejecting symbol collisions

mod gzip;
mod header;
pub mod minify;

pub use header::{render_header, RAW_DELIMITER};

use anyhow::Context;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::Settings;

/// jQuery builds: only the `/*! ... */` banner is stripped
const LICENSE_BANNER_SCRIPTS: &[&str] = &["jquery"];
/// Bootstrap/Popper builds: banner and source map reference are stripped
const VENDOR_SCRIPTS: &[&str] = &["bootstrap", "popper"];
const VENDOR_STYLESHEETS: &[&str] = &["bootstrap"];

/// Errors raised while bundling web assets. Any of them aborts the run.
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to list web assets")]
    Walk(#[from] walkdir::Error),

    #[error("{0} is not valid UTF-8")]
    NotUtf8(String),

    #[error("{file} and {existing} both map to symbol '{symbol}'")]
    SymbolCollision {
        symbol: String,
        file: String,
        existing: String,
    },

    #[error("{0:?} cannot be used as a C string literal")]
    UnsupportedFileName(String),

    #[error("{0} is empty after processing")]
    EmptyAsset(String),

    #[error("{0} contains the raw string literal delimiter")]
    LiteralDelimiter(String),

    #[error("no web assets found in {}", .0.display())]
    NoAssets(PathBuf),
}

/// Preprocessing applied to one web asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Policy {
    /// HTML: minify inline scripts and markup, store uncompressed
    Markup,
    /// Strip a leading `/*! ... */` license banner, gzip
    LicenseHeader,
    /// Strip the leading block comment and trailing source map reference, gzip
    LicenseAndSourceMap,
    /// Raw bytes, gzip
    Compressed,
    /// CSS: strip comments, collapse whitespace, store as a string literal
    InlineStylesheet,
}

/// How a payload is declared in the generated header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    /// `const uint8_t name[] = { 0x.., ... };`
    Bytes,
    /// `const char name[] = R"delim(...)delim";`
    Literal,
}

impl Policy {
    /// Choose the policy for a file name. `None` means the file is not bundled.
    pub fn classify(file_name: &str) -> Option<Self> {
        let ext = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
        let has_prefix = |prefixes: &[&str]| prefixes.iter().any(|p| file_name.starts_with(p));

        match ext.as_str() {
            "html" => Some(Policy::Markup),
            "js" if has_prefix(LICENSE_BANNER_SCRIPTS) => Some(Policy::LicenseHeader),
            "js" if has_prefix(VENDOR_SCRIPTS) => Some(Policy::LicenseAndSourceMap),
            "js" => Some(Policy::Compressed),
            "css" if has_prefix(VENDOR_STYLESHEETS) => Some(Policy::LicenseAndSourceMap),
            "css" => Some(Policy::InlineStylesheet),
            "ico" | "jpg" => Some(Policy::Compressed),
            _ => None,
        }
    }

    /// Whether the payload is gzip compressed
    pub fn is_compressed(self) -> bool {
        matches!(
            self,
            Policy::LicenseHeader | Policy::LicenseAndSourceMap | Policy::Compressed
        )
    }

    pub fn storage(self) -> Storage {
        match self {
            Policy::InlineStylesheet => Storage::Literal,
            _ => Storage::Bytes,
        }
    }

    /// Transform raw file contents into the stored payload.
    pub fn apply(self, file_name: &str, raw: Vec<u8>) -> Result<Vec<u8>, BundleError> {
        let text = |raw: Vec<u8>| {
            String::from_utf8(raw).map_err(|_| BundleError::NotUtf8(file_name.to_string()))
        };

        let payload = match self {
            Policy::Markup => minify::minify_markup(&text(raw)?),
            Policy::LicenseHeader => minify::strip_license_banner(&text(raw)?).into_bytes(),
            Policy::LicenseAndSourceMap => {
                minify::strip_vendor_decorations(&text(raw)?).into_bytes()
            }
            Policy::Compressed => raw,
            Policy::InlineStylesheet => {
                let css = minify::minify_css(&text(raw)?);
                if css.contains(&format!("){}\"", RAW_DELIMITER)) {
                    return Err(BundleError::LiteralDelimiter(file_name.to_string()));
                }
                css.into_bytes()
            }
        };

        let payload = if self.is_compressed() {
            gzip::compress(&payload)
        } else {
            payload
        };

        if payload.is_empty() {
            return Err(BundleError::EmptyAsset(file_name.to_string()));
        }
        Ok(payload)
    }
}

/// Derive a C identifier from a file name (`app.min.js` -> `app_min_js`).
pub fn symbol_name(file_name: &str) -> String {
    let mut symbol: String = file_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if symbol.is_empty() || symbol.starts_with(|c: char| c.is_ascii_digit()) {
        symbol.insert(0, '_');
    }
    symbol
}

/// File names are emitted verbatim inside `"..."` in the index table.
fn is_literal_safe(file_name: &str) -> bool {
    !file_name
        .chars()
        .any(|c| c.is_control() || c == '"' || c == '\\')
}

/// A processed web asset ready for emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub file_name: String,
    pub symbol: String,
    pub policy: Policy,
    pub data: Vec<u8>,
}

impl Asset {
    /// Process raw file contents with the given policy.
    pub fn new(file_name: &str, policy: Policy, raw: Vec<u8>) -> Result<Self, BundleError> {
        if !is_literal_safe(file_name) {
            return Err(BundleError::UnsupportedFileName(file_name.to_string()));
        }
        let data = policy.apply(file_name, raw)?;
        Ok(Self {
            file_name: file_name.to_string(),
            symbol: symbol_name(file_name),
            policy,
            data,
        })
    }

    pub fn storage(&self) -> Storage {
        self.policy.storage()
    }

    /// Payload length in bytes, as recorded in the index table
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Ordered accumulator of bundled assets.
#[derive(Debug, Default, Clone)]
pub struct AssetIndex {
    assets: Vec<Asset>,
}

impl AssetIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an asset. Fails if its symbol is already taken.
    pub fn push(&mut self, asset: Asset) -> Result<(), BundleError> {
        if let Some(existing) = self.assets.iter().find(|a| a.symbol == asset.symbol) {
            return Err(BundleError::SymbolCollision {
                symbol: asset.symbol,
                file: asset.file_name,
                existing: existing.file_name.clone(),
            });
        }
        self.assets.push(asset);
        Ok(())
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    /// Look up an asset by file name
    pub fn get(&self, file_name: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.file_name == file_name)
    }

    /// `(file name, symbol, length)` triples in emission order
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str, usize)> {
        self.assets
            .iter()
            .map(|a| (a.file_name.as_str(), a.symbol.as_str(), a.len()))
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Total payload bytes
    pub fn total_bytes(&self) -> usize {
        self.assets.iter().map(Asset::len).sum()
    }
}

/// Process a single file. Returns `None` for file types that are not bundled.
pub fn process_file(path: &Path) -> Result<Option<Asset>, BundleError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let Some(policy) = Policy::classify(&file_name) else {
        tracing::debug!("Skipping {}", path.display());
        return Ok(None);
    };

    tracing::info!("Processing {} ({:?})", file_name, policy);
    let raw = std::fs::read(path).map_err(|source| BundleError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let raw_len = raw.len();
    let asset = Asset::new(&file_name, policy, raw)?;
    tracing::debug!("  {} -> {} bytes", raw_len, asset.len());

    Ok(Some(asset))
}

/// Bundle every asset in `src` (non-recursive), sorted by file name.
pub fn bundle_dir(src: &Path) -> Result<AssetIndex, BundleError> {
    let mut index = AssetIndex::new();

    for entry in WalkDir::new(src)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(asset) = process_file(entry.path())? {
            index.push(asset)?;
        }
    }

    if index.is_empty() {
        return Err(BundleError::NoAssets(src.to_path_buf()));
    }
    Ok(index)
}

/// Bundle the configured web source directory and write the header.
///
/// The header is rendered completely before anything touches the output file,
/// so a failing asset leaves the previous header in place.
pub fn write_bundle(src: &Path, output: &Path, portal: &str) -> anyhow::Result<AssetIndex> {
    tracing::info!("Bundling web assets from {}", src.display());
    let index =
        bundle_dir(src).with_context(|| format!("Failed to bundle {}", src.display()))?;
    let header = render_header(&index, portal)?;

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    std::fs::write(output, header)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    tracing::info!(
        "Embedded {} assets ({} bytes) into {}",
        index.len(),
        index.total_bytes(),
        output.display()
    );
    Ok(index)
}

/// [`write_bundle`] with paths taken from the `[web]` settings.
pub fn write_configured(settings: &Settings) -> anyhow::Result<AssetIndex> {
    write_bundle(
        &settings.resolve(&settings.web.source),
        &settings.resolve(&settings.web.output),
        &settings.web.portal,
    )
}
