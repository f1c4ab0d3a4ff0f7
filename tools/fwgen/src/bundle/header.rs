//! webcontent.h generator

use anyhow::Result;
use std::fmt::Write as FmtWrite;

use super::{Asset, AssetIndex, Storage};

/// Delimiter of the C++ raw string literals holding inline stylesheets
pub const RAW_DELIMITER: &str = "fwgen";

/// Bytes per line in emitted arrays
const BYTES_PER_LINE: usize = 16;

/// Render the complete header for `index`.
///
/// `portal` names the asset exposed through `getPortalHTML()`. When it is not
/// part of the index the portal accessors are left out.
pub fn render_header(index: &AssetIndex, portal: &str) -> Result<String> {
    let mut output = String::new();

    writeln!(output, "// GENERATED FILE - DO NOT EDIT")?;
    writeln!(
        output,
        "// Web portal assets embedded by fwgen ({} files, {} bytes)",
        index.len(),
        index.total_bytes()
    )?;
    writeln!(output)?;
    writeln!(output, "#pragma once")?;
    writeln!(output)?;
    writeln!(output, "#include <Arduino.h>")?;
    writeln!(output, "#include <cstdint>")?;
    writeln!(output, "#include <cstring>")?;
    writeln!(output)?;

    for asset in index.assets() {
        write_asset(&mut output, asset)?;
        writeln!(output)?;
    }

    write_index(&mut output, index)?;
    writeln!(output)?;
    write_accessors(&mut output)?;

    match index.get(portal) {
        Some(asset) => {
            writeln!(output)?;
            write_portal_accessors(&mut output, asset)?;
        }
        None => tracing::warn!(
            "Portal page {} not found, getPortalHTML() will not be generated",
            portal
        ),
    }

    Ok(output)
}

fn write_asset(output: &mut String, asset: &Asset) -> Result<()> {
    let encoding = if asset.policy.is_compressed() {
        "gzip"
    } else {
        "plain"
    };
    writeln!(
        output,
        "// {} ({}, {} bytes)",
        asset.file_name,
        encoding,
        asset.len()
    )?;

    match asset.storage() {
        Storage::Bytes => {
            writeln!(output, "const uint8_t {}[] PROGMEM = {{", asset.symbol)?;
            let lines = asset.data.chunks(BYTES_PER_LINE).collect::<Vec<_>>();
            for (i, line) in lines.iter().enumerate() {
                let values = line
                    .iter()
                    .map(|b| format!("0x{:02X}", b))
                    .collect::<Vec<_>>()
                    .join(", ");
                let separator = if i + 1 < lines.len() { "," } else { "" };
                writeln!(output, "  {}{}", values, separator)?;
            }
            writeln!(output, "}};")?;
        }
        Storage::Literal => {
            // Payload was validated as UTF-8 and delimiter-free by the policy
            let text = String::from_utf8_lossy(&asset.data);
            writeln!(
                output,
                "const char {}[] PROGMEM = R\"{}({}){}\";",
                asset.symbol, RAW_DELIMITER, text, RAW_DELIMITER
            )?;
        }
    }
    Ok(())
}

fn write_index(output: &mut String, index: &AssetIndex) -> Result<()> {
    writeln!(output, "typedef struct {{")?;
    writeln!(output, "    const char* filename;")?;
    writeln!(output, "    const uint8_t* data;")?;
    writeln!(output, "    const unsigned int length;")?;
    writeln!(output, "}} EmbeddedAsset;")?;
    writeln!(output)?;

    writeln!(output, "const EmbeddedAsset assets[] = {{")?;
    for asset in index.assets() {
        let data = match asset.storage() {
            Storage::Bytes => asset.symbol.clone(),
            Storage::Literal => format!("(const uint8_t*){}", asset.symbol),
        };
        writeln!(
            output,
            "    {{ \"{}\", {}, {} }},",
            asset.file_name,
            data,
            asset.len()
        )?;
    }
    writeln!(output, "}};")?;
    Ok(())
}

fn write_accessors(output: &mut String) -> Result<()> {
    output.push_str(
        r#"// Get total number of assets
inline size_t getAssetCount() {
    return sizeof(assets) / sizeof(assets[0]);
}

// Get asset by filename
inline const EmbeddedAsset* getAsset(const char* filename) {
    for (size_t i = 0; i < getAssetCount(); i++) {
        if (strcmp(assets[i].filename, filename) == 0) {
            return &assets[i];
        }
    }
    return nullptr;
}

// Convert asset data to String
inline String assetToString(const EmbeddedAsset* asset) {
    if (asset == nullptr) return String();
    return String((const char*)asset->data, asset->length);
}

// Get asset by index
inline const EmbeddedAsset* getAssetByIndex(size_t index) {
    if (index >= getAssetCount()) return nullptr;
    return &assets[index];
}
"#,
    );
    Ok(())
}

fn write_portal_accessors(output: &mut String, portal: &Asset) -> Result<()> {
    writeln!(output, "// Direct access to {}", portal.file_name)?;
    writeln!(output, "inline String getPortalHTML() {{")?;
    writeln!(
        output,
        "    return String((const char*){}, {});",
        portal.symbol,
        portal.len()
    )?;
    writeln!(output, "}}")?;
    writeln!(output)?;
    writeln!(output, "inline size_t getPortalHTMLSize() {{")?;
    writeln!(output, "    return {};", portal.len())?;
    writeln!(output, "}}")?;
    Ok(())
}
