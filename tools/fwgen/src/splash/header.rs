//! splash_screen.h generator

use anyhow::Result;
use std::fmt::Write as FmtWrite;

use super::DisplayTag;

/// Array name the firmware's display manager links against.
pub const BITMAP_SYMBOL: &str = "epd_bitmap_";

/// RGB565 values per output line.
pub const VALUES_PER_LINE: usize = 8;

/// An encoded splash screen ready for emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplashHeader {
    /// Source image file name (no directory)
    pub source_name: String,
    pub display: DisplayTag,
    pub width: u32,
    pub height: u32,
    /// RGB565 pixels in row-major order
    pub pixels: Vec<u16>,
}

impl SplashHeader {
    /// Size of the pixel array in bytes
    pub fn byte_size(&self) -> usize {
        self.pixels.len() * 2
    }
}

/// Render the header text.
///
/// Output depends only on the inputs, so re-running on the same image yields a
/// byte-identical file.
pub fn render_header(splash: &SplashHeader) -> Result<String> {
    let mut output = String::new();
    let SplashHeader {
        source_name,
        display,
        width,
        height,
        pixels,
    } = splash;
    let total_bytes = splash.byte_size();

    writeln!(output, "/*")?;
    writeln!(output, " * Splash screen color bitmap header file")?;
    writeln!(output, " * Generated from {}", source_name)?;
    writeln!(output, " * Target display: {}", display)?;
    writeln!(output, " * Image size: {}x{} pixels", width, height)?;
    writeln!(
        output,
        " * RGB565 color bitmap ({}x{}, {} bytes)",
        width, height, total_bytes
    )?;
    writeln!(output, " * Generated with fwgen")?;
    writeln!(output, " */")?;
    writeln!(output)?;

    writeln!(output, "#ifndef SPLASH_SCREEN_H")?;
    writeln!(output, "#define SPLASH_SCREEN_H")?;
    writeln!(output)?;
    writeln!(output, "#include <Arduino.h>")?;
    writeln!(output)?;

    writeln!(output, "// Bitmap dimensions for {}", display)?;
    writeln!(output, "#define SPLASH_WIDTH  {}", width)?;
    writeln!(output, "#define SPLASH_HEIGHT {}", height)?;
    writeln!(output, "#define SPLASH_SIZE   {}", total_bytes)?;
    writeln!(output)?;

    writeln!(output, "// Splash screen color bitmap data (RGB565)")?;
    writeln!(output, "// Compatible with {} ({}x{})", display, width, height)?;
    writeln!(output, "const uint16_t {}[] PROGMEM = {{", BITMAP_SYMBOL)?;

    for (i, line) in pixels.chunks(VALUES_PER_LINE).enumerate() {
        let values = line
            .iter()
            .map(|v| format!("0x{:04X}", v))
            .collect::<Vec<_>>()
            .join(", ");
        let is_last = (i + 1) * VALUES_PER_LINE >= pixels.len();
        if is_last {
            writeln!(output, "  {}", values)?;
        } else {
            writeln!(output, "  {},", values)?;
        }
    }

    writeln!(output, "}};")?;
    writeln!(output)?;
    writeln!(output, "#endif // SPLASH_SCREEN_H")?;

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn splash(width: u32, height: u32, pixels: Vec<u16>) -> SplashHeader {
        SplashHeader {
            source_name: "test.png".to_string(),
            display: DisplayTag::detect(width, height),
            width,
            height,
            pixels,
        }
    }

    fn array_body(header: &str) -> &str {
        let start = header.find("PROGMEM = {\n").unwrap() + "PROGMEM = {\n".len();
        let end = header.find("};").unwrap();
        &header[start..end]
    }

    #[test]
    fn test_two_pixel_scenario() {
        let header = render_header(&splash(2, 1, vec![0xF800, 0x07E0])).unwrap();
        assert!(header.contains("#define SPLASH_WIDTH  2\n"));
        assert!(header.contains("#define SPLASH_HEIGHT 1\n"));
        assert!(header.contains("#define SPLASH_SIZE   4\n"));
        assert_eq!(array_body(&header), "  0xF800, 0x07E0\n");
        assert!(header.contains(" * Target display: CUSTOM\n"));
        assert!(header.contains(" * Generated from test.png\n"));
    }

    #[test]
    fn test_exact_multiple_of_line_width() {
        let pixels: Vec<u16> = (0..16).collect();
        let header = render_header(&splash(4, 4, pixels)).unwrap();
        assert_eq!(
            array_body(&header),
            "  0x0000, 0x0001, 0x0002, 0x0003, 0x0004, 0x0005, 0x0006, 0x0007,\n  \
             0x0008, 0x0009, 0x000A, 0x000B, 0x000C, 0x000D, 0x000E, 0x000F\n"
        );
    }

    #[test]
    fn test_partial_last_line() {
        let pixels: Vec<u16> = vec![0xFFFF; 9];
        let header = render_header(&splash(3, 3, pixels)).unwrap();
        let body = array_body(&header);
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(','));
        assert_eq!(lines[1], "  0xFFFF");
    }

    #[test]
    fn test_element_count_matches_dimensions() {
        let (w, h) = (13u32, 7u32);
        let header = render_header(&splash(w, h, vec![0x1234; (w * h) as usize])).unwrap();
        let count = array_body(&header).matches("0x1234").count();
        assert_eq!(count, (w * h) as usize);
        assert!(header.contains(&format!("#define SPLASH_SIZE   {}\n", 2 * w * h)));
    }

    #[test]
    fn test_render_is_deterministic() {
        let s = splash(80, 160, vec![0xABCD; 80 * 160]);
        assert_eq!(render_header(&s).unwrap(), render_header(&s).unwrap());
    }

    #[test]
    fn test_guard_and_symbol() {
        let header = render_header(&splash(1, 1, vec![0])).unwrap();
        assert!(header.contains("#ifndef SPLASH_SCREEN_H"));
        assert!(header.contains("const uint16_t epd_bitmap_[] PROGMEM = {"));
        assert!(header.ends_with("#endif // SPLASH_SCREEN_H\n"));
    }
}
