//! Integration tests for the fwgen binary
//!
//! Each test builds a scratch project in a temp dir and runs the compiled
//! binary against it, the same way the build tool does.

use image::{Rgb, RgbImage};
use std::path::Path;
use std::process::{Command, Output};
use tempfile::tempdir;

/// Run fwgen in `dir` with a clean build environment plus `env`.
fn fwgen(dir: &Path, args: &[&str], env: &[(&str, &str)]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_fwgen"));
    cmd.current_dir(dir)
        .args(args)
        .env_remove("PIOENV")
        .env_remove("PROJECT_DIR")
        .env_remove("BUILD_FLAGS");
    for (key, value) in env {
        cmd.env(key, value);
    }
    cmd.output().expect("Failed to run fwgen")
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "fwgen failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

fn write_png(path: &Path, width: u32, height: u32) {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).unwrap();
    }
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 3) as u8, (y * 2) as u8, ((x + y) % 256) as u8])
    });
    img.save(path).expect("Failed to write PNG");
}

/// Bytes of the `uint8_t` array named `symbol` in a generated header.
fn array_bytes(header: &str, symbol: &str) -> Vec<u8> {
    let open = format!("const uint8_t {}[] PROGMEM = {{", symbol);
    let start = header.find(&open).expect("array not found") + open.len();
    let end = start + header[start..].find("};").unwrap();
    header[start..end]
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| u8::from_str_radix(s.trim_start_matches("0x"), 16).unwrap())
        .collect()
}

fn gunzip(member: &[u8]) -> Vec<u8> {
    assert_eq!(&member[..3], &[0x1F, 0x8B, 0x08]);
    let body = &member[10..member.len() - 8];
    let data = miniz_oxide::inflate::decompress_to_vec(body).expect("invalid deflate stream");
    let crc = u32::from_le_bytes(member[member.len() - 8..member.len() - 4].try_into().unwrap());
    assert_eq!(crc, crc32fast::hash(&data));
    data
}

#[test]
fn test_splash_two_pixels() {
    let dir = tempdir().expect("Failed to create temp dir");
    let mut img = RgbImage::new(2, 1);
    img.put_pixel(0, 0, Rgb([255, 0, 0]));
    img.put_pixel(1, 0, Rgb([0, 255, 0]));
    img.save(dir.path().join("tiny.png")).unwrap();

    let output = fwgen(dir.path(), &["splash", "tiny.png", "out/splash.h"], &[]);
    assert_success(&output);

    let header = std::fs::read_to_string(dir.path().join("out/splash.h")).unwrap();
    assert!(header.contains("#define SPLASH_WIDTH  2\n"));
    assert!(header.contains("#define SPLASH_HEIGHT 1\n"));
    assert!(header.contains("#define SPLASH_SIZE   4\n"));
    assert!(header.contains("const uint16_t epd_bitmap_[] PROGMEM = {\n  0xF800, 0x07E0\n};\n"));
    assert!(header.contains(" * Generated from tiny.png\n"));
    assert!(header.contains(" * Target display: CUSTOM\n"));
}

#[test]
fn test_splash_is_idempotent() {
    let dir = tempdir().expect("Failed to create temp dir");
    write_png(&dir.path().join("splash.png"), 80, 160);

    assert_success(&fwgen(dir.path(), &["splash", "splash.png", "a.h"], &[]));
    assert_success(&fwgen(dir.path(), &["splash", "splash.png", "b.h"], &[]));

    let a = std::fs::read(dir.path().join("a.h")).unwrap();
    let b = std::fs::read(dir.path().join("b.h")).unwrap();
    assert_eq!(a, b);
    let text = String::from_utf8(a).unwrap();
    assert!(text.contains("Target display: ST7735"));
    let body = &text[text.find("PROGMEM = {").unwrap()..];
    assert_eq!(body.matches("0x").count(), 80 * 160);
}

#[test]
fn test_splash_explicit_display_mismatch_still_succeeds() {
    let dir = tempdir().expect("Failed to create temp dir");
    write_png(&dir.path().join("wide.png"), 160, 80);

    let output = fwgen(dir.path(), &["splash", "wide.png", "s.h", "st7789"], &[]);
    assert_success(&output);
    let header = std::fs::read_to_string(dir.path().join("s.h")).unwrap();
    assert!(header.contains("Target display: ST7789"));
    assert!(String::from_utf8_lossy(&output.stderr).contains("240x240"));
}

#[test]
fn test_splash_missing_input_fails() {
    let dir = tempdir().expect("Failed to create temp dir");
    let output = fwgen(dir.path(), &["splash", "absent.png", "out.h"], &[]);
    assert_eq!(output.status.code(), Some(1));
    assert!(!dir.path().join("out.h").exists());
}

#[test]
fn test_splash_unknown_display_rejected() {
    let dir = tempdir().expect("Failed to create temp dir");
    write_png(&dir.path().join("splash.png"), 4, 4);
    let output = fwgen(dir.path(), &["splash", "splash.png", "out.h", "ili9341"], &[]);
    assert!(!output.status.success());
}

#[test]
fn test_bundle_single_script() {
    let dir = tempdir().expect("Failed to create temp dir");
    std::fs::create_dir(dir.path().join("data")).unwrap();
    std::fs::write(dir.path().join("data/app.js"), "var x=1;").unwrap();

    assert_success(&fwgen(dir.path(), &["bundle"], &[]));

    let header = std::fs::read_to_string(dir.path().join("include/webcontent.h")).unwrap();
    let bytes = array_bytes(&header, "app_js");
    assert_eq!(gunzip(&bytes), b"var x=1;");
    assert!(header.contains(&format!("{{ \"app.js\", app_js, {} }},", bytes.len())));
    assert_eq!(header.matches("{ \"").count(), 1);
    assert!(!header.contains("getPortalHTML"));
}

#[test]
fn test_bundle_portal() {
    let dir = tempdir().expect("Failed to create temp dir");
    let web = dir.path().join("web");
    std::fs::create_dir(&web).unwrap();
    std::fs::write(
        web.join("portal.html"),
        concat!(
            "<!DOCTYPE html>\n<html>\n  <!-- setup page -->\n  <body>\n",
            "    <h1>Setup</h1>\n    <script>\n      var ready = true;\n",
            "    </script>\n  </body>\n</html>\n",
        ),
    )
    .unwrap();
    std::fs::write(
        web.join("jquery-3.7.1.min.js"),
        "/*! jQuery v3.7.1 | (c) OpenJS Foundation */\n!function(e){}(window);",
    )
    .unwrap();
    std::fs::write(
        web.join("bootstrap.min.css"),
        concat!(
            "/*!\n * Bootstrap v5.3.3\n */:root{--bs-blue:#0d6efd}\n",
            "/*# sourceMappingURL=bootstrap.min.css.map */",
        ),
    )
    .unwrap();
    std::fs::write(web.join("style.css"), "/* theme */\nbody {\n  margin: 0;\n}\n").unwrap();
    std::fs::write(web.join("favicon.ico"), [0u8, 0, 1, 0, 1, 0]).unwrap();
    std::fs::write(web.join("notes.txt"), "not bundled").unwrap();

    let output = fwgen(
        dir.path(),
        &["bundle", "--src", "web", "--out", "gen/webcontent.h"],
        &[],
    );
    assert_success(&output);

    let header = std::fs::read_to_string(dir.path().join("gen/webcontent.h")).unwrap();

    let portal = array_bytes(&header, "portal_html");
    let page = String::from_utf8(portal.clone()).unwrap();
    assert!(page.contains("<h1>Setup</h1>"));
    assert!(page.contains("<script>"));
    assert!(!page.contains("setup page"));
    assert!(!page.contains("\n    "));
    assert!(header.contains(&format!(
        "return String((const char*)portal_html, {});",
        portal.len()
    )));

    let jquery = array_bytes(&header, "jquery_3_7_1_min_js");
    assert_eq!(gunzip(&jquery), b"!function(e){}(window);");

    let bootstrap = array_bytes(&header, "bootstrap_min_css");
    assert_eq!(gunzip(&bootstrap), b":root{--bs-blue:#0d6efd}\n");

    assert!(header.contains(
        "const char style_css[] PROGMEM = R\"fwgen(body { margin: 0; })fwgen\";"
    ));
    assert!(header.contains("{ \"style.css\", (const uint8_t*)style_css, 19 },"));

    assert_eq!(gunzip(&array_bytes(&header, "favicon_ico")), [0u8, 0, 1, 0, 1, 0]);
    assert!(!header.contains("notes"));

    // Index follows file name order
    let order: Vec<usize> = [
        "\"bootstrap.min.css\"",
        "\"favicon.ico\"",
        "\"jquery-3.7.1.min.js\"",
        "\"portal.html\"",
        "\"style.css\"",
    ]
    .iter()
    .map(|name| header.find(name).unwrap())
    .collect();
    assert!(order.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_bundle_failure_writes_nothing() {
    let dir = tempdir().expect("Failed to create temp dir");
    std::fs::create_dir(dir.path().join("data")).unwrap();
    std::fs::write(dir.path().join("data/a-b.js"), "var a;").unwrap();
    std::fs::write(dir.path().join("data/a_b.js"), "var b;").unwrap();

    let output = fwgen(dir.path(), &["bundle"], &[]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("a_b_js"));
    assert!(!dir.path().join("include/webcontent.h").exists());
}

#[test]
fn test_build_info_flags_and_counter() {
    let dir = tempdir().expect("Failed to create temp dir");
    std::fs::write(
        dir.path().join("fwgen.toml"),
        "[build]\nversion = \"v1.2\"\n",
    )
    .unwrap();
    let env = [("PIOENV", "esp32dev-st7735-debug")];

    let first = fwgen(dir.path(), &["build-info"], &env);
    assert_success(&first);
    let second = fwgen(dir.path(), &["build-info"], &env);
    assert_success(&second);

    let stdout = String::from_utf8(second.stdout).unwrap();
    let flags: Vec<&str> = stdout.lines().collect();
    assert_eq!(flags.len(), 7);
    assert!(flags.iter().all(|f| f.starts_with("-D")));
    assert!(stdout.contains("-DFIRMWARE_VERSION=\\\"v1.2\\\""));
    assert!(stdout.contains("-DBUILD_ENVIRONMENT=\\\"esp32dev-st7735-debug\\\""));
    // Same-day run (unless the test straddles midnight)
    assert!(
        stdout.contains("-DDAILY_BUILD_COUNT=1") || stdout.contains("-DDAILY_BUILD_COUNT=0")
    );

    let header = std::fs::read_to_string(dir.path().join("include/build_info.h")).unwrap();
    assert!(header.contains("#define FIRMWARE_VERSION \"v1.2\""));
    assert!(dir.path().join(".pio/build_counter.json").exists());
}

#[test]
fn test_archive() {
    let dir = tempdir().expect("Failed to create temp dir");
    std::fs::write(dir.path().join("firmware.bin"), b"\xE9firmware").unwrap();

    let debug = fwgen(
        dir.path(),
        &["archive", "firmware.bin"],
        &[("PIOENV", "esp32dev-st7735-debug")],
    );
    assert_success(&debug);
    assert!(!dir.path().join("firmware").exists());

    let production = fwgen(
        dir.path(),
        &["archive", "firmware.bin"],
        &[("PIOENV", "esp32dev-st7735-production")],
    );
    assert_success(&production);
    assert_eq!(
        std::fs::read(dir.path().join("firmware/esp32_ST7735_production.bin")).unwrap(),
        b"\xE9firmware"
    );
}

#[test]
fn test_archive_missing_firmware_fails() {
    let dir = tempdir().expect("Failed to create temp dir");
    let output = fwgen(
        dir.path(),
        &["archive", "nope.bin"],
        &[("PIOENV", "esp32s3-st7789-production")],
    );
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_hooks_full_build() {
    let project = tempdir().expect("Failed to create temp dir");
    let root = project.path();
    write_png(&root.join("test_images/splash_screen_80X160.png"), 80, 160);
    std::fs::create_dir(root.join("data")).unwrap();
    std::fs::write(root.join("data/portal.html"), "<html><body>ok</body></html>").unwrap();
    std::fs::write(root.join("build.bin"), b"image").unwrap();

    // Run from elsewhere; PROJECT_DIR locates the project
    let elsewhere = tempdir().expect("Failed to create temp dir");
    let root_str = root.to_str().unwrap();
    let env = [
        ("PIOENV", "esp32dev-st7735-production"),
        ("PROJECT_DIR", root_str),
    ];

    assert_success(&fwgen(elsewhere.path(), &["hook", "pre"], &env));
    let splash = root.join("include/splash_screen.h");
    assert!(splash.exists());
    assert!(root.join("include/webcontent.h").exists());
    assert!(root.join("include/build_info.h").exists());

    // Second run leaves the up-to-date splash header alone
    let before = std::fs::metadata(&splash).unwrap().modified().unwrap();
    let again = fwgen(elsewhere.path(), &["hook", "pre"], &env);
    assert_success(&again);
    assert!(String::from_utf8_lossy(&again.stderr).contains("already up to date"));
    assert_eq!(std::fs::metadata(&splash).unwrap().modified().unwrap(), before);

    let target = root.join("build.bin");
    assert_success(&fwgen(
        elsewhere.path(),
        &["hook", "post", "--target", target.to_str().unwrap()],
        &env,
    ));
    assert!(root.join("firmware/esp32_ST7735_production.bin").exists());
}

#[test]
fn test_build_info_flags_then_pre_hook_count_once() {
    let project = tempdir().expect("Failed to create temp dir");
    let root = project.path();
    write_png(&root.join("test_images/splash_screen_80X160.png"), 80, 160);
    std::fs::create_dir(root.join("data")).unwrap();
    std::fs::write(root.join("data/portal.html"), "<html><body>ok</body></html>").unwrap();
    let env = [("PIOENV", "esp32dev-st7735-debug")];

    let flags = fwgen(root, &["build-info"], &env);
    assert_success(&flags);
    let stdout = String::from_utf8(flags.stdout).unwrap();
    let count = stdout
        .lines()
        .find_map(|l| l.strip_prefix("-DDAILY_BUILD_COUNT="))
        .expect("no build count flag")
        .to_string();

    assert_success(&fwgen(root, &["hook", "pre"], &env));
    let header = std::fs::read_to_string(root.join("include/build_info.h")).unwrap();
    assert!(header.contains(&format!("#define DAILY_BUILD_COUNT {}\n", count)));
}

#[test]
fn test_hook_pre_missing_splash_image_fails() {
    let dir = tempdir().expect("Failed to create temp dir");
    std::fs::create_dir(dir.path().join("data")).unwrap();
    std::fs::write(dir.path().join("data/app.js"), "var x=1;").unwrap();

    let output = fwgen(
        dir.path(),
        &["hook", "pre"],
        &[("PIOENV", "esp32s3-st7789-production")],
    );
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("splash"));
}
