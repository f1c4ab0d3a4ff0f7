//! Text filters for portal pages, stylesheets and pre-minified vendor libraries.

use regex::Regex;
use std::sync::OnceLock;

static LICENSE_BANNER: OnceLock<Regex> = OnceLock::new();
static LEADING_BLOCK_COMMENT: OnceLock<Regex> = OnceLock::new();
static SOURCE_MAP: OnceLock<Regex> = OnceLock::new();
static CSS_COMMENT: OnceLock<Regex> = OnceLock::new();
static WHITESPACE_RUN: OnceLock<Regex> = OnceLock::new();

fn compiled(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static pattern is valid"))
}

/// Remove a leading `/*! ... */` license banner and the whitespace after it.
pub fn strip_license_banner(src: &str) -> String {
    compiled(&LICENSE_BANNER, r"\A\s*/\*![\s\S]*?\*/\s*")
        .replace(src, "")
        .into_owned()
}

/// Remove a block comment at the very start of the file.
pub fn strip_leading_block_comment(src: &str) -> String {
    compiled(&LEADING_BLOCK_COMMENT, r"(?s)\A/\*.*?\*/\s*")
        .replace(src, "")
        .into_owned()
}

/// Remove a trailing source map reference.
///
/// Handles both the script form `//# sourceMappingURL=...` and the stylesheet
/// form `/*# sourceMappingURL=... */`.
pub fn strip_source_map(src: &str) -> String {
    compiled(
        &SOURCE_MAP,
        r"(?s)(?://\s*[#@]\s*sourceMappingURL=[^\n]*|/\*\s*[#@]\s*sourceMappingURL=.*?\*/)\s*\z",
    )
    .replace(src, "")
    .into_owned()
}

/// License header plus source map stripping used for bootstrap/popper builds.
pub fn strip_vendor_decorations(src: &str) -> String {
    strip_source_map(&strip_leading_block_comment(src))
}

/// Minify an HTML page: comments are dropped, optional attribute quotes and
/// insignificant whitespace removed, inline `<script>` and `<style>` minified.
pub fn minify_markup(src: &str) -> Vec<u8> {
    let cfg = minify_html::Cfg {
        minify_css: true,
        minify_js: true,
        ..Default::default()
    };
    minify_html::minify(src.as_bytes(), &cfg)
}

/// Basic stylesheet minification: drop comments, collapse whitespace, trim.
pub fn minify_css(src: &str) -> String {
    // a removed comment must not join `/` and `*` into a new one
    let without_comments = compiled(&CSS_COMMENT, r"(?s)/\*.*?\*/").replace_all(src, " ");
    compiled(&WHITESPACE_RUN, r"\s+")
        .replace_all(&without_comments, " ")
        .trim()
        .to_string()
}
