//! Path splitting and MIME classification by file extension.
//!
//! The extension table is process-wide. It is seeded from the bundled
//! `mime.properties` mapping on first use and can be extended at runtime
//! with [`register_mime`].

use std::collections::HashMap;
use std::sync::{LazyLock, PoisonError, RwLock};

/// MIME type reported when the extension is missing or unregistered.
pub const UNKNOWN_MIME: &str = "application/octet-stream";

const BUNDLED_MAPPING: &str = include_str!("mime.properties");

static MIME_TABLE: LazyLock<RwLock<HashMap<String, String>>> =
    LazyLock::new(|| RwLock::new(parse_properties(BUNDLED_MAPPING)));

/// Parse `key=value` (or `key:value`) lines, skipping blanks and `#`/`!` comments.
fn parse_properties(text: &str) -> HashMap<String, String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .filter_map(|line| {
            let (key, value) = line.split_once(['=', ':'])?;
            let key = key.trim();
            let value = value.trim();
            (!key.is_empty() && !value.is_empty())
                .then(|| (key.to_ascii_lowercase(), value.to_string()))
        })
        .collect()
}

/// Index of the last `/` or `\` in `path`.
fn separator_index(path: &str) -> Option<usize> {
    memchr::memrchr2(b'/', b'\\', path.as_bytes())
}

/// Final path component, including any extension.
pub fn file_name(path: &str) -> &str {
    match separator_index(path) {
        Some(i) => &path[i + 1..],
        None => path,
    }
}

/// Final path component with its extension removed.
pub fn base_name(path: &str) -> &str {
    let name = file_name(path);
    match name.rfind('.') {
        Some(i) if i > 0 => &name[..i],
        _ => name,
    }
}

/// Text after the last `.` of the final path component, or `""`.
///
/// A leading dot (as in `.hidden`) does not start an extension.
pub fn extension(path: &str) -> &str {
    let name = file_name(path);
    match name.rfind('.') {
        Some(i) if i > 0 => &name[i + 1..],
        _ => "",
    }
}

/// Map `extension` to `mime`, replacing any previous mapping.
pub fn register_mime(extension: &str, mime: &str) {
    let key = extension.trim_start_matches('.').to_ascii_lowercase();
    tracing::debug!(extension = %key, mime, "registered MIME mapping");
    MIME_TABLE
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(key, mime.to_string());
}

/// The registered MIME type for `extension`, if any.
pub fn lookup_mime(extension: &str) -> Option<String> {
    MIME_TABLE
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&extension.to_ascii_lowercase())
        .cloned()
}

/// Derive a MIME type from the extension of `name`.
///
/// Returns `""` for an empty name and [`UNKNOWN_MIME`] when the extension
/// is missing or unregistered.
pub fn mime_for(name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }
    let ext = extension(name);
    if ext.is_empty() {
        return UNKNOWN_MIME.to_string();
    }
    lookup_mime(ext).unwrap_or_else(|| UNKNOWN_MIME.to_string())
}

/// `declared` when it is non-empty, otherwise the MIME type derived from `name`.
pub fn mime_or_detect(name: &str, declared: Option<&str>) -> String {
    match declared {
        Some(mime) if !mime.is_empty() => mime.to_string(),
        _ => mime_for(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_parts() {
        assert_eq!(file_name("books/sci-fi/dune.epub"), "dune.epub");
        assert_eq!(file_name("C:\\books\\dune.epub"), "dune.epub");
        assert_eq!(file_name("dune.epub"), "dune.epub");
        assert_eq!(base_name("books/dune.tar.gz"), "dune.tar");
        assert_eq!(extension("books/dune.tar.gz"), "gz");
        assert_eq!(extension("books.d/README"), "");
        assert_eq!(extension(".hidden"), "");
        assert_eq!(base_name(".hidden"), ".hidden");
        assert_eq!(extension("trailing."), "");
    }

    #[test]
    fn test_bundled_mapping() {
        assert_eq!(mime_for("book.epub"), "application/epub+zip");
        assert_eq!(mime_for("OEBPS/Images/Cover.JPG"), "image/jpeg");
        assert_eq!(mime_for("chapter.xhtml"), "application/xhtml+xml");
    }

    #[test]
    fn test_unknown_and_empty() {
        assert_eq!(mime_for("book.xyz123"), UNKNOWN_MIME);
        assert_eq!(mime_for("README"), UNKNOWN_MIME);
        assert_eq!(mime_for(""), "");
    }

    #[test]
    fn test_declared_wins() {
        assert_eq!(mime_or_detect("book.epub", Some("text/x-custom")), "text/x-custom");
        assert_eq!(mime_or_detect("book.epub", Some("")), "application/epub+zip");
        assert_eq!(mime_or_detect("book.epub", None), "application/epub+zip");
    }

    #[test]
    fn test_register_mime() {
        assert_eq!(lookup_mime("jemtestfmt"), None);
        register_mime(".JemTestFmt", "application/x-jem-test");
        assert_eq!(mime_for("a/b/c.jemtestfmt"), "application/x-jem-test");
    }

    #[test]
    fn test_parse_properties() {
        let map = parse_properties("# comment\n\n! also\nA = x/y\nb:z/w\nbroken\n=nokey\n");
        assert_eq!(map.len(), 2);
        assert_eq!(map["a"], "x/y");
        assert_eq!(map["b"], "z/w");
    }
}
