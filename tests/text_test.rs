//! Backed text re-reads its content on every access.

use jem::io::{BufferedStore, RandomAccess, share};
use jem::text::{HTML, PLAIN};
use jem::{ContentHandle, ErrorKind, TextHandle};
use tempfile::TempDir;

#[test]
fn test_backed_file_text_sees_rewrites() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("chapter.txt");
    std::fs::write(&path, "first draft\n").unwrap();

    let text = TextHandle::backed(ContentHandle::file(&path, None).unwrap(), "utf-8", PLAIN);
    assert_eq!(text.string().unwrap(), "first draft\n");

    std::fs::write(&path, "second draft\nwith more\n").unwrap();
    assert_eq!(text.string().unwrap(), "second draft\nwith more\n");
    assert_eq!(text.lines().unwrap(), ["second draft", "with more"]);
}

#[test]
fn test_backed_range_text_sees_store_writes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("book.bin");
    std::fs::write(&path, b"HDR<p>old</p>TAIL").unwrap();

    let store = share(BufferedStore::open(&path, true, 3).unwrap());
    let content = ContentHandle::range("body.html", store.clone(), 3, 10, None).unwrap();
    let text = TextHandle::backed(content, "utf-8", HTML);
    assert_eq!(text.string().unwrap(), "<p>old</p>");
    assert_eq!(text.kind(), HTML);

    store.borrow_mut().write_at(6, b"new").unwrap();
    assert_eq!(text.string().unwrap(), "<p>new</p>");

    let mut out = Vec::new();
    assert_eq!(text.write_to(&mut out).unwrap(), 10);
    assert_eq!(out, b"<p>new</p>");
}

#[test]
fn test_backed_text_detects_bom() {
    let mut data = vec![0xFF, 0xFE];
    for unit in "hi\r\nthere".encode_utf16() {
        data.extend_from_slice(&unit.to_le_bytes());
    }
    let text = TextHandle::backed(ContentHandle::memory("a.txt", data, None), "utf-8", PLAIN);
    assert_eq!(text.lines().unwrap(), ["hi", "there"]);
}

#[test]
fn test_backed_text_missing_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("gone.txt");
    std::fs::write(&path, "here for now").unwrap();
    let text = TextHandle::backed(ContentHandle::file(&path, None).unwrap(), "utf-8", PLAIN);

    std::fs::remove_file(&path).unwrap();
    let err = text.string().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_literal_display() {
    let text = TextHandle::literal("<b>bold</b>", HTML);
    assert_eq!(text.to_string(), "<b>bold</b>");
    assert_eq!(TextHandle::empty(PLAIN).to_string(), "");
}
