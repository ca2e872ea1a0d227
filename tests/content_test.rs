//! Content handle behaviour across every source kind.

use std::io::{Cursor, Read, Write};

use jem::io::{BufferedStore, RandomAccess, share};
use jem::{Archive, ContentHandle, ErrorKind, Source, paths};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

fn build_epub() -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let stored = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    writer.start_file("mimetype", stored).unwrap();
    writer.write_all(b"application/epub+zip").unwrap();
    writer.start_file("OEBPS/Text/ch1.xhtml", deflated).unwrap();
    writer
        .write_all("<p>It was a dark and stormy night.</p>\n".repeat(200).as_bytes())
        .unwrap();
    writer.start_file("OEBPS/Images/cover.jpg", stored).unwrap();
    writer.write_all(&[0xFF, 0xD8, 0xFF, 0xE0]).unwrap();
    writer.finish().unwrap().into_inner()
}

fn write_epub(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("book.epub");
    std::fs::write(&path, build_epub()).unwrap();
    path
}

// ============================================================================
// File handles
// ============================================================================

#[test]
fn test_file_handle() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, b"line one\nline two\n").unwrap();

    let handle = ContentHandle::file(&path, None).unwrap();
    assert_eq!(handle.name(), path.to_string_lossy());
    assert_eq!(handle.mime(), "text/plain");
    assert_eq!(handle.bytes().unwrap(), b"line one\nline two\n");
    assert_eq!(handle.size_hint(), Some(18));

    let mut out = Vec::new();
    assert_eq!(handle.write_to(&mut out).unwrap(), 18);
    assert_eq!(out, b"line one\nline two\n");
    assert!(matches!(handle.source(), Source::File(_)));
}

#[test]
fn test_file_handle_missing_or_directory() {
    let dir = TempDir::new().unwrap();

    let err = ContentHandle::file(dir.path().join("missing.txt"), None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = ContentHandle::file(dir.path(), None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

// ============================================================================
// Archive entry handles
// ============================================================================

#[test]
fn test_archive_entries_from_disk() {
    let dir = TempDir::new().unwrap();
    let path = write_epub(&dir);
    let archive = Archive::open(&path).unwrap();

    let chapter = ContentHandle::archive_entry(&archive, "OEBPS/Text/ch1.xhtml", None).unwrap();
    assert_eq!(chapter.name(), "OEBPS/Text/ch1.xhtml");
    assert_eq!(chapter.mime(), "application/xhtml+xml");

    let expected = "<p>It was a dark and stormy night.</p>\n".repeat(200);
    assert_eq!(chapter.bytes().unwrap(), expected.as_bytes());
    assert_eq!(chapter.size_hint(), Some(expected.len() as u64));

    let mut sink = Vec::new();
    assert_eq!(chapter.write_to(&mut sink).unwrap(), expected.len() as u64);
    assert_eq!(sink, expected.as_bytes());

    let cover =
        ContentHandle::archive_entry(&archive, "OEBPS/Images/cover.jpg", None).unwrap();
    assert_eq!(cover.mime(), "image/jpeg");
    assert_eq!(cover.bytes().unwrap(), [0xFF, 0xD8, 0xFF, 0xE0]);
    assert_eq!(
        cover.to_string(),
        format!("zip://{}!OEBPS/Images/cover.jpg;mime=image/jpeg", path.to_string_lossy())
    );
}

#[test]
fn test_archive_entry_streams_are_independent() {
    let archive = Archive::from_bytes("book.epub", build_epub()).unwrap();
    let chapter = ContentHandle::archive_entry(&archive, "OEBPS/Text/ch1.xhtml", None).unwrap();

    let mut first = chapter.open_stream().unwrap();
    let mut second = chapter.open_stream().unwrap();
    let mut a = [0u8; 16];
    let mut b = [0u8; 16];
    first.read_exact(&mut a).unwrap();
    first.read_exact(&mut a).unwrap();
    second.read_exact(&mut b).unwrap();
    assert_eq!(&b, b"<p>It was a dark");
}

#[test]
fn test_archive_entry_missing() {
    let archive = Archive::from_bytes("book.epub", build_epub()).unwrap();
    let err = ContentHandle::archive_entry(&archive, "OEBPS/Text/ch9.xhtml", None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_closed_archive_invalidates_handles() {
    let archive = Archive::from_bytes("book.epub", build_epub()).unwrap();
    let chapter = ContentHandle::archive_entry(&archive, "OEBPS/Text/ch1.xhtml", None).unwrap();
    let mimetype = ContentHandle::archive_entry(&archive, "mimetype", None).unwrap();

    archive.close();

    for handle in [&chapter, &mimetype] {
        assert_eq!(handle.open_stream().err().unwrap().kind(), ErrorKind::InvalidState);
        assert_eq!(handle.bytes().unwrap_err().kind(), ErrorKind::InvalidState);
        assert_eq!(
            handle.write_to(&mut Vec::<u8>::new()).unwrap_err().kind(),
            ErrorKind::InvalidState
        );
    }
    // Name and MIME stay available on a stale handle.
    assert_eq!(chapter.mime(), "application/xhtml+xml");

    let err = ContentHandle::archive_entry(&archive, "mimetype", None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
}

// ============================================================================
// Range handles
// ============================================================================

#[test]
fn test_range_handle_over_buffered_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("book.pmab");
    std::fs::write(&path, b"MAGIC\x00\x00\x00cover-bytes-here\x00rest").unwrap();

    let store = share(BufferedStore::open(&path, false, 4).unwrap());
    let cover = ContentHandle::range("cover.png", store.clone(), 8, 16, None).unwrap();
    let magic = ContentHandle::range("magic", store, 0, 5, Some("text/plain")).unwrap();

    assert_eq!(cover.mime(), "image/png");
    assert_eq!(cover.bytes().unwrap(), b"cover-bytes-here");
    assert_eq!(magic.bytes().unwrap(), b"MAGIC");

    let mut out = Vec::new();
    cover.write_to(&mut out).unwrap();
    assert_eq!(out, b"cover-bytes-here");
}

#[test]
fn test_range_handle_rejects_overflow() {
    let store = share(vec![0u8; 32]);
    let err = ContentHandle::range("x", store, 30, 3, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OutOfRange);
}

#[test]
fn test_range_handle_fails_after_store_shrinks() {
    let store = share(vec![7u8; 10]);
    let handle = ContentHandle::range("blob", store.clone(), 0, 10, None).unwrap();
    assert_eq!(handle.bytes().unwrap(), [7u8; 10]);

    store.borrow_mut().set_len(5).unwrap();
    assert_eq!(handle.bytes().unwrap_err().kind(), ErrorKind::OutOfRange);
    assert_eq!(
        handle.write_to(&mut Vec::<u8>::new()).unwrap_err().kind(),
        ErrorKind::OutOfRange
    );
    assert_eq!(handle.open_stream().err().unwrap().kind(), ErrorKind::OutOfRange);
}

// ============================================================================
// MIME derivation
// ============================================================================

#[test]
fn test_mime_resolution() {
    let epub = ContentHandle::memory("book.epub", b"PK".to_vec(), None);
    assert_eq!(epub.mime(), "application/epub+zip");

    let unknown = ContentHandle::memory("book.xyz123", b"??".to_vec(), None);
    assert_eq!(unknown.mime(), paths::UNKNOWN_MIME);

    let declared = ContentHandle::memory("book.epub", b"PK".to_vec(), Some("application/zip"));
    assert_eq!(declared.mime(), "application/zip");
}

#[test]
fn test_runtime_registration() {
    paths::register_mime("jemumd", "application/umd");
    let handle = ContentHandle::memory("novel.JEMUMD", b"x".to_vec(), None);
    assert_eq!(handle.mime(), "application/umd");
}
