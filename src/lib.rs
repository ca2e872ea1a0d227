//! # jem
//!
//! Content plumbing for ebook tooling: a uniform way to address and stream
//! bytes regardless of where they live, and a write-back buffer cache for
//! random-access stores.
//!
//! ## Features
//!
//! - [`ContentHandle`] over files, ZIP entries, byte ranges of a larger
//!   store, remote URLs, or memory
//! - MIME detection from file extensions with a runtime-extensible table
//! - [`BufferedStore`], a single-window write-back cache that turns
//!   byte-at-a-time access into block-aligned I/O
//! - [`RangeStream`], a bounded read view over part of a store
//! - [`TextHandle`] for literal text or content decoded on demand
//!
//! ## Quick Start
//!
//! ```no_run
//! use jem::{Archive, ContentHandle, TextHandle};
//!
//! let archive = Archive::open("book.epub").unwrap();
//! let chapter = ContentHandle::archive_entry(&archive, "OEBPS/ch1.xhtml", None).unwrap();
//! assert_eq!(chapter.mime(), "application/xhtml+xml");
//!
//! let text = TextHandle::backed(chapter, "utf-8", jem::text::HTML);
//! println!("{}", text.string().unwrap());
//! ```
//!
//! ## Buffered Stores
//!
//! ```
//! use jem::io::{BufferedStore, RangeStream};
//! use std::io::Read;
//!
//! let mut store = BufferedStore::with_window_bits(b"hello".to_vec(), 4).unwrap();
//! for &b in b", world" {
//!     store.append(b).unwrap();
//! }
//! assert_eq!(store.length().unwrap(), 12);
//!
//! let mut range = RangeStream::new(&mut store, 7, 5).unwrap();
//! let mut word = String::new();
//! range.read_to_string(&mut word).unwrap();
//! assert_eq!(word, "world");
//! ```

pub mod content;
pub mod error;
pub mod io;
pub mod paths;
pub mod text;

pub use content::{Archive, ByteStream, ContentHandle, Source};
pub use error::{Error, ErrorKind, Result};
pub use io::{BufferedStore, RandomAccess, RangeStream, StoreRef};
pub use text::TextHandle;
