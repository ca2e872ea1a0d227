//! Text values: literal strings or content decoded on demand.

use std::borrow::Cow;
use std::fmt;
use std::io::{self, Read, Write};

use encoding_rs::{CoderResult, Encoding};

use crate::content::{ContentHandle, initial_capacity};
use crate::error::{Error, Result};

/// Kind tag for plain text.
pub const PLAIN: &str = "plain";
/// Kind tag for HTML markup.
pub const HTML: &str = "html";

const CHUNK_SIZE: usize = 8 * 1024;

/// A piece of text, either held literally or decoded from content.
///
/// `Backed` text is never cached: every call decodes the content afresh,
/// so changes to the underlying bytes show up on the next call.
#[derive(Debug, Clone)]
pub enum TextHandle {
    Literal {
        text: String,
        kind: String,
    },
    Backed {
        content: ContentHandle,
        encoding: String,
        kind: String,
    },
}

impl TextHandle {
    pub fn literal(text: impl Into<String>, kind: impl Into<String>) -> Self {
        TextHandle::Literal {
            text: text.into(),
            kind: kind.into(),
        }
    }

    /// Text decoded from `content` under the encoding labelled `encoding`
    /// (any WHATWG label, e.g. `utf-8`, `gbk`, `windows-1252`).
    pub fn backed(content: ContentHandle, encoding: impl Into<String>, kind: impl Into<String>) -> Self {
        TextHandle::Backed {
            content,
            encoding: encoding.into(),
            kind: kind.into(),
        }
    }

    pub fn empty(kind: impl Into<String>) -> Self {
        Self::literal(String::new(), kind)
    }

    /// Content classification tag, such as [`PLAIN`] or [`HTML`].
    pub fn kind(&self) -> &str {
        match self {
            TextHandle::Literal { kind, .. } | TextHandle::Backed { kind, .. } => kind,
        }
    }

    pub fn encoding(&self) -> Option<&str> {
        match self {
            TextHandle::Literal { .. } => None,
            TextHandle::Backed { encoding, .. } => Some(encoding),
        }
    }

    /// The full text.
    pub fn string(&self) -> Result<Cow<'_, str>> {
        match self {
            TextHandle::Literal { text, .. } => Ok(Cow::Borrowed(text)),
            TextHandle::Backed {
                content, encoding, ..
            } => {
                let encoding = resolve_encoding(encoding)?;
                let mut text = String::with_capacity(initial_capacity(content.size_hint()));
                decode_stream(content.open_stream()?, encoding, |chunk| {
                    text.push_str(chunk);
                    Ok(())
                })?;
                Ok(Cow::Owned(text))
            }
        }
    }

    /// The text split on `\n`, `\r\n`, or `\r`. A trailing terminator does
    /// not produce an empty final line.
    pub fn lines(&self) -> Result<Vec<String>> {
        Ok(split_lines(&self.string()?))
    }

    /// Write the text to `sink` as UTF-8. Backed text is decoded in chunks
    /// and never held whole. Returns the number of bytes written.
    pub fn write_to<W: Write + ?Sized>(&self, sink: &mut W) -> Result<u64> {
        let written = match self {
            TextHandle::Literal { text, .. } => {
                sink.write_all(text.as_bytes())?;
                text.len() as u64
            }
            TextHandle::Backed {
                content, encoding, ..
            } => {
                let encoding = resolve_encoding(encoding)?;
                let mut written = 0u64;
                decode_stream(content.open_stream()?, encoding, |chunk| {
                    sink.write_all(chunk.as_bytes())?;
                    written += chunk.len() as u64;
                    Ok(())
                })?;
                written
            }
        };
        sink.flush()?;
        Ok(written)
    }
}

impl fmt::Display for TextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.string().map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

fn resolve_encoding(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| Error::UnsupportedEncoding(label.to_string()))
}

/// Decode `reader` chunk by chunk, handing each decoded piece to `emit`.
///
/// A BOM, if present, overrides `encoding`. Malformed sequences become
/// U+FFFD.
fn decode_stream<R, F>(mut reader: R, encoding: &'static Encoding, mut emit: F) -> Result<()>
where
    R: Read,
    F: FnMut(&str) -> Result<()>,
{
    let mut decoder = encoding.new_decoder();
    let mut input = vec![0u8; CHUNK_SIZE];
    let mut output = String::with_capacity(CHUNK_SIZE * 3);

    loop {
        let n = match reader.read(&mut input) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        let last = n == 0;
        let mut src = &input[..n];
        loop {
            let (result, read, _) = decoder.decode_to_string(src, &mut output, last);
            src = &src[read..];
            match result {
                CoderResult::InputEmpty => break,
                CoderResult::OutputFull => {
                    emit(&output)?;
                    output.clear();
                }
            }
        }
        if last {
            break;
        }
    }

    if !output.is_empty() {
        emit(&output)?;
    }
    Ok(())
}

fn split_lines(text: &str) -> Vec<String> {
    let bytes = text.as_bytes();
    let mut lines = Vec::new();
    let mut start = 0;
    for i in memchr::memchr2_iter(b'\n', b'\r', bytes) {
        if bytes[i] == b'\n' && i > 0 && bytes[i - 1] == b'\r' {
            // Second half of a CRLF pair.
            start = i + 1;
            continue;
        }
        lines.push(text[start..i].to_string());
        start = i + 1;
    }
    if start < bytes.len() {
        lines.push(text[start..].to_string());
    }
    lines
}
