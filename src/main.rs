//! jem - inspect and extract content from files, archives, and byte ranges

use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use jem::io::{BufferedStore, DEFAULT_WINDOW_BITS, share};
use jem::{Archive, ContentHandle, TextHandle, paths};

#[derive(Parser)]
#[command(name = "jem")]
#[command(version, about = "Inspect and extract ebook content", long_about = None)]
#[command(after_help = "EXAMPLES:
    jem book.epub -e OEBPS/ch1.xhtml           Print a chapter from an EPUB
    jem book.mobi --offset 1024 --size 512 -i  Describe a byte range
    jem notes.txt --encoding gbk               Decode a GBK text file
    jem https://example.com/cover.jpg -i       Describe a remote resource")]
struct Cli {
    /// Input file or http(s) URL
    #[arg(value_name = "SOURCE")]
    source: String,

    /// Read a named entry inside a ZIP archive
    #[arg(short, long, value_name = "NAME", conflicts_with_all = ["offset", "size"])]
    entry: Option<String>,

    /// Start of a byte range inside the file
    #[arg(long, value_name = "BYTES")]
    offset: Option<u64>,

    /// Length of the byte range (defaults to the rest of the file)
    #[arg(long, value_name = "BYTES")]
    size: Option<u64>,

    /// Declared MIME type, overriding extension detection
    #[arg(short, long, value_name = "TYPE")]
    mime: Option<String>,

    /// Decode the content as text in this encoding
    #[arg(long, value_name = "LABEL")]
    encoding: Option<String>,

    /// Text kind tag used with --encoding
    #[arg(long, default_value = jem::text::PLAIN)]
    kind: String,

    /// Show a description instead of the content
    #[arg(short, long)]
    info: bool,

    /// Print --info output as JSON
    #[arg(long, requires = "info")]
    json: bool,

    /// Extra extension mapping, e.g. --register umd=application/umd
    #[arg(long, value_name = "EXT=MIME", value_parser = parse_mapping)]
    register: Vec<(String, String)>,

    /// Window size of the range buffer, as a power of two
    #[arg(long, default_value_t = DEFAULT_WINDOW_BITS)]
    window_bits: u32,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Serialize)]
struct Info<'a> {
    name: &'a str,
    mime: &'a str,
    descriptor: String,
    size: Option<u64>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "jem=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> jem::Result<()> {
    for (ext, mime) in &cli.register {
        paths::register_mime(ext, mime);
    }

    let handle = open_handle(cli)?;

    if cli.info {
        return show_info(&handle, cli.json);
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match &cli.encoding {
        Some(encoding) => {
            TextHandle::backed(handle, encoding.as_str(), cli.kind.as_str()).write_to(&mut out)?;
        }
        None => {
            handle.write_to(&mut out)?;
            out.flush()?;
        }
    }
    Ok(())
}

fn open_handle(cli: &Cli) -> jem::Result<ContentHandle> {
    let mime = cli.mime.as_deref();
    let source = cli.source.as_str();

    if source.starts_with("http://") || source.starts_with("https://") {
        return ContentHandle::remote(source, mime);
    }

    if let Some(entry) = &cli.entry {
        let archive = Archive::open(source)?;
        return ContentHandle::archive_entry(&archive, entry, mime);
    }

    if cli.offset.is_some() || cli.size.is_some() {
        let store = BufferedStore::open(source, false, cli.window_bits)?;
        let len = store.length()?;
        let offset = cli.offset.unwrap_or(0);
        let size = cli.size.unwrap_or_else(|| len.saturating_sub(offset));
        return ContentHandle::range(paths::file_name(source), share(store), offset, size, mime);
    }

    ContentHandle::file(source, mime)
}

fn show_info(handle: &ContentHandle, json: bool) -> jem::Result<()> {
    let info = Info {
        name: handle.name(),
        mime: handle.mime(),
        descriptor: handle.to_string(),
        size: handle.size_hint(),
    };

    if json {
        let rendered = serde_json::to_string_pretty(&info)
            .map_err(|e| jem::Error::Io(std::io::Error::other(e)))?;
        println!("{rendered}");
        return Ok(());
    }

    println!("Name: {}", info.name);
    println!("MIME: {}", info.mime);
    println!("Descriptor: {}", info.descriptor);
    match info.size {
        Some(size) => println!("Size: {size} bytes"),
        None => println!("Size: unknown"),
    }
    Ok(())
}

fn parse_mapping(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((ext, mime)) if !ext.is_empty() && !mime.is_empty() => {
            Ok((ext.to_string(), mime.to_string()))
        }
        _ => Err(format!("expected EXT=MIME, got '{s}'")),
    }
}
