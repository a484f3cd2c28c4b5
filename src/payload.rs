//! JSON payload validation and canonical encoding.
//!
//! Payloads are stored in a single canonical form (sorted keys, 4-space indentation, ASCII
//! only) so that deploying the same document twice writes byte-identical node values.
//! Numbers keep their source text, so integers wider than 64 bits survive unchanged.

use serde::Serialize;
use serde_json::ser::{Formatter, PrettyFormatter, Serializer};
use std::io;
use std::path::{Path, PathBuf};

const INDENT: &[u8] = b"    ";

#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid JSON payload: {0}")]
    InvalidFormat(#[from] serde_json::Error),
}

/// Pretty printer that escapes everything outside printable ASCII as `\uXXXX`.
struct AsciiFormatter<'a> {
    pretty: PrettyFormatter<'a>,
}

impl Formatter for AsciiFormatter<'_> {
    fn write_string_fragment<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        fragment: &str,
    ) -> io::Result<()> {
        let mut start = 0;
        for (idx, ch) in fragment.char_indices() {
            if (' '..='~').contains(&ch) {
                continue;
            }
            writer.write_all(&fragment.as_bytes()[start..idx])?;
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{:04x}", unit)?;
            }
            start = idx + ch.len_utf8();
        }
        writer.write_all(&fragment.as_bytes()[start..])
    }

    fn begin_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.begin_array(writer)
    }

    fn end_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.end_array(writer)
    }

    fn begin_array_value<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.pretty.begin_array_value(writer, first)
    }

    fn end_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.end_array_value(writer)
    }

    fn begin_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.begin_object(writer)
    }

    fn end_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.end_object(writer)
    }

    fn begin_object_key<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.pretty.begin_object_key(writer, first)
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.begin_object_value(writer)
    }

    fn end_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.end_object_value(writer)
    }
}

/// Parses `text` as JSON and re-encodes it canonically.
///
/// Object keys come out sorted because `serde_json::Map` is ordered by key unless the
/// `preserve_order` feature is enabled, which this crate does not do.
pub fn canonicalize(text: &str) -> Result<Vec<u8>, PayloadError> {
    let value: serde_json::Value = serde_json::from_str(text.trim_end())?;

    let mut out = Vec::new();
    let formatter = AsciiFormatter {
        pretty: PrettyFormatter::with_indent(INDENT),
    };
    let mut serializer = Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut serializer)?;
    Ok(out)
}

/// Reads a JSON document from `path` and returns its canonical encoding.
pub fn read_canonical(path: &Path) -> Result<Vec<u8>, PayloadError> {
    let text = std::fs::read_to_string(path).map_err(|source| PayloadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    canonicalize(&text)
}

/// `clap` value parser for `--values`.
pub fn parse_json_arg(raw: &str) -> Result<String, String> {
    let bytes = canonicalize(raw).map_err(|e| e.to_string())?;
    String::from_utf8(bytes).map_err(|e| e.to_string())
}
