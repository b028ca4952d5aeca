//! Delimited-text dialects shared by import, export and the bulk loader.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Caller-supplied dialect hints, as collected from an import form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DialectHints {
    pub delimiter: String,
    pub other_delimiter: String,
    pub quote_character: String,
    pub other_quote_character: String,
    pub has_header: bool,
}

/// A resolved dialect: single-byte delimiter and quote, plus the header flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    pub delimiter: u8,
    pub quote: u8,
    pub has_header: bool,
}

impl Default for Dialect {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
            has_header: true,
        }
    }
}

impl Dialect {
    /// Resolves hints: an empty primary value falls back to the paired "other"
    /// value, then escape notation is decoded into a single character.
    pub fn resolve(hints: &DialectHints) -> Result<Self> {
        let delimiter = pick(&hints.delimiter, &hints.other_delimiter, "delimiter")?;
        let quote = pick(
            &hints.quote_character,
            &hints.other_quote_character,
            "quote character",
        )?;

        let delimiter = single_ascii(&decode_escapes(delimiter)?, "delimiter")?;
        let quote = single_ascii(&decode_escapes(quote)?, "quote character")?;

        if delimiter == quote {
            return Err(Error::InvalidDialect(
                "delimiter and quote character must differ".to_string(),
            ));
        }

        Ok(Self {
            delimiter,
            quote,
            has_header: hints.has_header,
        })
    }

    /// A reader that yields every row, including the header, as a record.
    pub fn reader<R: Read>(&self, source: R) -> csv::Reader<R> {
        csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .quote(self.quote)
            .has_headers(false)
            .from_reader(source)
    }

    pub fn writer<W: Write>(&self, sink: W) -> csv::Writer<W> {
        csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .quote(self.quote)
            .from_writer(sink)
    }
}

fn pick<'a>(primary: &'a str, fallback: &'a str, what: &str) -> Result<&'a str> {
    if !primary.is_empty() {
        return Ok(primary);
    }
    if !fallback.is_empty() {
        return Ok(fallback);
    }
    Err(Error::InvalidDialect(format!("no {what} given")))
}

fn single_ascii(decoded: &str, what: &str) -> Result<u8> {
    let mut chars = decoded.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii() => Ok(c as u8),
        _ => Err(Error::InvalidDialect(format!(
            "{what} must be a single ASCII character, got {decoded:?}"
        ))),
    }
}

/// Decodes backslash escape notation (`\t`, `\n`, `\xHH`, ...) into literal
/// characters. Text without backslashes is returned unchanged.
pub fn decode_escapes(raw: &str) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let decoded = match chars.next() {
            Some('t') => '\t',
            Some('n') => '\n',
            Some('r') => '\r',
            Some('0') => '\0',
            Some('a') => '\x07',
            Some('b') => '\x08',
            Some('f') => '\x0c',
            Some('v') => '\x0b',
            Some('\\') => '\\',
            Some('\'') => '\'',
            Some('"') => '"',
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                u8::from_str_radix(&hex, 16)
                    .ok()
                    .filter(|_| hex.len() == 2)
                    .map(char::from)
                    .ok_or_else(|| {
                        Error::InvalidDialect(format!("invalid hex escape \\x{hex}"))
                    })?
            }
            // Unknown escapes are kept literally.
            Some(other) => {
                out.push('\\');
                other
            }
            None => '\\',
        };
        out.push(decoded);
    }

    Ok(out)
}

/// Decodes one field: UTF-8 when valid, ISO-8859-1 otherwise.
#[must_use]
pub fn decode_field(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}
