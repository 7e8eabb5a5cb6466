//! Hex image format for assembled programs.
//!
//! An image is a plain text file:
//! - One instruction (or chunk of raw bytes) per line
//! - Bytes written as two hex digits, separated by whitespace
//! - Everything after `;` is a comment
//! - Blank lines are ignored

use crate::asm::assembler::Listing;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// Raw bytes per line when no listing is available.
const BYTES_PER_LINE: usize = 16;

/// A loaded hex image.
///
/// Bytes, line lengths and comments are only changed together through
/// [`push`](ImageFile::push), so every line always covers its own bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageFile {
    bytes: Vec<u8>,
    /// One comment per line of bytes (may be empty).
    source_lines: Vec<String>,
    chunks: Vec<usize>,
}

impl ImageFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one line of bytes with its comment.
    pub fn push(&mut self, bytes: &[u8], source: &str) {
        self.bytes.extend_from_slice(bytes);
        self.chunks.push(bytes.len());
        self.source_lines.push(source.to_string());
    }

    /// Build an image with one line per assembled instruction.
    pub fn from_listing(listing: &Listing) -> Self {
        let mut image = Self::new();
        for entry in &listing.entries {
            image.push(listing.bytes_of(entry), &format!("{} {}", entry.mode, entry.source));
        }
        image
    }

    /// Build an image from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut image = Self::new();
        for chunk in bytes.chunks(BYTES_PER_LINE) {
            image.push(chunk, "");
        }
        image
    }

    /// The program bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Comment of each line, in order.
    pub fn source_lines(&self) -> &[String] {
        &self.source_lines
    }

    /// Each line as its offset, bytes and comment.
    pub fn lines(&self) -> impl Iterator<Item = (usize, &[u8], &str)> + '_ {
        let mut offset = 0;
        self.chunks.iter().zip(&self.source_lines).map(move |(&len, comment)| {
            let line = (offset, &self.bytes[offset..offset + len], comment.as_str());
            offset += len;
            line
        })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Parse image text.
pub fn parse_image(text: &str) -> Result<ImageFile, ImageError> {
    let mut image = ImageFile::new();

    for (line_num, line) in text.lines().enumerate() {
        let (data, comment) = match line.split_once(';') {
            Some((data, comment)) => (data.trim(), comment.trim()),
            None => (line.trim(), ""),
        };
        if data.is_empty() {
            continue;
        }

        let bytes = data
            .split_whitespace()
            .map(|token| parse_byte(token))
            .collect::<Option<Vec<u8>>>()
            .ok_or_else(|| ImageError::Parse {
                line: line_num + 1,
                message: format!("expected hex bytes, found '{}'", data),
            })?;

        image.push(&bytes, comment);
    }

    Ok(image)
}

fn parse_byte(token: &str) -> Option<u8> {
    if token.len() != 2 {
        return None;
    }
    u8::from_str_radix(token, 16).ok()
}

/// Render an image as text.
pub fn render_image(image: &ImageFile) -> String {
    let mut out = String::new();
    out.push_str("; duet hex image\n");
    out.push_str(&format!("; {} bytes\n\n", image.len()));

    for (offset, bytes, comment) in image.lines() {
        let hex: Vec<String> = bytes.iter().map(|b| format!("{:02X}", b)).collect();
        if comment.is_empty() {
            out.push_str(&format!("{:<12} ; {:04X}\n", hex.join(" "), offset));
        } else {
            out.push_str(&format!("{:<12} ; {:04X} {}\n", hex.join(" "), offset, comment));
        }
    }

    out
}

/// Load an image file from disk.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<ImageFile, ImageError> {
    let text = std::fs::read_to_string(path.as_ref())
        .map_err(|e| ImageError::Io(e.to_string()))?;
    parse_image(&text)
}

/// Save an image file to disk.
pub fn save_image<P: AsRef<Path>>(path: P, image: &ImageFile) -> Result<(), ImageError> {
    let mut file = std::fs::File::create(path.as_ref())
        .map_err(|e| ImageError::Io(e.to_string()))?;
    file.write_all(render_image(image).as_bytes())
        .map_err(|e| ImageError::Io(e.to_string()))
}

/// Errors that can occur during image operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },
}
