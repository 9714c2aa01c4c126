//! Memory image loaders for the backing store.
//!
//! Two encodings are accepted: one hex byte per line (as written by the
//! hexify scripts, `//` lines are comments) and a raw little-endian binary.

use camino::Utf8Path;
use clap::ValueEnum;
use eyre::{Result, WrapErr};
use std::fs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ImageFormat {
    Hex,
    Bin,
}

impl ImageFormat {
    /// `.hex` and `.txt` are text images, everything else is raw binary.
    pub fn from_path(path: &Utf8Path) -> Self {
        match path.extension() {
            Some("hex") | Some("txt") => ImageFormat::Hex,
            _ => ImageFormat::Bin,
        }
    }
}

/// Parse a hex image. Stops at the first blank or unparsable line.
pub fn parse_hex(text: &str) -> Vec<u8> {
    let mut bytes = Vec::new();
    for line in text.lines() {
        let Some(token) = line.split_whitespace().next() else {
            break;
        };
        if token == "//" {
            continue;
        }
        match u8::from_str_radix(token, 16) {
            Ok(byte) => bytes.push(byte),
            Err(_) => break,
        }
    }
    bytes
}

/// Read fixed-width little-endian words until the input runs out.
///
/// A trailing partial word is kept, its missing high bytes are zero.
pub fn parse_bin(raw: &[u8], word_bytes: usize) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(raw.len().next_multiple_of(word_bytes));
    for chunk in raw.chunks(word_bytes) {
        let mut word = [0u8; 8];
        word[..chunk.len()].copy_from_slice(chunk);
        let value = u64::from_le_bytes(word);
        bytes.extend_from_slice(&value.to_le_bytes()[..word_bytes]);
    }
    bytes
}

pub fn load_image(path: &Utf8Path, format: ImageFormat, word_bytes: usize) -> Result<Vec<u8>> {
    let bytes = match format {
        ImageFormat::Hex => {
            let text = fs::read_to_string(path)
                .wrap_err_with(|| format!("Failed to read hex image {path}"))?;
            parse_hex(&text)
        }
        ImageFormat::Bin => {
            let raw =
                fs::read(path).wrap_err_with(|| format!("Failed to read binary image {path}"))?;
            parse_bin(&raw, word_bytes)
        }
    };
    log::info!("loaded {} bytes from {path} ({format:?})", bytes.len());
    Ok(bytes)
}
