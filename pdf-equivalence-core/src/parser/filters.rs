//! PDF Stream Filters
//!
//! Handles decompression and decoding of PDF streams according to ISO 32000-1 Section 7.4.
//! Image-only filters (DCT, JPX, CCITT, JBIG2) are recognised but never decoded: only
//! image metadata is read from the document.

use super::objects::{PdfDictionary, PdfObject};
use crate::error::{LoadError, Result};

#[cfg(feature = "compression")]
use flate2::read::ZlibDecoder;
#[cfg(feature = "compression")]
use std::io::Read;
use weezl::{decode::Decoder as LzwDecoder, BitOrder, LzwStatus};

/// Supported PDF filters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    /// ASCII hex decode
    ASCIIHexDecode,

    /// ASCII 85 decode
    ASCII85Decode,

    /// LZW decode
    LZWDecode,

    /// Flate decode (zlib/deflate compression)
    FlateDecode,

    /// Run length decode
    RunLengthDecode,

    /// CCITT fax decode
    CCITTFaxDecode,

    /// JBIG2 decode
    JBIG2Decode,

    /// DCT decode (JPEG)
    DCTDecode,

    /// JPX decode (JPEG 2000)
    JPXDecode,

    /// Crypt filter
    Crypt,
}

impl Filter {
    /// Parse filter from name, accepting the abbreviations allowed in inline images
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ASCIIHexDecode" | "AHx" => Some(Filter::ASCIIHexDecode),
            "ASCII85Decode" | "A85" => Some(Filter::ASCII85Decode),
            "LZWDecode" | "LZW" => Some(Filter::LZWDecode),
            "FlateDecode" | "Fl" => Some(Filter::FlateDecode),
            "RunLengthDecode" | "RL" => Some(Filter::RunLengthDecode),
            "CCITTFaxDecode" | "CCF" => Some(Filter::CCITTFaxDecode),
            "JBIG2Decode" => Some(Filter::JBIG2Decode),
            "DCTDecode" | "DCT" => Some(Filter::DCTDecode),
            "JPXDecode" => Some(Filter::JPXDecode),
            "Crypt" => Some(Filter::Crypt),
            _ => None,
        }
    }
}

/// Filter names of a stream dictionary in application order
pub fn filter_names(dict: &PdfDictionary) -> Vec<String> {
    match dict.get("Filter") {
        Some(PdfObject::Name(name)) => vec![name.as_str().to_string()],
        Some(PdfObject::Array(array)) => array
            .iter()
            .filter_map(|obj| obj.as_name().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

/// Decode parameters matching each filter position
fn decode_parms(dict: &PdfDictionary, count: usize) -> Vec<Option<&PdfDictionary>> {
    let mut parms = match dict.get("DecodeParms").or_else(|| dict.get("DP")) {
        Some(PdfObject::Dictionary(d)) => vec![Some(d)],
        Some(PdfObject::Array(array)) => array.iter().map(PdfObject::as_dict).collect(),
        _ => Vec::new(),
    };
    parms.resize(count, None);
    parms
}

/// Decode stream data according to the `/Filter` and `/DecodeParms` entries of `dict`.
///
/// Filter entries must already be direct objects. Output of any filter stage larger
/// than `max_size` bytes is a [`LoadError::StreamDecode`].
pub fn decode_stream(data: &[u8], dict: &PdfDictionary, max_size: usize) -> Result<Vec<u8>> {
    let filters = match dict.get("Filter") {
        None | Some(PdfObject::Null) => return Ok(data.to_vec()),
        Some(PdfObject::Name(_)) | Some(PdfObject::Array(_)) => filter_names(dict),
        Some(other) => {
            return Err(LoadError::StreamDecode(format!(
                "Invalid Filter type: {other:?}"
            )))
        }
    };

    let parms = decode_parms(dict, filters.len());
    let mut result = data.to_vec();
    for (name, parms) in filters.iter().zip(parms) {
        let filter = Filter::from_name(name)
            .ok_or_else(|| LoadError::StreamDecode(format!("Unknown filter: {name}")))?;
        result = apply_filter(&result, filter, parms, max_size)?;
        check_size(result.len(), max_size)?;
    }

    Ok(result)
}

/// Apply a single filter to data
fn apply_filter(
    data: &[u8],
    filter: Filter,
    parms: Option<&PdfDictionary>,
    max_size: usize,
) -> Result<Vec<u8>> {
    match filter {
        Filter::FlateDecode => {
            let inflated = decode_flate(data, max_size)?;
            apply_predictor(inflated, parms)
        }
        Filter::LZWDecode => {
            let early_change = parms
                .and_then(|p| p.get("EarlyChange"))
                .and_then(PdfObject::as_integer)
                .unwrap_or(1);
            let expanded = decode_lzw(data, early_change, max_size)?;
            apply_predictor(expanded, parms)
        }
        Filter::ASCIIHexDecode => decode_ascii_hex(data),
        Filter::ASCII85Decode => decode_ascii85(data),
        Filter::RunLengthDecode => Ok(decode_run_length(data)),
        _ => Err(LoadError::StreamDecode(format!(
            "Filter {filter:?} is not decoded"
        ))),
    }
}

fn check_size(size: usize, max_size: usize) -> Result<()> {
    if size > max_size {
        return Err(LoadError::StreamDecode(format!(
            "Decoded stream exceeds {max_size} bytes"
        )));
    }
    Ok(())
}

/// Decode FlateDecode (zlib/deflate) compressed data
#[cfg(feature = "compression")]
fn decode_flate(data: &[u8], max_size: usize) -> Result<Vec<u8>> {
    // One byte past the limit tells an oversized stream from one that fits exactly
    let limit = u64::try_from(max_size).unwrap_or(u64::MAX).saturating_add(1);
    let mut decoder = ZlibDecoder::new(data).take(limit);
    let mut result = Vec::new();
    let status = decoder.read_to_end(&mut result);
    check_size(result.len(), max_size)?;
    match status {
        Ok(_) => Ok(result),
        // Truncated streams are common; keep what was inflated
        Err(e) if !result.is_empty() => {
            tracing::warn!("Flate stream truncated after {} bytes: {}", result.len(), e);
            Ok(result)
        }
        Err(e) => Err(LoadError::StreamDecode(format!("Flate decode error: {e}"))),
    }
}

#[cfg(not(feature = "compression"))]
fn decode_flate(_data: &[u8], _max_size: usize) -> Result<Vec<u8>> {
    Err(LoadError::StreamDecode(
        "FlateDecode requires 'compression' feature".to_string(),
    ))
}

/// Decode LZW data (MSB first, 8-bit codes). Corrupt input yields the partial output.
///
/// `/EarlyChange 1` (the default) is the code-size switch TIFF uses.
fn decode_lzw(data: &[u8], early_change: i64, max_size: usize) -> Result<Vec<u8>> {
    let mut decoder = if early_change == 0 {
        LzwDecoder::new(BitOrder::Msb, 8)
    } else {
        LzwDecoder::with_tiff_size_switch(BitOrder::Msb, 8)
    };
    let mut output = Vec::new();
    let mut buffer = [0u8; 4096];
    let mut input = data;

    loop {
        let step = decoder.decode_bytes(input, &mut buffer);
        input = &input[step.consumed_in..];
        output.extend_from_slice(&buffer[..step.consumed_out]);
        check_size(output.len(), max_size)?;

        match step.status {
            Ok(LzwStatus::Ok) if step.consumed_in > 0 || step.consumed_out > 0 => {}
            Ok(_) => break,
            Err(e) => {
                tracing::debug!("LZW decode stopped early: {:?}", e);
                break;
            }
        }
    }
    Ok(output)
}

/// Decode ASCIIHexDecode data
fn decode_ascii_hex(data: &[u8]) -> Result<Vec<u8>> {
    let mut digits = Vec::with_capacity(data.len());
    for &ch in data {
        if ch == b'>' {
            break;
        }
        if super::lexer::is_whitespace(ch) {
            continue;
        }
        let value = hex_digit_value(ch).ok_or_else(|| {
            LoadError::StreamDecode(format!("Invalid hex digit: {}", ch as char))
        })?;
        digits.push(value);
    }
    if digits.len() % 2 == 1 {
        digits.push(0);
    }
    Ok(digits.chunks(2).map(|p| (p[0] << 4) | p[1]).collect())
}

fn hex_digit_value(ch: u8) -> Option<u8> {
    match ch {
        b'0'..=b'9' => Some(ch - b'0'),
        b'A'..=b'F' => Some(ch - b'A' + 10),
        b'a'..=b'f' => Some(ch - b'a' + 10),
        _ => None,
    }
}

/// Decode ASCII85Decode data
fn decode_ascii85(data: &[u8]) -> Result<Vec<u8>> {
    let mut body = data;
    if body.starts_with(b"<~") {
        body = &body[2..];
    }

    let mut result = Vec::with_capacity(body.len() * 4 / 5);
    let mut group = [0u8; 5];
    let mut filled = 0usize;

    for &c in body {
        match c {
            b'~' => break,
            b'z' if filled == 0 => result.extend_from_slice(&[0, 0, 0, 0]),
            b'!'..=b'u' => {
                group[filled] = c - b'!';
                filled += 1;
                if filled == 5 {
                    result.extend_from_slice(&ascii85_group_value(&group)?.to_be_bytes());
                    filled = 0;
                }
            }
            _ if super::lexer::is_whitespace(c) => {}
            _ => {
                return Err(LoadError::StreamDecode(format!(
                    "Invalid ASCII85 character: {}",
                    c as char
                )))
            }
        }
    }

    // A final partial group of n characters encodes n - 1 bytes
    if filled == 1 {
        return Err(LoadError::StreamDecode(
            "ASCII85 final group has a single character".to_string(),
        ));
    }
    if filled > 1 {
        for slot in group.iter_mut().skip(filled) {
            *slot = 84;
        }
        let bytes = ascii85_group_value(&group)?.to_be_bytes();
        result.extend_from_slice(&bytes[..filled - 1]);
    }

    Ok(result)
}

fn ascii85_group_value(group: &[u8; 5]) -> Result<u32> {
    let value = group
        .iter()
        .fold(0u64, |acc, &digit| acc * 85 + digit as u64);
    u32::try_from(value)
        .map_err(|_| LoadError::StreamDecode("ASCII85 group out of range".to_string()))
}

/// Decode RunLengthDecode data
fn decode_run_length(data: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(data.len() * 2);
    let mut i = 0;
    while i < data.len() {
        let length = data[i];
        i += 1;
        match length {
            128 => break,
            0..=127 => {
                let count = length as usize + 1;
                let end = (i + count).min(data.len());
                result.extend_from_slice(&data[i..end]);
                i = end;
            }
            _ => {
                if let Some(&byte) = data.get(i) {
                    let count = 257 - length as usize;
                    result.extend(std::iter::repeat(byte).take(count));
                    i += 1;
                }
            }
        }
    }
    result
}

fn parm_usize(parms: &PdfDictionary, key: &str, default: usize) -> usize {
    parms
        .get(key)
        .and_then(PdfObject::as_integer)
        .and_then(|v| usize::try_from(v).ok())
        .unwrap_or(default)
}

/// Reverse TIFF (2) or PNG (10-15) prediction
fn apply_predictor(data: Vec<u8>, parms: Option<&PdfDictionary>) -> Result<Vec<u8>> {
    let parms = match parms {
        Some(p) => p,
        None => return Ok(data),
    };
    let predictor = parm_usize(parms, "Predictor", 1);
    if predictor <= 1 || data.is_empty() {
        return Ok(data);
    }

    let colors = parm_usize(parms, "Colors", 1).max(1);
    let bits = parm_usize(parms, "BitsPerComponent", 8).max(1);
    let columns = parm_usize(parms, "Columns", 1).max(1);

    // A row can never be longer than the data it is part of
    let row_bits = columns.checked_mul(colors).and_then(|n| n.checked_mul(bits));
    if !row_bits.is_some_and(|n| n / 8 <= data.len()) {
        return Err(LoadError::StreamDecode(
            "Predictor row size out of range".to_string(),
        ));
    }

    match predictor {
        2 => Ok(apply_tiff_predictor(data, columns, colors, bits)),
        10..=15 => Ok(apply_png_predictor(&data, columns, colors, bits)),
        other => Err(LoadError::StreamDecode(format!(
            "Unsupported predictor {other}"
        ))),
    }
}

/// TIFF predictor 2, supported for 8-bit components
fn apply_tiff_predictor(mut data: Vec<u8>, columns: usize, colors: usize, bits: usize) -> Vec<u8> {
    if bits != 8 {
        tracing::warn!("TIFF predictor with {} bits per component left as is", bits);
        return data;
    }
    let row_len = columns * colors;
    for row in data.chunks_mut(row_len) {
        for i in colors..row.len() {
            row[i] = row[i].wrapping_add(row[i - colors]);
        }
    }
    data
}

/// PNG predictors: every row starts with its own filter type byte
fn apply_png_predictor(data: &[u8], columns: usize, colors: usize, bits: usize) -> Vec<u8> {
    let row_bytes = (colors * columns * bits).div_ceil(8);
    let bpp = std::cmp::max(1, colors * bits / 8);
    let row_size = row_bytes + 1;

    let mut result = Vec::with_capacity(data.len());
    let mut prev_row = vec![0u8; row_bytes];

    for chunk in data.chunks(row_size) {
        if chunk.len() < row_size {
            break;
        }
        let filter_type = chunk[0];
        let row_data = &chunk[1..];
        let mut current_row = vec![0u8; row_bytes];

        for i in 0..row_bytes {
            let left = if i >= bpp { current_row[i - bpp] } else { 0 };
            let above = prev_row[i];
            let upper_left = if i >= bpp { prev_row[i - bpp] } else { 0 };
            let predicted = match filter_type {
                1 => left,
                2 => above,
                3 => ((left as u16 + above as u16) / 2) as u8,
                4 => paeth_predictor(left, above, upper_left),
                _ => 0,
            };
            current_row[i] = row_data[i].wrapping_add(predicted);
        }

        result.extend_from_slice(&current_row);
        prev_row = current_row;
    }

    result
}

fn paeth_predictor(left: u8, above: u8, upper_left: u8) -> u8 {
    let a = left as i32;
    let b = above as i32;
    let c = upper_left as i32;
    let p = a + b - c;
    let pa = (p - a).abs();
    let pb = (p - b).abs();
    let pc = (p - c).abs();

    if pa <= pb && pa <= pc {
        left
    } else if pb <= pc {
        above
    } else {
        upper_left
    }
}
