//! Framing reader
//!
//! Walks the raw file and brackets it into `(tag, length, payload)` blocks.
//! Three framings are recognized:
//!
//! - G1 (STAP): fixed 5-byte header = tag (u16 BE) + record type (u8) +
//!   length (u16 BE). Record type `0x01` marks a signature block for the
//!   same tag; `0x04` marks a container.
//! - G2/G2.2 (BER-TLV): 2-byte composite tag, BER short- or long-form
//!   length, nested containers (construction bit `0x20` in the first tag
//!   byte).
//! - A fallback bracketing heuristic for records that match neither, tried
//!   at container boundaries in a fixed order.
//!
//! Robustness policy: a header whose length overruns the enclosing payload
//! turns the remaining bytes into a raw span and the walk resumes at the
//! container's end; a header that does not parse at all goes through the
//! fallback heuristic first. Only a failure to bracket the very first
//! top-level record is a structural error.

use crate::config::DecoderConfig;
use crate::registry::TagRegistry;
use crate::types::{DecodeError, Generation, Result};

/// STAP record type marking a signature block
const STAP_TYPE_SIGNATURE: u8 = 0x01;
/// STAP record type marking a container
const STAP_TYPE_CONTAINER: u8 = 0x04;
/// Highest record type a valid STAP header can carry
const STAP_TYPE_MAX: u8 = 0x04;

/// One bracketed record
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub tag: u16,
    /// File offset of the header
    pub offset: usize,
    pub header_len: usize,
    /// Leading padding bytes skipped inside a container payload
    pub padding: usize,
    /// File offset of the payload
    pub payload_offset: usize,
    pub length: usize,
    pub depth: u8,
    /// Tag of the enclosing container, if any
    pub container_tag: Option<u16>,
    pub is_container: bool,
    pub is_signature: bool,
}

impl Block {
    /// The payload bytes of this block within `data`
    pub fn payload<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        &data[self.payload_offset..self.payload_offset + self.length]
    }
}

/// A region no framing could bracket; surfaced as raw-unparsed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSpan {
    pub offset: usize,
    pub length: usize,
}

/// The bracketed file: flat block list in file order plus unbracketable
/// spans
#[derive(Debug)]
pub struct FramedFile {
    pub generation: Generation,
    pub blocks: Vec<Block>,
    pub raw_spans: Vec<RawSpan>,
}

/// Outcome of one header-read attempt
enum HeaderRead<T> {
    /// Header and length valid, record fits
    Header(T),
    /// Header shape valid but the length overruns the enclosing payload
    BadLength,
    /// Bytes do not form a header of this framing
    NoMatch,
}

/// Detect the equipment generation from the first two bytes.
///
/// Pure function of those two bytes: `0x7621` is the G2 download
/// container, `0x7631` the G2.2 one, anything else is a G1 file.
pub fn detect_generation(first_two: [u8; 2]) -> Generation {
    match u16::from_be_bytes(first_two) {
        0x7621 => Generation::G2,
        0x7631 => Generation::G2V2,
        _ => Generation::G1,
    }
}

/// Bracket a whole file.
pub fn frame(data: &[u8], registry: &TagRegistry, config: &DecoderConfig) -> Result<FramedFile> {
    if data.len() < 5 {
        return Err(DecodeError::MalformedFile {
            offset: 0,
            reason: format!("file too short for one record header ({} bytes)", data.len()),
        });
    }

    let generation = detect_generation([data[0], data[1]]);
    log::debug!("Detected generation {} from leading bytes", generation);

    let mut walker = Walker {
        data,
        registry,
        generation,
        max_depth: config.max_container_depth,
        blocks: Vec::new(),
        raw_spans: Vec::new(),
    };

    match generation {
        Generation::G1 => walker.walk_stap(0, data.len(), 0, None)?,
        Generation::G2 | Generation::G2V2 => walker.walk_ber(0, data.len(), 0, None)?,
    }

    log::debug!(
        "Framed {} blocks, {} raw spans",
        walker.blocks.len(),
        walker.raw_spans.len()
    );

    Ok(FramedFile {
        generation,
        blocks: walker.blocks,
        raw_spans: walker.raw_spans,
    })
}

struct Walker<'a> {
    data: &'a [u8],
    registry: &'a TagRegistry,
    generation: Generation,
    max_depth: u8,
    blocks: Vec<Block>,
    raw_spans: Vec<RawSpan>,
}

impl Walker<'_> {
    /// STAP walk over `[start..end)`. Depth 0 is the file top level, where
    /// a malformed first record is a structural error.
    fn walk_stap(
        &mut self,
        start: usize,
        end: usize,
        depth: u8,
        container_tag: Option<u16>,
    ) -> Result<()> {
        let mut pos = start;
        let mut first = true;

        while pos < end {
            match read_stap_header(self.data, pos, end) {
                HeaderRead::Header((tag, record_type, length)) => {
                    let is_signature = record_type == STAP_TYPE_SIGNATURE;
                    let is_container = !is_signature
                        && (record_type == STAP_TYPE_CONTAINER
                            || self.registry.is_container(self.generation, tag))
                        && depth < self.max_depth;
                    self.blocks.push(Block {
                        tag,
                        offset: pos,
                        header_len: 5,
                        padding: 0,
                        payload_offset: pos + 5,
                        length,
                        depth,
                        container_tag,
                        is_container,
                        is_signature,
                    });
                    if is_container {
                        self.walk_stap(pos + 5, pos + 5 + length, depth + 1, Some(tag))?;
                    }
                    pos += 5 + length;
                }
                outcome => {
                    if depth == 0 && first {
                        return Err(DecodeError::MalformedFile {
                            offset: pos,
                            reason: "first record matches no known framing".into(),
                        });
                    }
                    match outcome {
                        HeaderRead::BadLength => {
                            // Length overruns the enclosing payload: give up
                            // on this container and resume at its end
                            self.raw_span(pos, end - pos);
                            break;
                        }
                        _ => {
                            if !self.try_fallback(&mut pos, end, depth, container_tag) {
                                self.raw_span(pos, end - pos);
                                break;
                            }
                        }
                    }
                }
            }
            first = false;
        }
        Ok(())
    }

    /// BER-TLV walk over `[start..end)`.
    fn walk_ber(
        &mut self,
        start: usize,
        end: usize,
        depth: u8,
        container_tag: Option<u16>,
    ) -> Result<()> {
        let mut pos = start;
        let mut first = true;

        while pos < end {
            match read_ber_header(self.data, pos, end) {
                HeaderRead::Header((tag, length, header_len)) => {
                    let constructed = self.data[pos] & 0x20 != 0;
                    let is_container = (constructed
                        || self.registry.is_container(self.generation, tag))
                        && depth < self.max_depth;
                    let is_signature = self
                        .registry
                        .data_tag_for_signature(self.generation, tag)
                        .is_some();

                    // Download containers may prepend a padding word
                    let mut padding = 0;
                    let payload_offset = pos + header_len;
                    if is_container
                        && matches!(tag, 0x7621 | 0x7631)
                        && length >= 2
                        && self.data[payload_offset] == 0x00
                    {
                        padding = 2;
                    }

                    self.blocks.push(Block {
                        tag,
                        offset: pos,
                        header_len,
                        padding,
                        payload_offset: payload_offset + padding,
                        length: length - padding,
                        depth,
                        container_tag,
                        is_container,
                        is_signature,
                    });
                    if is_container {
                        self.walk_ber(
                            payload_offset + padding,
                            payload_offset + length,
                            depth + 1,
                            Some(tag),
                        )?;
                    }
                    pos += header_len + length;
                }
                outcome => {
                    if depth == 0 && first {
                        return Err(DecodeError::MalformedFile {
                            offset: pos,
                            reason: "first record matches no known framing".into(),
                        });
                    }
                    match outcome {
                        HeaderRead::BadLength => {
                            self.raw_span(pos, end - pos);
                            break;
                        }
                        _ => {
                            if !self.try_fallback(&mut pos, end, depth, container_tag) {
                                self.raw_span(pos, end - pos);
                                break;
                            }
                        }
                    }
                }
            }
            first = false;
        }
        Ok(())
    }

    /// Apply the fallback bracketing heuristic at `pos`; push a block and
    /// advance on success.
    fn try_fallback(
        &mut self,
        pos: &mut usize,
        end: usize,
        depth: u8,
        container_tag: Option<u16>,
    ) -> bool {
        let Some((tag, length, header_len)) = fallback_bracket(self.data, *pos, end) else {
            return false;
        };
        log::warn!(
            "Fallback framing at offset {}: tag {:#06x}, {} bytes",
            *pos,
            tag,
            length
        );
        self.blocks.push(Block {
            tag,
            offset: *pos,
            header_len,
            padding: 0,
            payload_offset: *pos + header_len,
            length,
            depth,
            container_tag,
            is_container: false,
            is_signature: false,
        });
        *pos += header_len + length;
        true
    }

    fn raw_span(&mut self, offset: usize, length: usize) {
        if length == 0 {
            return;
        }
        log::warn!("Unbracketable region at offset {}, {} bytes", offset, length);
        self.raw_spans.push(RawSpan { offset, length });
    }
}

/// Read one STAP header at `pos`, validating that the record fits in
/// `[pos..end)`.
fn read_stap_header(data: &[u8], pos: usize, end: usize) -> HeaderRead<(u16, u8, usize)> {
    if end.saturating_sub(pos) < 5 {
        return HeaderRead::NoMatch;
    }
    let tag = u16::from_be_bytes([data[pos], data[pos + 1]]);
    let record_type = data[pos + 2];
    let length = u16::from_be_bytes([data[pos + 3], data[pos + 4]]) as usize;
    if tag == 0 || tag == 0xFFFF || record_type > STAP_TYPE_MAX {
        return HeaderRead::NoMatch;
    }
    if pos + 5 + length > end {
        return HeaderRead::BadLength;
    }
    HeaderRead::Header((tag, record_type, length))
}

/// Read one BER-TLV header (2-byte composite tag + short- or long-form
/// length) at `pos`, validating that the record fits in `[pos..end)`.
fn read_ber_header(data: &[u8], pos: usize, end: usize) -> HeaderRead<(u16, usize, usize)> {
    if end.saturating_sub(pos) < 3 {
        return HeaderRead::NoMatch;
    }
    if data[pos] == 0x00 || data[pos] == 0xFF {
        return HeaderRead::NoMatch;
    }
    let tag = u16::from_be_bytes([data[pos], data[pos + 1]]);
    let length_byte = data[pos + 2];
    let (length, header_len) = if length_byte & 0x80 == 0 {
        (length_byte as usize, 3)
    } else {
        let num_bytes = (length_byte & 0x7F) as usize;
        if num_bytes == 0 || num_bytes > 3 || pos + 3 + num_bytes > end {
            return HeaderRead::NoMatch;
        }
        let mut length = 0usize;
        for &b in &data[pos + 3..pos + 3 + num_bytes] {
            length = (length << 8) | b as usize;
        }
        (length, 3 + num_bytes)
    };
    if pos + header_len + length > end {
        return HeaderRead::BadLength;
    }
    HeaderRead::Header((tag, length, header_len))
}

/// Last-resort bracketing when the generation's own framing fails.
///
/// Tried in order: BER-TLV long-form length, 2-byte tag + 2-byte length,
/// BER-TLV short-form. The first candidate whose length fits the remaining
/// bytes wins.
fn fallback_bracket(data: &[u8], pos: usize, end: usize) -> Option<(u16, usize, usize)> {
    let remaining = end.saturating_sub(pos);

    // 1. BER-TLV long-form
    if remaining >= 4 && data[pos + 2] & 0x80 != 0 {
        let num_bytes = (data[pos + 2] & 0x7F) as usize;
        if (1..=3).contains(&num_bytes) && pos + 3 + num_bytes <= end {
            let mut length = 0usize;
            for &b in &data[pos + 3..pos + 3 + num_bytes] {
                length = (length << 8) | b as usize;
            }
            if pos + 3 + num_bytes + length <= end {
                let tag = u16::from_be_bytes([data[pos], data[pos + 1]]);
                return Some((tag, length, 3 + num_bytes));
            }
        }
    }

    // 2. 2-byte tag + 2-byte length
    if remaining >= 4 {
        let length = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        if pos + 4 + length <= end {
            let tag = u16::from_be_bytes([data[pos], data[pos + 1]]);
            return Some((tag, length, 4));
        }
    }

    // 3. BER-TLV short-form
    if remaining >= 3 && data[pos + 2] & 0x80 == 0 {
        let length = data[pos + 2] as usize;
        if pos + 3 + length <= end {
            let tag = u16::from_be_bytes([data[pos], data[pos + 1]]);
            return Some((tag, length, 3));
        }
    }

    None
}
