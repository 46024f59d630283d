//! Primitive wire codecs
//!
//! Bounds-checked byte cursor plus the scalar encodings shared by every
//! record layout: big-endian integers, packed BCD, padded Latin-1 strings,
//! the Annex 1B nation table, `TimeReal` timestamps, `Datef` BCD dates and
//! GNSS coordinates.

use crate::types::{DecodeError, Result, Timestamp};
use chrono::{DateTime, NaiveDate};

/// Cursor over a borrowed byte slice with bounds-checked reads
///
/// Every decoder reads through one of these; a read past the end yields
/// [`DecodeError::Truncated`] instead of panicking, so a short record can
/// be recovered by the caller.
#[derive(Debug)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current offset into the slice
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Take the next `n` bytes
    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(DecodeError::Truncated {
                needed: n,
                available: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn u16_be(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    /// 3-byte big-endian unsigned integer (odometer fields)
    pub fn u24_be(&mut self) -> Result<u32> {
        let b = self.take(3)?;
        Ok(u32::from_be_bytes([0, b[0], b[1], b[2]]))
    }

    pub fn u32_be(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn i32_be(&mut self) -> Result<i32> {
        let b = self.take(4)?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// 4-byte `TimeReal`, empty sentinels mapped to `None`
    pub fn time_real(&mut self) -> Result<Option<Timestamp>> {
        Ok(decode_time_real(self.u32_be()?))
    }
}

/// Decode one packed-BCD byte to its two-digit value, rejecting hex nibbles
pub fn bcd_byte(byte: u8) -> Option<u8> {
    let hi = byte >> 4;
    let lo = byte & 0x0F;
    if hi > 9 || lo > 9 {
        return None;
    }
    Some(hi * 10 + lo)
}

/// Decode a 2-byte packed-BCD counter. All-0xFF means the field is unset.
pub fn bcd_counter(bytes: &[u8; 2]) -> Option<u16> {
    if bytes == &[0xFF, 0xFF] {
        return None;
    }
    let hi = bcd_byte(bytes[0])? as u16;
    let lo = bcd_byte(bytes[1])? as u16;
    Some(hi * 100 + lo)
}

/// Decode `TimeReal`: UInt32 BE seconds since 1970-01-01T00:00:00Z.
/// `0` and `0xFFFFFFFF` are empty sentinels.
pub fn decode_time_real(seconds: u32) -> Option<Timestamp> {
    if seconds == 0 || seconds == 0xFFFF_FFFF {
        return None;
    }
    DateTime::from_timestamp(seconds as i64, 0)
}

/// Decode `Datef`: packed BCD `YYYYMMDD` in 4 bytes, validated.
pub fn decode_datef(bytes: &[u8; 4]) -> Option<NaiveDate> {
    let year = bcd_byte(bytes[0])? as i32 * 100 + bcd_byte(bytes[1])? as i32;
    let month = bcd_byte(bytes[2])? as u32;
    let day = bcd_byte(bytes[3])? as u32;
    if !(1900..=2100).contains(&year) || !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Decode a padded IA5/Latin-1 string field
///
/// A leading code-page byte (< 0x20) is consumed; the payload decodes as
/// Latin-1. Trailing `0x00`/`0xFF` padding and surrounding whitespace are
/// stripped, and non-printable characters dropped.
pub fn decode_string(data: &[u8]) -> String {
    let trimmed = trim_padding(data);
    if trimmed.is_empty() {
        return String::new();
    }
    let payload = if trimmed[0] < 0x20 {
        &trimmed[1..]
    } else {
        trimmed
    };
    payload
        .iter()
        .map(|&b| char::from(b))
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Decode an identifier field (card number, plate, VIN): Latin-1, keeping
/// only alphanumerics and spaces, uppercased.
pub fn decode_id_string(data: &[u8]) -> String {
    let text = decode_string(data);
    text.chars()
        .filter(|c| (c.is_ascii_alphanumeric() || *c == ' ') && c.is_ascii())
        .collect::<String>()
        .trim()
        .to_uppercase()
}

fn trim_padding(data: &[u8]) -> &[u8] {
    let mut end = data.len();
    while end > 0 && (data[end - 1] == 0x00 || data[end - 1] == 0xFF) {
        end -= 1;
    }
    &data[..end]
}

/// GNSS coordinate: signed 32-bit value scaled by 1e-7 to WGS84 degrees
pub fn decode_gnss_coord(raw: i32) -> f64 {
    raw as f64 / 10_000_000.0
}

/// Map an Annex 1B numeric nation code to its vehicle registration code
pub fn nation_name(code: u8) -> String {
    let name = match code {
        0x00 => "No information available",
        0x01 => "A",
        0x02 => "AL",
        0x03 => "AND",
        0x04 => "ARM",
        0x05 => "AZ",
        0x06 => "B",
        0x07 => "BG",
        0x08 => "BIH",
        0x09 => "BY",
        0x0A => "CH",
        0x0B => "CY",
        0x0C => "CZ",
        0x0D => "D",
        0x0E => "DK",
        0x0F => "E",
        0x10 => "EST",
        0x11 => "F",
        0x12 => "FIN",
        0x13 => "FL",
        0x14 => "FR",
        0x15 => "UK",
        0x16 => "GE",
        0x17 => "GR",
        0x18 => "H",
        0x19 => "HR",
        0x1A => "I",
        0x1B => "IRL",
        0x1C => "IS",
        0x1D => "KZ",
        0x1E => "L",
        0x1F => "LT",
        0x20 => "LV",
        0x21 => "M",
        0x22 => "MC",
        0x23 => "MD",
        0x24 => "MK",
        0x25 => "N",
        0x26 => "NL",
        0x27 => "P",
        0x28 => "PL",
        0x29 => "RO",
        0x2A => "RSM",
        0x2B => "RUS",
        0x2C => "S",
        0x2D => "SK",
        0x2E => "SLO",
        0x2F => "TM",
        0x30 => "TR",
        0x31 => "UA",
        0x32 => "V",
        0x33 => "YU",
        0x34 => "MNE",
        0x35 => "SRB",
        0xFD => "EC",
        0xFE => "EUR",
        0xFF => "WLD",
        other => return format!("Unknown({:02X})", other),
    };
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_integers() {
        let data = [0x00, 0x27, 0x10, 0x12, 0x34, 0x56, 0x78];
        let mut reader = ByteReader::new(&data);
        assert_eq!(reader.u24_be().unwrap(), 10000);
        assert_eq!(reader.u32_be().unwrap(), 0x12345678);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_reader_truncated() {
        let mut reader = ByteReader::new(&[0x01]);
        let err = reader.u16_be().unwrap_err();
        match err {
            DecodeError::Truncated { needed: 2, available: 1 } => {}
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_bcd() {
        assert_eq!(bcd_byte(0x42), Some(42));
        assert_eq!(bcd_byte(0x99), Some(99));
        assert_eq!(bcd_byte(0x4A), None);
        assert_eq!(bcd_counter(&[0x01, 0x23]), Some(123));
        assert_eq!(bcd_counter(&[0xFF, 0xFF]), None);
    }

    #[test]
    fn test_time_real_sentinels() {
        assert!(decode_time_real(0).is_none());
        assert!(decode_time_real(0xFFFF_FFFF).is_none());
        let ts = decode_time_real(1_577_836_800).unwrap();
        assert_eq!(ts.to_rfc3339(), "2020-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_datef() {
        assert_eq!(
            decode_datef(&[0x19, 0x85, 0x07, 0x21]),
            NaiveDate::from_ymd_opt(1985, 7, 21)
        );
        // hex nibble in the year is not BCD
        assert_eq!(decode_datef(&[0x5E, 0x00, 0x01, 0x01]), None);
        // month 13 rejected
        assert_eq!(decode_datef(&[0x20, 0x20, 0x13, 0x01]), None);
    }

    #[test]
    fn test_decode_string_padding() {
        assert_eq!(decode_string(b"MUELLER\x00\x00\x00"), "MUELLER");
        assert_eq!(decode_string(&[0xFF; 8]), "");
        // leading code-page byte consumed
        assert_eq!(decode_string(b"\x01DUPONT\x00\x00"), "DUPONT");
        // Latin-1 accents preserved
        assert_eq!(decode_string(&[0x01, b'M', 0xFC, b'l', b'l', b'e', b'r']), "M\u{fc}ller");
    }

    #[test]
    fn test_decode_id_string() {
        assert_eq!(decode_id_string(b"ab123cd\x00\x00\x00\x00\x00\x00\x00"), "AB123CD");
        assert_eq!(decode_id_string(&[0xFF; 14]), "");
    }

    #[test]
    fn test_gnss_coord() {
        assert_eq!(decode_gnss_coord(451234567), 45.1234567);
        assert_eq!(decode_gnss_coord(-73500000), -7.35);
    }

    #[test]
    fn test_nation_table() {
        assert_eq!(nation_name(0x03), "AND");
        assert_eq!(nation_name(0x1A), "I");
        assert_eq!(nation_name(0xFE), "EUR");
        assert_eq!(nation_name(0x80), "Unknown(80)");
    }
}
