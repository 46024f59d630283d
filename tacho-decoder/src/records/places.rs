//! Place decoders
//!
//! Daily work period places (0x0506 / 0x0208), GNSS-enhanced places
//! (0x0225 / 0x0528) and border crossings (0x0228 / 0x052A).

use crate::primitives::{decode_gnss_coord, nation_name, ByteReader};
use crate::types::{
    BorderCrossing, DecodeError, GnssPlaceRecord, PlaceRecord, Result, TachographFile,
};

/// Wire size of one daily-work-period place record
const PLACE_RECORD_LEN: usize = 10;

/// Decode CardPlaceDailyWorkPeriod: 1-byte newest pointer + 10-byte
/// records `entry_time(4) entry_type(1) country(1) region(1) odometer(3)`.
pub fn decode_places(payload: &[u8], file: &mut TachographFile) -> Result<()> {
    if payload.len() < 1 + PLACE_RECORD_LEN {
        return Err(DecodeError::Truncated {
            needed: 1 + PLACE_RECORD_LEN,
            available: payload.len(),
        });
    }

    for chunk in payload[1..].chunks_exact(PLACE_RECORD_LEN) {
        let mut reader = ByteReader::new(chunk);
        let Some(entry_time) = reader.time_real()? else {
            continue;
        };
        let entry_type = reader.u8()?;
        let country = nation_name(reader.u8()?);
        let region = reader.u8()?;
        let odometer = reader.u24_be()?;
        file.places.push(PlaceRecord {
            entry_time: Some(entry_time),
            entry_type,
            country,
            region,
            odometer_km: (odometer != 0xFF_FFFF).then_some(odometer),
        });
    }
    Ok(())
}

/// Decode GNSS-enhanced places: 16-byte records
/// `ts(4) lat(4) lon(4) place_type(1) nation(1) region(2)`, or the
/// 12-byte coordinate-only form when the length divides by 12 instead.
pub fn decode_gnss_places(payload: &[u8], file: &mut TachographFile) -> Result<()> {
    let record_len = if !payload.is_empty() && payload.len() % 16 == 0 {
        16
    } else if !payload.is_empty() && payload.len() % 12 == 0 {
        12
    } else {
        return Err(DecodeError::UnknownLayout(format!(
            "GNSS place payload of {} bytes fits neither 16- nor 12-byte records",
            payload.len()
        )));
    };

    for chunk in payload.chunks_exact(record_len) {
        let mut reader = ByteReader::new(chunk);
        let Some(timestamp) = reader.time_real()? else {
            continue;
        };
        let latitude = decode_gnss_coord(reader.i32_be()?);
        let longitude = decode_gnss_coord(reader.i32_be()?);
        let (place_type, nation) = if record_len == 16 {
            (Some(reader.u8()?), Some(nation_name(reader.u8()?)))
        } else {
            (None, None)
        };
        file.gnss_places.push(GnssPlaceRecord {
            timestamp,
            latitude,
            longitude,
            place_type,
            nation,
        });
    }
    Ok(())
}

/// Decode border crossings: 14-byte records
/// `ts(4) nation_from(1) nation_to(1) lat(4) lon(4)`, or the 10-byte form
/// without the longitude.
pub fn decode_border_crossings(payload: &[u8], file: &mut TachographFile) -> Result<()> {
    let record_len = if !payload.is_empty() && payload.len() % 14 == 0 {
        14
    } else if !payload.is_empty() && payload.len() % 10 == 0 {
        10
    } else {
        return Err(DecodeError::UnknownLayout(format!(
            "border crossing payload of {} bytes fits neither 14- nor 10-byte records",
            payload.len()
        )));
    };

    for chunk in payload.chunks_exact(record_len) {
        let mut reader = ByteReader::new(chunk);
        let Some(timestamp) = reader.time_real()? else {
            continue;
        };
        let nation_from = nation_name(reader.u8()?);
        let nation_to = nation_name(reader.u8()?);
        let latitude = decode_gnss_coord(reader.i32_be()?);
        let longitude = if record_len == 14 {
            Some(decode_gnss_coord(reader.i32_be()?))
        } else {
            None
        };
        file.border_crossings.push(BorderCrossing {
            timestamp,
            nation_from,
            nation_to,
            latitude: Some(latitude),
            longitude,
        });
    }
    Ok(())
}
