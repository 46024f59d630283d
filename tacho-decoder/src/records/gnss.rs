//! G2.2 GNSS and cargo decoders
//!
//! Accumulated-driving positions (0x0525), load/unload operations
//! (0x0526 / 0x0226), trailer registrations (0x0527 / 0x0227) and load
//! sensor snapshots (0x0529). Some of these fields are not fully
//! documented yet; the record-size fallbacks are policy, gated by
//! [`DecoderConfig::permit_g2_2_heuristics`].

use crate::config::DecoderConfig;
use crate::primitives::{decode_gnss_coord, decode_id_string, nation_name, ByteReader};
use crate::types::{
    DecodeError, GnssPoint, LoadOperation, LoadSensorRecord, LoadUnloadRecord, Result,
    TachographFile, TrailerRecord,
};

/// Decode GNSS accumulated driving: 16-byte records
/// `ts(4) lat(4) lon(4) speed(2) heading(2)`.
pub fn decode_accumulated_driving(payload: &[u8], file: &mut TachographFile) -> Result<()> {
    if payload.is_empty() || payload.len() % 16 != 0 {
        return Err(DecodeError::UnknownLayout(format!(
            "GNSS accumulated driving payload of {} bytes is not a 16-byte record array",
            payload.len()
        )));
    }

    for chunk in payload.chunks_exact(16) {
        let mut reader = ByteReader::new(chunk);
        let Some(timestamp) = reader.time_real()? else {
            continue;
        };
        let latitude = decode_gnss_coord(reader.i32_be()?);
        let longitude = decode_gnss_coord(reader.i32_be()?);
        let speed_kmh = reader.u16_be()?;
        let heading = reader.u16_be()?;
        file.gnss_points.push(GnssPoint {
            timestamp,
            latitude,
            longitude,
            speed_kmh,
            heading,
        });
    }
    log::debug!("Decoded {} GNSS points", file.gnss_points.len());
    Ok(())
}

/// Decode load/unload operations.
///
/// The documented form is 9-byte records `ts(4) op(1) lat(4)`. The
/// 13-byte form with a longitude is a field observation: it is only
/// selected when `len % 13 == 0` and the heuristics gate is open.
pub fn decode_load_unload(
    payload: &[u8],
    config: &DecoderConfig,
    file: &mut TachographFile,
) -> Result<()> {
    let record_len = if config.permit_g2_2_heuristics && !payload.is_empty() && payload.len() % 13 == 0
    {
        13
    } else if !payload.is_empty() && payload.len() % 9 == 0 {
        9
    } else {
        return Err(DecodeError::UnknownLayout(format!(
            "load/unload payload of {} bytes fits no permitted record size",
            payload.len()
        )));
    };

    for chunk in payload.chunks_exact(record_len) {
        let mut reader = ByteReader::new(chunk);
        let Some(timestamp) = reader.time_real()? else {
            continue;
        };
        let operation = if reader.u8()? == 0 {
            LoadOperation::Load
        } else {
            LoadOperation::Unload
        };
        let latitude = decode_gnss_coord(reader.i32_be()?);
        let longitude = if record_len == 13 {
            Some(decode_gnss_coord(reader.i32_be()?))
        } else {
            None
        };
        file.load_unload.push(LoadUnloadRecord {
            timestamp,
            operation,
            latitude: Some(latitude),
            longitude,
        });
    }
    Ok(())
}

/// Decode trailer registrations: 24-byte records
/// `ts(4) nation(1) plate(14) coupling(1) reserved(4)`, or the 20-byte
/// form without the reserved tail.
pub fn decode_trailers(payload: &[u8], file: &mut TachographFile) -> Result<()> {
    let record_len = if !payload.is_empty() && payload.len() % 24 == 0 {
        24
    } else if !payload.is_empty() && payload.len() % 20 == 0 {
        20
    } else {
        return Err(DecodeError::UnknownLayout(format!(
            "trailer payload of {} bytes fits neither 24- nor 20-byte records",
            payload.len()
        )));
    };

    for chunk in payload.chunks_exact(record_len) {
        let mut reader = ByteReader::new(chunk);
        let Some(timestamp) = reader.time_real()? else {
            continue;
        };
        let nation = nation_name(reader.u8()?);
        let plate = decode_id_string(reader.take(14)?);
        let coupled = reader.u8()? == 0;
        file.trailers.push(TrailerRecord {
            timestamp,
            nation,
            plate,
            coupled,
        });
    }
    Ok(())
}

/// Decode a load sensor snapshot: `ts(4)` followed by 2-byte axle weights;
/// 0xFFFF entries are unset axles.
pub fn decode_load_sensor(payload: &[u8], file: &mut TachographFile) -> Result<()> {
    let mut reader = ByteReader::new(payload);
    let Some(timestamp) = reader.time_real()? else {
        return Ok(());
    };
    let mut weights = Vec::new();
    while reader.remaining() >= 2 {
        let weight = reader.u16_be()?;
        if weight != 0xFFFF {
            weights.push(weight);
        }
    }
    file.load_sensor.push(LoadSensorRecord {
        timestamp,
        weights_kg: weights,
    });
    Ok(())
}
