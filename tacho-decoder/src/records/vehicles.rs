//! CardVehiclesUsed decoder (tag 0x0505 / 0x0207)
//!
//! The payload is a 2-byte newest-record pointer followed by fixed-size
//! records; the record size selects the layout:
//!
//! - 31 bytes (G1): odometer begin (3) + odometer end (3) + first use (4)
//!   + last use (4) + nation (1) + plate (14) + BCD block counter (2)
//! - 29 bytes: the short form without the counter
//! - 48 bytes (G2): the 31-byte layout followed by a 17-byte VIN

use crate::primitives::{bcd_counter, decode_id_string, nation_name, ByteReader};
use crate::types::{
    DecodeError, Generation, Result, TachographFile, VehicleUsedRecord, WarningKind,
};

const RECORD_LEN_G1: usize = 31;
const RECORD_LEN_SHORT: usize = 29;
const RECORD_LEN_G2: usize = 48;

/// Decode the vehicles-used elementary file.
pub fn decode_vehicles_used(
    payload: &[u8],
    generation: Generation,
    file: &mut TachographFile,
) -> Result<()> {
    if payload.len() < 2 + RECORD_LEN_SHORT {
        return Err(DecodeError::Truncated {
            needed: 2 + RECORD_LEN_SHORT,
            available: payload.len(),
        });
    }

    let candidates: &[usize] = match generation {
        Generation::G1 => &[RECORD_LEN_G1, RECORD_LEN_SHORT],
        Generation::G2 | Generation::G2V2 => &[RECORD_LEN_G2, RECORD_LEN_G1, RECORD_LEN_SHORT],
    };

    // The pointer prefix is usually present; fall back to a bare record
    // array when no size divides the remainder
    let (records, record_len) = select_layout(&payload[2..], candidates)
        .or_else(|| select_layout(payload, candidates))
        .ok_or_else(|| {
            DecodeError::UnknownLayout(format!(
                "vehicles-used payload of {} bytes fits no record size",
                payload.len()
            ))
        })?;

    for chunk in records.chunks_exact(record_len) {
        if let Some(record) = decode_record(chunk, record_len)? {
            if let (Some(begin), Some(end)) = (record.odometer_begin_km, record.odometer_end_km) {
                if end < begin {
                    file.warn(
                        WarningKind::OdometerNotMonotonic,
                        format!("vehicle {}: odometer {} -> {}", record.plate, begin, end),
                    );
                }
            }
            file.vehicles_used.push(record);
        }
    }
    log::debug!("Decoded {} vehicle records", file.vehicles_used.len());
    Ok(())
}

fn select_layout<'a>(records: &'a [u8], candidates: &[usize]) -> Option<(&'a [u8], usize)> {
    candidates
        .iter()
        .find(|&&size| !records.is_empty() && records.len() % size == 0)
        .map(|&size| (records, size))
}

/// Decode one record; `None` for empty (all-0xFF) slots.
fn decode_record(chunk: &[u8], record_len: usize) -> Result<Option<VehicleUsedRecord>> {
    if chunk.iter().all(|&b| b == 0xFF) {
        return Ok(None);
    }

    let mut reader = ByteReader::new(chunk);
    let odometer_begin = reader.u24_be()?;
    let odometer_end = reader.u24_be()?;
    let first_use = reader.time_real()?;
    let last_use = reader.time_real()?;
    let nation = nation_name(reader.u8()?);
    let plate = decode_id_string(reader.take(14)?);

    let vu_data_block_counter = if record_len >= RECORD_LEN_G1 {
        let counter = reader.take(2)?;
        bcd_counter(&[counter[0], counter[1]])
    } else {
        None
    };
    let vin = if record_len == RECORD_LEN_G2 {
        let vin = decode_id_string(reader.take(17)?);
        (!vin.is_empty()).then_some(vin)
    } else {
        None
    };

    // A slot with neither usage timestamp carries no session
    if first_use.is_none() && last_use.is_none() {
        return Ok(None);
    }

    Ok(Some(VehicleUsedRecord {
        odometer_begin_km: (odometer_begin != 0xFF_FFFF).then_some(odometer_begin),
        odometer_end_km: (odometer_end != 0xFF_FFFF).then_some(odometer_end),
        first_use,
        last_use,
        nation,
        plate,
        vu_data_block_counter,
        vin,
    }))
}
