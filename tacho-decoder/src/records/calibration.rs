//! Calibration record decoder (tag 0x050C)
//!
//! A 2-byte pointer prefix followed by workshop calibration records. The
//! record size depends on the vehicle-unit version: 105 bytes (Annex 1B)
//! or 161 bytes (Annex 1C); divisibility of the remainder selects the
//! layout. Both variants share the leading field group decoded here.

use crate::primitives::{decode_id_string, decode_string, nation_name, ByteReader};
use crate::types::{CalibrationRecord, DecodeError, Result, TachographFile};

const RECORD_LEN_1B: usize = 105;
const RECORD_LEN_1C: usize = 161;

/// Decode the calibration elementary file.
pub fn decode_calibration(payload: &[u8], file: &mut TachographFile) -> Result<()> {
    if payload.len() < 2 + RECORD_LEN_1B {
        return Err(DecodeError::Truncated {
            needed: 2 + RECORD_LEN_1B,
            available: payload.len(),
        });
    }

    let records = &payload[2..];
    let record_len = if records.len() % RECORD_LEN_1B == 0 {
        RECORD_LEN_1B
    } else if records.len() % RECORD_LEN_1C == 0 {
        RECORD_LEN_1C
    } else {
        // VU exports occasionally append slack; the 1B size still frames
        // the complete leading records
        RECORD_LEN_1B
    };

    for chunk in records.chunks_exact(record_len) {
        if chunk.iter().all(|&b| b == 0xFF) {
            continue;
        }
        let mut reader = ByteReader::new(chunk);
        let purpose = reader.u8()?;
        let vin = decode_id_string(reader.take(17)?);
        let nation = nation_name(reader.u8()?);
        let plate = decode_id_string(reader.take(14)?);
        let w_characteristic = reader.u16_be()?;
        let k_constant = reader.u16_be()?;
        let l_tyre_circumference = reader.u16_be()?;
        let tyre_size = decode_string(reader.take(15)?);
        let speed_limit_kmh = reader.u8()?;
        let odometer = reader.u24_be()?;

        file.calibration_records.push(CalibrationRecord {
            purpose,
            vin,
            plate,
            nation,
            w_characteristic,
            k_constant,
            l_tyre_circumference,
            tyre_size,
            speed_limit_kmh,
            odometer_km: (odometer != 0xFF_FFFF).then_some(odometer),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(len: usize) -> Vec<u8> {
        let mut chunk = Vec::new();
        chunk.push(0x03); // periodic inspection
        chunk.extend_from_slice(b"ZFA25000001234567");
        chunk.push(0x1A);
        chunk.extend_from_slice(b"FI321ZZ\x00\x00\x00\x00\x00\x00\x00");
        chunk.extend_from_slice(&8_000u16.to_be_bytes()); // w
        chunk.extend_from_slice(&8_000u16.to_be_bytes()); // k
        chunk.extend_from_slice(&3_050u16.to_be_bytes()); // l
        chunk.extend_from_slice(b"315/70R22.5\x00\x00\x00\x00");
        chunk.push(90);
        chunk.extend_from_slice(&[0x01, 0x86, 0xA0]); // 100000 km
        chunk.resize(len, 0x00);
        chunk
    }

    #[test]
    fn test_calibration_105() {
        let mut payload = vec![0x00, 0x00];
        payload.extend_from_slice(&record(105));
        let mut file = TachographFile::default();
        decode_calibration(&payload, &mut file).unwrap();
        assert_eq!(file.calibration_records.len(), 1);
        let cal = &file.calibration_records[0];
        assert_eq!(cal.purpose, 3);
        assert_eq!(cal.vin, "ZFA25000001234567");
        assert_eq!(cal.plate, "FI321ZZ");
        assert_eq!(cal.nation, "I");
        assert_eq!(cal.w_characteristic, 8_000);
        assert_eq!(cal.tyre_size, "315/70R22.5");
        assert_eq!(cal.speed_limit_kmh, 90);
        assert_eq!(cal.odometer_km, Some(100_000));
    }

    #[test]
    fn test_calibration_161_and_filler() {
        let mut payload = vec![0x00, 0x01];
        payload.extend_from_slice(&record(161));
        payload.extend_from_slice(&[0xFF; 161]);
        let mut file = TachographFile::default();
        decode_calibration(&payload, &mut file).unwrap();
        assert_eq!(file.calibration_records.len(), 1);
        assert_eq!(file.calibration_records[0].vin, "ZFA25000001234567");
    }
}
