//! Identification decoders
//!
//! Covers the card application identification (0x0501), the combined
//! CardIdentification + DriverCardHolderIdentification record (0x0520),
//! the standalone holder identification of the G2 section (0x0201) and
//! the driving licence information (0x0521).

use crate::primitives::{decode_datef, decode_id_string, decode_string, decode_time_real, nation_name, ByteReader};
use crate::types::{
    BirthDateEncoding, CardApplication, DrivingLicence, Result, TachographFile, WarningKind,
};
use chrono::NaiveDate;

/// Length of the CardIdentification part of tag 0x0520
const CARD_IDENTIFICATION_LEN: usize = 65;
/// Length of the DriverCardHolderIdentification part
const HOLDER_IDENTIFICATION_LEN: usize = 78;

/// Decode DriverCardApplicationIdentification (0x0501, 10 bytes).
pub fn decode_application(payload: &[u8], file: &mut TachographFile) -> Result<()> {
    let mut reader = ByteReader::new(payload);
    let card_type = reader.u8()?;
    let version = reader.take(2)?;
    let events_per_type = reader.u8()?;
    let faults_per_type = reader.u8()?;
    let activity_structure_length = reader.u16_be()?;
    let vehicle_records = reader.u16_be()?;
    let place_records = reader.u8()?;

    file.card_application = Some(CardApplication {
        card_type,
        structure_version: hex::encode(version),
        events_per_type,
        faults_per_type,
        activity_structure_length,
        vehicle_records,
        place_records,
    });
    Ok(())
}

/// Decode CardIdentification + DriverCardHolderIdentification (0x0520).
///
/// CardIdentification (65 bytes): issuing nation (1), card number (16),
/// issuing authority (36), issue date (4), validity begin (4), expiry (4).
/// DriverCardHolderIdentification (78 bytes): surname (36), first names
/// (36), birth date (4), preferred language (2). The holder part may be
/// absent in partial downloads.
pub fn decode_identification(payload: &[u8], file: &mut TachographFile) -> Result<()> {
    let mut reader = ByteReader::new(payload);

    file.driver.issuing_nation = nation_name(reader.u8()?);
    file.driver.card_number = decode_id_string(reader.take(16)?);
    file.driver.card_issuing_authority = decode_string(reader.take(36)?);
    file.driver.card_issue_date = reader.time_real()?;
    file.driver.card_validity_begin = reader.time_real()?;
    file.driver.card_expiry = reader.time_real()?;

    if payload.len() >= CARD_IDENTIFICATION_LEN + HOLDER_IDENTIFICATION_LEN {
        decode_holder(&payload[CARD_IDENTIFICATION_LEN..], file)?;
    } else if reader.remaining() >= 36 {
        // Partial holder data: at least the surname is present
        file.driver.surname = decode_string(reader.take(36)?);
    }
    Ok(())
}

/// Decode DriverCardHolderIdentification (0x0201 in the G2 section, or
/// the tail of 0x0520).
pub fn decode_holder(payload: &[u8], file: &mut TachographFile) -> Result<()> {
    let mut reader = ByteReader::new(payload);
    file.driver.surname = decode_string(reader.take(36)?);
    file.driver.first_names = decode_string(reader.take(36)?);

    let bytes = reader.take(4)?;
    let raw = [bytes[0], bytes[1], bytes[2], bytes[3]];
    let (date, encoding) = decode_birth_date(raw);
    file.driver.birth_date = date;
    file.driver.birth_date_encoding = encoding;
    file.driver.birth_date_raw_hex = hex::encode(raw);
    if encoding == Some(BirthDateEncoding::TimeReal) {
        file.warn(
            WarningKind::BirthDateAsTimeReal,
            format!("birth date field {} decoded as TimeReal", hex::encode(raw)),
        );
    }

    file.driver.preferred_language = decode_string(reader.take(2)?);
    Ok(())
}

/// Decode the 4-byte card holder birth date.
///
/// Nominally `Datef`, but some producers emit `TimeReal`; Datef is
/// attempted first and TimeReal only when the bytes are not a valid BCD
/// date. Pure function of the four bytes, so re-decoding the recorded raw
/// value yields the same result.
pub fn decode_birth_date(raw: [u8; 4]) -> (Option<NaiveDate>, Option<BirthDateEncoding>) {
    if let Some(date) = decode_datef(&raw) {
        return (Some(date), Some(BirthDateEncoding::Datef));
    }
    let seconds = u32::from_be_bytes(raw);
    if let Some(ts) = decode_time_real(seconds) {
        return (Some(ts.date_naive()), Some(BirthDateEncoding::TimeReal));
    }
    (None, None)
}

/// Decode CardDrivingLicenceInformation (0x0521, 53 bytes): issuing
/// authority (36), issuing nation (1), licence number (16).
pub fn decode_licence(payload: &[u8], file: &mut TachographFile) -> Result<()> {
    let mut reader = ByteReader::new(payload);
    let authority = decode_string(reader.take(36)?);
    let nation = nation_name(reader.u8()?);
    let number = decode_id_string(reader.take(16)?);
    file.driver.licence = Some(DrivingLicence {
        authority,
        nation,
        number,
    });
    Ok(())
}

/// Decode a VehicleIdentificationNumber block (tag 0x0001, 17 bytes).
pub fn decode_vin(payload: &[u8], file: &mut TachographFile) -> Result<()> {
    let mut reader = ByteReader::new(payload);
    let vin = decode_id_string(reader.take(17)?);
    if !vin.is_empty() {
        file.vin = Some(vin);
    }
    Ok(())
}
