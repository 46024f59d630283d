//! Event and fault decoders (tags 0x0502 / 0x0503 and G2 counterparts)
//!
//! CardEventData is a sequence of six equally sized event-type groups,
//! each a fixed-count array of 24-byte records. CardFaultData has the
//! same record layout in two groups. Empty slots (all-0xFF type or
//! sentinel begin time) are skipped but do not terminate a group.

use crate::primitives::{decode_id_string, nation_name, ByteReader};
use crate::types::{
    DecodeError, EventGroup, EventRecord, FaultGroup, FaultRecord, Result, TachographFile,
    Timestamp,
};

/// Wire size of one event or fault record
pub const EVENT_RECORD_LEN: usize = 24;

struct WireEvent {
    type_code: u8,
    begin: Option<Timestamp>,
    begin_raw: u32,
    end: Option<Timestamp>,
    nation: String,
    plate: String,
}

fn read_record(reader: &mut ByteReader<'_>) -> Result<WireEvent> {
    let type_code = reader.u8()?;
    let begin_raw = reader.u32_be()?;
    let begin = crate::primitives::decode_time_real(begin_raw);
    let end = reader.time_real()?;
    let nation = nation_name(reader.u8()?);
    let plate = decode_id_string(reader.take(14)?);
    Ok(WireEvent {
        type_code,
        begin,
        begin_raw,
        end,
        nation,
        plate,
    })
}

/// A slot is empty when the type is the 0xFF filler or the begin time is
/// one of the empty sentinels.
fn is_empty(record: &WireEvent) -> bool {
    record.type_code == 0xFF || record.begin_raw == 0 || record.begin_raw == 0xFFFF_FFFF
}

/// Decode CardEventData: six groups of `len / 6 / 24` records each.
pub fn decode_events(payload: &[u8], file: &mut TachographFile) -> Result<()> {
    let group_len = payload.len() / EventGroup::ALL.len();
    let records_per_group = group_len / EVENT_RECORD_LEN;
    if records_per_group == 0 {
        return Err(DecodeError::UnknownLayout(format!(
            "event data of {} bytes holds no complete record group",
            payload.len()
        )));
    }

    for (index, group) in EventGroup::ALL.iter().enumerate() {
        let base = index * group_len;
        let mut reader = ByteReader::new(&payload[base..base + records_per_group * EVENT_RECORD_LEN]);
        for _ in 0..records_per_group {
            let record = read_record(&mut reader)?;
            if is_empty(&record) {
                continue;
            }
            file.events.push(EventRecord {
                group: *group,
                type_code: record.type_code,
                begin: record.begin,
                end: record.end,
                vehicle_nation: record.nation,
                vehicle_plate: record.plate,
            });
        }
    }
    log::debug!("Decoded {} events", file.events.len());
    Ok(())
}

/// Decode CardFaultData: two groups with the event record layout.
pub fn decode_faults(payload: &[u8], file: &mut TachographFile) -> Result<()> {
    const GROUPS: [FaultGroup; 2] = [FaultGroup::VuFault, FaultGroup::CardFault];
    let group_len = payload.len() / GROUPS.len();
    let records_per_group = group_len / EVENT_RECORD_LEN;
    if records_per_group == 0 {
        return Err(DecodeError::UnknownLayout(format!(
            "fault data of {} bytes holds no complete record group",
            payload.len()
        )));
    }

    for (index, group) in GROUPS.iter().enumerate() {
        let base = index * group_len;
        let mut reader = ByteReader::new(&payload[base..base + records_per_group * EVENT_RECORD_LEN]);
        for _ in 0..records_per_group {
            let record = read_record(&mut reader)?;
            if is_empty(&record) {
                continue;
            }
            file.faults.push(FaultRecord {
                group: *group,
                type_code: record.type_code,
                begin: record.begin,
                end: record.end,
                vehicle_nation: record.nation,
                vehicle_plate: record.plate,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_record() -> Vec<u8> {
        let mut record = vec![0xFF];
        record.extend_from_slice(&[0x00; 4]);
        record.extend_from_slice(&[0x00; 4]);
        record.push(0xFF);
        record.extend_from_slice(&[0xFF; 14]);
        record
    }

    fn record(type_code: u8, begin: u32, end: u32, nation: u8, plate: &[u8]) -> Vec<u8> {
        let mut data = vec![type_code];
        data.extend_from_slice(&begin.to_be_bytes());
        data.extend_from_slice(&end.to_be_bytes());
        data.push(nation);
        let mut plate_field = plate.to_vec();
        plate_field.resize(14, 0x00);
        data.extend_from_slice(&plate_field);
        data
    }

    #[test]
    fn test_single_driving_without_card_event() {
        // one record per group; groups 0..5 empty, group 5 holds the event
        let mut payload = Vec::new();
        for _ in 0..5 {
            payload.extend_from_slice(&empty_record());
        }
        payload.extend_from_slice(&record(0x08, 1_600_000_000, 1_600_003_600, 0x0D, b"B AB 123"));

        let mut file = TachographFile::default();
        decode_events(&payload, &mut file).unwrap();

        assert_eq!(file.events.len(), 1);
        let event = &file.events[0];
        assert_eq!(event.group, EventGroup::DrivingWithoutCard);
        assert_eq!(event.group.label(), "DrivingWithoutCard");
        assert_eq!(event.begin.unwrap().timestamp(), 1_600_000_000);
        assert_eq!(event.end.unwrap().timestamp(), 1_600_003_600);
        assert_eq!(event.vehicle_nation, "D");
        assert_eq!(event.vehicle_plate, "B AB 123");
    }

    #[test]
    fn test_empty_record_does_not_terminate_group() {
        // two records per group: group 0 = [empty, real], rest empty
        let mut payload = Vec::new();
        payload.extend_from_slice(&empty_record());
        payload.extend_from_slice(&record(0x01, 1_500_000_000, 1_500_000_600, 0x11, b"AA111BB"));
        for _ in 0..10 {
            payload.extend_from_slice(&empty_record());
        }

        let mut file = TachographFile::default();
        decode_events(&payload, &mut file).unwrap();
        assert_eq!(file.events.len(), 1);
        assert_eq!(file.events[0].group, EventGroup::TimeOverlap);
    }

    #[test]
    fn test_faults_two_groups() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&record(0x21, 1_550_000_000, 1_550_000_060, 0x1A, b"MI000XX"));
        payload.extend_from_slice(&empty_record());

        let mut file = TachographFile::default();
        decode_faults(&payload, &mut file).unwrap();
        assert_eq!(file.faults.len(), 1);
        assert_eq!(file.faults[0].group, FaultGroup::VuFault);
        assert_eq!(file.faults[0].type_code, 0x21);
    }

    #[test]
    fn test_too_short_payload_rejected() {
        let mut file = TachographFile::default();
        assert!(decode_events(&[0u8; 30], &mut file).is_err());
    }
}
