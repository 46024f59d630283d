//! CardDriverActivity cyclic-buffer decoder (tag 0x0504 / 0x0524 / 0x0206)
//!
//! The payload is a 2-byte oldest pointer and a 2-byte newest pointer into
//! a circular body. Each daily record is
//! `prev_len(2) cur_len(2) day_ts(4) presence(2, BCD) distance(2)` followed
//! by 2-byte ActivityChangeInfo entries. Reconstruction walks backward
//! from the newest record along `prev_len`, with modular indexing over the
//! body, until the oldest record is reached; each record is visited
//! exactly once.

use crate::primitives::{bcd_counter, decode_time_real};
use crate::types::{
    ActivityChangeInfo, DailyActivityRecord, DecodeError, Result, TachographFile,
};
use std::collections::HashSet;

/// Fixed header length of one daily record
const DAY_HEADER_LEN: usize = 12;

/// Decode the activity elementary file into daily records, oldest first.
pub fn decode_activity(payload: &[u8], file: &mut TachographFile) -> Result<()> {
    if payload.len() < 4 + DAY_HEADER_LEN {
        return Err(DecodeError::Truncated {
            needed: 4 + DAY_HEADER_LEN,
            available: payload.len(),
        });
    }

    let oldest = u16::from_be_bytes([payload[0], payload[1]]) as usize;
    let newest = u16::from_be_bytes([payload[2], payload[3]]) as usize;
    let body = &payload[4..];

    if oldest >= body.len() || newest >= body.len() {
        return Err(DecodeError::InvalidValue(format!(
            "activity pointers {}/{} outside body of {} bytes",
            oldest,
            newest,
            body.len()
        )));
    }

    let mut days = Vec::new();
    let mut visited = HashSet::new();
    let mut offset = newest;

    // Walking backward cannot pass more records than headers fit the body
    let max_records = body.len() / DAY_HEADER_LEN + 1;

    for _ in 0..max_records {
        if !visited.insert(offset) {
            log::warn!("Activity walk revisited offset {}, stopping", offset);
            break;
        }
        let Some(day) = read_day(body, offset) else {
            break;
        };
        let previous_length = day.previous_length as usize;
        days.push(day);

        if offset == oldest {
            break;
        }
        if previous_length == 0 || previous_length > body.len() {
            break;
        }
        offset = (offset + body.len() - previous_length) % body.len();
    }

    // Backward walk produced newest-first; the result model is
    // chronological
    days.reverse();
    log::debug!("Reconstructed {} daily activity records", days.len());
    file.activities.extend(days);
    Ok(())
}

/// Read the bytes of one cyclic region, handling wrap-around.
fn cyclic_read(body: &[u8], start: usize, length: usize) -> Option<Vec<u8>> {
    if length > body.len() {
        return None;
    }
    let start = start % body.len();
    let end = start + length;
    if end <= body.len() {
        Some(body[start..end].to_vec())
    } else {
        let mut bytes = body[start..].to_vec();
        bytes.extend_from_slice(&body[..end - body.len()]);
        Some(bytes)
    }
}

/// Decode one daily record at `offset`; `None` stops the walk.
fn read_day(body: &[u8], offset: usize) -> Option<DailyActivityRecord> {
    let header = cyclic_read(body, offset, DAY_HEADER_LEN)?;
    let previous_length = u16::from_be_bytes([header[0], header[1]]);
    let current_length = u16::from_be_bytes([header[2], header[3]]);
    let day_ts = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
    let presence: [u8; 2] = [header[8], header[9]];
    let distance = u16::from_be_bytes([header[10], header[11]]);

    let record_len = current_length as usize;
    if record_len < DAY_HEADER_LEN || record_len > body.len() {
        return None;
    }
    let day = decode_time_real(day_ts)?;

    let change_bytes = cyclic_read(body, offset + DAY_HEADER_LEN, record_len - DAY_HEADER_LEN)?;
    let mut changes = Vec::with_capacity(change_bytes.len() / 2);
    for pair in change_bytes.chunks_exact(2) {
        let raw = u16::from_be_bytes([pair[0], pair[1]]);
        // 0xFFFF fills unused space; 0x0000 is a valid midnight rest entry
        if raw == 0xFFFF {
            continue;
        }
        changes.push(ActivityChangeInfo::decode(raw));
    }

    Some(DailyActivityRecord {
        day,
        previous_length,
        current_length,
        daily_presence_counter: bcd_counter(&presence),
        day_distance_km: distance,
        changes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActivityKind, CardSlot};

    /// Build one daily record with the given change words.
    fn day_record(prev_len: u16, day_ts: u32, distance: u16, changes: &[u16]) -> Vec<u8> {
        let current = (DAY_HEADER_LEN + changes.len() * 2) as u16;
        let mut record = Vec::new();
        record.extend_from_slice(&prev_len.to_be_bytes());
        record.extend_from_slice(&current.to_be_bytes());
        record.extend_from_slice(&day_ts.to_be_bytes());
        record.extend_from_slice(&[0x00, 0x01]); // presence counter 1
        record.extend_from_slice(&distance.to_be_bytes());
        for &change in changes {
            record.extend_from_slice(&change.to_be_bytes());
        }
        record
    }

    fn change(kind: ActivityKind, minute: u16) -> u16 {
        ((kind.code() as u16) << 11) | minute
    }

    #[test]
    fn test_two_day_walk() {
        // Day 1 at offset 0, day 2 follows it; newest = day 2
        let day1 = day_record(0, 1_600_000_000, 120, &[change(ActivityKind::Rest, 0)]);
        let day2 = day_record(
            day1.len() as u16,
            1_600_086_400,
            80,
            &[change(ActivityKind::Driving, 300)],
        );
        let day1_len = day1.len();

        let mut payload = vec![0x00, 0x00]; // oldest at 0
        payload.extend_from_slice(&(day1_len as u16).to_be_bytes()); // newest
        payload.extend_from_slice(&day1);
        payload.extend_from_slice(&day2);

        let mut file = TachographFile::default();
        decode_activity(&payload, &mut file).unwrap();

        assert_eq!(file.activities.len(), 2);
        // chronological order
        assert_eq!(file.activities[0].day.timestamp(), 1_600_000_000);
        assert_eq!(file.activities[1].day.timestamp(), 1_600_086_400);
        assert_eq!(file.activities[1].day_distance_km, 80);
        assert_eq!(file.activities[0].daily_presence_counter, Some(1));
        let first_change = &file.activities[1].changes[0];
        assert_eq!(first_change.activity, ActivityKind::Driving);
        assert_eq!(first_change.minute_of_day, 300);
        assert_eq!(first_change.slot, CardSlot::Driver);
    }

    #[test]
    fn test_wrap_around() {
        // Body layout: [tail of day2][day1][head of day2]; newest points at
        // day2's header which wraps past the body end
        let day1 = day_record(0, 1_600_000_000, 0, &[change(ActivityKind::Rest, 0)]);
        let day2 = day_record(
            day1.len() as u16,
            1_600_086_400,
            42,
            &[change(ActivityKind::Work, 60)],
        );

        let split = 4; // last 4 bytes of day2 wrap to the body start
        let day2_head = &day2[..day2.len() - split];
        let day2_tail = &day2[day2.len() - split..];

        let mut body = Vec::new();
        body.extend_from_slice(day2_tail);
        body.extend_from_slice(&day1);
        body.extend_from_slice(day2_head);

        let oldest = split as u16;
        let newest = (split + day1.len()) as u16;
        let mut payload = Vec::new();
        payload.extend_from_slice(&oldest.to_be_bytes());
        payload.extend_from_slice(&newest.to_be_bytes());
        payload.extend_from_slice(&body);

        let mut file = TachographFile::default();
        decode_activity(&payload, &mut file).unwrap();

        assert_eq!(file.activities.len(), 2);
        assert_eq!(file.activities[1].day_distance_km, 42);
        assert_eq!(file.activities[1].changes[0].activity, ActivityKind::Work);
    }

    #[test]
    fn test_single_record_visited_once() {
        let day = day_record(0, 1_600_000_000, 10, &[change(ActivityKind::Driving, 480)]);
        let mut payload = vec![0x00, 0x00, 0x00, 0x00];
        payload.extend_from_slice(&day);

        let mut file = TachographFile::default();
        decode_activity(&payload, &mut file).unwrap();
        assert_eq!(file.activities.len(), 1);
    }

    #[test]
    fn test_filler_changes_skipped() {
        let day = day_record(
            0,
            1_600_000_000,
            10,
            &[change(ActivityKind::Rest, 0), 0xFFFF, 0xFFFF],
        );
        let mut payload = vec![0x00, 0x00, 0x00, 0x00];
        payload.extend_from_slice(&day);

        let mut file = TachographFile::default();
        decode_activity(&payload, &mut file).unwrap();
        assert_eq!(file.activities[0].changes.len(), 1);
    }

    #[test]
    fn test_bad_pointers_rejected() {
        let mut file = TachographFile::default();
        let mut payload = vec![0xFF, 0xFF, 0x00, 0x00];
        payload.extend_from_slice(&[0u8; 16]);
        assert!(decode_activity(&payload, &mut file).is_err());
    }
}
