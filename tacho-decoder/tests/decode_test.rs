//! End-to-end decode tests over hand-built `.ddd` byte images

use tacho_decoder::compliance::{self, InfractionCategory};
use tacho_decoder::framing;
use tacho_decoder::registry::TagRegistry;
use tacho_decoder::types::{ActivityKind, EventGroup, Generation};
use tacho_decoder::{DecoderConfig, TachoDecoder};

/// One STAP record: tag + record type + 2-byte length + payload
fn stap(tag: u16, record_type: u8, payload: &[u8]) -> Vec<u8> {
    let mut bytes = tag.to_be_bytes().to_vec();
    bytes.push(record_type);
    bytes.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    bytes.extend_from_slice(payload);
    bytes
}

fn padded(text: &[u8], len: usize) -> Vec<u8> {
    let mut field = text.to_vec();
    field.resize(len, 0x00);
    field
}

/// CardIdentification (65) + DriverCardHolderIdentification (78)
fn identification_payload() -> Vec<u8> {
    let mut payload = Vec::new();
    payload.push(0x11); // France
    payload.extend_from_slice(&padded(b"F100000000000001", 16));
    payload.extend_from_slice(&padded(b"PREFECTURE 75", 36));
    payload.extend_from_slice(&1_262_304_000u32.to_be_bytes());
    payload.extend_from_slice(&1_262_304_000u32.to_be_bytes());
    payload.extend_from_slice(&1_893_456_000u32.to_be_bytes());
    payload.extend_from_slice(&padded(b"DUPONT", 36));
    payload.extend_from_slice(&padded(b"JEAN", 36));
    payload.extend_from_slice(&[0x19, 0x79, 0x03, 0x05]);
    payload.extend_from_slice(b"fr");
    payload
}

fn empty_event() -> Vec<u8> {
    let mut record = vec![0xFF];
    record.extend_from_slice(&[0x00; 8]);
    record.push(0xFF);
    record.extend_from_slice(&[0xFF; 14]);
    record
}

/// Six event groups, one record each, with one real DrivingWithoutCard
/// entry in the last group
fn events_payload() -> Vec<u8> {
    let mut payload = Vec::new();
    for _ in 0..5 {
        payload.extend_from_slice(&empty_event());
    }
    let mut record = vec![0x08];
    record.extend_from_slice(&1_600_000_000u32.to_be_bytes());
    record.extend_from_slice(&1_600_005_400u32.to_be_bytes());
    record.push(0x11);
    record.extend_from_slice(&padded(b"AA111BB", 14));
    payload.extend_from_slice(&record);
    payload
}

/// Pointer + one 31-byte G1 vehicle record (Annex 1B field order)
fn vehicles_payload() -> Vec<u8> {
    let mut payload = vec![0x00, 0x00];
    payload.extend_from_slice(&[0x00, 0x27, 0x10]);
    payload.extend_from_slice(&[0x00, 0x27, 0x21]);
    payload.extend_from_slice(&[0x5E, 0x00, 0x00, 0x00]);
    payload.extend_from_slice(&[0x5E, 0x00, 0x0E, 0x10]);
    payload.push(0x03);
    payload.extend_from_slice(&padded(b"AB123CD", 14));
    payload.extend_from_slice(&[0x00, 0x00]);
    payload
}

fn change_word(kind: ActivityKind, minute: u16) -> [u8; 2] {
    (((kind.code() as u16) << 11) | minute).to_be_bytes()
}

/// Cyclic activity buffer holding a single day
fn activity_payload(day_ts: u32, changes: &[(ActivityKind, u16)]) -> Vec<u8> {
    let current_length = (12 + changes.len() * 2) as u16;
    let mut payload = vec![0x00, 0x00, 0x00, 0x00]; // oldest = newest = 0
    payload.extend_from_slice(&0u16.to_be_bytes()); // prev_len
    payload.extend_from_slice(&current_length.to_be_bytes());
    payload.extend_from_slice(&day_ts.to_be_bytes());
    payload.extend_from_slice(&[0x00, 0x01]); // presence counter
    payload.extend_from_slice(&120u16.to_be_bytes()); // day distance
    for &(kind, minute) in changes {
        payload.extend_from_slice(&change_word(kind, minute));
    }
    payload
}

/// 2020-09-14 00:00 UTC, a Monday
const MONDAY: u32 = 1_600_041_600;

fn g1_file() -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&stap(0x0520, 0x00, &identification_payload()));
    data.extend_from_slice(&stap(0x0520, 0x01, &[0x5C; 128]));
    data.extend_from_slice(&stap(0x0502, 0x00, &events_payload()));
    data.extend_from_slice(&stap(0x0502, 0x01, &[0x51; 128]));
    data.extend_from_slice(&stap(0x0505, 0x00, &vehicles_payload()));
    data.extend_from_slice(&stap(
        0x0504,
        0x00,
        &activity_payload(
            MONDAY,
            &[
                (ActivityKind::Rest, 0),
                (ActivityKind::Driving, 360),
                (ActivityKind::Rest, 660),
            ],
        ),
    ));
    data
}

#[test]
fn test_g1_full_decode() {
    let decoder = TachoDecoder::new();
    let file = decoder.decode_bytes(&g1_file(), &DecoderConfig::default()).unwrap();

    assert_eq!(file.generation, Some(Generation::G1));
    assert_eq!(file.driver.surname, "DUPONT");
    assert_eq!(file.driver.first_names, "JEAN");
    assert_eq!(file.driver.card_number, "F100000000000001");
    assert_eq!(file.driver.issuing_nation, "F");

    // vehicles: odometers first, then timestamps, nation, plate, counter
    assert_eq!(file.vehicles_used.len(), 1);
    let vehicle = &file.vehicles_used[0];
    assert_eq!(vehicle.odometer_begin_km, Some(10_000));
    assert_eq!(vehicle.odometer_end_km, Some(10_017));
    assert_eq!(vehicle.first_use.unwrap().timestamp(), 0x5E00_0000 as i64);
    assert_eq!(vehicle.nation, "AND");
    assert_eq!(vehicle.plate, "AB123CD");

    // activity + timeline
    assert_eq!(file.activities.len(), 1);
    assert_eq!(file.activities[0].day_distance_km, 120);
    assert_eq!(file.timeline.len(), 2);
    assert_eq!(file.timeline[1].kind, ActivityKind::Driving);
    assert_eq!(file.timeline[1].duration_minutes, 300);

    // signatures paired with their data blocks
    assert_eq!(file.signature_blocks.len(), 2);
    assert!(file.signature_blocks.iter().all(|s| !s.orphan));
    assert_eq!(file.signature_blocks[0].data_tag, Some(0x0520));
    assert!(file.raw_unparsed.is_empty());
}

#[test]
fn test_event_dispatch_leaves_identification_untouched() {
    // One DrivingWithoutCard event must land in events[] without touching
    // the driver identity
    let decoder = TachoDecoder::new();
    let file = decoder.decode_bytes(&g1_file(), &DecoderConfig::default()).unwrap();

    assert_eq!(file.events.len(), 1);
    let event = &file.events[0];
    assert_eq!(event.group, EventGroup::DrivingWithoutCard);
    assert_eq!(event.begin.unwrap().timestamp(), 1_600_000_000);
    assert_eq!(event.end.unwrap().timestamp(), 1_600_005_400);
    assert_eq!(event.vehicle_plate, "AA111BB");

    // identification decoded from its own tag, not clobbered by 0x0502
    assert_eq!(file.driver.surname, "DUPONT");
    assert_eq!(file.driver.card_number, "F100000000000001");
}

#[test]
fn test_decode_then_analyze_finds_missing_break() {
    let decoder = TachoDecoder::new();
    let file = decoder.decode_bytes(&g1_file(), &DecoderConfig::default()).unwrap();
    let report = compliance::analyze(&file);

    let categories: Vec<_> = report.infractions.iter().map(|i| i.category).collect();
    assert_eq!(categories, vec![InfractionCategory::NoBreakAfter4h30]);
    assert_eq!(report.weeks.len(), 1);
    assert_eq!(report.weeks[0].driving_minutes, 300);
    assert_eq!(report.weeks[0].distance_km, 120);
}

#[test]
fn test_covering_property_with_junk() {
    // Whole-file coverage: decoded block ranges plus raw spans equal the
    // payload byte-for-byte, junk and unknown tags included
    let mut data = g1_file();
    data.extend_from_slice(&stap(0x0ABC, 0x00, &[0x42; 7])); // unknown tag
    data.extend_from_slice(&[0xFF, 0xFF]); // unbracketable tail

    let registry = TagRegistry::standard();
    let framed = framing::frame(&data, &registry, &DecoderConfig::default()).unwrap();

    let mut covered = vec![false; data.len()];
    for block in &framed.blocks {
        for flag in covered
            .iter_mut()
            .skip(block.offset)
            .take(block.header_len + block.padding)
        {
            *flag = true;
        }
        if !block.is_container {
            for flag in covered.iter_mut().skip(block.payload_offset).take(block.length) {
                *flag = true;
            }
        }
    }
    for span in &framed.raw_spans {
        for flag in covered.iter_mut().skip(span.offset).take(span.length) {
            *flag = true;
        }
    }
    assert!(covered.iter().all(|&c| c), "every byte of the file must be covered");

    // And the decoder keeps the unclaimed bytes
    let decoder = TachoDecoder::new();
    let file = decoder.decode_bytes(&data, &DecoderConfig::default()).unwrap();
    assert!(file.raw_unparsed.iter().any(|r| r.tag == Some(0x0ABC)));
    assert!(file.raw_unparsed.iter().any(|r| r.tag.is_none() && r.length == 2));
}

/// One BER-TLV block with short-form length
fn ber(tag: u16, payload: &[u8]) -> Vec<u8> {
    assert!(payload.len() < 0x80);
    let mut bytes = tag.to_be_bytes().to_vec();
    bytes.push(payload.len() as u8);
    bytes.extend_from_slice(payload);
    bytes
}

#[test]
fn test_g2v2_container_decode() {
    // GNSS accumulated driving record
    let mut gnss = Vec::new();
    gnss.extend_from_slice(&1_700_000_000u32.to_be_bytes());
    gnss.extend_from_slice(&451_234_567i32.to_be_bytes());
    gnss.extend_from_slice(&92_345_678i32.to_be_bytes());
    gnss.extend_from_slice(&75u16.to_be_bytes());
    gnss.extend_from_slice(&180u16.to_be_bytes());

    let mut inner = vec![0x00, 0x00]; // padding word
    inner.extend_from_slice(&ber(0x0525, &gnss));
    inner.extend_from_slice(&ber(0x0525 | 0x8000, &[0x5C; 16])); // signature

    let mut data = vec![0x76, 0x31, inner.len() as u8];
    data.extend_from_slice(&inner);

    let decoder = TachoDecoder::new();
    let file = decoder.decode_bytes(&data, &DecoderConfig::default()).unwrap();

    assert_eq!(file.generation, Some(Generation::G2V2));
    assert_eq!(file.gnss_points.len(), 1);
    assert!((file.gnss_points[0].latitude - 45.1234567).abs() < 1e-9);
    assert_eq!(file.gnss_points[0].speed_kmh, 75);

    assert_eq!(file.signature_blocks.len(), 1);
    assert!(!file.signature_blocks[0].orphan);
    assert_eq!(file.signature_blocks[0].data_tag, Some(0x0525));
    assert!(file.raw_unparsed.is_empty());
}

#[test]
fn test_strict_mode_surfaces_heuristic_layout_as_raw() {
    // A 13-byte load/unload payload decodes under the default config but
    // is kept raw in strict mode
    let mut record = Vec::new();
    record.extend_from_slice(&1_700_000_000u32.to_be_bytes());
    record.push(0x00);
    record.extend_from_slice(&451_000_000i32.to_be_bytes());
    record.extend_from_slice(&90_000_000i32.to_be_bytes());

    let mut inner = ber(0x0526, &record);
    let mut data = vec![0x76, 0x31, inner.len() as u8];
    data.append(&mut inner);

    let decoder = TachoDecoder::new();
    let default_file = decoder.decode_bytes(&data, &DecoderConfig::default()).unwrap();
    assert_eq!(default_file.load_unload.len(), 1);
    assert!(default_file.raw_unparsed.is_empty());

    let strict_file = decoder
        .decode_bytes(&data, &DecoderConfig::new().strict())
        .unwrap();
    assert!(strict_file.load_unload.is_empty());
    assert_eq!(strict_file.raw_unparsed.len(), 1);
    assert_eq!(strict_file.raw_unparsed[0].tag, Some(0x0526));
}

#[test]
fn test_generation_detection_is_pure() {
    assert_eq!(framing::detect_generation([0x76, 0x21]), Generation::G2);
    assert_eq!(framing::detect_generation([0x76, 0x31]), Generation::G2V2);
    for other in [[0x05, 0x01], [0x00, 0x02], [0xC1, 0x00]] {
        assert_eq!(framing::detect_generation(other), Generation::G1);
    }
}
