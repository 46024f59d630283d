//! Core types for the tachograph decoder library
//!
//! This module defines the generation-neutral result model that the decoder
//! emits when processing `.ddd` download files. The decoder is a pure
//! function from bytes to this model - it does not evaluate driving rules;
//! that is the job of the [`crate::compliance`] module, which consumes the
//! derived timeline.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::fmt;

/// Timestamp type used throughout the decoder
pub type Timestamp = DateTime<Utc>;

/// Result type for decoder operations
pub type Result<T> = std::result::Result<T, DecodeError>;

/// Errors that can occur during decoding
///
/// Only structural errors ([`DecodeError::MalformedFile`]) and I/O errors
/// surface to the caller of a full-file decode. Record-level errors are
/// recovered internally: the affected bytes land in
/// [`TachographFile::raw_unparsed`] and decoding continues.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Malformed file at offset {offset}: {reason}")]
    MalformedFile { offset: usize, reason: String },

    #[error("Record truncated: need {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Unknown record layout: {0}")]
    UnknownLayout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Tachograph equipment generation, detected from the first two bytes of
/// the file (see [`crate::framing::detect_generation`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Generation {
    /// Digital tachograph, Annex 1B
    G1,
    /// Smart tachograph, Annex 1C
    G2,
    /// Smart tachograph V2, Reg. (EU) 2023/980
    G2V2,
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Generation::G1 => write!(f, "G1"),
            Generation::G2 => write!(f, "G2"),
            Generation::G2V2 => write!(f, "G2.2"),
        }
    }
}

/// Driver activity kind, the 2-bit activity field of ActivityChangeInfo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ActivityKind {
    Rest,
    Availability,
    Work,
    Driving,
}

impl ActivityKind {
    /// Map the 2-bit wire code to an activity kind.
    pub fn from_code(code: u8) -> ActivityKind {
        match code & 0x03 {
            0 => ActivityKind::Rest,
            1 => ActivityKind::Availability,
            2 => ActivityKind::Work,
            _ => ActivityKind::Driving,
        }
    }

    /// The 2-bit wire code for this kind.
    pub fn code(self) -> u8 {
        match self {
            ActivityKind::Rest => 0,
            ActivityKind::Availability => 1,
            ActivityKind::Work => 2,
            ActivityKind::Driving => 3,
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivityKind::Rest => write!(f, "REST"),
            ActivityKind::Availability => write!(f, "AVAILABILITY"),
            ActivityKind::Work => write!(f, "WORK"),
            ActivityKind::Driving => write!(f, "DRIVING"),
        }
    }
}

/// Card slot a change was recorded in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CardSlot {
    Driver,
    CoDriver,
}

/// One decoded 2-byte ActivityChangeInfo bitfield
///
/// Wire layout (big-endian `u16`):
/// - bit 15: slot (0 = driver, 1 = co-driver)
/// - bit 14: crew flag (0 = single, 1 = crew)
/// - bit 13: card status (0 = inserted, 1 = withdrawn)
/// - bits 12-11: activity
/// - bits 10-0: minute of day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActivityChangeInfo {
    pub slot: CardSlot,
    pub crew: bool,
    pub card_withdrawn: bool,
    pub activity: ActivityKind,
    /// Minute of day; valid records carry 0..=1439 but the full 11-bit
    /// range round-trips so that re-encoding is lossless.
    pub minute_of_day: u16,
}

impl ActivityChangeInfo {
    /// Decode from the raw big-endian word.
    pub fn decode(raw: u16) -> ActivityChangeInfo {
        ActivityChangeInfo {
            slot: if raw & 0x8000 != 0 {
                CardSlot::CoDriver
            } else {
                CardSlot::Driver
            },
            crew: raw & 0x4000 != 0,
            card_withdrawn: raw & 0x2000 != 0,
            activity: ActivityKind::from_code(((raw >> 11) & 0x03) as u8),
            minute_of_day: raw & 0x07FF,
        }
    }

    /// Re-encode to the raw big-endian word. `encode(decode(x)) == x` for
    /// every 16-bit input.
    pub fn encode(&self) -> u16 {
        let mut raw = self.minute_of_day & 0x07FF;
        raw |= (self.activity.code() as u16) << 11;
        if self.card_withdrawn {
            raw |= 0x2000;
        }
        if self.crew {
            raw |= 0x4000;
        }
        if self.slot == CardSlot::CoDriver {
            raw |= 0x8000;
        }
        raw
    }
}

/// One day of the driver activity cyclic buffer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyActivityRecord {
    /// Midnight UTC of the recorded day
    pub day: Timestamp,
    /// Distance to the previous record in the cyclic buffer, bytes
    pub previous_length: u16,
    /// Length of this record in the cyclic buffer, bytes
    pub current_length: u16,
    /// BCD presence counter; `None` when the field was all-0xFF or not BCD
    pub daily_presence_counter: Option<u16>,
    pub day_distance_km: u16,
    pub changes: Vec<ActivityChangeInfo>,
}

/// The six fixed event-type groups of CardEventData
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventGroup {
    TimeOverlap,
    LastCardSession,
    PowerSupplyInterruption,
    CardConflict,
    TimeDifference,
    DrivingWithoutCard,
}

impl EventGroup {
    pub const ALL: [EventGroup; 6] = [
        EventGroup::TimeOverlap,
        EventGroup::LastCardSession,
        EventGroup::PowerSupplyInterruption,
        EventGroup::CardConflict,
        EventGroup::TimeDifference,
        EventGroup::DrivingWithoutCard,
    ];

    pub fn label(self) -> &'static str {
        match self {
            EventGroup::TimeOverlap => "TimeOverlap",
            EventGroup::LastCardSession => "LastCardSession",
            EventGroup::PowerSupplyInterruption => "PowerSupplyInterruption",
            EventGroup::CardConflict => "CardConflict",
            EventGroup::TimeDifference => "TimeDifference",
            EventGroup::DrivingWithoutCard => "DrivingWithoutCard",
        }
    }
}

/// Fault groups of CardFaultData
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FaultGroup {
    VuFault,
    CardFault,
}

/// A single event record (24 bytes on the wire)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    pub group: EventGroup,
    pub type_code: u8,
    pub begin: Option<Timestamp>,
    pub end: Option<Timestamp>,
    pub vehicle_nation: String,
    pub vehicle_plate: String,
}

/// A single fault record, same wire layout as events
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaultRecord {
    pub group: FaultGroup,
    pub type_code: u8,
    pub begin: Option<Timestamp>,
    pub end: Option<Timestamp>,
    pub vehicle_nation: String,
    pub vehicle_plate: String,
}

/// One vehicle usage period from CardVehiclesUsed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleUsedRecord {
    /// Odometer at first use, km; `None` when the field carried the
    /// all-0xFF sentinel
    pub odometer_begin_km: Option<u32>,
    pub odometer_end_km: Option<u32>,
    pub first_use: Option<Timestamp>,
    pub last_use: Option<Timestamp>,
    pub nation: String,
    pub plate: String,
    /// BCD block counter; absent in the 29-byte short form
    pub vu_data_block_counter: Option<u16>,
    /// Present only in the 48-byte G2 form
    pub vin: Option<String>,
}

/// Driving licence data from CardDrivingLicenceInformation
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DrivingLicence {
    pub authority: String,
    pub nation: String,
    pub number: String,
}

/// Which decode path produced the card holder birth date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BirthDateEncoding {
    Datef,
    TimeReal,
}

/// Card holder identity, merged from CardIdentification and
/// DriverCardHolderIdentification
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Driver {
    pub surname: String,
    pub first_names: String,
    pub birth_date: Option<NaiveDate>,
    /// The encoding that successfully produced `birth_date`
    pub birth_date_encoding: Option<BirthDateEncoding>,
    /// Raw birth-date field, hex, kept because producers disagree on the
    /// encoding
    pub birth_date_raw_hex: String,
    pub card_number: String,
    pub card_issuing_authority: String,
    pub card_issue_date: Option<Timestamp>,
    pub card_validity_begin: Option<Timestamp>,
    pub card_expiry: Option<Timestamp>,
    pub issuing_nation: String,
    pub preferred_language: String,
    pub licence: Option<DrivingLicence>,
}

/// DriverCardApplicationIdentification (tag 0x0501)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardApplication {
    pub card_type: u8,
    /// Card structure version, two raw bytes as hex
    pub structure_version: String,
    pub events_per_type: u8,
    pub faults_per_type: u8,
    pub activity_structure_length: u16,
    pub vehicle_records: u16,
    pub place_records: u8,
}

/// Daily work period place record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaceRecord {
    pub entry_time: Option<Timestamp>,
    pub entry_type: u8,
    pub country: String,
    pub region: u8,
    pub odometer_km: Option<u32>,
}

/// GNSS position recorded with accumulated driving (G2.2)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GnssPoint {
    pub timestamp: Timestamp,
    pub latitude: f64,
    pub longitude: f64,
    pub speed_kmh: u16,
    pub heading: u16,
}

/// GNSS-enhanced place record (G2/G2.2)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GnssPlaceRecord {
    pub timestamp: Timestamp,
    pub latitude: f64,
    pub longitude: f64,
    pub place_type: Option<u8>,
    pub nation: Option<String>,
}

/// Border crossing record (G2/G2.2)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BorderCrossing {
    pub timestamp: Timestamp,
    pub nation_from: String,
    pub nation_to: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Load or unload operation (G2/G2.2)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadUnloadRecord {
    pub timestamp: Timestamp,
    pub operation: LoadOperation,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoadOperation {
    Load,
    Unload,
}

/// Trailer coupling record (G2/G2.2)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrailerRecord {
    pub timestamp: Timestamp,
    pub nation: String,
    pub plate: String,
    pub coupled: bool,
}

/// Load sensor (axle weight) snapshot (G2.2)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadSensorRecord {
    pub timestamp: Timestamp,
    pub weights_kg: Vec<u16>,
}

/// Workshop calibration record (tag 0x050C; 105- or 161-byte layout)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationRecord {
    pub purpose: u8,
    pub vin: String,
    pub plate: String,
    pub nation: String,
    pub w_characteristic: u16,
    pub k_constant: u16,
    pub l_tyre_circumference: u16,
    pub tyre_size: String,
    pub speed_limit_kmh: u8,
    pub odometer_km: Option<u32>,
}

/// Signature algorithm family per generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SignatureAlgorithm {
    /// RSA, ISO/IEC 9796-2 (Annex 1B)
    Rsa,
    /// ECDSA on Brainpool curves (Annex 1C)
    Ecdsa,
}

/// A signature block located in the file, paired with its data block when
/// possible
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignatureBlock {
    /// The signature block's own tag
    pub tag: u16,
    /// Tag of the data block this signature covers; `None` for orphans
    pub data_tag: Option<u16>,
    /// File offset of the covered data block's payload
    pub data_offset: Option<usize>,
    pub data_length: Option<usize>,
    pub algorithm: SignatureAlgorithm,
    #[serde(serialize_with = "hex_bytes")]
    pub signature: Vec<u8>,
    /// A signature that could not be paired with any data block
    pub orphan: bool,
}

/// Certificate kinds stored for the signature-verifier collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CertificateKind {
    Card,
    CertificationAuthority,
    Link,
    MemberState,
}

/// An undecoded certificate block (tags 0xC100..0xC108)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CertificateBlock {
    pub tag: u16,
    pub kind: CertificateKind,
    #[serde(serialize_with = "hex_bytes")]
    pub bytes: Vec<u8>,
}

/// A region of the file that no decoder claimed: unknown tag, malformed
/// length, or trailing bytes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawBlock {
    /// Tag of the unrecognized record, when one could be framed
    pub tag: Option<u16>,
    pub offset: usize,
    pub length: usize,
    #[serde(serialize_with = "hex_bytes")]
    pub bytes: Vec<u8>,
}

/// Semantic warning categories: known field ambiguities, not failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WarningKind {
    BirthDateAsTimeReal,
    MissingVin,
    OdometerNotMonotonic,
    UnknownLayout,
    MalformedRecord,
}

/// A semantic warning attached to the result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodeWarning {
    pub kind: WarningKind,
    pub detail: String,
}

/// A timeline activity derived from the change stream: one contiguous span
/// of a single `(kind, slot, card_inserted)` state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Activity {
    pub kind: ActivityKind,
    pub start: Timestamp,
    pub end: Timestamp,
    pub duration_minutes: i64,
    pub slot: CardSlot,
    pub card_inserted: bool,
}

/// Complete decoded file: the generation-neutral result model
///
/// All records are produced in a single decode pass and owned exclusively
/// by this structure. `timeline` is derived once from `activities` by the
/// timeline builder and is what the compliance engine consumes.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TachographFile {
    pub generation: Option<Generation>,
    pub card_application: Option<CardApplication>,
    pub driver: Driver,
    pub vin: Option<String>,
    pub vehicles_used: Vec<VehicleUsedRecord>,
    pub activities: Vec<DailyActivityRecord>,
    pub timeline: Vec<Activity>,
    pub events: Vec<EventRecord>,
    pub faults: Vec<FaultRecord>,
    pub places: Vec<PlaceRecord>,
    pub gnss_points: Vec<GnssPoint>,
    pub gnss_places: Vec<GnssPlaceRecord>,
    pub border_crossings: Vec<BorderCrossing>,
    pub load_unload: Vec<LoadUnloadRecord>,
    pub trailers: Vec<TrailerRecord>,
    pub load_sensor: Vec<LoadSensorRecord>,
    pub calibration_records: Vec<CalibrationRecord>,
    pub certificates: Vec<CertificateBlock>,
    pub signature_blocks: Vec<SignatureBlock>,
    pub raw_unparsed: Vec<RawBlock>,
    pub warnings: Vec<DecodeWarning>,
}

impl TachographFile {
    /// Push a semantic warning onto the result.
    pub fn warn(&mut self, kind: WarningKind, detail: impl Into<String>) {
        let detail = detail.into();
        log::warn!("{:?}: {}", kind, detail);
        self.warnings.push(DecodeWarning { kind, detail });
    }
}

/// Serialize binary fields as lowercase hex
fn hex_bytes<S>(bytes: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_change_roundtrip_exhaustive() {
        for raw in 0..=u16::MAX {
            let decoded = ActivityChangeInfo::decode(raw);
            assert_eq!(decoded.encode(), raw, "round-trip failed for {:#06x}", raw);
        }
    }

    #[test]
    fn test_activity_change_fields() {
        // co-driver, crew, withdrawn, driving, minute 90
        let raw = 0x8000 | 0x4000 | 0x2000 | (3 << 11) | 90;
        let info = ActivityChangeInfo::decode(raw);
        assert_eq!(info.slot, CardSlot::CoDriver);
        assert!(info.crew);
        assert!(info.card_withdrawn);
        assert_eq!(info.activity, ActivityKind::Driving);
        assert_eq!(info.minute_of_day, 90);
    }

    #[test]
    fn test_activity_kind_codes() {
        for code in 0..4u8 {
            assert_eq!(ActivityKind::from_code(code).code(), code);
        }
    }

    #[test]
    fn test_generation_display() {
        assert_eq!(Generation::G1.to_string(), "G1");
        assert_eq!(Generation::G2V2.to_string(), "G2.2");
    }

    #[test]
    fn test_raw_block_serializes_hex() {
        let block = RawBlock {
            tag: Some(0x0502),
            offset: 10,
            length: 3,
            bytes: vec![0xAB, 0xCD, 0xEF],
        };
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["bytes"], "abcdef");
    }
}
