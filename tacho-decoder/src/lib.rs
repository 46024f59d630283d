//! Tachograph Download File Decoder
//!
//! A library for decoding `.ddd` download files from European digital
//! tachographs and driver cards, covering all three equipment generations
//! (G1 / Annex 1B, G2 Smart / Annex 1C, G2.2 Smart V2 / Reg. 2023/980),
//! and for evaluating the decoded activity timeline against the driving
//! and rest rules of EU Regulation 561/2006.
//!
//! # Architecture
//!
//! The decode pipeline is a pure function from bytes to a
//! generation-neutral result:
//!
//! - The framing reader brackets the file into tagged blocks (STAP for
//!   G1, BER-TLV with nested containers for G2/G2.2, plus a fallback
//!   heuristic) and never aborts on a single bad record.
//! - The tag registry routes each block to its structural record decoder.
//! - The aggregator owns all decoded records; bytes nothing claimed are
//!   preserved under `raw_unparsed` so that the block ranges cover the
//!   whole file.
//! - Signature blocks are paired with their data blocks; cryptographic
//!   verification is delegated through the [`signature::SignatureVerifier`]
//!   trait.
//! - The timeline builder turns activity changes into contiguous,
//!   duration-annotated spans, which the compliance engine partitions
//!   into shifts and weeks.
//!
//! # Example
//!
//! ```no_run
//! use tacho_decoder::{compliance, DecoderConfig, TachoDecoder};
//! use std::path::Path;
//!
//! let decoder = TachoDecoder::new();
//! let file = decoder
//!     .decode_file(Path::new("driver_card.ddd"), &DecoderConfig::default())
//!     .unwrap();
//!
//! println!("{} {}", file.driver.first_names, file.driver.surname);
//! let report = compliance::analyze(&file);
//! for infraction in &report.infractions {
//!     println!("{} [{}] {}", infraction.date, infraction.severity, infraction.description);
//! }
//! ```

pub mod compliance;
pub mod config;
pub mod decoder;
pub mod framing;
pub mod primitives;
pub mod records;
pub mod registry;
pub mod signature;
pub mod timeline;
pub mod types;

pub use config::DecoderConfig;
pub use decoder::TachoDecoder;
pub use types::{
    Activity, ActivityChangeInfo, ActivityKind, CardSlot, DecodeError, Driver, EventGroup,
    EventRecord, FaultRecord, Generation, Result, TachographFile, Timestamp, VehicleUsedRecord,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_basics() {
        // Smoke test: a fresh decoder refuses an empty buffer and nothing
        // panics on the way
        let decoder = TachoDecoder::new();
        assert!(decoder.decode_bytes(&[], &DecoderConfig::default()).is_err());
    }
}
