//! Tag registry
//!
//! Maps `(generation, tag)` to the tag's name, container flag, signature
//! tag and decoder. Dispatch is an explicit table: each entry carries a
//! [`DecoderKind`] discriminant the aggregator matches on exhaustively.
//!
//! The mapping follows Annex 1B/1C. In particular `0x0501` (application
//! identification), `0x0502` (events) and `0x0520` (identification) are
//! three distinct records with three distinct decoders.

use crate::types::{CertificateKind, Generation};
use std::collections::HashMap;

/// Discriminant selecting the record decoder for a leaf tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderKind {
    ApplicationIdentification,
    Identification,
    HolderIdentification,
    DrivingLicence,
    Events,
    Faults,
    ActivityBuffer,
    VehiclesUsed,
    Places,
    Calibration,
    GnssAccumulatedDriving,
    GnssPlaces,
    LoadUnload,
    Trailers,
    LoadSensor,
    BorderCrossings,
    VehicleIdentificationNumber,
    Certificate(CertificateKind),
}

/// Registry entry for one `(generation, tag)` pair
#[derive(Debug, Clone)]
pub struct TagInfo {
    pub name: &'static str,
    pub is_container: bool,
    pub decoder: Option<DecoderKind>,
    /// Tag of this record's signature block, for signable EFs
    pub signature_tag: Option<u16>,
}

/// The dispatch table keyed by `(generation, tag)`
pub struct TagRegistry {
    entries: HashMap<(Generation, u16), TagInfo>,
}

/// Signature blocks carry the data tag with the marker bit set
pub const SIGNATURE_TAG_BIT: u16 = 0x8000;

const ALL_GENERATIONS: [Generation; 3] = [Generation::G1, Generation::G2, Generation::G2V2];
const SMART_GENERATIONS: [Generation; 2] = [Generation::G2, Generation::G2V2];

impl TagRegistry {
    /// Build the standard Annex 1B/1C/2023-980 registry.
    pub fn standard() -> Self {
        let mut registry = Self {
            entries: HashMap::new(),
        };

        // G1 elementary files, also present in the G1 section of smart
        // card downloads
        for generation in ALL_GENERATIONS {
            registry.leaf(generation, 0x0501, "DriverCardApplicationIdentification", DecoderKind::ApplicationIdentification);
            registry.leaf(generation, 0x0502, "CardEventData", DecoderKind::Events);
            registry.leaf(generation, 0x0503, "CardFaultData", DecoderKind::Faults);
            registry.leaf(generation, 0x0504, "CardDriverActivity", DecoderKind::ActivityBuffer);
            registry.leaf(generation, 0x0505, "CardVehiclesUsed", DecoderKind::VehiclesUsed);
            registry.leaf(generation, 0x0506, "CardPlaceDailyWorkPeriod", DecoderKind::Places);
            registry.leaf(generation, 0x050C, "SpecificConditions", DecoderKind::Calibration);
            registry.leaf(generation, 0x0520, "CardIdentification", DecoderKind::Identification);
            registry.leaf(generation, 0x0521, "CardDrivingLicenceInformation", DecoderKind::DrivingLicence);
            registry.plain(generation, 0x0001, "VehicleIdentificationNumber", DecoderKind::VehicleIdentificationNumber);
            registry.plain(generation, 0xC100, "CardCertificate", DecoderKind::Certificate(CertificateKind::Card));
            registry.plain(generation, 0xC101, "CaCertificate", DecoderKind::Certificate(CertificateKind::CertificationAuthority));
            registry.plain(generation, 0xC102, "LinkCertificate", DecoderKind::Certificate(CertificateKind::Link));
            registry.plain(generation, 0xC108, "MemberStateCertificate", DecoderKind::Certificate(CertificateKind::MemberState));
        }

        // G2 section (Annex 1C numbering)
        for generation in SMART_GENERATIONS {
            registry.leaf(generation, 0x0201, "DriverCardHolderIdentification", DecoderKind::HolderIdentification);
            registry.leaf(generation, 0x0204, "CardEventData", DecoderKind::Events);
            registry.leaf(generation, 0x0205, "CardFaultData", DecoderKind::Faults);
            registry.leaf(generation, 0x0206, "CardDriverActivity", DecoderKind::ActivityBuffer);
            registry.leaf(generation, 0x0207, "CardVehiclesUsed", DecoderKind::VehiclesUsed);
            registry.leaf(generation, 0x0208, "CardPlaceDailyWorkPeriod", DecoderKind::Places);
            registry.leaf(generation, 0x0225, "GnssPlaces", DecoderKind::GnssPlaces);
            registry.leaf(generation, 0x0226, "CardLoadUnloadOperations", DecoderKind::LoadUnload);
            registry.leaf(generation, 0x0227, "CardTrailerRegistrations", DecoderKind::Trailers);
            registry.leaf(generation, 0x0228, "CardBorderCrossings", DecoderKind::BorderCrossings);
            registry.leaf(generation, 0x0524, "CardDriverActivity", DecoderKind::ActivityBuffer);
            registry.container(generation, 0x7621, "CardDownloadGen2");
            registry.container(generation, 0x7631, "CardDownloadGen2V2");
        }

        // G2.2 additions (Reg. 2023/980 numbering)
        registry.leaf(Generation::G2V2, 0x0525, "GnssAccumulatedDriving", DecoderKind::GnssAccumulatedDriving);
        registry.leaf(Generation::G2V2, 0x0526, "CardLoadUnloadOperations", DecoderKind::LoadUnload);
        registry.leaf(Generation::G2V2, 0x0527, "CardTrailerRegistrations", DecoderKind::Trailers);
        registry.leaf(Generation::G2V2, 0x0528, "GnssPlaces", DecoderKind::GnssPlaces);
        registry.leaf(Generation::G2V2, 0x0529, "CardLoadSensor", DecoderKind::LoadSensor);
        registry.leaf(Generation::G2V2, 0x052A, "CardBorderCrossings", DecoderKind::BorderCrossings);

        registry
    }

    /// Signable leaf entry: gets a signature tag with the marker bit set
    fn leaf(&mut self, generation: Generation, tag: u16, name: &'static str, decoder: DecoderKind) {
        self.entries.insert(
            (generation, tag),
            TagInfo {
                name,
                is_container: false,
                decoder: Some(decoder),
                signature_tag: Some(tag | SIGNATURE_TAG_BIT),
            },
        );
    }

    /// Leaf entry without a signature counterpart (certificates, VIN)
    fn plain(&mut self, generation: Generation, tag: u16, name: &'static str, decoder: DecoderKind) {
        self.entries.insert(
            (generation, tag),
            TagInfo {
                name,
                is_container: false,
                decoder: Some(decoder),
                signature_tag: None,
            },
        );
    }

    fn container(&mut self, generation: Generation, tag: u16, name: &'static str) {
        self.entries.insert(
            (generation, tag),
            TagInfo {
                name,
                is_container: true,
                decoder: None,
                signature_tag: None,
            },
        );
    }

    /// Look up the entry for a tag within a generation
    pub fn get(&self, generation: Generation, tag: u16) -> Option<&TagInfo> {
        self.entries.get(&(generation, tag))
    }

    /// True when the tag opens a nested container
    pub fn is_container(&self, generation: Generation, tag: u16) -> bool {
        self.get(generation, tag).map(|e| e.is_container).unwrap_or(false)
    }

    /// If `tag` is a registered signature tag, the data tag it covers
    pub fn data_tag_for_signature(&self, generation: Generation, tag: u16) -> Option<u16> {
        if tag & SIGNATURE_TAG_BIT == 0 {
            return None;
        }
        let data_tag = tag & !SIGNATURE_TAG_BIT;
        match self.get(generation, data_tag) {
            Some(entry) if entry.signature_tag == Some(tag) => Some(data_tag),
            _ => None,
        }
    }
}

impl Default for TagRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_tag_is_not_identification() {
        let registry = TagRegistry::standard();
        let events = registry.get(Generation::G1, 0x0502).unwrap();
        assert_eq!(events.decoder, Some(DecoderKind::Events));
        let app = registry.get(Generation::G1, 0x0501).unwrap();
        assert_eq!(app.decoder, Some(DecoderKind::ApplicationIdentification));
        let ident = registry.get(Generation::G1, 0x0520).unwrap();
        assert_eq!(ident.decoder, Some(DecoderKind::Identification));
    }

    #[test]
    fn test_g2_tags() {
        let registry = TagRegistry::standard();
        assert_eq!(
            registry.get(Generation::G2, 0x0201).unwrap().decoder,
            Some(DecoderKind::HolderIdentification)
        );
        assert_eq!(
            registry.get(Generation::G2, 0x0524).unwrap().decoder,
            Some(DecoderKind::ActivityBuffer)
        );
        assert!(registry.is_container(Generation::G2, 0x7621));
        // G2.2-only tags are not visible from G2
        assert!(registry.get(Generation::G2, 0x0529).is_none());
        assert_eq!(
            registry.get(Generation::G2V2, 0x0529).unwrap().decoder,
            Some(DecoderKind::LoadSensor)
        );
    }

    #[test]
    fn test_signature_tag_mapping() {
        let registry = TagRegistry::standard();
        assert_eq!(
            registry.data_tag_for_signature(Generation::G1, 0x0502 | SIGNATURE_TAG_BIT),
            Some(0x0502)
        );
        // certificates are not signable EFs
        assert_eq!(registry.data_tag_for_signature(Generation::G1, 0xC100), None);
        // unknown marker tags do not resolve
        assert_eq!(registry.data_tag_for_signature(Generation::G1, 0x8FFF), None);
    }
}
