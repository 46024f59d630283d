//! Main decoder API
//!
//! [`TachoDecoder`] is the entry point: it frames the file, dispatches
//! each block through the tag registry to the record decoders, pairs
//! signatures and derives the activity timeline. Decoding is a pure
//! function of the input bytes - single-threaded, no shared state, the
//! buffer is read once and never modified.

use crate::config::DecoderConfig;
use crate::framing::{self, Block};
use crate::records;
use crate::registry::{DecoderKind, TagRegistry};
use crate::signature;
use crate::timeline;
use crate::types::{
    CertificateBlock, DecodeError, Generation, RawBlock, Result, TachographFile, WarningKind,
};
use std::path::Path;

/// The decoder - owns the tag registry, reusable across files
pub struct TachoDecoder {
    registry: TagRegistry,
}

impl TachoDecoder {
    /// Create a decoder with the standard Annex 1B/1C registry.
    pub fn new() -> Self {
        Self {
            registry: TagRegistry::standard(),
        }
    }

    /// Create a decoder with a custom registry.
    pub fn with_registry(registry: TagRegistry) -> Self {
        Self { registry }
    }

    /// Read and decode a `.ddd` file.
    pub fn decode_file(&self, path: &Path, config: &DecoderConfig) -> Result<TachographFile> {
        log::info!("Decoding tachograph file: {:?}", path);
        let data = std::fs::read(path)?;
        self.decode_bytes(&data, config)
    }

    /// Decode an in-memory `.ddd` byte buffer.
    ///
    /// Fails only on structural errors ([`DecodeError::MalformedFile`]);
    /// individual malformed records are recovered into `raw_unparsed`.
    pub fn decode_bytes(&self, data: &[u8], config: &DecoderConfig) -> Result<TachographFile> {
        let framed = framing::frame(data, &self.registry, config)?;
        let generation = framed.generation;

        let mut file = TachographFile {
            generation: Some(generation),
            ..TachographFile::default()
        };

        for block in &framed.blocks {
            if block.is_container || block.is_signature {
                continue;
            }
            self.dispatch_block(block, data, generation, config, &mut file);
        }

        for span in &framed.raw_spans {
            file.raw_unparsed.push(RawBlock {
                tag: None,
                offset: span.offset,
                length: span.length,
                bytes: data[span.offset..span.offset + span.length].to_vec(),
            });
        }

        signature::pair_signatures(&framed, data, &self.registry, &mut file);

        if file.vin.is_none() && !file.vehicles_used.is_empty() {
            file.warn(
                WarningKind::MissingVin,
                "no vehicle identification number in the file",
            );
        }

        if config.build_timeline {
            file.timeline = timeline::build(&file.activities);
        }

        log::info!(
            "Decoded {} file: {} days of activity, {} events, {} vehicles, {} raw blocks",
            generation,
            file.activities.len(),
            file.events.len(),
            file.vehicles_used.len(),
            file.raw_unparsed.len()
        );
        Ok(file)
    }

    /// Route one leaf block to its record decoder; on a record-level
    /// error the payload is preserved under `raw_unparsed`.
    fn dispatch_block(
        &self,
        block: &Block,
        data: &[u8],
        generation: Generation,
        config: &DecoderConfig,
        file: &mut TachographFile,
    ) {
        let payload = block.payload(data);
        let Some(kind) = self.registry.get(generation, block.tag).and_then(|e| e.decoder) else {
            log::debug!("Unknown tag {:#06x}, keeping {} raw bytes", block.tag, block.length);
            file.raw_unparsed.push(RawBlock {
                tag: Some(block.tag),
                offset: block.payload_offset,
                length: block.length,
                bytes: payload.to_vec(),
            });
            return;
        };

        log::debug!(
            "Dispatching tag {:#06x} ({} bytes) to {:?}",
            block.tag,
            block.length,
            kind
        );
        let outcome = match kind {
            DecoderKind::ApplicationIdentification => {
                records::identification::decode_application(payload, file)
            }
            DecoderKind::Identification => {
                records::identification::decode_identification(payload, file)
            }
            DecoderKind::HolderIdentification => {
                records::identification::decode_holder(payload, file)
            }
            DecoderKind::DrivingLicence => records::identification::decode_licence(payload, file),
            DecoderKind::Events => records::events::decode_events(payload, file),
            DecoderKind::Faults => records::events::decode_faults(payload, file),
            DecoderKind::ActivityBuffer => records::activity::decode_activity(payload, file),
            DecoderKind::VehiclesUsed => {
                records::vehicles::decode_vehicles_used(payload, generation, file)
            }
            DecoderKind::Places => records::places::decode_places(payload, file),
            DecoderKind::Calibration => records::calibration::decode_calibration(payload, file),
            DecoderKind::GnssAccumulatedDriving => {
                records::gnss::decode_accumulated_driving(payload, file)
            }
            DecoderKind::GnssPlaces => records::places::decode_gnss_places(payload, file),
            DecoderKind::LoadUnload => records::gnss::decode_load_unload(payload, config, file),
            DecoderKind::Trailers => records::gnss::decode_trailers(payload, file),
            DecoderKind::LoadSensor => records::gnss::decode_load_sensor(payload, file),
            DecoderKind::BorderCrossings => records::places::decode_border_crossings(payload, file),
            DecoderKind::VehicleIdentificationNumber => {
                records::identification::decode_vin(payload, file)
            }
            DecoderKind::Certificate(cert_kind) => {
                file.certificates.push(CertificateBlock {
                    tag: block.tag,
                    kind: cert_kind,
                    bytes: payload.to_vec(),
                });
                Ok(())
            }
        };

        if let Err(error) = outcome {
            let warning_kind = match error {
                DecodeError::UnknownLayout(_) => WarningKind::UnknownLayout,
                _ => WarningKind::MalformedRecord,
            };
            file.warn(
                warning_kind,
                format!("tag {:#06x} at offset {}: {}", block.tag, block.offset, error),
            );
            file.raw_unparsed.push(RawBlock {
                tag: Some(block.tag),
                offset: block.payload_offset,
                length: block.length,
                bytes: payload.to_vec(),
            });
        }
    }
}

impl Default for TachoDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoder_rejects_empty_input() {
        let decoder = TachoDecoder::new();
        let err = decoder
            .decode_bytes(&[], &DecoderConfig::default())
            .unwrap_err();
        assert!(matches!(err, DecodeError::MalformedFile { .. }));
    }

    #[test]
    fn test_unknown_tag_kept_raw() {
        // valid STAP framing with an unregistered tag
        let data = [0x0A, 0xBC, 0x00, 0x00, 0x03, 0x01, 0x02, 0x03];
        let decoder = TachoDecoder::new();
        let file = decoder.decode_bytes(&data, &DecoderConfig::default()).unwrap();
        assert_eq!(file.raw_unparsed.len(), 1);
        assert_eq!(file.raw_unparsed[0].tag, Some(0x0ABC));
        assert_eq!(file.raw_unparsed[0].bytes, vec![0x01, 0x02, 0x03]);
    }

    #[test]
    fn test_malformed_record_payload_kept_raw() {
        // tag 0x0502 (events) with a payload too short for one group
        let mut data = vec![0x05, 0x02, 0x00, 0x00, 0x04];
        data.extend_from_slice(&[0xAA; 4]);
        let decoder = TachoDecoder::new();
        let file = decoder.decode_bytes(&data, &DecoderConfig::default()).unwrap();
        assert!(file.events.is_empty());
        assert_eq!(file.raw_unparsed.len(), 1);
        assert_eq!(file.raw_unparsed[0].tag, Some(0x0502));
        assert_eq!(file.warnings.len(), 1);
    }
}
