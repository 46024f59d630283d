//! Signature block pairing and the verifier boundary
//!
//! Every signable elementary file may be followed by a signature block:
//! in G1 the same tag with record type 0x01, in G2/G2.2 the data tag with
//! the marker bit set. Pairing prefers adjacency inside the enclosing
//! container and falls back to a tag match anywhere in that container;
//! what remains is kept as an orphan.
//!
//! The cryptography itself (RSA / ECDSA, ERCA chain walking) is a
//! collaborator behind [`SignatureVerifier`]; this crate only locates and
//! pairs the blocks.

use crate::framing::{Block, FramedFile};
use crate::registry::TagRegistry;
use crate::types::{Generation, SignatureAlgorithm, SignatureBlock, TachographFile};
use serde::Serialize;

/// Pair every signature block in the framed file with its data block.
pub fn pair_signatures(
    framed: &FramedFile,
    data: &[u8],
    registry: &TagRegistry,
    file: &mut TachographFile,
) {
    let algorithm = match framed.generation {
        Generation::G1 => SignatureAlgorithm::Rsa,
        Generation::G2 | Generation::G2V2 => SignatureAlgorithm::Ecdsa,
    };

    for (index, block) in framed.blocks.iter().enumerate() {
        if !block.is_signature {
            continue;
        }
        let expected_tag = match framed.generation {
            // G1 signatures reuse the data tag; the record type byte is
            // the marker
            Generation::G1 => Some(block.tag),
            Generation::G2 | Generation::G2V2 => {
                registry.data_tag_for_signature(framed.generation, block.tag)
            }
        };

        let paired = expected_tag.and_then(|tag| {
            find_adjacent(&framed.blocks, index, tag)
                .or_else(|| find_by_tag(&framed.blocks, index, tag))
        });

        file.signature_blocks.push(SignatureBlock {
            tag: block.tag,
            data_tag: paired.map(|b| b.tag),
            data_offset: paired.map(|b| b.payload_offset),
            data_length: paired.map(|b| b.length),
            algorithm,
            signature: block.payload(data).to_vec(),
            orphan: paired.is_none(),
        });
    }

    let orphans = file.signature_blocks.iter().filter(|s| s.orphan).count();
    if orphans > 0 {
        log::warn!("{} signature blocks could not be paired", orphans);
    }
}

/// The immediately preceding data block in the same container, if its tag
/// matches.
fn find_adjacent<'a>(blocks: &'a [Block], sig_index: usize, tag: u16) -> Option<&'a Block> {
    blocks[..sig_index]
        .iter()
        .rev()
        .find(|b| !b.is_signature && !b.is_container && b.container_tag == blocks[sig_index].container_tag)
        .filter(|b| b.tag == tag)
}

/// Any data block with the expected tag in the same container.
fn find_by_tag<'a>(blocks: &'a [Block], sig_index: usize, tag: u16) -> Option<&'a Block> {
    blocks
        .iter()
        .find(|b| {
            !b.is_signature
                && !b.is_container
                && b.tag == tag
                && b.container_tag == blocks[sig_index].container_tag
        })
}

/// Outcome of a delegated signature verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VerificationStatus {
    Verified,
    VerifiedLocalChain,
    IncompleteCertificates,
    Invalid,
}

/// One verification request handed to the collaborator
pub struct VerificationRequest<'a> {
    pub algorithm: SignatureAlgorithm,
    pub signed_data: &'a [u8],
    pub signature: &'a [u8],
    pub signer_certificate: Option<&'a [u8]>,
}

/// Boundary to the cryptographic collaborator. Implementations own the
/// RSA/ECDSA primitives and the certificate chain walk to the ERCA roots.
pub trait SignatureVerifier {
    fn verify(&self, request: &VerificationRequest<'_>) -> VerificationStatus;
}

/// Verifier used when no cryptographic backend is wired up
pub struct NoopVerifier;

impl SignatureVerifier for NoopVerifier {
    fn verify(&self, _request: &VerificationRequest<'_>) -> VerificationStatus {
        VerificationStatus::IncompleteCertificates
    }
}

/// Run the verifier over every paired signature of a decoded file.
///
/// Returns one status per entry of `file.signature_blocks`; orphans are
/// reported [`VerificationStatus::IncompleteCertificates`] without calling
/// the collaborator.
pub fn verify_signatures(
    file: &TachographFile,
    data: &[u8],
    verifier: &dyn SignatureVerifier,
) -> Vec<VerificationStatus> {
    let card_certificate = file
        .certificates
        .iter()
        .find(|c| c.kind == crate::types::CertificateKind::Card)
        .map(|c| c.bytes.as_slice());

    file.signature_blocks
        .iter()
        .map(|signature| {
            let (Some(offset), Some(length)) = (signature.data_offset, signature.data_length)
            else {
                return VerificationStatus::IncompleteCertificates;
            };
            verifier.verify(&VerificationRequest {
                algorithm: signature.algorithm,
                signed_data: &data[offset..offset + length],
                signature: &signature.signature,
                signer_certificate: card_certificate,
            })
        })
        .collect()
}
