//! Packets that can carry a signature.
//!
//! Signing follows one protocol for every packet kind: set the signature
//! info, sign the signed portion, attach the signature value. The
//! [`Signable`] trait exposes exactly those three steps.

use crate::certificate::{serde_hex, SignatureInfo, SignatureType};
use crate::error::{IdentityError, IdentityResult};
use ndnsec_core::encoding::{decode_non_negative_integer, encode_non_negative_integer};
use ndnsec_core::{now_millis, Name};
use ndnsec_crypto::{verify_digest_sha256, verify_signature};
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// A packet whose signature is computed over a signed portion.
pub trait Signable {
    /// Install the signature info, discarding any previous signature value.
    fn set_signature_info(&mut self, info: SignatureInfo) -> IdentityResult<()>;

    fn signature_info(&self) -> Option<&SignatureInfo>;

    /// Bytes covered by the signature, including the signature info.
    fn signed_portion(&self) -> IdentityResult<Vec<u8>>;

    fn set_signature_value(&mut self, value: Vec<u8>) -> IdentityResult<()>;

    fn signature_value(&self) -> &[u8];
}

/// Check a packet's signature.
///
/// Digest signatures need no key; every other type needs the signer's
/// DER-encoded public key and yields `Ok(false)` without one.
pub fn verify_packet<P: Signable + ?Sized>(
    packet: &P,
    public_key: Option<&[u8]>,
) -> IdentityResult<bool> {
    let Some(info) = packet.signature_info() else {
        return Ok(false);
    };
    let signed = packet.signed_portion()?;

    match (info.signature_type, public_key) {
        (SignatureType::DigestSha256, _) => {
            Ok(verify_digest_sha256(&signed, packet.signature_value()))
        }
        (_, Some(key)) => Ok(verify_signature(key, &signed, packet.signature_value())?),
        (_, None) => Ok(false),
    }
}

/// A named content packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Data {
    pub name: Name,
    #[serde(with = "serde_hex")]
    pub content: Vec<u8>,
    #[serde(default)]
    pub signature_info: SignatureInfo,
    #[serde(with = "serde_hex", default)]
    pub signature_value: Vec<u8>,
}

#[derive(Serialize)]
struct DataSignedRegion<'a> {
    name: &'a Name,
    #[serde(with = "serde_hex")]
    content: &'a [u8],
    signature_info: &'a SignatureInfo,
}

impl Data {
    pub fn new(name: Name, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name,
            content: content.into(),
            signature_info: SignatureInfo::default(),
            signature_value: Vec::new(),
        }
    }

    pub fn wire_encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn wire_decode(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

impl Signable for Data {
    fn set_signature_info(&mut self, info: SignatureInfo) -> IdentityResult<()> {
        self.signature_info = info;
        self.signature_value.clear();
        Ok(())
    }

    fn signature_info(&self) -> Option<&SignatureInfo> {
        Some(&self.signature_info)
    }

    fn signed_portion(&self) -> IdentityResult<Vec<u8>> {
        Ok(serde_json::to_vec(&DataSignedRegion {
            name: &self.name,
            content: &self.content,
            signature_info: &self.signature_info,
        })?)
    }

    fn set_signature_value(&mut self, value: Vec<u8>) -> IdentityResult<()> {
        self.signature_value = value;
        Ok(())
    }

    fn signature_value(&self) -> &[u8] {
        &self.signature_value
    }
}

/// An interest, signed in command-interest form.
///
/// Signing appends four components to the name:
/// `<timestamp>/<nonce>/<signature info>/<signature value>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interest {
    name: Name,
    signature_info: Option<SignatureInfo>,
    signature_value: Vec<u8>,
}

const NONCE_LEN: usize = 8;

impl Interest {
    pub fn new(name: Name) -> Self {
        Self {
            name,
            signature_info: None,
            signature_value: Vec::new(),
        }
    }

    /// Full name, including signature components once signed.
    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn is_signed(&self) -> bool {
        self.signature_info.is_some() && !self.signature_value.is_empty()
    }

    /// Timestamp component of a signed interest.
    pub fn timestamp(&self) -> Option<u64> {
        if self.signature_info.is_none() {
            return None;
        }
        let offset = if self.signature_value.is_empty() { -3 } else { -4 };
        decode_non_negative_integer(self.name.get(offset)?.value())
    }

    /// Rebuild a signed interest from its full name.
    pub fn from_signed_name(name: Name) -> IdentityResult<Self> {
        if name.len() < 4 {
            return Err(IdentityError::Certificate(format!(
                "{} is too short to be a signed interest",
                name
            )));
        }
        let (Some(info), Some(value)) = (name.get(-2), name.get(-1)) else {
            return Err(IdentityError::Certificate(format!("{} is not signed", name)));
        };
        let signature_info: SignatureInfo = serde_json::from_slice(info.value())?;
        let signature_value = value.value().to_vec();

        Ok(Self {
            name,
            signature_info: Some(signature_info),
            signature_value,
        })
    }

    /// Name without the signature value component.
    fn unsigned_name(&self) -> Name {
        if self.signature_info.is_some() && !self.signature_value.is_empty() {
            self.name.prefix(-1)
        } else {
            self.name.clone()
        }
    }
}

impl Signable for Interest {
    fn set_signature_info(&mut self, info: SignatureInfo) -> IdentityResult<()> {
        let base = match &self.signature_info {
            // Re-signing replaces the whole command suffix.
            Some(_) => self.unsigned_name().prefix(-3),
            None => self.name.clone(),
        };

        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        self.name = base
            .append(encode_non_negative_integer(now_millis()))
            .append(nonce.to_vec())
            .append(serde_json::to_vec(&info)?);
        self.signature_info = Some(info);
        self.signature_value.clear();
        Ok(())
    }

    fn signature_info(&self) -> Option<&SignatureInfo> {
        self.signature_info.as_ref()
    }

    fn signed_portion(&self) -> IdentityResult<Vec<u8>> {
        Ok(self.unsigned_name().wire_encode())
    }

    fn set_signature_value(&mut self, value: Vec<u8>) -> IdentityResult<()> {
        if self.signature_info.is_none() {
            return Err(IdentityError::Certificate(
                "signature info must be set before the signature value".to_string(),
            ));
        }
        self.name = self.unsigned_name().append(value.clone());
        self.signature_value = value;
        Ok(())
    }

    fn signature_value(&self) -> &[u8] {
        &self.signature_value
    }
}
