//! Identity certificates.
//!
//! A certificate binds a key name to its public key bits for a validity
//! window and carries a signature by the issuer. Certificates are plain
//! values: the PIB hands out `Arc<Certificate>` so a cached copy is never
//! mutated through a reader.

use crate::error::{IdentityResult, PibResult};
use crate::naming;
use crate::packet::Signable;
use ndnsec_core::Name;
use serde::{Deserialize, Serialize};

/// Attribute OID of the subject-description naming the certified key.
pub const OID_ATTRIBUTE_NAME: &str = "2.5.4.41";

const MILLIS_PER_DAY: u64 = 24 * 60 * 60 * 1000;

/// Hex encoding for byte fields in the JSON form.
pub(crate) mod serde_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        hex::decode(encoded).map_err(serde::de::Error::custom)
    }
}

/// Signature algorithm recorded in a signature info block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureType {
    DigestSha256,
    Sha256WithRsa,
    Sha256WithEcdsa,
}

/// Signature metadata covered by the signature itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureInfo {
    pub signature_type: SignatureType,
    /// Signer certificate name without its version, absent for digest signatures
    pub key_locator: Option<Name>,
}

impl SignatureInfo {
    pub fn digest_sha256() -> Self {
        Self {
            signature_type: SignatureType::DigestSha256,
            key_locator: None,
        }
    }

    pub fn new(signature_type: SignatureType, key_locator: Name) -> Self {
        Self {
            signature_type,
            key_locator: Some(key_locator),
        }
    }
}

impl Default for SignatureInfo {
    fn default() -> Self {
        Self::digest_sha256()
    }
}

/// Validity window in epoch milliseconds, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityPeriod {
    pub not_before: u64,
    pub not_after: u64,
}

impl ValidityPeriod {
    pub fn new(not_before: u64, not_after: u64) -> Self {
        Self {
            not_before,
            not_after,
        }
    }

    /// Window starting at `now_ms` and lasting `days`.
    pub fn for_days(now_ms: u64, days: u64) -> Self {
        Self::new(now_ms, now_ms.saturating_add(days.saturating_mul(MILLIS_PER_DAY)))
    }

    pub fn is_valid(&self, now_ms: u64) -> bool {
        self.not_before <= now_ms && now_ms <= self.not_after
    }
}

/// Attribute describing the certificate subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectDescription {
    pub oid: String,
    pub value: String,
}

impl SubjectDescription {
    pub fn new(oid: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            oid: oid.into(),
            value: value.into(),
        }
    }
}

/// An identity certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub name: Name,
    pub validity: ValidityPeriod,
    /// DER-encoded SubjectPublicKeyInfo
    #[serde(with = "serde_hex")]
    pub public_key: Vec<u8>,
    #[serde(default)]
    pub subject_descriptions: Vec<SubjectDescription>,
    #[serde(default)]
    pub signature_info: SignatureInfo,
    #[serde(with = "serde_hex", default)]
    pub signature_value: Vec<u8>,
}

/// The part of a certificate covered by its signature.
#[derive(Serialize)]
struct SignedRegion<'a> {
    name: &'a Name,
    validity: &'a ValidityPeriod,
    #[serde(with = "serde_hex")]
    public_key: &'a [u8],
    subject_descriptions: &'a [SubjectDescription],
    signature_info: &'a SignatureInfo,
}

impl Certificate {
    /// Unsigned certificate; the signature is filled in by the signer.
    pub fn new(name: Name, public_key: Vec<u8>, validity: ValidityPeriod) -> Self {
        Self {
            name,
            validity,
            public_key,
            subject_descriptions: Vec::new(),
            signature_info: SignatureInfo::default(),
            signature_value: Vec::new(),
        }
    }

    pub fn with_subject_description(mut self, description: SubjectDescription) -> Self {
        self.subject_descriptions.push(description);
        self
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// Name of the certified key.
    pub fn key_name(&self) -> PibResult<Name> {
        naming::extract_key_name_from_cert_name(&self.name)
    }

    /// Identity owning the certified key.
    pub fn identity(&self) -> PibResult<Name> {
        Ok(naming::extract_identity_from_key_name(&self.key_name()?))
    }

    pub fn is_too_early(&self, now_ms: u64) -> bool {
        now_ms < self.validity.not_before
    }

    pub fn is_too_late(&self, now_ms: u64) -> bool {
        now_ms > self.validity.not_after
    }

    pub fn is_signed(&self) -> bool {
        !self.signature_value.is_empty()
    }

    pub fn wire_encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn wire_decode(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

impl Signable for Certificate {
    fn set_signature_info(&mut self, info: SignatureInfo) -> IdentityResult<()> {
        self.signature_info = info;
        self.signature_value.clear();
        Ok(())
    }

    fn signature_info(&self) -> Option<&SignatureInfo> {
        Some(&self.signature_info)
    }

    fn signed_portion(&self) -> IdentityResult<Vec<u8>> {
        let region = SignedRegion {
            name: &self.name,
            validity: &self.validity,
            public_key: &self.public_key,
            subject_descriptions: &self.subject_descriptions,
            signature_info: &self.signature_info,
        };
        Ok(serde_json::to_vec(&region)?)
    }

    fn set_signature_value(&mut self, value: Vec<u8>) -> IdentityResult<()> {
        self.signature_value = value;
        Ok(())
    }

    fn signature_value(&self) -> &[u8] {
        &self.signature_value
    }
}
