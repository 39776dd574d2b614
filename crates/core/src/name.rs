//! Hierarchical names for identities, keys and certificates.
//!
//! A [`Name`] is an immutable, ordered sequence of opaque binary
//! [`Component`]s. Names have a canonical URI form (`/alice/KEY/ksk-1`) used
//! for display and configuration, and an NDN-TLV wire form used as the
//! storage key by the SQL-backed PIBs.

use crate::encoding::{
    decode_non_negative_integer, encode_non_negative_integer, read_tlv, write_tlv,
    TLV_GENERIC_NAME_COMPONENT, TLV_NAME,
};
use crate::error::{CoreError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Marker byte prefixed to version components.
pub const VERSION_MARKER: u8 = 0xFD;

/// A single name component.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Component(Vec<u8>);

impl Component {
    /// Create a component from raw bytes.
    pub fn new(value: impl Into<Vec<u8>>) -> Self {
        Self(value.into())
    }

    /// Create a version component (`0xFD` marker followed by the version).
    pub fn from_version(version: u64) -> Self {
        let mut value = vec![VERSION_MARKER];
        value.extend(encode_non_negative_integer(version));
        Self(value)
    }

    /// Raw bytes of the component.
    pub fn value(&self) -> &[u8] {
        &self.0
    }

    pub fn is_version(&self) -> bool {
        self.to_version().is_some()
    }

    /// Interpret the component as a version, if it carries the version marker.
    pub fn to_version(&self) -> Option<u64> {
        match self.0.split_first() {
            Some((&VERSION_MARKER, rest)) => decode_non_negative_integer(rest),
            _ => None,
        }
    }

    /// Escaped URI form of the component.
    pub fn to_escaped_string(&self) -> String {
        if self.0.iter().all(|b| *b == b'.') {
            // "", "." and ".." are reserved in URIs; pad with three periods.
            return ".".repeat(self.0.len() + 3);
        }

        let mut out = String::with_capacity(self.0.len());
        for &b in &self.0 {
            if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') {
                out.push(b as char);
            } else {
                out.push_str(&format!("%{:02X}", b));
            }
        }
        out
    }

    /// Parse the escaped URI form of a single component.
    pub fn from_escaped_str(escaped: &str) -> Result<Self> {
        let invalid = |reason: &str| CoreError::InvalidUri {
            uri: escaped.to_string(),
            reason: reason.to_string(),
        };

        let bytes = escaped.as_bytes();
        if !bytes.is_empty() && bytes.iter().all(|b| *b == b'.') {
            if bytes.len() < 3 {
                return Err(invalid("'.' and '..' are not valid components"));
            }
            return Ok(Self(vec![b'.'; bytes.len() - 3]));
        }

        let mut value = Vec::with_capacity(bytes.len());
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'%' {
                let hex_digits = bytes
                    .get(i + 1..i + 3)
                    .ok_or_else(|| invalid("truncated percent escape"))?;
                let decoded = std::str::from_utf8(hex_digits)
                    .ok()
                    .and_then(|s| u8::from_str_radix(s, 16).ok())
                    .ok_or_else(|| invalid("malformed percent escape"))?;
                value.push(decoded);
                i += 3;
            } else {
                value.push(bytes[i]);
                i += 1;
            }
        }
        Ok(Self(value))
    }
}

impl Ord for Component {
    // NDN canonical order: shorter components sort first, then bytewise.
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for Component {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_escaped_string())
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component({})", self.to_escaped_string())
    }
}

impl From<&str> for Component {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

impl From<String> for Component {
    fn from(value: String) -> Self {
        Self(value.into_bytes())
    }
}

impl From<Vec<u8>> for Component {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

impl From<&[u8]> for Component {
    fn from(value: &[u8]) -> Self {
        Self(value.to_vec())
    }
}

/// An immutable hierarchical name.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name {
    components: Vec<Component>,
}

impl Name {
    /// The empty (root) name.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a name from its URI form. An `ndn:` scheme is accepted.
    pub fn from_uri(uri: &str) -> Result<Self> {
        let mut rest = uri.trim();
        if let Some(stripped) = rest.strip_prefix("ndn:") {
            rest = stripped;
        }
        if let Some(idx) = rest.find(['?', '#']) {
            rest = &rest[..idx];
        }
        if !rest.is_empty() && !rest.starts_with('/') {
            return Err(CoreError::InvalidUri {
                uri: uri.to_string(),
                reason: "name must start with '/'".to_string(),
            });
        }

        let components = rest
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(Component::from_escaped_str)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { components })
    }

    /// Canonical URI form; the empty name is `/`.
    pub fn to_uri(&self) -> String {
        if self.components.is_empty() {
            return "/".to_string();
        }
        let mut out = String::new();
        for component in &self.components {
            out.push('/');
            out.push_str(&component.to_escaped_string());
        }
        out
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Component at `index`; negative values count from the end.
    pub fn get(&self, index: isize) -> Option<&Component> {
        let idx = if index < 0 {
            self.components.len().checked_sub(index.unsigned_abs())?
        } else {
            index as usize
        };
        self.components.get(idx)
    }

    /// Return a copy of this name with `component` appended.
    pub fn append(mut self, component: impl Into<Component>) -> Self {
        self.components.push(component.into());
        self
    }

    /// Return a copy of this name with every component of `suffix` appended.
    pub fn append_name(mut self, suffix: &Name) -> Self {
        self.components.extend(suffix.components.iter().cloned());
        self
    }

    /// Return a copy of this name with a version component appended.
    pub fn append_version(self, version: u64) -> Self {
        self.append(Component::from_version(version))
    }

    /// The first `n` components; negative `n` drops `|n|` components from the end.
    pub fn prefix(&self, n: isize) -> Name {
        let end = if n < 0 {
            self.components.len().saturating_sub(n.unsigned_abs())
        } else {
            (n as usize).min(self.components.len())
        };
        Name {
            components: self.components[..end].to_vec(),
        }
    }

    /// Up to `len` components starting at `start`.
    pub fn sub_name(&self, start: usize, len: usize) -> Name {
        let start = start.min(self.components.len());
        let end = start.saturating_add(len).min(self.components.len());
        Name {
            components: self.components[start..end].to_vec(),
        }
    }

    /// Whether every component of `self` matches the leading components of `other`.
    pub fn is_prefix_of(&self, other: &Name) -> bool {
        self.components.len() <= other.components.len()
            && self
                .components
                .iter()
                .zip(other.components.iter())
                .all(|(a, b)| a == b)
    }

    /// NDN-TLV encoding of the name.
    pub fn wire_encode(&self) -> Vec<u8> {
        let mut value = Vec::new();
        for component in &self.components {
            write_tlv(&mut value, TLV_GENERIC_NAME_COMPONENT, component.value());
        }
        let mut out = Vec::with_capacity(value.len() + 4);
        write_tlv(&mut out, TLV_NAME, &value);
        out
    }

    /// Decode an NDN-TLV encoded name. The whole buffer must be consumed.
    pub fn wire_decode(bytes: &[u8]) -> Result<Self> {
        let mut pos = 0;
        let (tlv_type, value) = read_tlv(bytes, &mut pos)?;
        if tlv_type != TLV_NAME {
            return Err(CoreError::Decode(format!(
                "expected Name TLV type {}, got {}",
                TLV_NAME, tlv_type
            )));
        }
        if pos != bytes.len() {
            return Err(CoreError::Decode(format!(
                "{} trailing bytes after Name",
                bytes.len() - pos
            )));
        }

        let mut components = Vec::new();
        let mut inner = 0;
        while inner < value.len() {
            let (component_type, component) = read_tlv(value, &mut inner)?;
            if component_type != TLV_GENERIC_NAME_COMPONENT {
                return Err(CoreError::Decode(format!(
                    "unsupported name component type {}",
                    component_type
                )));
            }
            components.push(Component::new(component));
        }
        Ok(Self { components })
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uri())
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", self.to_uri())
    }
}

impl FromStr for Name {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Name::from_uri(s)
    }
}

impl Serialize for Name {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_uri())
    }
}

impl<'de> Deserialize<'de> for Name {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let uri = String::deserialize(deserializer)?;
        Name::from_uri(&uri).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri_round_trip() {
        let name = Name::from_uri("/alice/KEY/ksk-1%2F2").unwrap();
        assert_eq!(name.len(), 3);
        assert_eq!(name.get(2).unwrap().value(), b"ksk-1/2");
        assert_eq!(name.to_uri(), "/alice/KEY/ksk-1%2F2");
    }

    #[test]
    fn test_scheme_and_trailing_slash_are_ignored() {
        let a = Name::from_uri("ndn:/a/b/").unwrap();
        let b: Name = "/a/b".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(Name::from_uri("/").unwrap(), Name::new());
    }

    #[test]
    fn test_period_components() {
        let name = Name::new().append("").append("..");
        assert_eq!(name.to_uri(), "/.../.....");
        assert_eq!(Name::from_uri(&name.to_uri()).unwrap(), name);
        assert!(Name::from_uri("/a/..").is_err());
    }

    #[test]
    fn test_rejects_malformed_escape() {
        assert!(matches!(
            Name::from_uri("/a%G1"),
            Err(CoreError::InvalidUri { .. })
        ));
        assert!(Name::from_uri("/a%2").is_err());
        assert!(Name::from_uri("relative/name").is_err());
    }

    #[test]
    fn test_prefix_and_negative_get() {
        let name = Name::from_uri("/a/b/c").unwrap();
        assert_eq!(name.prefix(-1).to_uri(), "/a/b");
        assert_eq!(name.prefix(5), name);
        assert_eq!(name.prefix(-5), Name::new());
        assert_eq!(name.get(-1).unwrap().value(), b"c");
        assert!(name.get(-4).is_none());
        assert_eq!(name.sub_name(1, 10).to_uri(), "/b/c");
    }

    #[test]
    fn test_is_prefix_of() {
        let a = Name::from_uri("/a").unwrap();
        let ab = Name::from_uri("/a/b").unwrap();
        assert!(a.is_prefix_of(&ab));
        assert!(ab.is_prefix_of(&ab));
        assert!(!ab.is_prefix_of(&a));
        assert!(Name::new().is_prefix_of(&a));
    }

    #[test]
    fn test_version_component() {
        let version = Component::from_version(1_700_000_000_000);
        assert!(version.is_version());
        assert_eq!(version.to_version(), Some(1_700_000_000_000));
        assert_eq!(Component::from("v1").to_version(), None);
    }

    #[test]
    fn test_wire_round_trip_and_errors() {
        let name = Name::from_uri("/alice/KEY/%00%FF").unwrap().append_version(7);
        let wire = name.wire_encode();
        assert_eq!(wire[0], 0x07);
        assert_eq!(Name::wire_decode(&wire).unwrap(), name);

        let mut trailing = wire.clone();
        trailing.push(0);
        assert!(Name::wire_decode(&trailing).is_err());
        assert!(Name::wire_decode(&wire[..wire.len() - 1]).is_err());
        assert!(Name::wire_decode(&[0x06, 0x00]).is_err());
    }

    #[test]
    fn test_canonical_ordering() {
        let short = Component::from("z");
        let long = Component::from("aa");
        assert!(short < long);

        let a = Name::from_uri("/a").unwrap();
        let ab = Name::from_uri("/a/b").unwrap();
        assert!(a < ab);
    }

    #[test]
    fn test_serde_uses_uri() {
        let name = Name::from_uri("/alice/ksk-1").unwrap();
        let json = serde_json::to_string(&name).unwrap();
        assert_eq!(json, "\"/alice/ksk-1\"");
        let back: Name = serde_json::from_str(&json).unwrap();
        assert_eq!(back, name);
    }
}
