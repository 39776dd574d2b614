//! Naming rules linking identities, keys and certificates.
//!
//! ```text
//! identity     /alice
//! key          /alice/KSK-1700000000000
//! certificate  /alice/KEY/KSK-1700000000000/ID-CERT/%FD%00%00%01%8B%CF%E5%68%00
//! ```
//!
//! A key name is its identity plus one key-id component. A certificate name
//! splits the key name around a `KEY` marker and ends with `ID-CERT` and a
//! version; [`extract_key_name_from_cert_name`] reverses the split.

use crate::error::{PibError, PibResult};
use ndnsec_core::{Component, Name};

/// Marker separating the signer prefix from the rest of the key name.
pub const KEY_COMPONENT: &str = "KEY";
/// Marker preceding the certificate version.
pub const ID_CERT_COMPONENT: &str = "ID-CERT";
/// Key-id prefix of key-signing keys.
pub const KSK_PREFIX: &str = "KSK-";
/// Key-id prefix of data-signing keys.
pub const DSK_PREFIX: &str = "DSK-";

/// Identity owning `key_name`: every component except the last.
pub fn extract_identity_from_key_name(key_name: &Name) -> Name {
    key_name.prefix(-1)
}

/// Positions of the `KEY` and `ID-CERT` markers, if `name` is a certificate name.
fn marker_positions(name: &Name) -> Option<(usize, usize)> {
    let key_marker = Component::from(KEY_COMPONENT);
    let id_cert_marker = Component::from(ID_CERT_COMPONENT);

    let id_cert = name
        .components()
        .iter()
        .rposition(|c| *c == id_cert_marker)?;
    let key = name.components()[..id_cert]
        .iter()
        .position(|c| *c == key_marker)?;

    // At least one key-id component must sit between the markers.
    (key + 1 < id_cert).then_some((key, id_cert))
}

/// Whether `name` carries the `KEY ... ID-CERT` marker sequence.
pub fn is_valid_certificate_name(name: &Name) -> bool {
    marker_positions(name).is_some()
}

/// Recover the key name from a certificate name.
pub fn extract_key_name_from_cert_name(cert_name: &Name) -> PibResult<Name> {
    let (key, id_cert) = marker_positions(cert_name).ok_or_else(|| {
        PibError::InvalidArgument(format!("{} is not a valid certificate name", cert_name))
    })?;

    Ok(cert_name
        .prefix(key as isize)
        .append_name(&cert_name.sub_name(key + 1, id_cert - key - 1)))
}

fn build_certificate_name(prefix: &Name, key_name: &Name, version: u64) -> PibResult<Name> {
    let remainder = key_name.sub_name(prefix.len(), key_name.len() - prefix.len());
    let cert_name = prefix
        .clone()
        .append(KEY_COMPONENT)
        .append_name(&remainder)
        .append(ID_CERT_COMPONENT)
        .append_version(version);

    // A marker inside the key name itself would make the split ambiguous.
    if extract_key_name_from_cert_name(&cert_name)? != *key_name {
        return Err(PibError::InvalidArgument(format!(
            "key name {} contains a reserved certificate marker",
            key_name
        )));
    }
    Ok(cert_name)
}

/// Certificate name for `key_name` when signed by `signing_identity`.
///
/// If the signing identity is a prefix of (or equal to) the key's identity,
/// the `KEY` marker follows the signing identity; otherwise it follows the
/// key's own identity.
pub fn infer_certificate_name(
    key_name: &Name,
    signing_identity: Option<&Name>,
    version: u64,
) -> PibResult<Name> {
    if key_name.is_empty() {
        return Err(PibError::InvalidArgument("key name is empty".to_string()));
    }

    let owner = extract_identity_from_key_name(key_name);
    let prefix = match signing_identity {
        Some(signer) if signer.is_prefix_of(&owner) => signer.clone(),
        _ => owner,
    };
    build_certificate_name(&prefix, key_name, version)
}

/// Certificate name using an explicit prefix, which must be a strict prefix of the key name.
pub fn certificate_name_with_prefix(
    cert_prefix: &Name,
    key_name: &Name,
    version: u64,
) -> PibResult<Name> {
    if !cert_prefix.is_prefix_of(key_name) || cert_prefix.len() == key_name.len() {
        return Err(PibError::InvalidArgument(format!(
            "certificate prefix {} is not a strict prefix of key {}",
            cert_prefix, key_name
        )));
    }
    build_certificate_name(cert_prefix, key_name, version)
}

/// Key-id component tagged with its role, e.g. `KSK-1700000000000`.
pub fn key_id_component(is_ksk: bool, timestamp_ms: u64) -> Component {
    let role = if is_ksk { KSK_PREFIX } else { DSK_PREFIX };
    Component::from(format!("{}{}", role, timestamp_ms))
}

/// Key name for a new key of `identity`.
pub fn key_name_for(identity: &Name, is_ksk: bool, timestamp_ms: u64) -> Name {
    identity.clone().append(key_id_component(is_ksk, timestamp_ms))
}
