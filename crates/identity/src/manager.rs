//! Identity manager: creates identities and keys, mints certificates and
//! signs packets.
//!
//! The manager is the only writer of the PIB front end. It pairs one
//! [`Pib`] with one [`Tpm`]: public halves and certificates go to the PIB,
//! private halves stay in the TPM.
//!
//! An identity moves through three states on its way to being usable:
//!
//! 1. it exists, with no key
//! 2. it has a default key, with no certificate
//! 3. its default key has a default certificate
//!
//! [`IdentityManager::create_identity_and_certificate`] drives an identity
//! from any of these states to the last one and is safe to call again.

use crate::certificate::{
    Certificate, SignatureInfo, SignatureType, SubjectDescription, ValidityPeriod,
    OID_ATTRIBUTE_NAME,
};
use crate::error::{IdentityError, IdentityResult};
use crate::naming::{
    certificate_name_with_prefix, extract_identity_from_key_name, extract_key_name_from_cert_name,
    infer_certificate_name, key_name_for,
};
use crate::packet::{verify_packet, Signable};
use crate::pib::{Key, Pib};
use crate::signing_info::{SignerType, SigningInfo};
use ndnsec_core::{now_millis, KeyChainConfig, Name};
use ndnsec_crypto::{
    digest_sha256, open_tpm, DigestAlgorithm, KeyParams, KeyType, Tpm, TpmError,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Default validity of self-signed certificates.
pub const DEFAULT_CERTIFICATE_VALIDITY_DAYS: u64 = 730;

pub struct IdentityManager {
    pib: Pib,
    tpm: Arc<dyn Tpm>,
    default_key_params: KeyParams,
    certificate_validity_days: u64,
}

impl IdentityManager {
    pub fn new(pib: Pib, tpm: Arc<dyn Tpm>) -> Self {
        Self {
            pib,
            tpm,
            default_key_params: KeyParams::default(),
            certificate_validity_days: DEFAULT_CERTIFICATE_VALIDITY_DAYS,
        }
    }

    /// Open the PIB and TPM named by `config`.
    ///
    /// A PIB records the locator of the TPM it was used with. If that differs
    /// from the configured TPM, opening fails with
    /// [`IdentityError::LocatorMismatch`] unless `allow_reset` is set, in
    /// which case every identity is dropped and the new locator recorded.
    pub fn from_config(config: &KeyChainConfig, allow_reset: bool) -> IdentityResult<Self> {
        let pib_locator = config.pib_locator()?;
        let tpm_locator = config.tpm_locator()?;
        let default_key_params =
            KeyParams::from_config(&config.default_key.algorithm, config.default_key.size)
                .map_err(|e| IdentityError::Config(e.to_string()))?;

        let pib = Pib::open(&pib_locator)?;
        let tpm = open_tpm(&tpm_locator)?;

        let recorded = pib.tpm_locator()?;
        let configured = tpm.locator();
        if recorded.is_empty() {
            pib.set_tpm_locator(&configured)?;
        } else if recorded != configured {
            if !allow_reset {
                return Err(IdentityError::LocatorMismatch {
                    pib: recorded,
                    tpm: configured,
                });
            }
            pib.reset(&configured)?;
        }

        info!(pib = %pib.locator(), tpm = %configured, "Identity manager ready");
        Ok(Self {
            pib,
            tpm,
            default_key_params,
            certificate_validity_days: config.certificate_validity_days,
        })
    }

    pub fn with_key_params(mut self, params: KeyParams) -> Self {
        self.default_key_params = params;
        self
    }

    pub fn with_certificate_validity_days(mut self, days: u64) -> Self {
        self.certificate_validity_days = days;
        self
    }

    pub fn pib(&self) -> &Pib {
        &self.pib
    }

    pub fn tpm(&self) -> &Arc<dyn Tpm> {
        &self.tpm
    }

    pub fn default_key_params(&self) -> &KeyParams {
        &self.default_key_params
    }

    // ----- identities -----

    /// Create an identity with a default key and self-signed certificate.
    ///
    /// Fails with [`IdentityError::IdentityExists`] if the identity already
    /// has a default certificate.
    pub fn create_identity(&self, identity: &Name, params: &KeyParams) -> IdentityResult<Name> {
        if self.has_default_certificate(identity)? {
            return Err(IdentityError::IdentityExists {
                identity: identity.to_uri(),
            });
        }
        self.create_identity_and_certificate(identity, params)
    }

    /// Bring `identity` to having a default certificate, creating whatever is
    /// missing, and return that certificate's name.
    pub fn create_identity_and_certificate(
        &self,
        identity: &Name,
        params: &KeyParams,
    ) -> IdentityResult<Name> {
        let handle = self.pib.add_identity(identity)?;

        let key = match handle.get_default_key() {
            Ok(key) if self.key_matches(&key, params)? => key,
            Ok(_) => {
                let key_name = self.generate_key_pair(identity, true, params)?;
                handle.set_default_key(&key_name)?
            }
            Err(e) if e.is_not_found() => {
                let key_name = self.generate_key_pair(identity, true, params)?;
                handle.set_default_key(&key_name)?
            }
            Err(e) => return Err(e.into()),
        };

        match key.get_default_certificate() {
            Ok(certificate) => Ok(certificate.name().clone()),
            Err(e) if e.is_not_found() => {
                let certificate = self.self_sign(key.name())?;
                self.add_certificate_as_identity_default(&certificate)?;
                info!(identity = %identity, certificate = %certificate.name(), "Created identity");
                Ok(certificate.name().clone())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Create an identity with the manager's default key parameters.
    pub fn create_identity_with_defaults(&self, identity: &Name) -> IdentityResult<Name> {
        self.create_identity_and_certificate(identity, &self.default_key_params)
    }

    fn key_matches(&self, key: &Key, params: &KeyParams) -> IdentityResult<bool> {
        let key_type = KeyType::from_public_key_der(&key.public_key()?)
            .map_err(|e| IdentityError::UnsupportedKeyType(e.to_string()))?;
        Ok(key_type == params.key_type())
    }

    fn has_default_certificate(&self, identity: &Name) -> IdentityResult<bool> {
        let lookup = self
            .pib
            .get_identity(identity)
            .and_then(|handle| handle.get_default_key())
            .and_then(|key| key.get_default_certificate());
        match lookup {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove an identity from the PIB and its private keys from the TPM.
    /// Deleting an unknown identity is a no-op.
    pub fn delete_identity(&self, identity: &Name) -> IdentityResult<()> {
        let handle = match self.pib.get_identity(identity) {
            Ok(handle) => handle,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let key_names = handle.key_names()?;
        self.pib.remove_identity(identity)?;
        for key_name in &key_names {
            self.tpm.delete_key_pair(key_name)?;
        }
        info!(identity = %identity, keys = key_names.len(), "Deleted identity");
        Ok(())
    }

    pub fn set_default_identity(&self, identity: &Name) -> IdentityResult<()> {
        self.pib.set_default_identity(identity)?;
        Ok(())
    }

    pub fn get_default_identity(&self) -> IdentityResult<Name> {
        Ok(self.pib.get_default_identity()?.name().clone())
    }

    pub fn get_identities(&self) -> IdentityResult<Vec<Name>> {
        Ok(self.pib.identity_names()?.into_iter().collect())
    }

    // ----- keys -----

    /// Generate a key pair for `identity` and register its public half.
    ///
    /// The key becomes the identity's default only if it has none.
    pub fn generate_key_pair(
        &self,
        identity: &Name,
        is_ksk: bool,
        params: &KeyParams,
    ) -> IdentityResult<Name> {
        params.validate()?;

        let key_name = key_name_for(identity, is_ksk, now_millis());
        if self.pib.backend().has_key(&key_name)? || self.tpm.has_key(&key_name)? {
            return Err(TpmError::KeyExists {
                key_name: key_name.to_uri(),
            }
            .into());
        }

        let public_key = self.tpm.generate_key_pair(&key_name, params)?;
        let handle = self.pib.add_identity(identity)?;
        handle.add_key(&public_key, &key_name)?;

        info!(
            identity = %identity,
            key = %key_name,
            key_type = %params.key_type(),
            "Generated key pair"
        );
        Ok(key_name)
    }

    pub fn generate_rsa_key_pair(
        &self,
        identity: &Name,
        is_ksk: bool,
        size: u32,
    ) -> IdentityResult<Name> {
        self.generate_key_pair(identity, is_ksk, &KeyParams::Rsa { size })
    }

    pub fn generate_ec_key_pair(
        &self,
        identity: &Name,
        is_ksk: bool,
        size: u32,
    ) -> IdentityResult<Name> {
        self.generate_key_pair(identity, is_ksk, &KeyParams::Ec { size })
    }

    pub fn generate_rsa_key_pair_as_default(
        &self,
        identity: &Name,
        is_ksk: bool,
        size: u32,
    ) -> IdentityResult<Name> {
        let key_name = self.generate_rsa_key_pair(identity, is_ksk, size)?;
        self.set_default_key_for_identity(&key_name)?;
        Ok(key_name)
    }

    pub fn generate_ec_key_pair_as_default(
        &self,
        identity: &Name,
        is_ksk: bool,
        size: u32,
    ) -> IdentityResult<Name> {
        let key_name = self.generate_ec_key_pair(identity, is_ksk, size)?;
        self.set_default_key_for_identity(&key_name)?;
        Ok(key_name)
    }

    fn key(&self, key_name: &Name) -> IdentityResult<Arc<Key>> {
        let identity = extract_identity_from_key_name(key_name);
        Ok(self.pib.get_identity(&identity)?.get_key(key_name)?)
    }

    /// Remove a key from the PIB and its private half from the TPM.
    pub fn delete_key(&self, key_name: &Name) -> IdentityResult<()> {
        let identity = extract_identity_from_key_name(key_name);
        self.pib.get_identity(&identity)?.remove_key(key_name)?;
        self.tpm.delete_key_pair(key_name)?;
        info!(key = %key_name, "Deleted key");
        Ok(())
    }

    pub fn set_default_key_for_identity(&self, key_name: &Name) -> IdentityResult<()> {
        let identity = extract_identity_from_key_name(key_name);
        self.pib.get_identity(&identity)?.set_default_key(key_name)?;
        Ok(())
    }

    pub fn get_default_key_name_for_identity(&self, identity: &Name) -> IdentityResult<Name> {
        Ok(self.pib.get_identity(identity)?.get_default_key()?.name().clone())
    }

    /// DER-encoded public key registered under `key_name`.
    pub fn get_public_key(&self, key_name: &Name) -> IdentityResult<Vec<u8>> {
        Ok(self.key(key_name)?.public_key()?)
    }

    // ----- certificates -----

    /// Build an unsigned certificate for `key_name`.
    ///
    /// The name follows `signing_identity` unless `cert_prefix` is given, in
    /// which case it must be a strict prefix of the key name. Without explicit
    /// subject descriptions the certificate names the key's identity.
    pub fn prepare_unsigned_identity_certificate(
        &self,
        key_name: &Name,
        signing_identity: &Name,
        validity: ValidityPeriod,
        subject_descriptions: Option<Vec<SubjectDescription>>,
        cert_prefix: Option<&Name>,
    ) -> IdentityResult<Certificate> {
        if validity.not_before > validity.not_after {
            return Err(IdentityError::Certificate(format!(
                "validity starts after it ends ({} > {})",
                validity.not_before, validity.not_after
            )));
        }

        let public_key = self.key(key_name)?.public_key()?;
        let version = now_millis();
        let cert_name = match cert_prefix {
            Some(prefix) => certificate_name_with_prefix(prefix, key_name, version)?,
            None => infer_certificate_name(key_name, Some(signing_identity), version)?,
        };

        let descriptions = subject_descriptions.unwrap_or_else(|| {
            vec![SubjectDescription::new(
                OID_ATTRIBUTE_NAME,
                extract_identity_from_key_name(key_name).to_uri(),
            )]
        });

        let mut certificate = Certificate::new(cert_name, public_key, validity);
        certificate.subject_descriptions = descriptions;
        Ok(certificate)
    }

    /// Certificate for `key_name` signed by the key itself.
    pub fn self_sign(&self, key_name: &Name) -> IdentityResult<Certificate> {
        let identity = extract_identity_from_key_name(key_name);
        let validity = ValidityPeriod::for_days(now_millis(), self.certificate_validity_days);
        let mut certificate =
            self.prepare_unsigned_identity_certificate(key_name, &identity, validity, None, None)?;

        let key_locator = certificate.name().prefix(-1);
        self.sign_with_key(&mut certificate, key_name, key_locator)?;
        debug!(key = %key_name, certificate = %certificate.name(), "Self-signed certificate");
        Ok(certificate)
    }

    pub fn add_certificate(&self, certificate: &Certificate) -> IdentityResult<()> {
        self.key(&certificate.key_name()?)?.add_certificate(certificate)?;
        Ok(())
    }

    /// Add `certificate` and make it its key's default.
    pub fn add_certificate_as_default(&self, certificate: &Certificate) -> IdentityResult<()> {
        self.key(&certificate.key_name()?)?
            .set_default_certificate_from(certificate)?;
        Ok(())
    }

    /// Add `certificate` as its key's default and the key as its identity's
    /// default. The identity becomes the PIB default if there is none.
    pub fn add_certificate_as_identity_default(
        &self,
        certificate: &Certificate,
    ) -> IdentityResult<()> {
        let key_name = certificate.key_name()?;
        let identity = extract_identity_from_key_name(&key_name);

        self.add_certificate_as_default(certificate)?;
        self.pib.get_identity(&identity)?.set_default_key(&key_name)?;

        match self.pib.get_default_identity() {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                self.pib.set_default_identity(&identity)?;
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    /// Like [`Self::add_certificate_as_identity_default`], and also make the
    /// identity the PIB default.
    pub fn add_certificate_as_system_default(
        &self,
        certificate: &Certificate,
    ) -> IdentityResult<()> {
        self.add_certificate_as_identity_default(certificate)?;
        self.pib.set_default_identity(&certificate.identity()?)?;
        Ok(())
    }

    pub fn delete_certificate(&self, cert_name: &Name) -> IdentityResult<()> {
        let key_name = extract_key_name_from_cert_name(cert_name)?;
        self.key(&key_name)?.remove_certificate(cert_name)?;
        Ok(())
    }

    pub fn get_certificate(&self, cert_name: &Name) -> IdentityResult<Arc<Certificate>> {
        let key_name = extract_key_name_from_cert_name(cert_name)?;
        Ok(self.key(&key_name)?.get_certificate(cert_name)?)
    }

    pub fn get_default_certificate_name_for_identity(
        &self,
        identity: &Name,
    ) -> IdentityResult<Name> {
        let key = self.pib.get_identity(identity)?.get_default_key()?;
        Ok(key.get_default_certificate()?.name().clone())
    }

    pub fn get_default_certificate(&self) -> IdentityResult<Arc<Certificate>> {
        let key = self.pib.get_default_identity()?.get_default_key()?;
        Ok(key.get_default_certificate()?)
    }

    // ----- signing -----

    /// Certificate that `info` selects, or `None` for digest-only signing.
    pub fn resolve_signing_certificate(&self, info: &SigningInfo) -> IdentityResult<Option<Name>> {
        let name = info.signer_name();
        let cert_name = match info.signer_type() {
            SignerType::Sha256 => return Ok(None),
            SignerType::Null => match self.pib.get_default_identity() {
                Ok(identity) => identity.get_default_key()?.get_default_certificate()?.name().clone(),
                // Without any identity there is nothing to sign with.
                Err(e) if e.is_not_found() => return Ok(None),
                Err(e) => return Err(e.into()),
            },
            SignerType::Id => self.get_default_certificate_name_for_identity(name)?,
            SignerType::Key => self.key(name)?.get_default_certificate()?.name().clone(),
            SignerType::Cert => self.get_certificate(name)?.name().clone(),
        };
        Ok(Some(cert_name))
    }

    /// Sign `packet` as directed by `info`.
    pub fn sign<P: Signable + ?Sized>(&self, packet: &mut P, info: &SigningInfo) -> IdentityResult<()> {
        match self.resolve_signing_certificate(info)? {
            Some(cert_name) => self.sign_by_certificate(packet, &cert_name),
            None => self.sign_with_sha256(packet),
        }
    }

    /// Sign `packet` with the key certified by `cert_name`.
    pub fn sign_by_certificate<P: Signable + ?Sized>(
        &self,
        packet: &mut P,
        cert_name: &Name,
    ) -> IdentityResult<()> {
        let certificate = self.get_certificate(cert_name)?;
        let key_name = certificate.key_name()?;
        self.sign_with_key(packet, &key_name, cert_name.prefix(-1))
    }

    /// Integrity-only signature: a SHA-256 digest of the signed portion.
    pub fn sign_with_sha256<P: Signable + ?Sized>(&self, packet: &mut P) -> IdentityResult<()> {
        packet.set_signature_info(SignatureInfo::digest_sha256())?;
        let digest = digest_sha256(&packet.signed_portion()?);
        packet.set_signature_value(digest)?;
        debug!("Signed with SHA-256 digest");
        Ok(())
    }

    /// Raw signature over `data` by the key certified by `cert_name`.
    pub fn sign_bytes(&self, data: &[u8], cert_name: &Name) -> IdentityResult<Vec<u8>> {
        let key_name = self.get_certificate(cert_name)?.key_name()?;
        Ok(self.tpm.sign(data, &key_name, DigestAlgorithm::Sha256)?)
    }

    fn sign_with_key<P: Signable + ?Sized>(
        &self,
        packet: &mut P,
        key_name: &Name,
        key_locator: Name,
    ) -> IdentityResult<()> {
        let signature_type = match self.tpm.get_key_type(key_name)? {
            KeyType::Rsa => SignatureType::Sha256WithRsa,
            KeyType::Ec => SignatureType::Sha256WithEcdsa,
        };

        packet.set_signature_info(SignatureInfo::new(signature_type, key_locator))?;
        let signed = packet.signed_portion()?;
        let signature = self.tpm.sign(&signed, key_name, DigestAlgorithm::Sha256)?;
        packet.set_signature_value(signature)?;

        debug!(key = %key_name, ?signature_type, "Signed packet");
        Ok(())
    }

    /// Check a packet's signature against the key its locator names in the PIB.
    pub fn verify<P: Signable + ?Sized>(&self, packet: &P) -> IdentityResult<bool> {
        let Some(info) = packet.signature_info() else {
            return Ok(false);
        };
        let Some(locator) = info.key_locator.as_ref() else {
            return verify_packet(packet, None);
        };

        let key_name = extract_key_name_from_cert_name(locator)?;
        let public_key = self.get_public_key(&key_name)?;
        verify_packet(packet, Some(&public_key))
    }
}

impl std::fmt::Debug for IdentityManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityManager")
            .field("pib", &self.pib.locator())
            .field("tpm", &self.tpm.locator())
            .finish_non_exhaustive()
    }
}
