//! Identity, key and certificate management for NDN applications.
//!
//! An application's security state lives in two stores. The Public
//! Information Base ([`pib`]) records identities, their public keys and the
//! certificates issued for those keys, along with which of each is the
//! default. The TPM (from `ndnsec-crypto`) holds the matching private keys.
//! [`IdentityManager`] keeps the two in step and signs packets.
//!
//! # Naming
//!
//! ```text
//! identity     /alice
//! key          /alice/KSK-1700000000000
//! certificate  /alice/KEY/KSK-1700000000000/ID-CERT/%FD%00%00%01%8B%CF%E5%68%00
//! ```
//!
//! See [`naming`] for the full rules.
//!
//! # Quick start
//!
//! ```no_run
//! use ndnsec_core::{KeyChainConfig, Name};
//! use ndnsec_identity::{packet::Data, IdentityManager, SigningInfo};
//!
//! # fn main() -> ndnsec_identity::IdentityResult<()> {
//! let manager = IdentityManager::from_config(&KeyChainConfig::in_memory(), false)?;
//! let alice = Name::from_uri("/alice")?;
//! manager.create_identity_with_defaults(&alice)?;
//!
//! let mut data = Data::new(Name::from_uri("/alice/hello")?, b"hello".to_vec());
//! manager.sign(&mut data, &SigningInfo::by_identity(alice))?;
//! assert!(manager.verify(&data)?);
//! # Ok(())
//! # }
//! ```

pub mod certificate;
pub mod error;
pub mod manager;
pub mod naming;
pub mod packet;
pub mod pib;
pub mod signing_info;

pub use certificate::{Certificate, SignatureInfo, SignatureType, SubjectDescription, ValidityPeriod};
pub use error::{EntityKind, IdentityError, IdentityResult, PibError, PibResult};
pub use manager::IdentityManager;
pub use packet::{Data, Interest, Signable};
pub use pib::{open_pib, Pib, PibImpl};
pub use signing_info::{SignerType, SigningInfo};
