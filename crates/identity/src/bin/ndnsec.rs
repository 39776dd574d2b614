//! ndnsec
//!
//! Command-line tool for inspecting and managing the local key chain.
//! The PIB and TPM are taken from `NDN_CLIENT_PIB` / `NDN_CLIENT_TPM`,
//! falling back to the stores under `$HOME/.ndn`.

use anyhow::{anyhow, Context};
use ndnsec_core::{logging, KeyChainConfig, Name};
use ndnsec_identity::{IdentityError, IdentityManager, PibError, SigningInfo};
use std::process;

fn open_manager() -> anyhow::Result<IdentityManager> {
    let config = KeyChainConfig::default_config().with_env_overrides();
    IdentityManager::from_config(&config, false).context("Failed to open key chain")
}

fn parse_name(uri: &str) -> anyhow::Result<Name> {
    Name::from_uri(uri).with_context(|| format!("Invalid name '{}'", uri))
}

/// Treat a missing entry as `None` and propagate every other failure.
fn optional<T, E>(result: Result<T, E>, is_not_found: fn(&E) -> bool) -> anyhow::Result<Option<T>>
where
    E: std::error::Error + Send + Sync + 'static,
{
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if is_not_found(&e) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn cmd_list(manager: &IdentityManager) -> anyhow::Result<()> {
    let default_identity = optional(manager.get_default_identity(), IdentityError::is_not_found)?;

    for identity_name in manager.get_identities()? {
        let marker = if Some(&identity_name) == default_identity.as_ref() { "*" } else { " " };
        println!("{} {}", marker, identity_name);

        let identity = manager.pib().get_identity(&identity_name)?;
        let default_key = optional(identity.get_default_key(), PibError::is_not_found)?;
        for key_name in identity.key_names()? {
            let key = identity.get_key(&key_name)?;
            let is_default = default_key.as_ref().map(|k| k.name()) == Some(&key_name);
            println!("  {} {}", if is_default { "+->*" } else { "+-> " }, key_name);

            let default_cert = optional(key.get_default_certificate(), PibError::is_not_found)?;
            for cert_name in key.certificates().names()? {
                let is_default = default_cert.as_ref().map(|c| c.name()) == Some(&cert_name);
                println!("       {} {}", if is_default { "+->*" } else { "+-> " }, cert_name);
            }
        }
    }
    Ok(())
}

fn cmd_key_gen(manager: &IdentityManager, identity: &Name, ec: bool) -> anyhow::Result<()> {
    let key_name = if ec {
        manager.generate_ec_key_pair_as_default(identity, true, 256)?
    } else {
        manager.generate_rsa_key_pair_as_default(identity, true, 2048)?
    };

    let certificate = manager.self_sign(&key_name)?;
    manager.add_certificate_as_identity_default(&certificate)?;
    println!("{}", certificate.name());
    Ok(())
}

fn cmd_cert_dump(manager: &IdentityManager, identity: &Name) -> anyhow::Result<()> {
    let cert_name = manager.get_default_certificate_name_for_identity(identity)?;
    let certificate = manager.get_certificate(&cert_name)?;
    println!("{}", serde_json::to_string_pretty(certificate.as_ref())?);
    Ok(())
}

fn cmd_sign_info(manager: &IdentityManager, text: &str) -> anyhow::Result<()> {
    let info: SigningInfo = text.parse()?;
    println!("Signer: {:?} {}", info.signer_type(), info);
    match manager.resolve_signing_certificate(&info)? {
        Some(cert_name) => println!("Certificate: {}", cert_name),
        None => println!("Certificate: none (SHA-256 digest)"),
    }
    Ok(())
}

fn print_usage() {
    println!("ndnsec - Manage NDN identities, keys and certificates");
    println!();
    println!("USAGE:");
    println!("    ndnsec list");
    println!("    ndnsec key-gen <identity> [--ec]");
    println!("    ndnsec set-default <identity>");
    println!("    ndnsec delete <identity>");
    println!("    ndnsec cert-dump <identity>");
    println!("    ndnsec sign-info <signing-info>");
    println!();
    println!("ENVIRONMENT:");
    println!("    NDN_CLIENT_PIB    PIB locator, e.g. pib-sqlite3:/home/alice/.ndn");
    println!("    NDN_CLIENT_TPM    TPM locator, e.g. tpm-file:/home/alice/.ndn/ndnsec-key-file");
}

fn positional<'a>(args: &'a [String], what: &str) -> anyhow::Result<&'a str> {
    args.iter()
        .find(|arg| !arg.starts_with("--"))
        .map(String::as_str)
        .ok_or_else(|| anyhow!("Missing <{}> argument", what))
}

fn run(command: &str, args: &[String]) -> anyhow::Result<()> {
    let manager = open_manager()?;
    match command {
        "list" => cmd_list(&manager),
        "key-gen" => {
            let identity = parse_name(positional(args, "identity")?)?;
            let ec = args.iter().any(|arg| arg == "--ec");
            cmd_key_gen(&manager, &identity, ec)
        }
        "set-default" => {
            let identity = parse_name(positional(args, "identity")?)?;
            manager.set_default_identity(&identity)?;
            Ok(())
        }
        "delete" => {
            let identity = parse_name(positional(args, "identity")?)?;
            manager.delete_identity(&identity)?;
            Ok(())
        }
        "cert-dump" => {
            let identity = parse_name(positional(args, "identity")?)?;
            cmd_cert_dump(&manager, &identity)
        }
        "sign-info" => {
            // An empty argument selects the default signer.
            let text = args.first().map(String::as_str).unwrap_or("");
            cmd_sign_info(&manager, text)
        }
        other => Err(anyhow!("Unknown command '{}'", other)),
    }
}

fn main() {
    logging::init();

    let args: Vec<String> = std::env::args().collect();
    let Some(command) = args.get(1) else {
        print_usage();
        process::exit(1);
    };
    if command == "help" || command == "--help" || command == "-h" {
        print_usage();
        return;
    }

    if let Err(e) = run(command, &args[2..]) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndnsec_identity::EntityKind;

    #[test]
    fn test_optional_maps_only_missing_entries() {
        let missing: Result<u8, PibError> =
            Err(PibError::not_found(EntityKind::DefaultKey, &Name::new()));
        assert!(optional(missing, PibError::is_not_found).unwrap().is_none());

        let found: Result<u8, PibError> = Ok(7);
        assert_eq!(optional(found, PibError::is_not_found).unwrap(), Some(7));

        let broken: Result<u8, PibError> = Err(PibError::Storage("disk I/O error".to_string()));
        assert!(optional(broken, PibError::is_not_found).is_err());
    }
}
