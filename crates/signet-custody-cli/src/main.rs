//! Signet custody CLI — `signet` command.
//!
//! Thin wrapper over the custody core: key lifecycle against a file key
//! store and trust management against the certificate store. Usage errors
//! and missing keys/certificates are terminal, non-zero-exit conditions.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};

use signet_custody::{
    encoding, CertificateStore, ConstantRetriever, FileKeyStore, KeyStore, PrivateKey, Retriever,
    Role,
};

// ── Directory helpers ─────────────────────────────────────────────────────────

fn signet_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SIGNET_HOME") {
        return PathBuf::from(dir);
    }
    let home = std::env::var("HOME").expect("HOME not set");
    PathBuf::from(home).join(".signet")
}

fn keys_dir() -> PathBuf {
    signet_dir().join("keys")
}

fn trust_path() -> PathBuf {
    signet_dir().join("trust.json")
}

// ── Passphrase helper ─────────────────────────────────────────────────────────

/// Build the retriever from `SIGNET_PASSPHRASE`, falling back to a single
/// stdin read. Interactive prompting beyond that is out of scope here.
fn retriever() -> std::sync::Arc<dyn Retriever> {
    if let Ok(pass) = std::env::var("SIGNET_PASSPHRASE") {
        return ConstantRetriever::shared(pass);
    }
    eprint!("Passphrase: ");
    let mut passphrase = String::new();
    std::io::stdin()
        .read_line(&mut passphrase)
        .expect("failed to read passphrase");
    ConstantRetriever::shared(passphrase.trim().to_string())
}

// ── CLI structure ─────────────────────────────────────────────────────────────

/// Signet custody CLI — manage signing keys and certificate trust.
#[derive(Parser, Debug)]
#[command(
    name = "signet",
    about = "Signet custody CLI",
    version,
    long_about = "signet — key custody and certificate trust\n\nManage private signing keys (generate, list, remove, export, import)\nand the X.509 trust store that authorizes them."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage private signing keys
    #[command(subcommand)]
    Key(KeyCommands),

    /// Manage certificate trust
    #[command(subcommand)]
    Cert(CertCommands),
}

#[derive(Subcommand, Debug)]
enum KeyCommands {
    /// List stored keys and their roles
    List,

    /// Generate a new key bound to a role
    Generate {
        /// Trust role (root, targets, snapshot, timestamp, or a delegated name)
        role: String,
    },

    /// Remove a key
    Remove {
        /// Key identifier
        key_id: String,
    },

    /// Write a key's password-protected encoding to a file
    Export {
        /// Key identifier
        key_id: String,
        /// Output path (defaults to `{key_id}.key` in the working directory)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Install an already-encrypted key encoding
    Import {
        /// Path to the encoding file
        file: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum CertCommands {
    /// List trusted certificates
    List,

    /// Add a DER-encoded certificate to the trust store
    Add {
        /// Path to the certificate file
        file: PathBuf,
    },

    /// Remove trust from a certificate authority or certificate
    Remove {
        /// SHA-256 Subject Key ID of the certificate
        skid: String,
    },

    /// Show one trusted certificate
    Info {
        /// SHA-256 Subject Key ID of the certificate
        skid: String,
    },
}

// ── Command handlers ──────────────────────────────────────────────────────────

fn key_store() -> Result<FileKeyStore> {
    FileKeyStore::new(keys_dir(), retriever()).context("failed to open key store")
}

fn cert_store() -> Result<CertificateStore> {
    CertificateStore::new(trust_path()).context("failed to open trust store")
}

fn run_key(command: KeyCommands) -> Result<()> {
    match command {
        KeyCommands::List => {
            let store = key_store()?;
            let mut entries: Vec<_> = store.list_keys().into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            for (id, info) in entries {
                println!("{id}\t{}", info.role);
            }
        }
        KeyCommands::Generate { role } => {
            let role = Role::from_str(&role)?;
            let store = key_store()?;
            let key = PrivateKey::generate();
            store.add_key(key.id(), &role, &key)?;
            println!("{} ({role})", key.id());
        }
        KeyCommands::Remove { key_id } => {
            let store = key_store()?;
            store.remove_key(&key_id)?;
            println!("Removed key {key_id}");
        }
        KeyCommands::Export { key_id, out } => {
            let store = key_store()?;
            let encoded = store.export_key(&key_id)?;
            let out = out.unwrap_or_else(|| PathBuf::from(format!("{key_id}.key")));
            std::fs::write(&out, encoded)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Exported key {key_id} to {}", out.display());
        }
        KeyCommands::Import { file } => {
            let encoded = std::fs::read(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            // Decrypt once to learn the key's identity, then install.
            let retriever = retriever();
            let (key, _) = encoding::decrypt_with_retriever(
                &encoded,
                file.to_string_lossy().as_ref(),
                "import",
                retriever.as_ref(),
            )?;
            let key_id = key.id().to_string();
            let store = FileKeyStore::new(keys_dir(), retriever)?;
            store.import_key(&encoded, &key_id)?;
            println!("Imported key {key_id}");
        }
    }
    Ok(())
}

fn run_cert(command: CertCommands) -> Result<()> {
    match command {
        CertCommands::List => {
            let store = cert_store()?;
            for cert in store.certificates() {
                println!("{cert}");
            }
        }
        CertCommands::Add { file } => {
            let der = std::fs::read(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let store = cert_store()?;
            let cert = store.add_cert(&der)?;
            println!("Added: {cert}");
        }
        CertCommands::Remove { skid } => {
            if skid.is_empty() {
                return Err(anyhow!(
                    "must specify a SHA-256 Subject Key ID of the certificate"
                ));
            }
            let store = cert_store()?;
            let cert = store
                .get_certificate_by_skid(&skid)
                .map_err(|_| anyhow!("certificate not found"))?;
            println!("Removing: {cert}");
            store
                .remove_cert(&cert)
                .context("failed to remove certificate from trust store")?;
        }
        CertCommands::Info { skid } => {
            let store = cert_store()?;
            let cert = store.get_certificate_by_skid(&skid)?;
            let (not_before, not_after) = cert.validity();
            println!("SKID:        {}", cert.skid());
            println!("Common Name: {}", cert.common_name());
            println!("CA:          {}", cert.is_ca());
            println!("Not before:  {not_before}");
            println!("Not after:   {not_after}");
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Key(command) => run_key(command),
        Commands::Cert(command) => run_cert(command),
    }
}
