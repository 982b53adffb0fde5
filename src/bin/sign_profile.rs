//! Signing utility for exported disease profiles.
//!
//! Writes `manifest.json` (SHA-256 of every artifact file) and `model.sig`
//! (Ed25519 signature over the manifest bytes) into a profile directory.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin sign_profile -- <profile_dir> [--disease <id>]
//! cargo run --bin sign_profile -- --generate-key
//! ```
//!
//! # Security
//!
//! - Signing key sourced from an FD or a file; env var fallback only in debug builds
//! - Private key material zeroized after use

use std::env;
use std::fs;
#[cfg(unix)]
use std::os::unix::io::FromRawFd;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose;
use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use mediassist::adapters::artifacts::{
    read_profile_files, ProfileManifest, MANIFEST_FILE, SIGNATURE_FILE,
};
use mediassist::domain::DiseaseId;

const KEY_FD_ENV: &str = "MEDIASSIST_SIGNING_KEY_B64_FD";
const KEY_FILE_ENV: &str = "MEDIASSIST_SIGNING_KEY_B64_FILE";
const KEY_ENV: &str = "MEDIASSIST_SIGNING_KEY_B64";

#[derive(Zeroize, ZeroizeOnDrop)]
struct Seed([u8; 32]);

enum Command {
    Sign {
        profile_dir: PathBuf,
        disease: Option<DiseaseId>,
    },
    GenerateKey,
}

fn usage() -> &'static str {
    "Usage: sign_profile <profile_dir> [--disease <id>] | sign_profile --generate-key"
}

fn parse_args() -> Result<Command> {
    let mut args = env::args().skip(1);
    let mut profile_dir: Option<PathBuf> = None;
    let mut disease: Option<DiseaseId> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--disease" => {
                let v = args.next().context(usage())?;
                disease = Some(v.parse()?);
            }
            "--generate-key" => return Ok(Command::GenerateKey),
            "-h" | "--help" => bail!(usage()),
            _ if profile_dir.is_none() => profile_dir = Some(PathBuf::from(arg)),
            _ => bail!(usage()),
        }
    }

    Ok(Command::Sign {
        profile_dir: profile_dir.context(usage())?,
        disease,
    })
}

fn non_empty(secret: &str) -> Result<Zeroizing<String>> {
    let secret = secret.trim_end_matches(['\n', '\r']).to_string();
    if secret.is_empty() {
        bail!("Empty signing key");
    }
    Ok(Zeroizing::new(secret))
}

fn read_signing_seed_b64() -> Result<Zeroizing<String>> {
    #[cfg(unix)]
    if let Ok(fd_str) = env::var(KEY_FD_ENV) {
        let fd: i32 = fd_str.trim().parse().context("Invalid key FD")?;
        if fd <= 2 {
            bail!("Refusing to read signing key from stdio FD");
        }
        // SAFETY: take ownership of FD for one-time secret read.
        let mut file = unsafe { std::fs::File::from_raw_fd(fd) };
        let mut buf = Zeroizing::new(String::new());
        use std::io::Read;
        file.read_to_string(&mut buf)
            .context("Failed reading signing key from FD")?;
        return non_empty(&buf);
    }

    if let Ok(path) = env::var(KEY_FILE_ENV) {
        let content = Zeroizing::new(
            fs::read_to_string(path.trim()).context("Failed reading signing key file")?,
        );
        return non_empty(&content);
    }

    if cfg!(debug_assertions) {
        if let Ok(v) = env::var(KEY_ENV) {
            return non_empty(&Zeroizing::new(v));
        }
    }

    bail!(
        "Missing signing key. Provide {KEY_FD_ENV} or {KEY_FILE_ENV} \
         ({KEY_ENV} only in debug builds)."
    )
}

fn read_signing_seed() -> Result<Seed> {
    let b64 = read_signing_seed_b64()?;
    let raw = Zeroizing::new(
        general_purpose::STANDARD
            .decode(b64.trim())
            .context("Invalid base64 in signing key")?,
    );
    let bytes: [u8; 32] = raw
        .as_slice()
        .try_into()
        .map_err(|_| anyhow::anyhow!("Signing key seed must be 32 bytes (got {})", raw.len()))?;
    Ok(Seed(bytes))
}

fn generate_key() {
    let mut seed = Seed([0u8; 32]);
    rand::rngs::OsRng.fill_bytes(&mut seed.0);
    let signing_key = SigningKey::from_bytes(&seed.0);

    println!("SIGNING_KEY_B64={}", general_purpose::STANDARD.encode(seed.0));
    println!(
        "MEDIASSIST_MODEL_PUBKEY_B64={}",
        general_purpose::STANDARD.encode(signing_key.verifying_key().to_bytes())
    );
}

fn sign(profile_dir: PathBuf, disease: Option<DiseaseId>) -> Result<()> {
    let disease = match disease {
        Some(d) => d,
        None => profile_dir
            .file_name()
            .and_then(|n| n.to_str())
            .context("Cannot infer disease from directory name; pass --disease")?
            .parse()?,
    };

    let files = read_profile_files(&profile_dir)
        .with_context(|| format!("Failed reading artifacts in {}", profile_dir.display()))?;
    let refs: Vec<(&str, &[u8])> = files.iter().map(|(n, b)| (*n, b.as_slice())).collect();
    let manifest = ProfileManifest::build(disease, &refs);
    let manifest_bytes = serde_json::to_vec_pretty(&manifest)?;

    let seed = read_signing_seed()?;
    let signing_key = SigningKey::from_bytes(&seed.0);
    drop(seed);

    let manifest_path = profile_dir.join(MANIFEST_FILE);
    fs::write(&manifest_path, &manifest_bytes)
        .with_context(|| format!("Failed to write {}", manifest_path.display()))?;

    let sig: Signature = signing_key.sign(&manifest_bytes);
    let sig_path = profile_dir.join(SIGNATURE_FILE);
    fs::write(&sig_path, sig.to_bytes())
        .with_context(|| format!("Failed to write {}", sig_path.display()))?;

    println!("Signed {disease} manifest: {}", manifest_path.display());
    println!("Wrote signature: {}", sig_path.display());
    println!(
        "MEDIASSIST_MODEL_PUBKEY_B64={}",
        general_purpose::STANDARD.encode(signing_key.verifying_key().to_bytes())
    );
    Ok(())
}

fn main() -> Result<()> {
    match parse_args()? {
        Command::GenerateKey => {
            generate_key();
            Ok(())
        }
        Command::Sign {
            profile_dir,
            disease,
        } => sign(profile_dir, disease),
    }
}
