//! Model signing utility for cardiorisk model directories.
//!
//! Creates a signed manifest (`manifest.json`) and Ed25519 signature (`model.sig`)
//! over the model artifacts, enabling verification at load time.
//!
//! # Usage
//!
//! ```bash
//! sign_model keygen --out-seed <path> [--out-pub <path>]
//! CARDIORISK_MODEL_SIGNING_KEY_B64_FILE=<path> sign_model sign <model_dir>
//! ```
//!
//! # Security
//!
//! - Signing key sourced from an FD or a file, never the command line
//! - Manifest includes SHA-256 hashes of columns.json, scaler.json and model.json
//! - Private key material zeroized after use

use std::env;
use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::io::FromRawFd;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose;
use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use cardiorisk::adapters::artifacts::{
    unix_now, SignedManifest, MANIFEST_FILE, PUBKEY_FILE, SIGNATURE_FILE,
};

const KEY_FD_ENV: &str = "CARDIORISK_MODEL_SIGNING_KEY_B64_FD";
const KEY_FILE_ENV: &str = "CARDIORISK_MODEL_SIGNING_KEY_B64_FILE";

#[derive(Zeroize, ZeroizeOnDrop)]
struct Seed([u8; 32]);

fn non_empty_secret(raw: &str) -> Result<Zeroizing<String>, String> {
    let secret = raw.trim_end_matches(['\n', '\r']).to_string();
    if secret.is_empty() {
        return Err("Empty signing key".to_string());
    }
    Ok(Zeroizing::new(secret))
}

fn read_signing_seed_b64() -> Result<Zeroizing<String>, String> {
    #[cfg(unix)]
    if let Ok(fd_str) = env::var(KEY_FD_ENV) {
        let fd: i32 = fd_str
            .trim()
            .parse()
            .map_err(|_| "Invalid key FD".to_string())?;
        if fd <= 2 {
            return Err("Refusing to read signing key from stdio FD".to_string());
        }
        // SAFETY: take ownership of FD for one-time secret read.
        let mut file = unsafe { std::fs::File::from_raw_fd(fd) };
        let mut buf = Zeroizing::new(String::new());
        use std::io::Read;
        file.read_to_string(&mut buf)
            .map_err(|e| format!("Failed reading signing key from FD: {e}"))?;
        return non_empty_secret(&buf);
    }

    if let Ok(path) = env::var(KEY_FILE_ENV) {
        let content = Zeroizing::new(
            fs::read_to_string(path.trim())
                .map_err(|e| format!("Failed reading signing key file: {e}"))?,
        );
        return non_empty_secret(&content);
    }

    Err(format!(
        "Missing signing key. Set {KEY_FILE_ENV} (or {KEY_FD_ENV}) to a base64 Ed25519 seed; \
         create one with `sign_model keygen`."
    ))
}

fn read_signing_seed() -> Result<Seed, String> {
    let v = read_signing_seed_b64()?;
    seed_from_b64(&v)
}

fn seed_from_b64(b64: &str) -> Result<Seed, String> {
    let raw = Zeroizing::new(
        general_purpose::STANDARD
            .decode(b64.trim())
            .map_err(|e| format!("Invalid base64 in signing key: {e}"))?,
    );

    if raw.len() != 32 {
        return Err(format!(
            "Signing key seed must be 32 bytes after base64 decode (got {})",
            raw.len()
        ));
    }

    let mut seed = [0u8; 32];
    seed.copy_from_slice(&raw);
    Ok(Seed(seed))
}

/// Write a secret file readable only by the owner. Refuses to overwrite.
fn write_secret(path: &Path, contents: &[u8]) -> Result<(), String> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options
        .open(path)
        .map_err(|e| format!("Failed to create {path:?}: {e}"))?;
    file.write_all(contents)
        .map_err(|e| format!("Failed to write {path:?}: {e}"))
}

enum Command {
    Keygen {
        out_seed: PathBuf,
        out_pub: Option<PathBuf>,
    },
    Sign {
        model_dir: PathBuf,
    },
}

fn usage() -> String {
    "Usage:\n  sign_model keygen --out-seed <path> [--out-pub <path>]\n  sign_model sign <model_dir>"
        .to_string()
}

fn parse_args() -> Result<Command, String> {
    let mut args = env::args().skip(1);

    match args.next().as_deref() {
        Some("keygen") => {
            let mut out_seed = None;
            let mut out_pub = None;
            while let Some(arg) = args.next() {
                match arg.as_str() {
                    "--out-seed" => out_seed = Some(PathBuf::from(args.next().ok_or_else(usage)?)),
                    "--out-pub" => out_pub = Some(PathBuf::from(args.next().ok_or_else(usage)?)),
                    _ => return Err(usage()),
                }
            }
            Ok(Command::Keygen {
                out_seed: out_seed.ok_or_else(usage)?,
                out_pub,
            })
        }
        Some("sign") => {
            let model_dir = PathBuf::from(args.next().ok_or_else(usage)?);
            if args.next().is_some() {
                return Err(usage());
            }
            Ok(Command::Sign { model_dir })
        }
        _ => Err(usage()),
    }
}

/// Generate a seed into `out_seed` and return the base64 public key.
fn keygen(out_seed: &Path, out_pub: Option<&Path>) -> Result<String, String> {
    let mut seed = Seed([0u8; 32]);
    rand::rngs::OsRng.fill_bytes(&mut seed.0);

    let seed_b64 = Zeroizing::new(general_purpose::STANDARD.encode(seed.0));
    write_secret(out_seed, seed_b64.as_bytes())?;

    let verifying_key = SigningKey::from_bytes(&seed.0).verifying_key();
    let pub_b64 = general_purpose::STANDARD.encode(verifying_key.to_bytes());
    match out_pub {
        Some(path) => {
            fs::write(path, &pub_b64).map_err(|e| format!("Failed to write {path:?}: {e}"))?;
            println!("Wrote public key: {path:?}");
        }
        None => println!("PUBKEY (base64)={pub_b64}"),
    }
    println!("Wrote signing seed: {out_seed:?}");
    Ok(pub_b64)
}

fn sign(model_dir: &Path) -> Result<(), String> {
    let seed = read_signing_seed()?;
    sign_with_seed(model_dir, &seed)
}

fn sign_with_seed(model_dir: &Path, seed: &Seed) -> Result<(), String> {
    let signing_key = SigningKey::from_bytes(&seed.0);
    let pub_b64 = general_purpose::STANDARD.encode(signing_key.verifying_key().to_bytes());

    let manifest = SignedManifest::for_directory(model_dir, unix_now())
        .map_err(|e| format!("Cannot sign {model_dir:?}: {e}"))?;
    let manifest_bytes = serde_json::to_vec_pretty(&manifest)
        .map_err(|e| format!("Failed to serialize {MANIFEST_FILE}: {e}"))?;

    let manifest_path = model_dir.join(MANIFEST_FILE);
    fs::write(&manifest_path, &manifest_bytes)
        .map_err(|e| format!("Failed to write {manifest_path:?}: {e}"))?;

    let sig: Signature = signing_key.sign(&manifest_bytes);
    let sig_path = model_dir.join(SIGNATURE_FILE);
    fs::write(&sig_path, sig.to_bytes())
        .map_err(|e| format!("Failed to write {sig_path:?}: {e}"))?;

    println!("Signed manifest: {manifest_path:?}");
    println!("Wrote signature: {sig_path:?}");

    // A stale model.pub would make the loader reject this signature.
    let pub_path = model_dir.join(PUBKEY_FILE);
    match fs::read_to_string(&pub_path) {
        Ok(existing) if existing.trim() != pub_b64 => {
            eprintln!("WARNING: {pub_path:?} does not match the signing key");
        }
        Ok(_) => {}
        Err(_) => println!("PUBKEY (base64)={pub_b64}"),
    }

    Ok(())
}

fn main() -> Result<(), String> {
    match parse_args()? {
        Command::Keygen { out_seed, out_pub } => keygen(&out_seed, out_pub.as_deref()).map(drop),
        Command::Sign { model_dir } => sign(&model_dir),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardiorisk::adapters::artifacts::{ArtifactLoader, BOUND_FILES};

    fn copy_models(dir: &Path) {
        let models = Path::new(env!("CARGO_MANIFEST_DIR")).join("models");
        for name in BOUND_FILES {
            fs::copy(models.join(name), dir.join(name)).expect("copy artifact");
        }
    }

    #[test]
    fn test_keygen_sign_load_roundtrip() {
        let temp = tempfile::tempdir().expect("tempdir");
        let model_dir = temp.path().join("model");
        fs::create_dir(&model_dir).expect("model dir");
        copy_models(&model_dir);

        let seed_path = temp.path().join("seed.b64");
        let pub_b64 = keygen(&seed_path, Some(&model_dir.join(PUBKEY_FILE))).expect("keygen");
        assert_eq!(
            fs::read_to_string(model_dir.join(PUBKEY_FILE)).expect("read pub"),
            pub_b64
        );

        let seed_b64 = Zeroizing::new(fs::read_to_string(&seed_path).expect("read seed"));
        let seed = seed_from_b64(&seed_b64).expect("decode seed");
        sign_with_seed(&model_dir, &seed).expect("sign");

        let artifacts = ArtifactLoader::new().load(&model_dir).expect("load");
        assert!(artifacts.verified);
    }

    #[test]
    fn test_write_secret_refuses_to_overwrite() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("seed.b64");
        write_secret(&path, b"first").expect("first write");

        assert!(write_secret(&path, b"second").is_err());
        assert_eq!(fs::read(&path).expect("read"), b"first");
    }

    #[cfg(unix)]
    #[test]
    fn test_secret_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("seed.b64");
        keygen(&path, None).expect("keygen");

        let mode = fs::metadata(&path).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_seed_must_be_32_bytes() {
        let short = general_purpose::STANDARD.encode([7u8; 16]);
        assert!(seed_from_b64(&short).is_err());
        assert!(seed_from_b64("not base64!").is_err());
    }
}
