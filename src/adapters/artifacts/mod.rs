//! Model artifact loader: schema, scaler and classifier from a model directory.
//!
//! # Layout
//!
//! ```text
//! models/
//!   columns.json    ordered feature names (the expected schema)
//!   scaler.json     fitted standardization parameters
//!   model.json      classifier parameters, tagged by "kind"
//!   manifest.json   optional: SHA-256 of each file above
//!   model.sig       optional: Ed25519 signature over manifest.json
//!   model.pub       optional: base64 verifying key
//! ```
//!
//! # Security
//!
//! - When `manifest.json` and `model.sig` are present they are always
//!   verified: signature first, then every bound file hash.
//! - The manifest must bind all three artifact files.
//! - Without a signature, loading is refused unless unsigned models are
//!   explicitly allowed (`CARDIORISK_ALLOW_UNSIGNED_MODELS=true`).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::adapters::sklearn::{ExportedModel, ExportedScaler, StandardScaler};
use crate::config::AppConfig;
use crate::domain::ExpectedSchema;
use crate::ports::{Classifier, ModelError, Scaler};

pub const SCHEMA_FILE: &str = "columns.json";
pub const SCALER_FILE: &str = "scaler.json";
pub const MODEL_FILE: &str = "model.json";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const SIGNATURE_FILE: &str = "model.sig";
pub const PUBKEY_FILE: &str = "model.pub";

/// Files a signed manifest must bind.
pub const BOUND_FILES: [&str; 3] = [SCHEMA_FILE, SCALER_FILE, MODEL_FILE];

const MANIFEST_VERSION: u32 = 1;

/// Allowed clock skew for `created_at` in the future (seconds).
const MAX_CLOCK_SKEW_SECS: i64 = 300;

/// Errors raised while loading model artifacts.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("Model directory not found: {0:?}")]
    MissingDirectory(PathBuf),

    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed {file}: {source}")]
    Malformed {
        file: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("{artifact} expects {got} features but the schema has {expected}")]
    DimensionMismatch {
        artifact: &'static str,
        got: usize,
        expected: usize,
    },

    #[error("Invalid model parameters in {file}: {source}")]
    InvalidModel {
        file: &'static str,
        #[source]
        source: ModelError,
    },

    #[error("Model signature required: {0}")]
    Unsigned(String),

    #[error("Signature verification failed: {0}")]
    Signature(String),

    #[error("File hash mismatch for {0}")]
    HashMismatch(String),
}

/// Signed manifest binding the artifact files by SHA-256.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedManifest {
    pub version: u32,
    /// Unix timestamp (seconds) of signing.
    pub created_at: i64,
    /// File name → lowercase hex SHA-256.
    pub files: BTreeMap<String, String>,
}

impl SignedManifest {
    /// Hash the bound files in `dir` into a new manifest.
    ///
    /// # Errors
    /// Returns `ArtifactError::Read` if any bound file is missing.
    pub fn for_directory(dir: &Path, created_at: i64) -> Result<Self, ArtifactError> {
        let bound = BoundFiles::read(dir)?;
        let files = BOUND_FILES
            .iter()
            .map(|name| (name.to_string(), sha256_hex(bound.get(name))))
            .collect();
        Ok(Self {
            version: MANIFEST_VERSION,
            created_at,
            files,
        })
    }
}

/// Contents of the bound files, read once. Hashing and parsing both use
/// these bytes, so a file replaced on disk after the read is never parsed.
struct BoundFiles(BTreeMap<&'static str, Vec<u8>>);

impl BoundFiles {
    fn read(dir: &Path) -> Result<Self, ArtifactError> {
        let mut files = BTreeMap::new();
        for name in BOUND_FILES {
            files.insert(name, read_file(&dir.join(name))?);
        }
        Ok(Self(files))
    }

    fn get(&self, name: &str) -> &[u8] {
        self.0.get(name).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Everything the prediction service needs, loaded once at start.
pub struct ModelArtifacts {
    pub schema: ExpectedSchema,
    pub scaler: StandardScaler,
    pub classifier: Box<dyn Classifier>,
    /// Whether a signed manifest was verified.
    pub verified: bool,
}

impl std::fmt::Debug for ModelArtifacts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelArtifacts")
            .field("columns", &self.schema.len())
            .field("classifier", &self.classifier.kind())
            .field("verified", &self.verified)
            .finish()
    }
}

#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes).iter().map(|b| format!("{b:02x}")).collect()
}

pub fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

// Constant-time compare for ASCII strings (used for SHA-256 hex digests).
fn constant_time_eq_str(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |diff, (x, y)| diff | (x ^ y))
        == 0
}

fn read_file(path: &Path) -> Result<Vec<u8>, ArtifactError> {
    fs::read(path).map_err(|source| ArtifactError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_json<T: DeserializeOwned>(file: &'static str, bytes: &[u8]) -> Result<T, ArtifactError> {
    serde_json::from_slice(bytes).map_err(|source| ArtifactError::Malformed { file, source })
}

/// Decode a base64 Ed25519 verifying key.
///
/// # Errors
/// Returns `ArtifactError::Signature` for bad base64 or a wrong key length.
pub fn verifying_key_from_b64(b64: &str) -> Result<VerifyingKey, ArtifactError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(b64.trim())
        .map_err(|_| ArtifactError::Signature("invalid public key base64".into()))?;
    let key: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| ArtifactError::Signature("public key must be 32 bytes".into()))?;
    VerifyingKey::from_bytes(&key)
        .map_err(|_| ArtifactError::Signature("invalid verifying key".into()))
}

/// Loads and cross-checks the artifacts of one model directory.
#[derive(Debug, Clone, Default)]
pub struct ArtifactLoader {
    allow_unsigned: bool,
    pubkey_file: Option<PathBuf>,
}

impl ArtifactLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            allow_unsigned: config.allow_unsigned_models,
            pubkey_file: config.model_pubkey_file.clone(),
        }
    }

    #[must_use]
    pub fn allow_unsigned(mut self, allow: bool) -> Self {
        self.allow_unsigned = allow;
        self
    }

    #[must_use]
    pub fn pubkey_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.pubkey_file = Some(path.into());
        self
    }

    /// Load schema, scaler and classifier from `dir`.
    ///
    /// # Errors
    /// Returns an `ArtifactError` if a file is missing or malformed, the
    /// signature policy is not met, or the artifacts disagree on dimension.
    pub fn load(&self, dir: &Path) -> Result<ModelArtifacts, ArtifactError> {
        if !dir.is_dir() {
            return Err(ArtifactError::MissingDirectory(dir.to_path_buf()));
        }

        let files = BoundFiles::read(dir)?;
        self.load_from(dir, &files)
    }

    fn load_from(&self, dir: &Path, files: &BoundFiles) -> Result<ModelArtifacts, ArtifactError> {
        let verified = self.verify_signature(dir, files)?;

        let schema: ExpectedSchema = parse_json(SCHEMA_FILE, files.get(SCHEMA_FILE))?;
        if schema.is_empty() {
            return Err(ArtifactError::InvalidSchema("no columns".into()));
        }
        if let Some(dup) = schema.first_duplicate() {
            return Err(ArtifactError::InvalidSchema(format!(
                "duplicate column {dup:?}"
            )));
        }

        let exported: ExportedScaler = parse_json(SCALER_FILE, files.get(SCALER_FILE))?;
        let scaler = StandardScaler::try_from(exported).map_err(|source| {
            ArtifactError::InvalidModel {
                file: SCALER_FILE,
                source,
            }
        })?;
        if scaler.dimension() != schema.len() {
            return Err(ArtifactError::DimensionMismatch {
                artifact: SCALER_FILE,
                got: scaler.dimension(),
                expected: schema.len(),
            });
        }

        let exported: ExportedModel = parse_json(MODEL_FILE, files.get(MODEL_FILE))?;
        let classifier = exported
            .into_classifier()
            .map_err(|source| ArtifactError::InvalidModel {
                file: MODEL_FILE,
                source,
            })?;
        if classifier.dimension() != schema.len() {
            return Err(ArtifactError::DimensionMismatch {
                artifact: MODEL_FILE,
                got: classifier.dimension(),
                expected: schema.len(),
            });
        }

        tracing::info!(
            "Loaded model artifacts from {:?} (kind={}, n_features={}, signed={})",
            dir,
            classifier.kind(),
            schema.len(),
            verified
        );

        Ok(ModelArtifacts {
            schema,
            scaler,
            classifier,
            verified,
        })
    }

    fn verifying_key(&self, dir: &Path) -> Result<VerifyingKey, ArtifactError> {
        let path = self
            .pubkey_file
            .clone()
            .unwrap_or_else(|| dir.join(PUBKEY_FILE));
        let b64 = fs::read_to_string(&path).map_err(|source| ArtifactError::Read {
            path: path.clone(),
            source,
        })?;
        verifying_key_from_b64(&b64)
    }

    /// Returns `Ok(true)` if a manifest was verified, `Ok(false)` if the
    /// directory is unsigned and unsigned models are allowed.
    fn verify_signature(&self, dir: &Path, files: &BoundFiles) -> Result<bool, ArtifactError> {
        let sig_path = dir.join(SIGNATURE_FILE);
        let manifest_path = dir.join(MANIFEST_FILE);

        if !sig_path.exists() || !manifest_path.exists() {
            if self.allow_unsigned {
                tracing::warn!(
                    "Loading UNSIGNED model from {:?} (CARDIORISK_ALLOW_UNSIGNED_MODELS=true)",
                    dir
                );
                return Ok(false);
            }
            tracing::error!("Model signature not found at {:?}", sig_path);
            return Err(ArtifactError::Unsigned(format!(
                "{MANIFEST_FILE} and {SIGNATURE_FILE} missing in {dir:?}; \
                 set CARDIORISK_ALLOW_UNSIGNED_MODELS=true to bypass"
            )));
        }

        let sig_bytes = read_file(&sig_path)?;
        let sig_bytes: [u8; 64] = sig_bytes
            .as_slice()
            .try_into()
            .map_err(|_| ArtifactError::Signature("signature must be 64 bytes".into()))?;
        let signature = Signature::from_bytes(&sig_bytes);

        let manifest_content = read_file(&manifest_path)?;
        self.verifying_key(dir)?
            .verify(&manifest_content, &signature)
            .map_err(|_| ArtifactError::Signature("invalid model signature".into()))?;

        let manifest: SignedManifest = parse_json(MANIFEST_FILE, &manifest_content)?;
        if manifest.version != MANIFEST_VERSION {
            return Err(ArtifactError::Signature(format!(
                "unsupported manifest version {}",
                manifest.version
            )));
        }
        if manifest.created_at > unix_now() + MAX_CLOCK_SKEW_SECS {
            return Err(ArtifactError::Signature(
                "manifest created_at is in the future".into(),
            ));
        }

        for name in BOUND_FILES {
            let expected = manifest.files.get(name).ok_or_else(|| {
                ArtifactError::Signature(format!("{MANIFEST_FILE} does not bind {name}"))
            })?;
            let actual = sha256_hex(files.get(name));
            if !constant_time_eq_str(&actual, expected) {
                return Err(ArtifactError::HashMismatch(name.to_string()));
            }
        }

        tracing::info!("Model signature and hashes verified successfully");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};
    use rand::RngCore;
    use serde_json::json;
    use tempfile::tempdir;

    fn write_artifacts(dir: &Path, columns: &[&str], model: serde_json::Value) {
        let n = columns.len();
        fs::write(dir.join(SCHEMA_FILE), json!(columns).to_string()).expect("write schema");
        fs::write(
            dir.join(SCALER_FILE),
            json!({"mean": vec![0.0; n], "scale": vec![1.0; n]}).to_string(),
        )
        .expect("write scaler");
        fs::write(dir.join(MODEL_FILE), model.to_string()).expect("write model");
    }

    fn logistic(n: usize) -> serde_json::Value {
        json!({"kind": "logistic_regression", "coefficients": vec![0.5; n], "intercept": 0.0})
    }

    fn signing_key() -> SigningKey {
        let mut seed = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut seed);
        SigningKey::from_bytes(&seed)
    }

    fn sign_directory(dir: &Path, key: &SigningKey) {
        let manifest = SignedManifest::for_directory(dir, unix_now()).expect("manifest");
        let bytes = serde_json::to_vec_pretty(&manifest).expect("serialize");
        fs::write(dir.join(MANIFEST_FILE), &bytes).expect("write manifest");
        let signature: Signature = key.sign(&bytes);
        fs::write(dir.join(SIGNATURE_FILE), signature.to_bytes()).expect("write sig");
        let pub_b64 =
            base64::engine::general_purpose::STANDARD.encode(key.verifying_key().to_bytes());
        fs::write(dir.join(PUBKEY_FILE), pub_b64).expect("write pubkey");
    }

    #[test]
    fn test_unsigned_model_refused_by_default() {
        let temp = tempdir().expect("tempdir");
        write_artifacts(temp.path(), &["Age", "Sex_M"], logistic(2));

        let err = ArtifactLoader::new().load(temp.path()).expect_err("must refuse");
        assert!(matches!(err, ArtifactError::Unsigned(_)));
    }

    #[test]
    fn test_unsigned_model_loads_when_allowed() {
        let temp = tempdir().expect("tempdir");
        write_artifacts(temp.path(), &["Age", "Sex_M"], logistic(2));

        let artifacts = ArtifactLoader::new()
            .allow_unsigned(true)
            .load(temp.path())
            .expect("load");
        assert_eq!(artifacts.schema.columns(), &["Age", "Sex_M"]);
        assert_eq!(artifacts.classifier.kind(), "logistic_regression");
        assert!(!artifacts.verified);
    }

    #[test]
    fn test_signed_model_verifies() {
        let temp = tempdir().expect("tempdir");
        write_artifacts(temp.path(), &["Age", "Sex_M", "Sex_F"], logistic(3));
        sign_directory(temp.path(), &signing_key());

        let artifacts = ArtifactLoader::new().load(temp.path()).expect("load signed");
        assert!(artifacts.verified);
    }

    #[test]
    fn test_signature_is_checked_even_when_unsigned_allowed() {
        let temp = tempdir().expect("tempdir");
        write_artifacts(temp.path(), &["Age"], logistic(1));
        sign_directory(temp.path(), &signing_key());

        // Swap in a different verifying key.
        let other = signing_key();
        let other_b64 =
            base64::engine::general_purpose::STANDARD.encode(other.verifying_key().to_bytes());
        fs::write(temp.path().join(PUBKEY_FILE), other_b64).expect("write pubkey");

        let err = ArtifactLoader::new()
            .allow_unsigned(true)
            .load(temp.path())
            .expect_err("wrong key");
        assert!(matches!(err, ArtifactError::Signature(_)));
    }

    #[test]
    fn test_tampered_file_detected() {
        let temp = tempdir().expect("tempdir");
        write_artifacts(temp.path(), &["Age", "Sex_M"], logistic(2));
        sign_directory(temp.path(), &signing_key());

        fs::write(temp.path().join(SCHEMA_FILE), r#"["Sex_M","Age"]"#).expect("tamper");

        let err = ArtifactLoader::new().load(temp.path()).expect_err("tampered");
        assert!(matches!(err, ArtifactError::HashMismatch(ref f) if f == SCHEMA_FILE));
    }

    #[test]
    fn test_parsed_artifacts_are_the_hashed_bytes() {
        let temp = tempdir().expect("tempdir");
        write_artifacts(temp.path(), &["Age", "Sex_M"], logistic(2));
        sign_directory(temp.path(), &signing_key());

        let files = BoundFiles::read(temp.path()).expect("read bound files");
        // Replace the schema on disk after it has been read.
        fs::write(temp.path().join(SCHEMA_FILE), r#"["Sex_M","Age"]"#).expect("replace");

        let artifacts = ArtifactLoader::new()
            .load_from(temp.path(), &files)
            .expect("verified bytes load");
        assert!(artifacts.verified);
        assert_eq!(artifacts.schema.columns(), &["Age", "Sex_M"]);
    }

    #[test]
    fn test_hash_checked_against_bytes_in_memory() {
        let temp = tempdir().expect("tempdir");
        write_artifacts(temp.path(), &["Age", "Sex_M"], logistic(2));
        sign_directory(temp.path(), &signing_key());

        let mut files = BoundFiles::read(temp.path()).expect("read bound files");
        files
            .0
            .insert(MODEL_FILE, logistic(2).to_string().replace("0.5", "0.9").into_bytes());

        let err = ArtifactLoader::new()
            .load_from(temp.path(), &files)
            .expect_err("in-memory tamper");
        assert!(matches!(err, ArtifactError::HashMismatch(ref f) if f == MODEL_FILE));
    }

    #[test]
    fn test_explicit_pubkey_file_is_used() {
        let temp = tempdir().expect("tempdir");
        write_artifacts(temp.path(), &["Age"], logistic(1));
        let key = signing_key();
        sign_directory(temp.path(), &key);

        let key_dir = tempdir().expect("tempdir");
        let key_path = key_dir.path().join("dev.pub");
        fs::copy(temp.path().join(PUBKEY_FILE), &key_path).expect("copy pubkey");
        fs::remove_file(temp.path().join(PUBKEY_FILE)).expect("remove pubkey");

        assert!(ArtifactLoader::new().load(temp.path()).is_err());
        let artifacts = ArtifactLoader::new()
            .pubkey_file(&key_path)
            .load(temp.path())
            .expect("load with explicit key");
        assert!(artifacts.verified);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let temp = tempdir().expect("tempdir");
        write_artifacts(temp.path(), &["Age", "Sex_M"], logistic(3));

        let err = ArtifactLoader::new()
            .allow_unsigned(true)
            .load(temp.path())
            .expect_err("mismatch");
        assert!(matches!(
            err,
            ArtifactError::DimensionMismatch {
                artifact: MODEL_FILE,
                got: 3,
                expected: 2
            }
        ));
    }

    #[test]
    fn test_duplicate_and_empty_schema_rejected() {
        let temp = tempdir().expect("tempdir");
        write_artifacts(temp.path(), &["Age", "Age"], logistic(2));
        let loader = ArtifactLoader::new().allow_unsigned(true);
        assert!(matches!(
            loader.load(temp.path()),
            Err(ArtifactError::InvalidSchema(_))
        ));

        write_artifacts(temp.path(), &[], logistic(1));
        assert!(matches!(
            loader.load(temp.path()),
            Err(ArtifactError::InvalidSchema(_))
        ));
    }

    #[test]
    fn test_invalid_model_parameters_rejected() {
        let temp = tempdir().expect("tempdir");
        write_artifacts(
            temp.path(),
            &["Age"],
            json!({"kind": "k_neighbors", "n_neighbors": 5, "samples": [[0.0]], "labels": [0]}),
        );
        let err = ArtifactLoader::new()
            .allow_unsigned(true)
            .load(temp.path())
            .expect_err("k too large");
        assert!(matches!(err, ArtifactError::InvalidModel { file: MODEL_FILE, .. }));
    }

    #[test]
    fn test_missing_directory() {
        let err = ArtifactLoader::new()
            .load(Path::new("/nonexistent/cardiorisk/models"))
            .expect_err("missing");
        assert!(matches!(err, ArtifactError::MissingDirectory(_)));
    }

    #[test]
    fn test_bundled_models_load() {
        let artifacts = ArtifactLoader::new()
            .allow_unsigned(true)
            .load(Path::new("models"))
            .expect("bundled models should load");
        assert_eq!(artifacts.schema.len(), 20);
        assert_eq!(artifacts.classifier.kind(), "k_neighbors");
    }
}
