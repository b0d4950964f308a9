//! Model artifact loading with optional integrity verification.
//!
//! The artifact is loaded exactly once at startup. When a `manifest.json`
//! sits next to it, the artifact's SHA-256 must match the manifest entry.
//! When a `model.sig` is present (or signatures are required by
//! configuration), the manifest itself must carry a valid Ed25519 signature
//! from the configured public key.
//!
//! # Layout
//!
//! ```text
//! models/
//!   decision_tree.json   # the fitted model
//!   manifest.json        # {"version":1,"created_at":...,"files":{"decision_tree.json":"<sha256>"}}
//!   model.sig            # 64-byte Ed25519 signature over manifest.json
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::tree::DecisionTree;
use crate::ports::{Classifier, ModelError};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const SIGNATURE_FILE: &str = "model.sig";
pub const MANIFEST_VERSION: u32 = 1;

/// Errors raised while loading or signing an artifact.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Integrity check failed: {0}")]
    Integrity(String),

    #[error("Signature verification failed: {0}")]
    Signature(String),

    #[error("Invalid key material: {0}")]
    Key(String),
}

/// Hashes of the files bound to a signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelManifest {
    pub version: u32,
    /// Unix timestamp (seconds)
    pub created_at: i64,
    /// File name → lowercase hex SHA-256
    pub files: BTreeMap<String, String>,
}

/// How strictly artifacts are checked on load.
#[derive(Debug, Clone, Default)]
pub struct VerificationPolicy {
    /// Refuse artifacts without a valid signature.
    pub require_signature: bool,
    /// Base64 Ed25519 public key used to check `model.sig`.
    pub public_key_b64: Option<String>,
}

/// What was actually verified for a loaded artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Unverified,
    Hashed,
    Signed,
}

/// Loads and verifies decision-tree artifacts.
#[derive(Debug, Clone, Default)]
pub struct ArtifactLoader {
    policy: VerificationPolicy,
}

impl ArtifactLoader {
    #[must_use]
    pub fn new(policy: VerificationPolicy) -> Self {
        Self { policy }
    }

    /// Load, verify and validate the model at `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, fails integrity or
    /// signature checks, or is not a well-formed tree.
    pub fn load(&self, path: &Path) -> Result<DecisionTree, ArtifactError> {
        let bytes = read(path)?;
        let verification = self.verify(path, &bytes)?;
        let tree = DecisionTree::from_json_slice(&bytes)?;

        tracing::info!(
            "Loaded model from {:?} (nodes={}, depth={}, n_features={}, classes={:?}, verification={:?})",
            path,
            tree.node_count(),
            tree.depth(),
            tree.n_features(),
            tree.classes(),
            verification
        );
        Ok(tree)
    }

    fn verify(&self, path: &Path, bytes: &[u8]) -> Result<Verification, ArtifactError> {
        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
        let manifest_path = base_dir.join(MANIFEST_FILE);
        let sig_path = base_dir.join(SIGNATURE_FILE);

        // Each file is read exactly once; the checked buffer is the parsed one.
        let manifest_bytes = if manifest_path.exists() {
            Some(read(&manifest_path)?)
        } else {
            None
        };
        let sig_bytes = if sig_path.exists() {
            Some(read(&sig_path)?)
        } else {
            None
        };

        self.check(
            &file_name(path)?,
            bytes,
            manifest_bytes.as_deref(),
            sig_bytes.as_deref(),
        )
    }

    /// Verify already-read artifact, manifest and signature buffers.
    fn check(
        &self,
        name: &str,
        model_bytes: &[u8],
        manifest_bytes: Option<&[u8]>,
        sig_bytes: Option<&[u8]>,
    ) -> Result<Verification, ArtifactError> {
        let mut verification = Verification::Unverified;

        if sig_bytes.is_some() || self.policy.require_signature {
            let (Some(manifest_bytes), Some(sig_bytes)) = (manifest_bytes, sig_bytes) else {
                return Err(ArtifactError::Signature(format!(
                    "signed model required but {MANIFEST_FILE} or {SIGNATURE_FILE} is missing next to {name}"
                )));
            };
            let key_b64 = self.policy.public_key_b64.as_deref().ok_or_else(|| {
                ArtifactError::Key("no model signing public key configured".into())
            })?;
            let key = verifying_key_from_b64(key_b64)?;

            let sig_array: [u8; 64] = sig_bytes.try_into().map_err(|_| {
                ArtifactError::Signature("invalid signature length (expected 64 bytes)".into())
            })?;
            let signature = Signature::from_bytes(&sig_array);

            key.verify(manifest_bytes, &signature)
                .map_err(|_| ArtifactError::Signature("manifest signature does not match".into()))?;
            verification = Verification::Signed;
        }

        let Some(manifest_bytes) = manifest_bytes else {
            tracing::warn!("No {MANIFEST_FILE} next to {name}; artifact integrity not verified");
            return Ok(verification);
        };

        let manifest: ModelManifest = serde_json::from_slice(manifest_bytes)
            .map_err(|e| ArtifactError::Integrity(format!("invalid {MANIFEST_FILE}: {e}")))?;
        if manifest.version != MANIFEST_VERSION {
            return Err(ArtifactError::Integrity(format!(
                "unsupported manifest version {}",
                manifest.version
            )));
        }

        let expected = manifest.files.get(name).ok_or_else(|| {
            ArtifactError::Integrity(format!("{MANIFEST_FILE} does not list {name}"))
        })?;
        if !constant_time_eq_str(&sha256_hex(model_bytes), &expected.to_ascii_lowercase()) {
            return Err(ArtifactError::Integrity(format!("hash mismatch for {name}")));
        }
        if verification == Verification::Unverified {
            verification = Verification::Hashed;
        }

        Ok(verification)
    }
}

/// 32-byte Ed25519 seed, wiped on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SigningSeed([u8; 32]);

impl SigningSeed {
    /// Fresh seed from OS entropy.
    #[must_use]
    pub fn generate() -> Self {
        use rand::RngCore;
        use rand::SeedableRng;

        let mut rng = rand_chacha::ChaCha20Rng::from_entropy();
        let mut seed = [0u8; 32];
        rng.fill_bytes(&mut seed);
        Self(seed)
    }

    /// # Errors
    /// Returns `ArtifactError::Key` unless the input decodes to exactly 32 bytes.
    pub fn from_b64(b64: &str) -> Result<Self, ArtifactError> {
        let raw = Zeroizing::new(
            base64::engine::general_purpose::STANDARD
                .decode(b64.trim())
                .map_err(|e| ArtifactError::Key(format!("invalid base64 seed: {e}")))?,
        );
        if raw.len() != 32 {
            return Err(ArtifactError::Key(format!(
                "seed must be 32 bytes after base64 decode (got {})",
                raw.len()
            )));
        }
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&raw);
        Ok(Self(seed))
    }

    #[must_use]
    pub fn to_b64(&self) -> Zeroizing<String> {
        Zeroizing::new(base64::engine::general_purpose::STANDARD.encode(self.0))
    }

    #[must_use]
    pub fn signing_key(&self) -> SigningKey {
        SigningKey::from_bytes(&self.0)
    }

    #[must_use]
    pub fn public_key_b64(&self) -> String {
        base64::engine::general_purpose::STANDARD
            .encode(self.signing_key().verifying_key().to_bytes())
    }
}

/// Write `manifest.json` and `model.sig` next to the model at `model_path`.
///
/// # Errors
/// Returns an error if the model cannot be read or the outputs cannot be written.
pub fn sign_artifact(model_path: &Path, seed: &SigningSeed) -> Result<ModelManifest, ArtifactError> {
    let base_dir = model_path.parent().unwrap_or_else(|| Path::new(""));
    let name = file_name(model_path)?;
    let bytes = read(model_path)?;

    let mut files = BTreeMap::new();
    files.insert(name, sha256_hex(&bytes));
    let manifest = ModelManifest {
        version: MANIFEST_VERSION,
        created_at: chrono::Utc::now().timestamp(),
        files,
    };

    let manifest_bytes = serde_json::to_vec_pretty(&manifest)
        .map_err(|e| ArtifactError::Integrity(format!("failed to serialize manifest: {e}")))?;
    let manifest_path = base_dir.join(MANIFEST_FILE);
    write(&manifest_path, &manifest_bytes)?;

    let signature: Signature = seed.signing_key().sign(&manifest_bytes);
    write(&base_dir.join(SIGNATURE_FILE), &signature.to_bytes())?;

    tracing::info!("Signed {:?} ({} file bound)", manifest_path, manifest.files.len());
    Ok(manifest)
}

/// # Errors
/// Returns `ArtifactError::Key` unless the input is a valid base64 Ed25519 public key.
pub fn verifying_key_from_b64(b64: &str) -> Result<VerifyingKey, ArtifactError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(b64.trim())
        .map_err(|_| ArtifactError::Key("invalid public key base64".into()))?;
    let key: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| ArtifactError::Key("invalid public key length (expected 32 bytes)".into()))?;
    VerifyingKey::from_bytes(&key).map_err(|_| ArtifactError::Key("invalid verifying key".into()))
}

#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes).iter().map(|b| format!("{b:02x}")).collect()
}

// Constant-time compare for ASCII strings (used for SHA-256 hex digests).
fn constant_time_eq_str(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes().iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

fn file_name(path: &Path) -> Result<String, ArtifactError> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| ArtifactError::Integrity(format!("{path:?} has no file name")))
}

fn read(path: &Path) -> Result<Vec<u8>, ArtifactError> {
    fs::read(path).map_err(|source| ArtifactError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn write(path: &Path, bytes: &[u8]) -> Result<(), ArtifactError> {
    fs::write(path, bytes).map_err(|source| ArtifactError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::tree::tests::stump_export;
    use tempfile::tempdir;

    fn write_model(dir: &Path) -> PathBuf {
        let path = dir.join("decision_tree.json");
        let json = serde_json::to_vec(&stump_export()).expect("serialize model");
        fs::write(&path, json).expect("write model");
        path
    }

    #[test]
    fn test_load_unverified_model() {
        let temp = tempdir().expect("tempdir");
        let path = write_model(temp.path());

        let tree = ArtifactLoader::default().load(&path).expect("load model");
        assert_eq!(tree.classes(), &[0, 1]);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let temp = tempdir().expect("tempdir");
        let err = ArtifactLoader::default()
            .load(&temp.path().join("absent.json"))
            .unwrap_err();
        assert!(matches!(err, ArtifactError::Read { .. }));
    }

    #[test]
    fn test_corrupt_model_is_model_error() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("decision_tree.json");
        fs::write(&path, b"{\"format_version\": 1").expect("write");

        let err = ArtifactLoader::default().load(&path).unwrap_err();
        assert!(matches!(err, ArtifactError::Model(ModelError::Malformed(_))));
    }

    #[test]
    fn test_manifest_hash_mismatch_rejected() {
        let temp = tempdir().expect("tempdir");
        let path = write_model(temp.path());

        let mut files = BTreeMap::new();
        files.insert("decision_tree.json".to_string(), sha256_hex(b"something else"));
        let manifest = ModelManifest {
            version: 1,
            created_at: 0,
            files,
        };
        fs::write(
            temp.path().join(MANIFEST_FILE),
            serde_json::to_vec(&manifest).expect("serialize"),
        )
        .expect("write manifest");

        let err = ArtifactLoader::default().load(&path).unwrap_err();
        assert!(matches!(err, ArtifactError::Integrity(_)));
    }

    #[test]
    fn test_signed_model_roundtrip() {
        let temp = tempdir().expect("tempdir");
        let path = write_model(temp.path());
        let seed = SigningSeed::generate();
        sign_artifact(&path, &seed).expect("sign");

        let loader = ArtifactLoader::new(VerificationPolicy {
            require_signature: true,
            public_key_b64: Some(seed.public_key_b64()),
        });
        let verification = loader
            .verify(&path, &fs::read(&path).expect("read"))
            .expect("verify");
        assert_eq!(verification, Verification::Signed);
        loader.load(&path).expect("load signed model");
    }

    #[test]
    fn test_signature_from_other_key_rejected() {
        let temp = tempdir().expect("tempdir");
        let path = write_model(temp.path());
        sign_artifact(&path, &SigningSeed::generate()).expect("sign");

        let loader = ArtifactLoader::new(VerificationPolicy {
            require_signature: false,
            public_key_b64: Some(SigningSeed::generate().public_key_b64()),
        });
        let err = loader.load(&path).unwrap_err();
        assert!(matches!(err, ArtifactError::Signature(_)));
    }

    #[test]
    fn test_tampered_model_after_signing_rejected() {
        let temp = tempdir().expect("tempdir");
        let path = write_model(temp.path());
        let seed = SigningSeed::generate();
        sign_artifact(&path, &seed).expect("sign");

        let mut export = stump_export();
        export.tree.threshold[0] = 0.9;
        fs::write(&path, serde_json::to_vec(&export).expect("serialize")).expect("rewrite");

        let loader = ArtifactLoader::new(VerificationPolicy {
            require_signature: true,
            public_key_b64: Some(seed.public_key_b64()),
        });
        assert!(matches!(
            loader.load(&path).unwrap_err(),
            ArtifactError::Integrity(_)
        ));
    }

    #[test]
    fn test_required_signature_missing() {
        let temp = tempdir().expect("tempdir");
        let path = write_model(temp.path());

        let loader = ArtifactLoader::new(VerificationPolicy {
            require_signature: true,
            public_key_b64: Some(SigningSeed::generate().public_key_b64()),
        });
        assert!(matches!(
            loader.load(&path).unwrap_err(),
            ArtifactError::Signature(_)
        ));
    }

    fn manifest_for(name: &str, model_bytes: &[u8]) -> Vec<u8> {
        let mut files = BTreeMap::new();
        files.insert(name.to_string(), sha256_hex(model_bytes));
        serde_json::to_vec(&ModelManifest {
            version: MANIFEST_VERSION,
            created_at: 0,
            files,
        })
        .expect("serialize manifest")
    }

    #[test]
    fn test_hash_is_checked_against_signed_manifest_bytes() {
        let seed = SigningSeed::generate();
        let loader = ArtifactLoader::new(VerificationPolicy {
            require_signature: true,
            public_key_b64: Some(seed.public_key_b64()),
        });

        let genuine = serde_json::to_vec(&stump_export()).expect("serialize");
        let mut other = stump_export();
        other.tree.threshold[0] = 0.9;
        let other = serde_json::to_vec(&other).expect("serialize");

        let signed = manifest_for("decision_tree.json", &genuine);
        let signature = seed.signing_key().sign(&signed).to_bytes();
        let swapped = manifest_for("decision_tree.json", &other);

        assert_eq!(
            loader
                .check("decision_tree.json", &genuine, Some(signed.as_slice()), Some(signature.as_slice()))
                .expect("genuine model verifies"),
            Verification::Signed
        );
        // Signed buffer binds the genuine model, so the other one fails the hash.
        assert!(matches!(
            loader.check("decision_tree.json", &other, Some(signed.as_slice()), Some(signature.as_slice())),
            Err(ArtifactError::Integrity(_))
        ));
        // A manifest binding the other model was never signed.
        assert!(matches!(
            loader.check("decision_tree.json", &other, Some(swapped.as_slice()), Some(signature.as_slice())),
            Err(ArtifactError::Signature(_))
        ));
    }

    #[test]
    fn test_seed_b64_roundtrip() {
        let seed = SigningSeed::generate();
        let restored = SigningSeed::from_b64(&seed.to_b64()).expect("decode");
        assert_eq!(seed.public_key_b64(), restored.public_key_b64());

        assert!(matches!(
            SigningSeed::from_b64("c2hvcnQ="),
            Err(ArtifactError::Key(_))
        ));
    }
}
