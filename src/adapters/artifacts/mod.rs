//! Artifact adapter: loads disease profiles from exported files.
//!
//! Each disease has its own directory holding `schema.json`, `scaler.json`,
//! `model.json` and `background.json`, optionally bound by a `manifest.json`
//! of SHA-256 digests and an Ed25519 `model.sig` over the manifest bytes.
//!
//! # Security
//!
//! - Every file is read exactly once; the bytes that are hashed are the
//!   bytes that are parsed.
//! - A manifest must bind all four artifact files.
//! - With `require_manifest` set, unsigned profiles are refused.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::EngineConfig;
use crate::domain::{
    AttributionStrategy, BackgroundStats, Classifier, DiseaseId, DiseaseProfile, FeatureSchema,
    ModelLoadError, ModelMetadata, RiskBands, StandardScaler,
};
use crate::ports::ArtifactStore;

pub const SCHEMA_FILE: &str = "schema.json";
pub const SCALER_FILE: &str = "scaler.json";
pub const MODEL_FILE: &str = "model.json";
pub const BACKGROUND_FILE: &str = "background.json";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const SIGNATURE_FILE: &str = "model.sig";

/// Files that make up a profile, in the order they are read.
pub const ARTIFACT_FILES: [&str; 4] = [SCHEMA_FILE, SCALER_FILE, MODEL_FILE, BACKGROUND_FILE];

const MANIFEST_VERSION: u32 = 1;
const MODEL_FORMAT_VERSION: u32 = 1;

/// Profiles laid out as `<root>/<disease id>/<file>`.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn profile_dir(&self, disease: DiseaseId) -> PathBuf {
        self.root.join(disease.as_str())
    }
}

impl ArtifactStore for DirectoryStore {
    fn read(&self, disease: DiseaseId, file: &str) -> std::io::Result<Vec<u8>> {
        std::fs::read(self.profile_dir(disease).join(file))
    }

    fn contains(&self, disease: DiseaseId, file: &str) -> bool {
        self.profile_dir(disease).join(file).is_file()
    }

    fn location(&self, disease: DiseaseId) -> String {
        self.profile_dir(disease).display().to_string()
    }
}

/// In-memory artifact bundle.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    files: HashMap<(DiseaseId, String), Vec<u8>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, disease: DiseaseId, file: &str, bytes: impl Into<Vec<u8>>) {
        self.files.insert((disease, file.to_string()), bytes.into());
    }

    pub fn remove(&mut self, disease: DiseaseId, file: &str) -> Option<Vec<u8>> {
        self.files.remove(&(disease, file.to_string()))
    }
}

impl ArtifactStore for MemoryStore {
    fn read(&self, disease: DiseaseId, file: &str) -> std::io::Result<Vec<u8>> {
        self.files
            .get(&(disease, file.to_string()))
            .cloned()
            .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::NotFound))
    }

    fn contains(&self, disease: DiseaseId, file: &str) -> bool {
        self.files.contains_key(&(disease, file.to_string()))
    }

    fn location(&self, disease: DiseaseId) -> String {
        format!("memory:{disease}")
    }
}

/// Signed list of artifact digests for one profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileManifest {
    pub version: u32,
    pub disease: DiseaseId,
    pub created_at: DateTime<Utc>,
    /// File name to lowercase SHA-256 hex.
    pub files: BTreeMap<String, String>,
}

impl ProfileManifest {
    /// Build a manifest over the given file contents.
    #[must_use]
    pub fn build(disease: DiseaseId, files: &[(&str, &[u8])]) -> Self {
        Self {
            version: MANIFEST_VERSION,
            disease,
            created_at: Utc::now(),
            files: files
                .iter()
                .map(|(name, bytes)| ((*name).to_string(), sha256_hex(bytes)))
                .collect(),
        }
    }
}

/// How much provenance a profile must prove before it is served.
#[derive(Debug, Clone, Default)]
pub struct IntegrityPolicy {
    /// Refuse profiles without a manifest and a valid signature.
    pub require_manifest: bool,
    pub verifying_key: Option<VerifyingKey>,
}

impl From<&EngineConfig> for IntegrityPolicy {
    fn from(config: &EngineConfig) -> Self {
        Self {
            require_manifest: config.require_signed,
            verifying_key: config.verifying_key,
        }
    }
}

#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

// Constant-time compare for ASCII strings (SHA-256 hex digests).
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

#[derive(Debug, Deserialize)]
struct SchemaArtifact {
    disease: DiseaseId,
    features: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ModelArtifact {
    format_version: u32,
    algorithm: String,
    #[serde(default)]
    f1_score: Option<f64>,
    #[serde(default)]
    trained_at: Option<DateTime<Utc>>,
    attribution: AttributionStrategy,
    classifier: Classifier,
    #[serde(default)]
    risk_bands: Option<RiskBands>,
}

/// Load, verify and assemble one disease profile.
///
/// # Errors
/// Returns a `ModelLoadError` describing the first problem found.
pub fn load_profile(
    store: &dyn ArtifactStore,
    disease: DiseaseId,
    policy: &IntegrityPolicy,
) -> Result<DiseaseProfile, ModelLoadError> {
    let mut contents = BTreeMap::new();
    for file in ARTIFACT_FILES {
        contents.insert(file, read_artifact(store, disease, file)?);
    }

    verify_integrity(store, disease, policy, &contents)?;

    let schema_artifact: SchemaArtifact = parse(disease, SCHEMA_FILE, &contents[SCHEMA_FILE])?;
    if schema_artifact.disease != disease {
        return Err(ModelLoadError::Inconsistent {
            disease,
            reason: format!("{SCHEMA_FILE} describes {}", schema_artifact.disease),
        });
    }
    let schema = FeatureSchema::from_export(disease, &schema_artifact.features)
        .map_err(|reason| ModelLoadError::Inconsistent { disease, reason })?;

    let scaler: StandardScaler = parse(disease, SCALER_FILE, &contents[SCALER_FILE])?;
    let background: BackgroundStats = parse(disease, BACKGROUND_FILE, &contents[BACKGROUND_FILE])?;
    let model: ModelArtifact = parse(disease, MODEL_FILE, &contents[MODEL_FILE])?;
    if model.format_version != MODEL_FORMAT_VERSION {
        return Err(ModelLoadError::Corrupt {
            disease,
            file: MODEL_FILE.into(),
            reason: format!("unsupported format_version {}", model.format_version),
        });
    }

    let metadata = ModelMetadata {
        algorithm: model.algorithm,
        f1_score: model.f1_score,
        trained_at: model.trained_at,
    };
    let profile = DiseaseProfile::new(
        schema,
        scaler,
        model.classifier,
        &model.attribution,
        &background,
        model.risk_bands.unwrap_or_default(),
        metadata,
    )?;

    tracing::info!(
        disease = %disease,
        location = %store.location(disease),
        algorithm = %profile.metadata().algorithm,
        classifier = profile.classifier().family(),
        attribution = profile.attributor().method(),
        features = profile.schema().len(),
        "Loaded disease profile"
    );
    Ok(profile)
}

fn read_artifact(
    store: &dyn ArtifactStore,
    disease: DiseaseId,
    file: &str,
) -> Result<Vec<u8>, ModelLoadError> {
    store.read(disease, file).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ModelLoadError::Missing {
                disease,
                file: file.into(),
            }
        } else {
            ModelLoadError::Corrupt {
                disease,
                file: file.into(),
                reason: e.to_string(),
            }
        }
    })
}

fn parse<T: DeserializeOwned>(
    disease: DiseaseId,
    file: &str,
    bytes: &[u8],
) -> Result<T, ModelLoadError> {
    serde_json::from_slice(bytes).map_err(|e| ModelLoadError::Corrupt {
        disease,
        file: file.into(),
        reason: e.to_string(),
    })
}

/// Check the manifest and signature against already-read artifact bytes.
fn verify_integrity(
    store: &dyn ArtifactStore,
    disease: DiseaseId,
    policy: &IntegrityPolicy,
    contents: &BTreeMap<&str, Vec<u8>>,
) -> Result<Option<ProfileManifest>, ModelLoadError> {
    let integrity = |reason: String| ModelLoadError::Integrity { disease, reason };

    if !store.contains(disease, MANIFEST_FILE) {
        if policy.require_manifest {
            return Err(integrity(format!("{MANIFEST_FILE} is required")));
        }
        tracing::warn!(disease = %disease, "Loading UNSIGNED profile (no manifest)");
        return Ok(None);
    }

    let manifest_bytes = read_artifact(store, disease, MANIFEST_FILE)?;

    match (store.contains(disease, SIGNATURE_FILE), policy.verifying_key.as_ref()) {
        (true, Some(key)) => {
            let sig_bytes = read_artifact(store, disease, SIGNATURE_FILE)?;
            let sig: [u8; 64] = sig_bytes
                .as_slice()
                .try_into()
                .map_err(|_| integrity("invalid signature length (expected 64 bytes)".into()))?;
            key.verify(&manifest_bytes, &Signature::from_bytes(&sig))
                .map_err(|_| integrity("invalid manifest signature".into()))?;
        }
        (true, None) if policy.require_manifest => {
            return Err(integrity("no verifying key configured".into()));
        }
        (false, _) if policy.require_manifest => {
            return Err(integrity(format!("{SIGNATURE_FILE} is required")));
        }
        _ => {
            tracing::warn!(disease = %disease, "Manifest signature not checked");
        }
    }

    let manifest: ProfileManifest = serde_json::from_slice(&manifest_bytes)
        .map_err(|e| integrity(format!("invalid {MANIFEST_FILE}: {e}")))?;
    if manifest.version != MANIFEST_VERSION {
        return Err(integrity(format!(
            "unsupported manifest version {}",
            manifest.version
        )));
    }
    if manifest.disease != disease {
        return Err(integrity(format!("manifest describes {}", manifest.disease)));
    }

    for (file, bytes) in contents {
        let expected = manifest
            .files
            .get(*file)
            .ok_or_else(|| integrity(format!("manifest does not bind {file}")))?;
        if !constant_time_eq_str(&sha256_hex(bytes), expected) {
            return Err(integrity(format!("hash mismatch for {file}")));
        }
    }

    tracing::info!(disease = %disease, "Profile manifest verified");
    Ok(Some(manifest))
}

/// Read every file a manifest should bind, for signing tools.
///
/// # Errors
/// Returns the first I/O error.
pub fn read_profile_files(dir: &Path) -> std::io::Result<Vec<(&'static str, Vec<u8>)>> {
    ARTIFACT_FILES
        .iter()
        .map(|file| Ok((*file, std::fs::read(dir.join(file))?)))
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};
    use rand::RngCore;
    use serde_json::json;
    use tempfile::tempdir;

    /// A small but complete heart disease profile.
    pub(crate) fn heart_fixture() -> Vec<(&'static str, Vec<u8>)> {
        let names: Vec<String> = crate::domain::clinical_catalog(DiseaseId::HeartDisease)
            .into_iter()
            .map(|s| s.name)
            .collect();
        let n = names.len();
        let mut coefficients = vec![0.0; n];
        coefficients[0] = 0.4;
        coefficients[3] = 0.9;
        coefficients[4] = -0.3;

        let files = [
            (SCHEMA_FILE, json!({ "disease": "heart_disease", "features": names })),
            (
                SCALER_FILE,
                json!({ "mean": vec![1.0; n], "scale": vec![2.0; n] }),
            ),
            (
                MODEL_FILE,
                json!({
                    "format_version": 1,
                    "algorithm": "Logistic Regression",
                    "f1_score": 0.85,
                    "trained_at": "2024-05-17T10:00:00Z",
                    "attribution": { "method": "linear" },
                    "classifier": {
                        "kind": "logistic",
                        "coefficients": coefficients,
                        "intercept": 0.1
                    }
                }),
            ),
            (BACKGROUND_FILE, json!({ "mean": vec![0.0; n] })),
        ];
        files
            .into_iter()
            .map(|(name, value)| (name, serde_json::to_vec_pretty(&value).expect("json")))
            .collect()
    }

    fn write_fixture(root: &Path) -> PathBuf {
        let dir = root.join(DiseaseId::HeartDisease.as_str());
        std::fs::create_dir_all(&dir).expect("mkdir");
        for (name, bytes) in heart_fixture() {
            std::fs::write(dir.join(name), bytes).expect("write artifact");
        }
        dir
    }

    fn signing_key() -> SigningKey {
        let mut sk = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut sk);
        SigningKey::from_bytes(&sk)
    }

    fn sign_dir(dir: &Path, key: &SigningKey) {
        let files = read_profile_files(dir).expect("read files");
        let refs: Vec<(&str, &[u8])> = files.iter().map(|(n, b)| (*n, b.as_slice())).collect();
        let manifest = ProfileManifest::build(DiseaseId::HeartDisease, &refs);
        let bytes = serde_json::to_vec_pretty(&manifest).expect("serialize manifest");
        std::fs::write(dir.join(MANIFEST_FILE), &bytes).expect("write manifest");
        let signature: Signature = key.sign(&bytes);
        std::fs::write(dir.join(SIGNATURE_FILE), signature.to_bytes()).expect("write sig");
    }

    fn strict(key: &SigningKey) -> IntegrityPolicy {
        IntegrityPolicy {
            require_manifest: true,
            verifying_key: Some(key.verifying_key()),
        }
    }

    #[test]
    fn test_loads_unsigned_profile_when_allowed() {
        let temp = tempdir().expect("tempdir");
        write_fixture(temp.path());
        let store = DirectoryStore::new(temp.path());

        let profile = load_profile(&store, DiseaseId::HeartDisease, &IntegrityPolicy::default())
            .expect("profile loads");
        assert_eq!(profile.schema().len(), 13);
        assert_eq!(profile.metadata().algorithm, "Logistic Regression");
        assert_eq!(profile.metadata().f1_score, Some(0.85));
        assert_eq!(profile.attributor().method(), "linear");
    }

    #[test]
    fn test_unsigned_profile_refused_when_required() {
        let temp = tempdir().expect("tempdir");
        write_fixture(temp.path());
        let store = DirectoryStore::new(temp.path());

        let err = load_profile(&store, DiseaseId::HeartDisease, &strict(&signing_key()))
            .expect_err("must fail closed");
        assert!(matches!(err, ModelLoadError::Integrity { .. }));
    }

    #[test]
    fn test_signed_profile_verifies() {
        let temp = tempdir().expect("tempdir");
        let dir = write_fixture(temp.path());
        let key = signing_key();
        sign_dir(&dir, &key);

        let store = DirectoryStore::new(temp.path());
        load_profile(&store, DiseaseId::HeartDisease, &strict(&key)).expect("signed profile loads");
    }

    #[test]
    fn test_tampered_artifact_is_rejected() {
        let temp = tempdir().expect("tempdir");
        let dir = write_fixture(temp.path());
        let key = signing_key();
        sign_dir(&dir, &key);

        let mut scaler = std::fs::read(dir.join(SCALER_FILE)).expect("read scaler");
        scaler.push(b'\n');
        std::fs::write(dir.join(SCALER_FILE), scaler).expect("rewrite scaler");

        let store = DirectoryStore::new(temp.path());
        let err = load_profile(&store, DiseaseId::HeartDisease, &strict(&key))
            .expect_err("hash mismatch");
        assert!(err.to_string().contains("hash mismatch for scaler.json"));
    }

    #[test]
    fn test_wrong_key_is_rejected() {
        let temp = tempdir().expect("tempdir");
        let dir = write_fixture(temp.path());
        sign_dir(&dir, &signing_key());

        let store = DirectoryStore::new(temp.path());
        let err = load_profile(&store, DiseaseId::HeartDisease, &strict(&signing_key()))
            .expect_err("signature from another key");
        assert!(err.to_string().contains("invalid manifest signature"));
    }

    #[test]
    fn test_missing_and_corrupt_files() {
        let mut store = MemoryStore::new();
        for (name, bytes) in heart_fixture() {
            store.insert(DiseaseId::HeartDisease, name, bytes);
        }
        let policy = IntegrityPolicy::default();

        store.remove(DiseaseId::HeartDisease, SCALER_FILE);
        let err = load_profile(&store, DiseaseId::HeartDisease, &policy).expect_err("missing");
        assert!(matches!(err, ModelLoadError::Missing { ref file, .. } if file == SCALER_FILE));

        store.insert(DiseaseId::HeartDisease, SCALER_FILE, b"{ not json".to_vec());
        let err = load_profile(&store, DiseaseId::HeartDisease, &policy).expect_err("corrupt");
        assert!(matches!(err, ModelLoadError::Corrupt { ref file, .. } if file == SCALER_FILE));
    }

    #[test]
    fn test_schema_for_other_disease_is_inconsistent() {
        let mut store = MemoryStore::new();
        for (name, bytes) in heart_fixture() {
            store.insert(DiseaseId::Diabetes, name, bytes);
        }
        let err = load_profile(&store, DiseaseId::Diabetes, &IntegrityPolicy::default())
            .expect_err("schema describes heart disease");
        assert!(matches!(err, ModelLoadError::Inconsistent { .. }));
    }
}
