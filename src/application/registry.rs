//! Disease profile registry.
//!
//! Holds one slot per supported disease. Slots are filled once, when the
//! registry is built, and never change afterwards, so lookups take no locks.
//! A disease whose artifacts failed to load keeps its error in the slot and
//! reports itself as not ready instead of falling back to anything.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::adapters::artifacts::{load_profile, DirectoryStore, IntegrityPolicy};
use crate::config::EngineConfig;
use crate::domain::{DiseaseId, DiseaseProfile, ModelLoadError};
use crate::ports::ArtifactStore;
use crate::{MediAssistError, Result};

static GLOBAL_REGISTRY: OnceLock<ProfileRegistry> = OnceLock::new();

#[derive(Debug)]
enum Slot {
    Ready(DiseaseProfile),
    Failed(ModelLoadError),
}

/// Readiness report for one disease.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileStatus {
    pub disease: DiseaseId,
    pub name: &'static str,
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub f1_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribution: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<usize>,
    pub loaded_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Immutable catalog of disease profiles.
#[derive(Debug)]
pub struct ProfileRegistry {
    slots: Vec<Slot>,
    loaded_at: DateTime<Utc>,
}

impl ProfileRegistry {
    /// Load every disease from `store`. Never fails as a whole: each
    /// disease is either ready or carries its load error.
    #[must_use]
    pub fn load(store: &dyn ArtifactStore, policy: &IntegrityPolicy) -> Self {
        let slots = DiseaseId::ALL
            .iter()
            .map(|&disease| match load_profile(store, disease, policy) {
                Ok(profile) => Slot::Ready(profile),
                Err(e) => {
                    tracing::warn!(disease = %disease, error = %e, "Disease unavailable");
                    Slot::Failed(e)
                }
            })
            .collect();

        Self {
            slots,
            loaded_at: Utc::now(),
        }
    }

    /// Load from the configured model directory.
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        tracing::info!(model_dir = %config.model_dir.display(), "Loading disease profiles");
        let store = DirectoryStore::new(&config.model_dir);
        Self::load(&store, &IntegrityPolicy::from(config))
    }

    /// Look up a profile by its textual id.
    ///
    /// # Errors
    /// `UnknownDisease` for ids outside the supported set, `ModelNotLoaded`
    /// for a supported disease that is not ready.
    pub fn get(&self, id: &str) -> Result<&DiseaseProfile> {
        let disease: DiseaseId = id.parse()?;
        self.profile(disease)
    }

    /// # Errors
    /// `ModelNotLoaded` if the disease failed to load.
    pub fn profile(&self, disease: DiseaseId) -> Result<&DiseaseProfile> {
        match &self.slots[disease.index()] {
            Slot::Ready(profile) => Ok(profile),
            Slot::Failed(e) => Err(MediAssistError::ModelNotLoaded {
                disease,
                reason: e.to_string(),
            }),
        }
    }

    #[must_use]
    pub fn is_ready(&self, disease: DiseaseId) -> bool {
        matches!(self.slots[disease.index()], Slot::Ready(_))
    }

    #[must_use]
    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    #[must_use]
    pub fn status(&self) -> Vec<ProfileStatus> {
        DiseaseId::ALL
            .iter()
            .map(|&disease| match &self.slots[disease.index()] {
                Slot::Ready(profile) => ProfileStatus {
                    disease,
                    name: disease.display_name(),
                    ready: true,
                    algorithm: Some(profile.metadata().algorithm.clone()),
                    f1_score: profile.metadata().f1_score,
                    attribution: Some(profile.attributor().method()),
                    features: Some(profile.schema().len()),
                    loaded_at: self.loaded_at,
                    error: None,
                },
                Slot::Failed(e) => ProfileStatus {
                    disease,
                    name: disease.display_name(),
                    ready: false,
                    algorithm: None,
                    f1_score: None,
                    attribution: None,
                    features: None,
                    loaded_at: self.loaded_at,
                    error: Some(e.to_string()),
                },
            })
            .collect()
    }
}

/// Initialise the process-wide registry from `config`.
///
/// The first caller performs the load; concurrent callers block until it
/// completes and every caller observes the same registry. Later calls
/// ignore `config`.
pub fn init_global(config: &EngineConfig) -> &'static ProfileRegistry {
    init_global_with(|| ProfileRegistry::from_config(config))
}

/// Initialise the process-wide registry with an arbitrary loader. `load`
/// runs at most once per process.
pub(crate) fn init_global_with(
    load: impl FnOnce() -> ProfileRegistry,
) -> &'static ProfileRegistry {
    GLOBAL_REGISTRY.get_or_init(load)
}

/// The process-wide registry, if it has been initialised.
#[must_use]
pub fn global() -> Option<&'static ProfileRegistry> {
    GLOBAL_REGISTRY.get()
}
