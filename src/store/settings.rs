use std::sync::Arc;

use tracing::{info, warn};

use crate::config::QuizConfig;

use super::{CONFIG_KEY, CONTROLLER_URL_KEY, SettingsBackend, StoreError};

/// Size limits above which optional blobs are dropped during a degraded save.
///
/// The defaults are capacity heuristics inherited from the original
/// deployment target; backends with different quotas should inject their own
/// values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimThresholds {
    /// A team logo longer than this (encoded bytes) is blanked.
    pub team_logo_max_bytes: usize,
    /// A custom audio clip longer than this (encoded bytes) is dropped.
    pub audio_max_bytes: usize,
}

impl Default for TrimThresholds {
    fn default() -> Self {
        Self {
            team_logo_max_bytes: 150_000,
            audio_max_bytes: 250_000,
        }
    }
}

/// Adapter between the configuration record and a [`SettingsBackend`].
///
/// Loads never fail (missing or corrupt data falls back to defaults) and
/// saves never propagate an error: a capacity rejection triggers one degraded
/// retry with large optional assets stripped, and a second rejection leaves
/// the in-memory record as the only copy.
#[derive(Clone)]
pub struct SettingsStore {
    backend: Arc<dyn SettingsBackend>,
    thresholds: TrimThresholds,
}

impl SettingsStore {
    /// Wrap a backend with the default trim thresholds.
    pub fn new(backend: Arc<dyn SettingsBackend>) -> Self {
        Self::with_thresholds(backend, TrimThresholds::default())
    }

    /// Wrap a backend with explicit trim thresholds.
    pub fn with_thresholds(backend: Arc<dyn SettingsBackend>, thresholds: TrimThresholds) -> Self {
        Self {
            backend,
            thresholds,
        }
    }

    /// Load the stored configuration, merging it over defaults.
    ///
    /// Missing and corrupt records both fall back to the defaults; neither is
    /// surfaced to the caller.
    pub fn load_config(&self) -> QuizConfig {
        let mut config = match self.backend.load(CONFIG_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<QuizConfig>(&raw) {
                Ok(config) => config,
                Err(err) => {
                    warn!(error = %err, "stored configuration is corrupt; using defaults");
                    QuizConfig::default()
                }
            },
            Ok(None) => {
                info!("no stored configuration; using defaults");
                QuizConfig::default()
            }
            Err(err) => {
                warn!(error = %err, "failed to read stored configuration; using defaults");
                QuizConfig::default()
            }
        };
        config.normalize();
        config
    }

    /// Persist the configuration, best-effort.
    ///
    /// A quota rejection is retried exactly once with the three header assets
    /// cleared, oversized team logos blanked, and an oversized audio clip
    /// dropped. A failing retry is logged and accepted.
    pub fn save_config(&self, config: &QuizConfig) {
        let encoded = match serde_json::to_string(config) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!(error = %err, "failed to encode configuration; not persisted");
                return;
            }
        };

        match self.backend.save(CONFIG_KEY, &encoded) {
            Ok(()) => {}
            Err(err @ StoreError::QuotaExceeded { .. }) => {
                warn!(error = %err, "configuration over capacity; retrying degraded save");
                self.degraded_save(config);
            }
            Err(err) => {
                warn!(error = %err, "failed to persist configuration");
            }
        }
    }

    fn degraded_save(&self, config: &QuizConfig) {
        let trimmed = self.trimmed_copy(config);
        let encoded = match serde_json::to_string(&trimmed) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!(error = %err, "failed to encode trimmed configuration");
                return;
            }
        };
        match self.backend.save(CONFIG_KEY, &encoded) {
            Ok(()) => info!("degraded save succeeded with large assets stripped"),
            Err(err) => {
                warn!(
                    error = %err,
                    "degraded save failed; configuration kept in memory only"
                );
            }
        }
    }

    /// Copy of the record with the large optional assets stripped.
    fn trimmed_copy(&self, config: &QuizConfig) -> QuizConfig {
        let mut trimmed = config.clone();
        trimmed.left_logo = None;
        trimmed.right_logo = None;
        trimmed.main_animation_gif = None;
        for team in &mut trimmed.teams {
            if team
                .logo
                .as_ref()
                .is_some_and(|logo| logo.len() > self.thresholds.team_logo_max_bytes)
            {
                team.logo = None;
            }
        }
        if trimmed
            .buzzer_audio_data
            .as_ref()
            .is_some_and(|clip| clip.len() > self.thresholds.audio_max_bytes)
        {
            trimmed.buzzer_audio_data = None;
        }
        trimmed
    }

    /// Delete the stored configuration record.
    pub fn clear_config(&self) {
        if let Err(err) = self.backend.remove(CONFIG_KEY) {
            warn!(error = %err, "failed to remove stored configuration");
        }
    }

    /// Read the persisted controller base URL, if one was saved.
    pub fn load_controller_url(&self) -> Option<String> {
        match self.backend.load(CONTROLLER_URL_KEY) {
            Ok(url) => url.filter(|url| !url.trim().is_empty()),
            Err(err) => {
                warn!(error = %err, "failed to read stored controller url");
                None
            }
        }
    }

    /// Persist the controller base URL, best-effort.
    pub fn save_controller_url(&self, url: &str) {
        if let Err(err) = self.backend.save(CONTROLLER_URL_KEY, url) {
            warn!(error = %err, "failed to persist controller url");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use crate::config::Team;
    use crate::store::StoreResult;

    use super::*;

    /// Backend double that rejects the first `quota_failures` saves with a
    /// quota error and records every accepted write.
    struct FlakyBackend {
        quota_failures: Mutex<usize>,
        saved: Mutex<Vec<String>>,
    }

    impl FlakyBackend {
        fn rejecting(n: usize) -> Arc<Self> {
            Arc::new(Self {
                quota_failures: Mutex::new(n),
                saved: Mutex::new(Vec::new()),
            })
        }

        fn last_saved(&self) -> Option<QuizConfig> {
            let saved = self.saved.lock().unwrap();
            saved.last().map(|raw| serde_json::from_str(raw).unwrap())
        }
    }

    impl SettingsBackend for FlakyBackend {
        fn load(&self, _key: &str) -> StoreResult<Option<String>> {
            Ok(self.saved.lock().unwrap().last().cloned())
        }

        fn save(&self, _key: &str, value: &str) -> StoreResult<()> {
            let mut remaining = self.quota_failures.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(StoreError::QuotaExceeded {
                    needed: value.len(),
                    capacity: 0,
                });
            }
            self.saved.lock().unwrap().push(value.to_string());
            Ok(())
        }

        fn remove(&self, _key: &str) -> StoreResult<()> {
            self.saved.lock().unwrap().clear();
            Ok(())
        }
    }

    fn config_with_assets() -> QuizConfig {
        let mut config = QuizConfig::default();
        config.left_logo = Some("L".repeat(10_000));
        config.right_logo = Some("R".repeat(10_000));
        config.main_animation_gif = Some("G".repeat(50_000));
        let mut small = Team::new("small");
        small.logo = Some("s".repeat(1_000));
        let mut big = Team::new("big");
        big.logo = Some("b".repeat(200_000));
        config.teams = vec![small, big];
        config.buzzer_audio_data = Some("a".repeat(300_000));
        config
    }

    #[test]
    fn degraded_save_strips_assets_and_retries_once() {
        let backend = FlakyBackend::rejecting(1);
        let store = SettingsStore::new(backend.clone());

        store.save_config(&config_with_assets());

        let saved = backend.last_saved().expect("retry should have persisted");
        assert_eq!(saved.left_logo, None);
        assert_eq!(saved.right_logo, None);
        assert_eq!(saved.main_animation_gif, None);
        // Logos under the threshold survive, oversized ones are blanked.
        assert!(saved.teams[0].logo.is_some());
        assert_eq!(saved.teams[1].logo, None);
        assert_eq!(saved.buzzer_audio_data, None);
        // Non-asset fields are untouched.
        assert_eq!(saved.header_title, "NEON QUIZ CHAMPIONSHIP");
    }

    #[test]
    fn second_quota_rejection_is_absorbed() {
        let backend = FlakyBackend::rejecting(2);
        let store = SettingsStore::new(backend.clone());

        store.save_config(&config_with_assets());

        assert!(backend.last_saved().is_none());
    }

    #[test]
    fn custom_thresholds_drive_trimming() {
        let backend = FlakyBackend::rejecting(1);
        let thresholds = TrimThresholds {
            team_logo_max_bytes: 500,
            audio_max_bytes: 500,
        };
        let store = SettingsStore::with_thresholds(backend.clone(), thresholds);

        store.save_config(&config_with_assets());

        let saved = backend.last_saved().unwrap();
        // Both logos exceed the lowered threshold now.
        assert_eq!(saved.teams[0].logo, None);
        assert_eq!(saved.teams[1].logo, None);
    }

    #[test]
    fn corrupt_record_falls_back_to_defaults() {
        let backend = FlakyBackend::rejecting(0);
        backend.saved.lock().unwrap().push("{not json".into());
        let store = SettingsStore::new(backend);

        let config = store.load_config();
        assert_eq!(config, QuizConfig::default());
    }

    #[test]
    fn saved_record_loads_back() {
        let backend = FlakyBackend::rejecting(0);
        let store = SettingsStore::new(backend);

        let mut config = QuizConfig::default();
        config.header_title = "LOCAL CUP".into();
        config.teams.push(Team::new("Alpha"));
        store.save_config(&config);

        assert_eq!(store.load_config(), config);
    }
}
