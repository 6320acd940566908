use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{RwLock, watch};
use uuid::Uuid;

use crate::store::SettingsStore;

use super::{MAX_TEAMS, QuizConfig, Team};

/// Shared handle to the configuration service.
pub type SharedConfig = Arc<ConfigService>;

/// Errors from roster operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The roster already holds [`MAX_TEAMS`] teams.
    #[error("team roster is full ({MAX_TEAMS} teams)")]
    RosterFull,
    /// No team with the given identity exists.
    #[error("team `{0}` not found")]
    UnknownTeam(Uuid),
}

/// Single writer for the configuration record.
///
/// Every mutation normalizes the record and persists it through the settings
/// store before returning. Readers take cheap snapshots; the session runtime
/// additionally watches the roster revision to catch mid-round roster edits.
pub struct ConfigService {
    store: SettingsStore,
    config: RwLock<QuizConfig>,
    roster_rev: watch::Sender<u64>,
}

impl ConfigService {
    /// Load the stored record (or defaults) and wrap it in a shared handle.
    pub fn load(store: SettingsStore) -> SharedConfig {
        let config = store.load_config();
        let (roster_rev, _) = watch::channel(0);
        Arc::new(Self {
            store,
            config: RwLock::new(config),
            roster_rev,
        })
    }

    /// Snapshot of the current record.
    pub async fn snapshot(&self) -> QuizConfig {
        self.config.read().await.clone()
    }

    /// Subscribe to roster revision bumps (team added, removed, or reordered).
    pub fn roster_watcher(&self) -> watch::Receiver<u64> {
        self.roster_rev.subscribe()
    }

    /// Replace the whole record.
    pub async fn replace(&self, config: QuizConfig) {
        self.mutate(move |current| *current = config).await;
    }

    /// Apply a partial update to the record.
    pub async fn update<F>(&self, apply: F)
    where
        F: FnOnce(&mut QuizConfig),
    {
        self.mutate(apply).await;
    }

    /// Append a team to the roster.
    pub async fn add_team(&self, team: Team) -> Result<(), ConfigError> {
        let mut result = Ok(());
        self.mutate(|config| {
            if config.teams.len() >= MAX_TEAMS {
                result = Err(ConfigError::RosterFull);
            } else {
                config.teams.push(team);
            }
        })
        .await;
        result
    }

    /// Remove a team by identity. Returns whether a team was removed.
    pub async fn remove_team(&self, id: Uuid) -> bool {
        let mut removed = false;
        self.mutate(|config| {
            let before = config.teams.len();
            config.teams.retain(|team| team.id != id);
            removed = config.teams.len() != before;
        })
        .await;
        removed
    }

    /// Edit a team in place (rename, logo, score). Identity-preserving edits
    /// do not bump the roster revision.
    pub async fn update_team<F>(&self, id: Uuid, apply: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut Team),
    {
        let mut result = Err(ConfigError::UnknownTeam(id));
        self.mutate(|config| {
            if let Some(team) = config.teams.iter_mut().find(|team| team.id == id) {
                apply(team);
                result = Ok(());
            }
        })
        .await;
        result
    }

    /// Set the current question number (floored at 1 by normalization).
    pub async fn set_question_number(&self, number: u32) {
        self.mutate(move |config| config.current_question_number = number)
            .await;
    }

    /// Restore defaults and delete the stored record.
    pub async fn reset(&self) {
        let roster_changed;
        {
            let mut guard = self.config.write().await;
            roster_changed = !guard.teams.is_empty();
            *guard = QuizConfig::default();
        }
        self.store.clear_config();
        if roster_changed {
            self.roster_rev.send_modify(|rev| *rev += 1);
        }
    }

    async fn mutate<F>(&self, apply: F)
    where
        F: FnOnce(&mut QuizConfig),
    {
        let roster_changed;
        {
            let mut guard = self.config.write().await;
            let before: Vec<Uuid> = guard.teams.iter().map(|team| team.id).collect();
            apply(&mut guard);
            guard.normalize();
            self.store.save_config(&guard);
            let after: Vec<Uuid> = guard.teams.iter().map(|team| team.id).collect();
            roster_changed = before != after;
        }
        if roster_changed {
            self.roster_rev.send_modify(|rev| *rev += 1);
        }
    }
}
