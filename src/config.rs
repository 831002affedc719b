//! Sync configuration
//!
//! Defaults can be overridden per database through the `app_settings`
//! table, which also remembers the attached notes file.

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::db::{
    SETTING_SYNC_FILE, SETTING_SYNC_INTERVAL_MS, SETTING_SYNC_MIN_WRITE_MS, SETTING_TAG_MATCH,
};
use crate::error::Result;
use crate::query::TagMatch;
use crate::scheduler::DEFAULT_SYNC_INTERVAL;
use crate::store::NoteStore;

pub const DEFAULT_MIN_WRITE_DURATION: Duration = Duration::from_millis(800);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// How often the scheduler exports to the attached file.
    pub interval: Duration,
    /// Minimum time an export stays in the syncing state.
    pub min_write_duration: Duration,
    pub tag_match: TagMatch,
    /// File the mirror should attach to on startup.
    pub sync_file: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SYNC_INTERVAL,
            min_write_duration: DEFAULT_MIN_WRITE_DURATION,
            tag_match: TagMatch::Exact,
            sync_file: None,
        }
    }
}

impl SyncConfig {
    /// Load configuration from database settings, falling back to defaults.
    pub async fn load(store: &NoteStore) -> Result<Self> {
        let defaults = Self::default();

        let interval = store
            .setting(SETTING_SYNC_INTERVAL_MS)
            .await?
            .and_then(|s| parse_millis(SETTING_SYNC_INTERVAL_MS, &s))
            .unwrap_or(defaults.interval);

        let min_write_duration = store
            .setting(SETTING_SYNC_MIN_WRITE_MS)
            .await?
            .and_then(|s| parse_millis(SETTING_SYNC_MIN_WRITE_MS, &s))
            .unwrap_or(defaults.min_write_duration);

        let tag_match = store
            .setting(SETTING_TAG_MATCH)
            .await?
            .map(|s| TagMatch::parse(&s))
            .unwrap_or_default();

        let sync_file = store.setting(SETTING_SYNC_FILE).await?.map(PathBuf::from);

        Ok(Self {
            interval,
            min_write_duration,
            tag_match,
            sync_file,
        })
    }

    /// Save the current configuration to the database
    pub async fn save(&self, store: &NoteStore) -> Result<()> {
        store
            .set_setting(
                SETTING_SYNC_INTERVAL_MS,
                &self.interval.as_millis().to_string(),
            )
            .await?;
        store
            .set_setting(
                SETTING_SYNC_MIN_WRITE_MS,
                &self.min_write_duration.as_millis().to_string(),
            )
            .await?;
        store
            .set_setting(SETTING_TAG_MATCH, self.tag_match.as_str())
            .await?;
        match &self.sync_file {
            Some(path) => {
                store
                    .set_setting(SETTING_SYNC_FILE, &path.to_string_lossy())
                    .await?
            }
            None => store.remove_setting(SETTING_SYNC_FILE).await?,
        }
        Ok(())
    }
}

fn parse_millis(key: &str, raw: &str) -> Option<Duration> {
    match raw.trim().parse::<u64>() {
        Ok(ms) => Some(Duration::from_millis(ms)),
        Err(e) => {
            warn!(setting = key, value = raw, "ignoring invalid setting: {e}");
            None
        }
    }
}
