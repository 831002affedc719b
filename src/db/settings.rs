use rusqlite::OptionalExtension;

use super::Database;
use crate::error::Result;

// Settings keys for database storage
pub const SETTING_SYNC_FILE: &str = "sync_file";
pub const SETTING_SYNC_INTERVAL_MS: &str = "sync_interval_ms";
pub const SETTING_SYNC_MIN_WRITE_MS: &str = "sync_min_write_ms";
pub const SETTING_TAG_MATCH: &str = "tag_match";

impl Database {
    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM app_settings WHERE key = ?",
                [key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO app_settings (key, value) VALUES (?, ?)",
            [key, value],
        )?;
        Ok(())
    }

    pub fn delete_setting(&self, key: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM app_settings WHERE key = ?", [key])?;
        Ok(rows > 0)
    }
}
