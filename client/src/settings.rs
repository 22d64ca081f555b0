use gloo_storage::Storage;

use geoportal_shared::AdminLevel;
use geoportal_shared::config::DEFAULT_ADMIN_LEVEL;

const STORAGE_KEY: &str = "geoportal_settings";

/// Explorer choices restored on the next visit.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Settings {
    pub dataset: Option<String>,
    pub admin_level: Option<u8>,
}

impl Settings {
    pub fn load() -> Self {
        gloo_storage::LocalStorage::get(STORAGE_KEY).unwrap_or_default()
    }

    pub fn save(&self) {
        if let Err(e) = gloo_storage::LocalStorage::set(STORAGE_KEY, self) {
            tracing::debug!(error = %e, "settings not persisted");
        }
    }

    pub fn level(&self) -> AdminLevel {
        self.admin_level
            .and_then(AdminLevel::from_number)
            .unwrap_or(DEFAULT_ADMIN_LEVEL)
    }
}
