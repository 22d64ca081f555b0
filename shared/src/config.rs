use std::time::Duration;

use crate::boundary::AdminLevel;

pub const DEFAULT_API_BASE: &str = "http://localhost:5000";
pub const API_BASE_ENV: &str = "GEOPORTAL_API_BASE";

pub const LAYERS_PATH: &str = "/gee_layers";
pub const DOWNLOAD_PATH: &str = "/download";

pub const REQUEST_TIMEOUT_SECS: u64 = 30;
pub const RENDER_ATTEMPTS: u32 = 2;
pub const RENDER_TIMEOUT_SECS: u64 = 10;
pub const RENDER_BACKOFF_SECS: u64 = 1;

pub const MAP_CENTER: [f64; 2] = [9.145, 40.489673]; // lat, lng
pub const MAP_ZOOM: u8 = 6;
pub const BASE_TILE_URL: &str = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png";
pub const BASE_TILE_ATTRIBUTION: &str =
    "&copy; <a href=\"https://www.openstreetmap.org/copyright\">OpenStreetMap</a> contributors";

pub const DEFAULT_ADMIN_LEVEL: AdminLevel = AdminLevel::District;

/// Static GeoJSON document served alongside the client for one administrative level.
pub fn boundary_document_path(level: AdminLevel) -> String {
    format!("data/ethiopia_admin_level_{}_gcs.geojson", level.number())
}

pub fn request_timeout() -> Duration {
    Duration::from_secs(REQUEST_TIMEOUT_SECS)
}

pub fn render_timeout() -> Duration {
    Duration::from_secs(RENDER_TIMEOUT_SECS)
}

pub fn render_backoff() -> Duration {
    Duration::from_secs(RENDER_BACKOFF_SECS)
}

/// Base URL of the remote analysis service.
///
/// Native builds read `GEOPORTAL_API_BASE` at runtime; wasm builds have no process
/// environment, so the value baked in at compile time is used instead.
pub fn api_base_url() -> String {
    std::env::var(API_BASE_ENV)
        .ok()
        .or_else(|| option_env!("GEOPORTAL_API_BASE").map(str::to_string))
        .map(|value| value.trim().trim_end_matches('/').to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
}

/// Endpoint URLs for the analysis service, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoints {
    pub layers: String,
    pub download: String,
}

impl ServiceEndpoints {
    pub fn new(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            layers: format!("{base}{LAYERS_PATH}"),
            download: format!("{base}{DOWNLOAD_PATH}"),
        }
    }

    pub fn from_env() -> Self {
        Self::new(&api_base_url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_base_defaults_when_unset() {
        temp_env::with_var_unset(API_BASE_ENV, || {
            if option_env!("GEOPORTAL_API_BASE").is_none() {
                assert_eq!(api_base_url(), DEFAULT_API_BASE);
            }
        });
    }

    #[test]
    fn api_base_trims_trailing_slash() {
        temp_env::with_var(API_BASE_ENV, Some("https://gee.example.org/api/ "), || {
            assert_eq!(api_base_url(), "https://gee.example.org/api");
        });
    }

    #[test]
    fn blank_api_base_falls_back() {
        temp_env::with_var(API_BASE_ENV, Some("   "), || {
            if option_env!("GEOPORTAL_API_BASE").is_none() {
                assert_eq!(api_base_url(), DEFAULT_API_BASE);
            }
        });
    }

    #[test]
    fn endpoints_join_paths() {
        let endpoints = ServiceEndpoints::new("https://gee.example.org/");
        assert_eq!(endpoints.layers, "https://gee.example.org/gee_layers");
        assert_eq!(endpoints.download, "https://gee.example.org/download");
    }

    #[test]
    fn boundary_paths_follow_level_number() {
        assert_eq!(
            boundary_document_path(AdminLevel::Region),
            "data/ethiopia_admin_level_1_gcs.geojson"
        );
        assert_eq!(
            boundary_document_path(AdminLevel::District),
            "data/ethiopia_admin_level_3_gcs.geojson"
        );
    }
}
