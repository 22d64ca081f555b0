//! Wire types for the analysis service (`POST /gee_layers`, `POST /download`).

use serde::{Deserialize, Serialize};

use crate::error::RequestError;
use crate::geometry::{Bounds, Geometry};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerRequest {
    pub dataset: String,
    pub index: String,
    pub start_date: String,
    pub end_date: String,
    pub geometry: Geometry,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownloadRequest {
    #[serde(flatten)]
    pub layer: LayerRequest,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VisParams {
    #[serde(default)]
    pub palette: Vec<String>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct LegendMeta {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct LegendInfo {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub meta: Option<LegendMeta>,
}

/// A class entry is either a bare name or an object carrying `class_name`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum UniqueClass {
    Name(String),
    Named { class_name: String },
}

impl UniqueClass {
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) | Self::Named { class_name: name } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct LayersResponse {
    #[serde(default)]
    pub tiles: Option<String>,
    #[serde(default)]
    pub mode_tiles: Option<String>,
    #[serde(default)]
    pub bounds: Option<Vec<[f64; 2]>>,
    #[serde(default)]
    pub vis_params: Option<VisParams>,
    #[serde(default)]
    pub legend: Option<LegendInfo>,
    #[serde(default)]
    pub unique_classes: Option<Vec<UniqueClass>>,
    /// Some failures arrive with a success status and an `error` field.
    #[serde(default)]
    pub error: Option<String>,
}

/// What one successful view request produced.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayDescriptor {
    pub tile_url_template: String,
    pub bounds: Option<Bounds>,
    pub vis_params: VisParams,
    pub legend_label: Option<String>,
    pub unique_classes: Option<Vec<UniqueClass>>,
}

impl OverlayDescriptor {
    pub fn min(&self) -> Option<f64> {
        self.vis_params.min
    }

    pub fn max(&self) -> Option<f64> {
        self.vis_params.max
    }
}

impl TryFrom<LayersResponse> for OverlayDescriptor {
    type Error = RequestError;

    fn try_from(response: LayersResponse) -> Result<Self, Self::Error> {
        let tile_url_template = response
            .tiles
            .filter(|url| !url.trim().is_empty())
            .or_else(|| response.mode_tiles.filter(|url| !url.trim().is_empty()))
            .ok_or(RequestError::NoTiles {
                detail: response.error,
            })?;

        let (legend_label, meta) = match response.legend {
            Some(legend) => (legend.label, legend.meta.unwrap_or_default()),
            None => (None, LegendMeta::default()),
        };
        let mut vis_params = response.vis_params.unwrap_or_default();
        vis_params.min = vis_params.min.or(meta.min);
        vis_params.max = vis_params.max.or(meta.max);

        Ok(Self {
            tile_url_template,
            bounds: response.bounds.as_deref().and_then(Bounds::from_corners),
            vis_params,
            legend_label,
            unique_classes: response.unique_classes,
        })
    }
}

const MAX_TEXT_DETAIL: usize = 200;

/// Best human-readable reason from an error body: a JSON `error`/`detail`/`message`
/// string, else a short plain-text body.
pub fn server_reason(body: &str) -> Option<String> {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        return ["error", "detail", "message"]
            .iter()
            .find_map(|key| value.get(key).and_then(|v| v.as_str()))
            .map(str::to_string);
    }
    let text = body.trim();
    (!text.is_empty() && text.len() <= MAX_TEXT_DETAIL && !text.starts_with('<'))
        .then(|| text.to_string())
}
