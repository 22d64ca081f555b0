use thiserror::Error;

/// Selection problems caught locally, before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("please choose {0}")]
    Missing(&'static str),
    #[error("unknown dataset `{0}`")]
    UnknownDataset(String),
    #[error("`{variable}` is not available for {dataset}")]
    UnknownVariable { dataset: String, variable: String },
    #[error("unknown feature `{0}`")]
    UnknownFeature(String),
    #[error("{field}: {reason}")]
    InvalidDate {
        field: &'static str,
        reason: DateRangeIssue,
    },
}

/// Why a date range was rejected. The `Display` text is the stable reason string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DateRangeIssue {
    #[error("not a valid calendar date")]
    NotACalendarDate,
    #[error("start before dataset minimum")]
    StartBeforeMinimum,
    #[error("end before start")]
    EndBeforeStart,
    #[error("end after dataset maximum")]
    EndAfterMaximum,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryParseError {
    #[error("file is not valid GeoJSON: {0}")]
    Malformed(String),
    #[error("no features")]
    NoFeatures,
    #[error("unsupported geometry")]
    UnsupportedGeometry,
    #[error("expected a Feature or FeatureCollection, found `{0}`")]
    UnsupportedDocument(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("administrative level {level} boundaries unavailable: {reason}")]
pub struct BoundaryLoadError {
    pub level: u8,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("server returned HTTP {status}{}", detail_suffix(.detail))]
    Status { status: u16, detail: Option<String> },
    #[error("no map tiles returned{}", detail_suffix(.detail))]
    NoTiles { detail: Option<String> },
    #[error("could not read server response: {0}")]
    Decode(String),
    #[error("request timed out after {0} seconds")]
    Timeout(u64),
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail
        .as_deref()
        .map(|detail| format!(": {detail}"))
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TileRenderError {
    #[error("map layer failed to render after {attempts} attempts")]
    Exhausted { attempts: u32 },
}

/// Every failure the explorer surfaces. None of them are fatal: the controller stays
/// in a state where the user can correct inputs and retry the same action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExplorerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    GeometryParse(#[from] GeometryParseError),
    #[error(transparent)]
    BoundaryLoad(#[from] BoundaryLoadError),
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error(transparent)]
    TileRender(#[from] TileRenderError),
    /// Superseded by a newer request of the same kind, or the map went away mid-render.
    #[error("request canceled")]
    Canceled,
}

impl ExplorerError {
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }
}
