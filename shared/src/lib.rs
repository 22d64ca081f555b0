pub mod boundary;
pub mod catalog;
pub mod config;
pub mod dates;
pub mod download;
pub mod error;
pub mod geometry;
pub mod legend;
pub mod overlay;
pub mod protocol;
pub mod retry;
pub mod selection;
pub mod surface;
pub mod upload;

pub use boundary::{AdminLevel, BoundaryFeature, BoundaryRegistry, BoundarySet, BoundarySource};
pub use catalog::{DatasetCatalog, DatasetDescriptor, VariableDescriptor};
pub use dates::{DateRangeValidator, PartialDate, ValidatedRange};
pub use download::RasterDownload;
pub use error::*;
pub use geometry::{Bounds, Geometry};
pub use legend::{Legend, LegendRenderer};
pub use overlay::{AnalysisService, OverlayManager, ViewOutcome};
pub use protocol::{DownloadRequest, LayerRequest, LayersResponse, OverlayDescriptor};
pub use retry::Timer;
pub use selection::{SelectionController, SelectionEvent, SelectionPhase, SelectionSnapshot, ViewEffect};
pub use surface::{FeatureStyle, LayerHandle, MapSession, MapSurface, TileLoadStatus};
pub use upload::CustomGeometryImporter;
