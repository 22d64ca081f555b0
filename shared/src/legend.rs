use crate::catalog::DatasetCatalog;
use crate::protocol::OverlayDescriptor;

pub const NEUTRAL_GRAY: &str = "#9e9e9e";

/// Dynamic World class colors, keyed by normalized class name.
const LANDCOVER_PALETTE: &[(&str, &str)] = &[
    ("water", "#419bdf"),
    ("trees", "#397d49"),
    ("grass", "#88b053"),
    ("flooded_vegetation", "#7a87c6"),
    ("crops", "#e49635"),
    ("shrub_and_scrub", "#dfc35a"),
    ("built", "#c4281b"),
    ("bare", "#a59b8f"),
    ("snow_and_ice", "#b39fe1"),
    ("tree_cover", "#006400"),
    ("shrubland", "#ffbb22"),
    ("grassland", "#ffff4c"),
    ("cropland", "#f096ff"),
    ("built_up", "#fa0000"),
    ("bare_sparse_vegetation", "#b4b4b4"),
    ("permanent_water_bodies", "#0064c8"),
    ("herbaceous_wetland", "#0096a0"),
];

/// Legend titles for continuous layers, keyed by (dataset, variable).
const DESCRIPTIONS: &[(&str, &str, &str)] = &[
    ("sentinel2", "NDVI", "Sentinel-2 NDVI (Normalized Difference Vegetation Index)"),
    ("sentinel2", "EVI", "Sentinel-2 EVI (Enhanced Vegetation Index)"),
    ("sentinel2", "NDWI", "Sentinel-2 NDWI (Normalized Difference Water Index)"),
    ("sentinel2", "SAVI", "Sentinel-2 SAVI (Soil Adjusted Vegetation Index)"),
    ("landsat", "NDVI", "Landsat NDVI (Normalized Difference Vegetation Index)"),
    ("landsat", "NDWI", "Landsat NDWI (Normalized Difference Water Index)"),
    ("landsat", "EVI", "Landsat EVI (Enhanced Vegetation Index)"),
    ("landsat", "NBR", "Landsat NBR (Normalized Burn Ratio)"),
    ("modis", "NDVI", "MODIS NDVI (16-day composite)"),
    ("modis", "EVI", "MODIS EVI (16-day composite)"),
    ("modis", "LST", "MODIS land surface temperature (°C)"),
    ("climate", "precipitation", "CHIRPS precipitation (mm)"),
    ("climate", "temperature", "ERA5 2 m air temperature (°C)"),
];

#[derive(Debug, Clone, PartialEq)]
pub struct LegendRow {
    pub label: String,
    pub color: String,
}

/// Presentation-ready legend, independent of how the surface draws it.
#[derive(Debug, Clone, PartialEq)]
pub enum Legend {
    Classes {
        title: String,
        rows: Vec<LegendRow>,
    },
    Gradient {
        title: String,
        palette: Vec<String>,
        min: Option<f64>,
        max: Option<f64>,
    },
}

impl Legend {
    pub fn title(&self) -> &str {
        match self {
            Self::Classes { title, .. } | Self::Gradient { title, .. } => title,
        }
    }

    /// CSS `background` for a gradient bar; `None` for class legends or an empty palette.
    pub fn gradient_css(&self) -> Option<String> {
        match self {
            Self::Gradient { palette, .. } if !palette.is_empty() => {
                Some(format!("linear-gradient(to right, {})", palette.join(", ")))
            }
            _ => None,
        }
    }

    /// Formatted labels for the two ends of a gradient bar.
    pub fn range_labels(&self) -> Option<(String, String)> {
        match self {
            Self::Gradient { min, max, .. } => Some((format_bound(*min), format_bound(*max))),
            Self::Classes { .. } => None,
        }
    }
}

pub fn format_bound(value: Option<f64>) -> String {
    match value {
        Some(v) if v.fract() == 0.0 => format!("{v:.0}"),
        Some(v) => format!("{v:.2}"),
        None => "–".to_string(),
    }
}

/// `"shrub and scrub"` → `shrub_and_scrub`.
fn normalize_class(name: &str) -> String {
    name.trim()
        .to_ascii_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// `flooded_vegetation` → `Flooded vegetation`.
fn display_class(name: &str) -> String {
    let spaced = name.trim().replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn landcover_color(class_name: &str) -> Option<&'static str> {
    let key = normalize_class(class_name);
    LANDCOVER_PALETTE
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, color)| *color)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LegendRenderer {
    catalog: DatasetCatalog,
}

impl LegendRenderer {
    pub fn new(catalog: DatasetCatalog) -> Self {
        Self { catalog }
    }

    pub fn render(&self, descriptor: &OverlayDescriptor, dataset_key: &str, variable_key: &str) -> Legend {
        let dataset = self.catalog.get(dataset_key);
        let categorical = dataset.is_some_and(|d| d.is_categorical());

        if let (true, Some(classes)) = (categorical, descriptor.unique_classes.as_ref()) {
            let palette = &descriptor.vis_params.palette;
            let rows = classes
                .iter()
                .enumerate()
                .map(|(i, class)| LegendRow {
                    label: display_class(class.name()),
                    color: landcover_color(class.name())
                        .map(str::to_string)
                        .or_else(|| palette.get(i).cloned())
                        .unwrap_or_else(|| NEUTRAL_GRAY.to_string()),
                })
                .collect();
            let title = descriptor
                .legend_label
                .clone()
                .unwrap_or_else(|| self.continuous_title(dataset_key, variable_key));
            return Legend::Classes { title, rows };
        }

        Legend::Gradient {
            title: self.continuous_title(dataset_key, variable_key),
            palette: descriptor.vis_params.palette.clone(),
            min: descriptor.min(),
            max: descriptor.max(),
        }
    }

    fn continuous_title(&self, dataset_key: &str, variable_key: &str) -> String {
        if let Some((_, _, title)) = DESCRIPTIONS
            .iter()
            .find(|(d, v, _)| *d == dataset_key && *v == variable_key)
        {
            return (*title).to_string();
        }
        let dataset_label = self
            .catalog
            .get(dataset_key)
            .map(|d| d.label)
            .unwrap_or(dataset_key);
        format!("{dataset_label} {variable_key}")
    }
}
