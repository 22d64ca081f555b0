use chrono::NaiveDate;

use crate::dates::ValidatedRange;

pub const RASTER_EXTENSION: &str = "tif";
pub const RASTER_MIME: &str = "image/tiff";

/// Keeps ASCII letters, digits and underscores: `"Addis Ababa"` → `AddisAbaba`.
pub fn sanitize_label(label: &str) -> String {
    label
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

fn short_date(date: NaiveDate) -> String {
    date.format("%d_%m_%y").to_string()
}

/// `<dataset>_<variable>_<dd_mm_yy>_to_<dd_mm_yy>_<label>.tif`
pub fn raster_filename(dataset: &str, variable: &str, range: &ValidatedRange, label: &str) -> String {
    format!(
        "{dataset}_{variable}_{}_to_{}_{}.{RASTER_EXTENSION}",
        short_date(range.from),
        short_date(range.to),
        sanitize_label(label)
    )
}

/// A fetched raster ready to hand to the browser.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterDownload {
    pub filename: String,
    pub bytes: Vec<u8>,
}
