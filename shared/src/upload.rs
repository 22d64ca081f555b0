use geojson::GeoJson;

use crate::error::GeometryParseError;
use crate::geometry::Geometry;

pub const ACCEPTED_EXTENSIONS: &[&str] = &["geojson", "json"];

/// Whether the file picker should hand this file to the importer.
pub fn accepts_file_name(name: &str) -> bool {
    name.rsplit_once('.')
        .is_some_and(|(_, ext)| ACCEPTED_EXTENSIONS.iter().any(|a| ext.eq_ignore_ascii_case(a)))
}

/// Turns an uploaded GeoJSON document into the single polygon used for requests.
///
/// Only shape type is checked; rings are not validated for topology.
#[derive(Debug, Clone, Copy, Default)]
pub struct CustomGeometryImporter;

impl CustomGeometryImporter {
    pub fn parse(&self, contents: &str) -> Result<Geometry, GeometryParseError> {
        let document: GeoJson = contents
            .parse()
            .map_err(|e: geojson::Error| GeometryParseError::Malformed(e.to_string()))?;

        let feature = match document {
            GeoJson::Feature(feature) => feature,
            GeoJson::FeatureCollection(collection) => collection
                .features
                .into_iter()
                .next()
                .ok_or(GeometryParseError::NoFeatures)?,
            GeoJson::Geometry(_) => return Err(GeometryParseError::UnsupportedDocument("Geometry".to_string())),
        };

        feature
            .geometry
            .and_then(|geometry| Geometry::from_geojson(geometry.value))
            .ok_or(GeometryParseError::UnsupportedGeometry)
    }
}
