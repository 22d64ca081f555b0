use std::collections::HashMap;
use std::fmt;

use futures::future::LocalBoxFuture;
use geojson::GeoJson;

use crate::error::BoundaryLoadError;
use crate::geometry::{Bounds, Geometry};

/// Nested administrative granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AdminLevel {
    Region,
    Zone,
    District,
}

impl AdminLevel {
    pub const ALL: [AdminLevel; 3] = [AdminLevel::Region, AdminLevel::Zone, AdminLevel::District];

    pub const fn number(self) -> u8 {
        match self {
            Self::Region => 1,
            Self::Zone => 2,
            Self::District => 3,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.number() == n)
    }

    /// Property holding the English feature name in that level's document.
    pub const fn name_property(self) -> &'static str {
        match self {
            Self::Region => "ADM1_EN",
            Self::Zone => "ADM2_EN",
            Self::District => "ADM3_EN",
        }
    }

    /// Form value used by the level picker (`adm1`..`adm3`).
    pub fn key(self) -> String {
        format!("adm{}", self.number())
    }

    pub fn from_key(key: &str) -> Option<Self> {
        key.strip_prefix("adm")?
            .parse::<u8>()
            .ok()
            .and_then(Self::from_number)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Region => "Level 1 (Regions)",
            Self::Zone => "Level 2 (Zones)",
            Self::District => "Level 3 (Districts)",
        }
    }

    const fn index(self) -> usize {
        self.number() as usize - 1
    }
}

impl fmt::Display for AdminLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryFeature {
    pub name: String,
    pub level: AdminLevel,
    pub geometry: Geometry,
    /// Computed once at load; `None` for an empty polygon.
    pub bounds: Option<Bounds>,
}

impl BoundaryFeature {
    pub fn new(name: impl Into<String>, level: AdminLevel, geometry: Geometry) -> Self {
        let bounds = geometry.bounds();
        Self {
            name: name.into(),
            level,
            geometry,
            bounds,
        }
    }
}

/// Name → feature index for one level.
pub type BoundarySet = HashMap<String, BoundaryFeature>;

/// Where boundary documents come from (static files in the browser, fixtures in tests).
pub trait BoundarySource {
    fn fetch(&self, level: AdminLevel) -> LocalBoxFuture<'_, Result<String, String>>;
}

/// Administrative polygons for all three levels, loaded once per session.
#[derive(Debug, Clone, Default)]
pub struct BoundaryRegistry {
    sets: [BoundarySet; 3],
}

impl BoundaryRegistry {
    /// Fetch and index every level. Any failure is reported once; there is no retry.
    pub async fn load<S: BoundarySource + ?Sized>(source: &S) -> Result<Self, BoundaryLoadError> {
        let mut registry = Self::default();
        for level in AdminLevel::ALL {
            let document = source.fetch(level).await.map_err(|reason| BoundaryLoadError {
                level: level.number(),
                reason,
            })?;
            registry.sets[level.index()] = parse_level(level, &document)?;
            tracing::debug!(
                level = level.number(),
                features = registry.sets[level.index()].len(),
                "boundary level indexed"
            );
        }
        Ok(registry)
    }

    pub fn from_documents(documents: [&str; 3]) -> Result<Self, BoundaryLoadError> {
        let mut registry = Self::default();
        for level in AdminLevel::ALL {
            registry.sets[level.index()] = parse_level(level, documents[level.index()])?;
        }
        Ok(registry)
    }

    pub fn level(&self, level: AdminLevel) -> &BoundarySet {
        &self.sets[level.index()]
    }

    pub fn lookup(&self, level: AdminLevel, name: &str) -> Option<&BoundaryFeature> {
        self.level(level).get(name)
    }

    /// Feature names for a level, sorted for display.
    pub fn names(&self, level: AdminLevel) -> Vec<String> {
        let mut names: Vec<String> = self.level(level).keys().cloned().collect();
        names.sort();
        names
    }

    /// Feature under a clicked coordinate, checked against bounds first.
    pub fn feature_at(&self, level: AdminLevel, lng: f64, lat: f64) -> Option<&BoundaryFeature> {
        self.level(level).values().find(|feature| {
            feature.bounds.is_some_and(|bounds| bounds.contains(lng, lat)) && feature.geometry.contains(lng, lat)
        })
    }
}

fn parse_level(level: AdminLevel, document: &str) -> Result<BoundarySet, BoundaryLoadError> {
    let fail = |reason: String| BoundaryLoadError {
        level: level.number(),
        reason,
    };
    let collection = match document.parse::<GeoJson>() {
        Ok(GeoJson::FeatureCollection(collection)) => collection,
        Ok(GeoJson::Feature(_)) => return Err(fail("expected FeatureCollection, found Feature".to_string())),
        Ok(GeoJson::Geometry(_)) => return Err(fail("expected FeatureCollection, found Geometry".to_string())),
        Err(e) => return Err(fail(format!("parse error: {e}"))),
    };

    let name_key = level.name_property();
    let mut set = BoundarySet::with_capacity(collection.features.len());
    for feature in collection.features {
        let name = feature
            .properties
            .as_ref()
            .and_then(|props| props.get(name_key))
            .and_then(|value| value.as_str())
            .map(str::to_owned);
        let geometry = feature
            .geometry
            .and_then(|geometry| Geometry::from_geojson(geometry.value));
        let (Some(name), Some(geometry)) = (name, geometry) else {
            tracing::warn!(level = level.number(), "skipping boundary feature without name or polygon");
            continue;
        };
        set.insert(name.clone(), BoundaryFeature::new(name, level, geometry));
    }
    Ok(set)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use futures::FutureExt;
    use futures::executor::block_on;

    pub(crate) fn collection(level: AdminLevel, features: &[(&str, f64, f64)]) -> String {
        let features: Vec<_> = features
            .iter()
            .map(|&(name, min, max)| {
                serde_json::json!({
                    "type": "Feature",
                    "properties": { level.name_property(): name },
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [crate::geometry::tests::square(min, max)]
                    }
                })
            })
            .collect();
        serde_json::json!({ "type": "FeatureCollection", "features": features }).to_string()
    }

    pub(crate) fn sample_registry() -> BoundaryRegistry {
        BoundaryRegistry::from_documents([
            collection(AdminLevel::Region, &[("Oromia", 0.0, 10.0), ("Afar", 20.0, 30.0)]).as_str(),
            collection(AdminLevel::Zone, &[("Region 14", 0.0, 2.0), ("Zone 1", 20.0, 22.0)]).as_str(),
            collection(
                AdminLevel::District,
                &[("Addis Ababa", 0.0, 1.0), ("Akaki", 1.0, 2.0), ("Bole", 3.0, 4.0)],
            )
            .as_str(),
        ])
        .unwrap()
    }

    struct FixtureSource {
        documents: [String; 3],
        fail_level: Option<AdminLevel>,
    }

    impl BoundarySource for FixtureSource {
        fn fetch(&self, level: AdminLevel) -> LocalBoxFuture<'_, Result<String, String>> {
            let result = if self.fail_level == Some(level) {
                Err("HTTP 404".to_string())
            } else {
                Ok(self.documents[level.index()].clone())
            };
            async move { result }.boxed_local()
        }
    }

    fn fixture(fail_level: Option<AdminLevel>) -> FixtureSource {
        FixtureSource {
            documents: [
                collection(AdminLevel::Region, &[("Oromia", 0.0, 10.0)]),
                collection(AdminLevel::Zone, &[("Region 14", 0.0, 2.0)]),
                collection(AdminLevel::District, &[("Bole", 3.0, 4.0)]),
            ],
            fail_level,
        }
    }

    #[test]
    fn load_indexes_every_level() {
        let registry = block_on(BoundaryRegistry::load(&fixture(None))).unwrap();
        assert!(registry.lookup(AdminLevel::Region, "Oromia").is_some());
        assert!(registry.lookup(AdminLevel::Zone, "Region 14").is_some());
        assert_eq!(
            registry.lookup(AdminLevel::District, "Bole").map(|f| f.level),
            Some(AdminLevel::District)
        );
        assert!(registry.lookup(AdminLevel::District, "Oromia").is_none());
    }

    #[test]
    fn load_fails_when_any_level_is_missing() {
        let err = block_on(BoundaryRegistry::load(&fixture(Some(AdminLevel::Zone)))).unwrap_err();
        assert_eq!(err.level, 2);
        assert_eq!(err.reason, "HTTP 404");
    }

    #[test]
    fn unparseable_document_is_a_load_error() {
        let good = collection(AdminLevel::Region, &[]);
        let err = BoundaryRegistry::from_documents([good.as_str(), "<html>", good.as_str()]).unwrap_err();
        assert_eq!(err.level, 2);
        assert!(err.reason.starts_with("parse error"));
    }

    #[test]
    fn features_without_names_or_polygons_are_skipped() {
        let document = serde_json::json!({
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "properties": {}, "geometry": { "type": "Polygon", "coordinates": [] } },
                { "type": "Feature", "properties": { "ADM1_EN": "Point" }, "geometry": { "type": "Point", "coordinates": [1.0, 2.0] } },
                { "type": "Feature", "properties": { "ADM1_EN": "Tigray" }, "geometry": { "type": "Polygon", "coordinates": [crate::geometry::tests::square(0.0, 1.0)] } }
            ]
        })
        .to_string();
        let empty = collection(AdminLevel::Zone, &[]);
        let registry = BoundaryRegistry::from_documents([document.as_str(), empty.as_str(), empty.as_str()]).unwrap();
        assert_eq!(registry.names(AdminLevel::Region), vec!["Tigray".to_string()]);
    }

    #[test]
    fn single_feature_document_is_a_load_error() {
        let good = collection(AdminLevel::Region, &[]);
        let feature = serde_json::json!({
            "type": "Feature",
            "properties": { "ADM3_EN": "Bole" },
            "geometry": { "type": "Polygon", "coordinates": [crate::geometry::tests::square(0.0, 1.0)] }
        })
        .to_string();
        let err = BoundaryRegistry::from_documents([good.as_str(), good.as_str(), feature.as_str()]).unwrap_err();
        assert_eq!(err.level, 3);
        assert_eq!(err.reason, "expected FeatureCollection, found Feature");
    }

    #[test]
    fn bounds_are_computed_at_load() {
        let registry = sample_registry();
        let bole = registry.lookup(AdminLevel::District, "Bole").unwrap();
        assert_eq!(bole.bounds, bole.geometry.bounds());
        assert_eq!(bole.bounds.map(|b| (b.min_lng, b.max_lat)), Some((3.0, 4.0)));
    }

    #[test]
    fn names_are_sorted() {
        let registry = sample_registry();
        assert_eq!(
            registry.names(AdminLevel::District),
            vec!["Addis Ababa", "Akaki", "Bole"]
        );
    }

    #[test]
    fn feature_at_hits_the_containing_polygon() {
        let registry = sample_registry();
        let hit = registry.feature_at(AdminLevel::District, 3.5, 3.5).map(|f| f.name.as_str());
        assert_eq!(hit, Some("Bole"));
        assert!(registry.feature_at(AdminLevel::District, 9.0, 9.0).is_none());
    }

    #[test]
    fn level_keys_round_trip() {
        for level in AdminLevel::ALL {
            assert_eq!(AdminLevel::from_key(&level.key()), Some(level));
        }
        assert_eq!(AdminLevel::from_key("adm0"), None);
    }
}
