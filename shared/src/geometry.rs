use serde::Serialize;

/// One GeoJSON position. Extra ordinates (altitude) are kept but ignored.
pub type Position = Vec<f64>;
pub type Ring = Vec<Position>;

/// Polygonal GeoJSON geometry; the only shapes the analysis service accepts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Polygon(Vec<Ring>),
    MultiPolygon(Vec<Vec<Ring>>),
}

/// Lng/lat bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_lng: f64,
    pub min_lat: f64,
    pub max_lng: f64,
    pub max_lat: f64,
}

impl Bounds {
    fn empty() -> Self {
        Self {
            min_lng: f64::MAX,
            min_lat: f64::MAX,
            max_lng: f64::MIN,
            max_lat: f64::MIN,
        }
    }

    fn extend(&mut self, lng: f64, lat: f64) {
        self.min_lng = self.min_lng.min(lng);
        self.min_lat = self.min_lat.min(lat);
        self.max_lng = self.max_lng.max(lng);
        self.max_lat = self.max_lat.max(lat);
    }

    fn is_valid(&self) -> bool {
        self.min_lng <= self.max_lng && self.min_lat <= self.max_lat
    }

    /// Bounds of a list of `[lng, lat]` pairs, as sent by the analysis service.
    pub fn from_corners(points: &[[f64; 2]]) -> Option<Self> {
        let mut bounds = Self::empty();
        for &[lng, lat] in points {
            bounds.extend(lng, lat);
        }
        bounds.is_valid().then_some(bounds)
    }

    pub fn contains(&self, lng: f64, lat: f64) -> bool {
        lng >= self.min_lng && lng <= self.max_lng && lat >= self.min_lat && lat <= self.max_lat
    }
}

impl Geometry {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Polygon(_) => "Polygon",
            Self::MultiPolygon(_) => "MultiPolygon",
        }
    }

    fn polygons(&self) -> impl Iterator<Item = &[Ring]> {
        let (single, many) = match self {
            Self::Polygon(rings) => (Some(rings.as_slice()), None),
            Self::MultiPolygon(polys) => (None, Some(polys.iter().map(Vec::as_slice))),
        };
        single.into_iter().chain(many.into_iter().flatten())
    }

    pub fn bounds(&self) -> Option<Bounds> {
        let mut bounds = Bounds::empty();
        for polygon in self.polygons() {
            // Holes lie inside the exterior ring.
            let Some(exterior) = polygon.first() else {
                continue;
            };
            for position in exterior {
                if let [lng, lat, ..] = position.as_slice() {
                    bounds.extend(*lng, *lat);
                }
            }
        }
        bounds.is_valid().then_some(bounds)
    }

    /// Point-in-polygon test; a point inside a hole is outside.
    pub fn contains(&self, lng: f64, lat: f64) -> bool {
        self.polygons().any(|polygon| {
            let mut rings = polygon.iter();
            let Some(exterior) = rings.next() else {
                return false;
            };
            point_in_ring(lng, lat, exterior) && !rings.any(|hole| point_in_ring(lng, lat, hole))
        })
    }

    /// Keeps polygonal GeoJSON shapes; points, lines and collections are rejected.
    pub fn from_geojson(value: geojson::Value) -> Option<Self> {
        match value {
            geojson::Value::Polygon(rings) => Some(Self::Polygon(rings)),
            geojson::Value::MultiPolygon(polygons) => Some(Self::MultiPolygon(polygons)),
            _ => None,
        }
    }
}

/// Ray-casting test against one closed ring.
fn point_in_ring(lng: f64, lat: f64, ring: &[Position]) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (Some(&[xi, yi]), Some(&[xj, yj])) = (xy(&ring[i]), xy(&ring[j])) else {
            j = i;
            continue;
        };
        if ((yi > lat) != (yj > lat)) && (lng < (xj - xi) * (lat - yi) / (yj - yi) + xi) {
            inside = !inside;
        }
        j = i;
    }
    inside
}

fn xy(position: &Position) -> Option<&[f64; 2]> {
    position.get(..2)?.try_into().ok()
}
