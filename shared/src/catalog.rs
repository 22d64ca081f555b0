use chrono::{Datelike, NaiveDate};

/// Dataset key whose overlays are categorical and get a class legend.
pub const LANDCOVER: &str = "landcover";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableDescriptor {
    pub key: &'static str,
    pub label: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetDescriptor {
    pub key: &'static str,
    pub label: &'static str,
    pub variables: &'static [VariableDescriptor],
    /// First acquisition date, as (year, month, day).
    pub min_date: (i32, u32, u32),
    /// Last selectable year, fixed per dataset so validation does not depend on the clock.
    pub max_year: i32,
}

impl DatasetDescriptor {
    pub fn min_date(&self) -> NaiveDate {
        let (y, m, d) = self.min_date;
        NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN)
    }

    pub fn variable(&self, key: &str) -> Option<&VariableDescriptor> {
        self.variables.iter().find(|v| v.key == key)
    }

    pub fn has_variable(&self, key: &str) -> bool {
        self.variable(key).is_some()
    }

    /// Years offered by the pickers, oldest first.
    pub fn years(&self) -> std::ops::RangeInclusive<i32> {
        self.min_date().year()..=self.max_year
    }

    pub fn is_categorical(&self) -> bool {
        self.key == LANDCOVER
    }
}

const fn var(key: &'static str, label: &'static str) -> VariableDescriptor {
    VariableDescriptor { key, label }
}

static DATASETS: &[DatasetDescriptor] = &[
    DatasetDescriptor {
        key: LANDCOVER,
        label: "Land cover",
        variables: &[
            var("dynamic", "Dynamic World"),
            var("esa", "ESA WorldCover"),
        ],
        min_date: (2015, 6, 27),
        max_year: 2024,
    },
    DatasetDescriptor {
        key: "sentinel2",
        label: "Sentinel-2",
        variables: &[
            var("NDVI", "NDVI"),
            var("EVI", "EVI"),
            var("NDWI", "NDWI"),
            var("SAVI", "SAVI"),
        ],
        min_date: (2017, 3, 28),
        max_year: 2025,
    },
    DatasetDescriptor {
        key: "landsat",
        label: "Landsat (4–8)",
        variables: &[
            var("NDVI", "NDVI"),
            var("NDWI", "NDWI"),
            var("EVI", "EVI"),
            var("NBR", "NBR"),
        ],
        min_date: (1984, 3, 16),
        max_year: 2024,
    },
    DatasetDescriptor {
        key: "modis",
        label: "MODIS",
        variables: &[
            var("NDVI", "NDVI"),
            var("EVI", "EVI"),
            var("LST", "Land surface temperature"),
        ],
        min_date: (2000, 2, 18),
        max_year: 2025,
    },
    DatasetDescriptor {
        key: "climate",
        label: "Climate",
        variables: &[
            var("precipitation", "Precipitation (CHIRPS)"),
            var("temperature", "Air temperature (ERA5)"),
        ],
        min_date: (1981, 1, 1),
        max_year: 2024,
    },
];

/// Static, process-wide table of the datasets the analysis service can render.
#[derive(Debug, Clone, Copy, Default)]
pub struct DatasetCatalog;

impl DatasetCatalog {
    pub fn all(&self) -> &'static [DatasetDescriptor] {
        DATASETS
    }

    pub fn get(&self, key: &str) -> Option<&'static DatasetDescriptor> {
        DATASETS.iter().find(|d| d.key == key)
    }

    pub fn variables(&self, key: &str) -> &'static [VariableDescriptor] {
        self.get(key).map(|d| d.variables).unwrap_or(&[])
    }
}

pub const MONTHS: std::ops::RangeInclusive<u32> = 1..=12;
pub const DAYS: std::ops::RangeInclusive<u32> = 1..=31;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_unique() {
        let catalog = DatasetCatalog;
        for (i, a) in catalog.all().iter().enumerate() {
            for b in &catalog.all()[i + 1..] {
                assert_ne!(a.key, b.key);
            }
        }
    }

    #[test]
    fn every_dataset_has_variables_and_a_valid_window() {
        for dataset in DatasetCatalog.all() {
            assert!(!dataset.variables.is_empty(), "{} has no variables", dataset.key);
            assert_ne!(dataset.min_date(), NaiveDate::MIN, "{} min date", dataset.key);
            assert!(dataset.years().start() <= dataset.years().end());
        }
    }

    #[test]
    fn surfaced_variables_belong_to_their_dataset() {
        let catalog = DatasetCatalog;
        for dataset in catalog.all() {
            for variable in catalog.variables(dataset.key) {
                assert!(dataset.has_variable(variable.key));
            }
        }
    }

    #[test]
    fn unknown_dataset_has_no_variables() {
        assert!(DatasetCatalog.variables("aster").is_empty());
        assert!(DatasetCatalog.get("aster").is_none());
    }

    #[test]
    fn only_landcover_is_categorical() {
        let categorical: Vec<_> = DatasetCatalog
            .all()
            .iter()
            .filter(|d| d.is_categorical())
            .map(|d| d.key)
            .collect();
        assert_eq!(categorical, vec![LANDCOVER]);
    }
}
