use std::rc::Rc;

use crate::boundary::{AdminLevel, BoundaryRegistry};
use crate::catalog::{DatasetCatalog, VariableDescriptor};
use crate::dates::PartialDate;
use crate::error::{BoundaryLoadError, ExplorerError, ValidationError};
use crate::geometry::{Bounds, Geometry};
use crate::surface::{MapSession, MapSurface};
use crate::upload::CustomGeometryImporter;

pub const CUSTOM_AREA_LABEL: &str = "CustomArea";

/// Boundary-mode selection: `Empty → LevelChosen → FeatureChosen`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoundaryChoice {
    pub level: Option<AdminLevel>,
    pub feature_names: Vec<String>,
    pub feature: Option<String>,
}

/// Exactly one geometry source is active at a time.
#[derive(Debug, Clone, PartialEq)]
pub enum GeometrySource {
    Boundary(BoundaryChoice),
    Custom(Option<Rc<Geometry>>),
}

impl Default for GeometrySource {
    fn default() -> Self {
        Self::Boundary(BoundaryChoice::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPhase {
    Empty,
    LevelChosen,
    FeatureChosen,
    CustomIdle,
    CustomLoaded,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectionState {
    pub source: GeometrySource,
    pub dataset: Option<String>,
    pub variable: Option<String>,
    pub variables: &'static [VariableDescriptor],
    pub years: Vec<i32>,
    pub from: PartialDate,
    pub to: PartialDate,
}

impl SelectionState {
    pub fn phase(&self) -> SelectionPhase {
        match &self.source {
            GeometrySource::Boundary(choice) => match (choice.level, &choice.feature) {
                (None, _) => SelectionPhase::Empty,
                (Some(_), None) => SelectionPhase::LevelChosen,
                (Some(_), Some(_)) => SelectionPhase::FeatureChosen,
            },
            GeometrySource::Custom(None) => SelectionPhase::CustomIdle,
            GeometrySource::Custom(Some(_)) => SelectionPhase::CustomLoaded,
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self.source, GeometrySource::Custom(_))
    }

    pub fn boundary(&self) -> Option<&BoundaryChoice> {
        match &self.source {
            GeometrySource::Boundary(choice) => Some(choice),
            GeometrySource::Custom(_) => None,
        }
    }
}

/// Input events from the explorer controls and the map.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionEvent {
    ChooseLevel(AdminLevel),
    /// An empty name clears the feature.
    ChooseFeatureByName(String),
    ChooseFeatureByMapClick { lng: f64, lat: f64 },
    SwitchToCustomMode,
    SwitchToBoundaryMode,
    /// An empty key clears the dataset.
    ChooseDataset(String),
    ChooseVariable(String),
    SetDateRange { from: PartialDate, to: PartialDate },
    Reset,
}

/// Rendering-surface changes a transition asks for, applied by `MapSession::apply`.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEffect {
    ShowBoundaryLevel(AdminLevel),
    HideBoundaries,
    Highlight { level: AdminLevel, name: String },
    ClearHighlight,
    FitBounds(Bounds),
    ShowCustomGeometry(Rc<Geometry>),
    ClearCustomGeometry,
}

#[derive(Debug, Clone, Default)]
enum Boundaries {
    #[default]
    Loading,
    Ready(Rc<BoundaryRegistry>),
    Failed,
}

/// Everything a request needs, detached from the controller so it can outlive
/// the borrow while the request is in flight.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectionSnapshot {
    pub geometry: Option<Geometry>,
    pub label: String,
    pub dataset: Option<String>,
    pub variable: Option<String>,
    pub from: PartialDate,
    pub to: PartialDate,
}

/// Owns the current selection and enforces its invariants. Transitions never touch
/// the map directly; they return the `ViewEffect`s describing what should change.
#[derive(Debug, Clone, Default)]
pub struct SelectionController {
    catalog: DatasetCatalog,
    boundaries: Boundaries,
    state: SelectionState,
}

impl SelectionController {
    pub fn new(catalog: DatasetCatalog) -> Self {
        Self {
            catalog,
            ..Self::default()
        }
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn registry(&self) -> Option<&BoundaryRegistry> {
        match &self.boundaries {
            Boundaries::Ready(registry) => Some(registry.as_ref()),
            _ => None,
        }
    }

    pub fn boundaries_failed(&self) -> bool {
        matches!(self.boundaries, Boundaries::Failed)
    }

    /// Install the loaded registry. A level chosen while loading gets its list now.
    pub fn boundaries_loaded(&mut self, registry: Rc<BoundaryRegistry>) -> Vec<ViewEffect> {
        self.boundaries = Boundaries::Ready(registry);
        match self.state.boundary().and_then(|choice| choice.level) {
            Some(level) => self.choose_level(level),
            None => Vec::new(),
        }
    }

    /// Record a terminal load failure; the error is handed back once for display and
    /// boundary events become no-ops afterwards. Custom uploads keep working.
    pub fn boundaries_unavailable(&mut self, error: BoundaryLoadError) -> ExplorerError {
        tracing::warn!(%error, "boundary mode disabled for this session");
        self.boundaries = Boundaries::Failed;
        if let GeometrySource::Boundary(choice) = &mut self.state.source {
            *choice = BoundaryChoice::default();
        }
        error.into()
    }

    pub fn dispatch(&mut self, event: SelectionEvent) -> Result<Vec<ViewEffect>, ExplorerError> {
        tracing::debug!(?event, "selection event");
        match event {
            SelectionEvent::ChooseLevel(level) => {
                if self.boundaries_failed() {
                    return Ok(Vec::new());
                }
                let mut effects = self.leave_custom_mode();
                effects.extend(self.choose_level(level));
                Ok(effects)
            }
            SelectionEvent::ChooseFeatureByName(name) => {
                if name.is_empty() {
                    return Ok(self.clear_feature());
                }
                self.choose_feature(&name)
            }
            SelectionEvent::ChooseFeatureByMapClick { lng, lat } => {
                let (Some(registry), Some(level)) = (
                    self.registry(),
                    self.state.boundary().and_then(|choice| choice.level),
                ) else {
                    return Ok(Vec::new());
                };
                match registry.feature_at(level, lng, lat) {
                    Some(feature) => {
                        let name = feature.name.clone();
                        self.choose_feature(&name)
                    }
                    None => Ok(Vec::new()),
                }
            }
            SelectionEvent::SwitchToCustomMode => {
                if self.state.is_custom() {
                    return Ok(Vec::new());
                }
                self.state.source = GeometrySource::Custom(None);
                Ok(vec![ViewEffect::ClearHighlight, ViewEffect::HideBoundaries])
            }
            SelectionEvent::SwitchToBoundaryMode => Ok(self.leave_custom_mode()),
            SelectionEvent::ChooseDataset(key) => {
                self.choose_dataset(&key)?;
                Ok(Vec::new())
            }
            SelectionEvent::ChooseVariable(key) => {
                self.choose_variable(&key)?;
                Ok(Vec::new())
            }
            SelectionEvent::SetDateRange { from, to } => {
                self.state.from = from;
                self.state.to = to;
                Ok(Vec::new())
            }
            SelectionEvent::Reset => {
                self.state = SelectionState::default();
                Ok(vec![
                    ViewEffect::ClearHighlight,
                    ViewEffect::HideBoundaries,
                    ViewEffect::ClearCustomGeometry,
                ])
            }
        }
    }

    /// Dispatch and apply the resulting effects to the map in one step.
    pub fn handle<S: MapSurface>(
        &mut self,
        event: SelectionEvent,
        session: &MapSession<S>,
    ) -> Result<(), ExplorerError> {
        let effects = self.dispatch(event)?;
        session.apply(&effects, self.registry());
        Ok(())
    }

    /// Parse an uploaded document and switch to custom mode with it. A parse failure
    /// leaves the current selection exactly as it was.
    pub fn load_custom(
        &mut self,
        importer: &CustomGeometryImporter,
        contents: &str,
    ) -> Result<Vec<ViewEffect>, ExplorerError> {
        let geometry = Rc::new(importer.parse(contents)?);
        let mut effects = Vec::new();
        if !self.state.is_custom() {
            effects.extend([ViewEffect::ClearHighlight, ViewEffect::HideBoundaries]);
        }
        self.state.source = GeometrySource::Custom(Some(Rc::clone(&geometry)));
        effects.push(ViewEffect::ShowCustomGeometry(Rc::clone(&geometry)));
        if let Some(bounds) = geometry.bounds() {
            effects.push(ViewEffect::FitBounds(bounds));
        }
        Ok(effects)
    }

    pub fn active_geometry(&self) -> Option<&Geometry> {
        match &self.state.source {
            GeometrySource::Boundary(choice) => {
                let (level, name) = (choice.level?, choice.feature.as_deref()?);
                self.registry()?.lookup(level, name).map(|f| &f.geometry)
            }
            GeometrySource::Custom(geometry) => geometry.as_deref(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.active_geometry().is_some()
            && self.state.dataset.is_some()
            && self.state.variable.is_some()
            && self.state.from.is_present()
            && self.state.to.is_present()
    }

    /// Display label used for download names.
    pub fn label(&self) -> String {
        match &self.state.source {
            GeometrySource::Boundary(choice) => choice.feature.clone().unwrap_or_default(),
            GeometrySource::Custom(_) => CUSTOM_AREA_LABEL.to_string(),
        }
    }

    pub fn snapshot(&self) -> SelectionSnapshot {
        SelectionSnapshot {
            geometry: self.active_geometry().cloned(),
            label: self.label(),
            dataset: self.state.dataset.clone(),
            variable: self.state.variable.clone(),
            from: self.state.from,
            to: self.state.to,
        }
    }

    fn leave_custom_mode(&mut self) -> Vec<ViewEffect> {
        if !self.state.is_custom() {
            return Vec::new();
        }
        self.state.source = GeometrySource::Boundary(BoundaryChoice::default());
        vec![ViewEffect::ClearCustomGeometry]
    }

    fn choose_level(&mut self, level: AdminLevel) -> Vec<ViewEffect> {
        let feature_names = self
            .registry()
            .map(|registry| registry.names(level))
            .unwrap_or_default();
        let loaded = self.registry().is_some();
        self.state.source = GeometrySource::Boundary(BoundaryChoice {
            level: Some(level),
            feature_names,
            feature: None,
        });
        let mut effects = vec![ViewEffect::ClearHighlight];
        if loaded {
            effects.push(ViewEffect::ShowBoundaryLevel(level));
        }
        effects
    }

    fn clear_feature(&mut self) -> Vec<ViewEffect> {
        match &mut self.state.source {
            GeometrySource::Boundary(choice) if choice.feature.is_some() => {
                choice.feature = None;
                vec![ViewEffect::ClearHighlight]
            }
            _ => Vec::new(),
        }
    }

    /// Shared tail of both feature entry points, so they converge on identical state.
    fn choose_feature(&mut self, name: &str) -> Result<Vec<ViewEffect>, ExplorerError> {
        let level = self
            .state
            .boundary()
            .and_then(|choice| choice.level)
            .ok_or(ValidationError::Missing("an administrative level"))?;
        let registry = self
            .registry()
            .ok_or(ValidationError::Missing("an administrative level"))?;
        let feature = registry
            .lookup(level, name)
            .ok_or_else(|| ValidationError::UnknownFeature(name.to_string()))?;
        let bounds = feature.bounds;

        if let GeometrySource::Boundary(choice) = &mut self.state.source {
            choice.feature = Some(name.to_string());
        }

        let mut effects = vec![ViewEffect::Highlight {
            level,
            name: name.to_string(),
        }];
        if let Some(bounds) = bounds {
            effects.push(ViewEffect::FitBounds(bounds));
        }
        Ok(effects)
    }

    fn choose_dataset(&mut self, key: &str) -> Result<(), ValidationError> {
        self.state.variable = None;
        if key.is_empty() {
            self.state.dataset = None;
            self.state.variables = &[];
            self.state.years.clear();
            return Ok(());
        }
        let dataset = self
            .catalog
            .get(key)
            .ok_or_else(|| ValidationError::UnknownDataset(key.to_string()))?;
        self.state.dataset = Some(dataset.key.to_string());
        self.state.variables = dataset.variables;
        self.state.years = dataset.years().collect();
        Ok(())
    }

    fn choose_variable(&mut self, key: &str) -> Result<(), ValidationError> {
        let dataset_key = self
            .state
            .dataset
            .as_deref()
            .ok_or(ValidationError::Missing("a dataset"))?;
        if key.is_empty() {
            self.state.variable = None;
            return Ok(());
        }
        let dataset = self
            .catalog
            .get(dataset_key)
            .ok_or_else(|| ValidationError::UnknownDataset(dataset_key.to_string()))?;
        if !dataset.has_variable(key) {
            return Err(ValidationError::UnknownVariable {
                dataset: dataset.key.to_string(),
                variable: key.to_string(),
            });
        }
        self.state.variable = Some(key.to_string());
        Ok(())
    }
}
