//! Rendering-surface seam and the session state that keeps it consistent.

use std::cell::RefCell;
use std::collections::HashMap;

use futures::future::LocalBoxFuture;

use crate::boundary::{AdminLevel, BoundaryRegistry, BoundarySet};
use crate::geometry::{Bounds, Geometry};
use crate::legend::Legend;
use crate::selection::ViewEffect;

/// Opaque id for anything added to the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureStyle {
    Default,
    Highlighted,
}

/// How a tile layer's first load ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileLoadStatus {
    Loaded,
    Failed,
    /// The layer was removed before it finished loading.
    Detached,
}

/// A slippy map that can hold vector layers, one raster overlay and a legend.
/// Implementations only draw; `MapSession` decides what is on the map.
pub trait MapSurface {
    fn add_boundary_layer(&mut self, level: AdminLevel, features: &BoundarySet) -> LayerHandle;
    fn add_geometry_layer(&mut self, geometry: &Geometry) -> LayerHandle;
    fn add_tile_layer(&mut self, url_template: &str) -> LayerHandle;
    /// Resolves once the layer's first tiles loaded or failed. Must not borrow the surface.
    fn tile_layer_loaded(&self, layer: LayerHandle) -> LocalBoxFuture<'static, TileLoadStatus>;
    fn add_legend(&mut self, legend: &Legend) -> LayerHandle;
    fn show_layer(&mut self, layer: LayerHandle);
    fn hide_layer(&mut self, layer: LayerHandle);
    fn remove_layer(&mut self, layer: LayerHandle);
    fn set_feature_style(&mut self, layer: LayerHandle, feature: &str, style: FeatureStyle);
    fn fit_bounds(&mut self, bounds: Bounds);
    fn teardown(&mut self);
}

struct SessionState<S> {
    surface: S,
    /// Built lazily, then shown and hidden as the level changes.
    boundary_layers: HashMap<AdminLevel, LayerHandle>,
    visible_level: Option<AdminLevel>,
    highlighted: Option<(AdminLevel, String)>,
    custom_layer: Option<LayerHandle>,
    overlay: Option<LayerHandle>,
    legend: Option<LayerHandle>,
    closed: bool,
}

/// Owns the surface for one page session and holds at most one overlay, one legend,
/// one highlighted feature and one custom geometry layer at any time.
///
/// Methods take `&self` so in-flight requests can share the session; no borrow is
/// held across an await.
pub struct MapSession<S: MapSurface> {
    state: RefCell<SessionState<S>>,
}

impl<S: MapSurface> MapSession<S> {
    pub fn init(surface: S) -> Self {
        Self {
            state: RefCell::new(SessionState {
                surface,
                boundary_layers: HashMap::new(),
                visible_level: None,
                highlighted: None,
                custom_layer: None,
                overlay: None,
                legend: None,
                closed: false,
            }),
        }
    }

    /// Remove every layer this session added, then tear the surface down. Requests
    /// still holding the session afterwards find no overlay to detach. Idempotent.
    pub fn teardown(&self) {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        if state.closed {
            return;
        }
        let layers: Vec<LayerHandle> = state
            .boundary_layers
            .drain()
            .map(|(_, layer)| layer)
            .chain(state.custom_layer.take())
            .chain(state.overlay.take())
            .chain(state.legend.take())
            .collect();
        for layer in layers {
            state.surface.remove_layer(layer);
        }
        state.visible_level = None;
        state.highlighted = None;
        state.surface.teardown();
        state.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.state.borrow().closed
    }

    pub fn apply(&self, effects: &[ViewEffect], registry: Option<&BoundaryRegistry>) {
        let mut state = self.state.borrow_mut();
        for effect in effects {
            match effect {
                ViewEffect::ShowBoundaryLevel(level) => state.show_level(*level, registry),
                ViewEffect::HideBoundaries => state.hide_boundaries(),
                ViewEffect::Highlight { level, name } => state.highlight(*level, name),
                ViewEffect::ClearHighlight => state.clear_highlight(),
                ViewEffect::FitBounds(bounds) => state.surface.fit_bounds(*bounds),
                ViewEffect::ShowCustomGeometry(geometry) => {
                    if let Some(old) = state.custom_layer.take() {
                        state.surface.remove_layer(old);
                    }
                    let layer = state.surface.add_geometry_layer(geometry);
                    state.custom_layer = Some(layer);
                }
                ViewEffect::ClearCustomGeometry => {
                    if let Some(old) = state.custom_layer.take() {
                        state.surface.remove_layer(old);
                    }
                }
            }
        }
    }

    /// Replace the overlay with a new tile layer.
    pub fn attach_overlay(&self, url_template: &str) -> LayerHandle {
        let mut state = self.state.borrow_mut();
        if let Some(old) = state.overlay.take() {
            state.surface.remove_layer(old);
        }
        let layer = state.surface.add_tile_layer(url_template);
        state.overlay = Some(layer);
        layer
    }

    pub fn overlay_loaded(&self, layer: LayerHandle) -> LocalBoxFuture<'static, TileLoadStatus> {
        self.state.borrow().surface.tile_layer_loaded(layer)
    }

    /// Remove `layer` if it is still the current overlay.
    pub fn detach_overlay(&self, layer: LayerHandle) {
        let mut state = self.state.borrow_mut();
        if state.overlay == Some(layer) {
            state.overlay = None;
            state.surface.remove_layer(layer);
        }
    }

    pub fn replace_legend(&self, legend: &Legend) {
        let mut state = self.state.borrow_mut();
        if let Some(old) = state.legend.take() {
            state.surface.remove_layer(old);
        }
        let layer = state.surface.add_legend(legend);
        state.legend = Some(layer);
    }

    pub fn release_overlay_and_legend(&self) {
        let mut state = self.state.borrow_mut();
        let layers: Vec<_> = state.overlay.take().into_iter().chain(state.legend.take()).collect();
        for layer in layers {
            state.surface.remove_layer(layer);
        }
    }

    pub fn fit_bounds(&self, bounds: Bounds) {
        self.state.borrow_mut().surface.fit_bounds(bounds);
    }

    pub fn highlighted(&self) -> Option<(AdminLevel, String)> {
        self.state.borrow().highlighted.clone()
    }

    pub fn overlay(&self) -> Option<LayerHandle> {
        self.state.borrow().overlay
    }

    pub fn has_legend(&self) -> bool {
        self.state.borrow().legend.is_some()
    }

    pub fn with_surface<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.state.borrow().surface)
    }
}

impl<S: MapSurface> SessionState<S> {
    fn show_level(&mut self, level: AdminLevel, registry: Option<&BoundaryRegistry>) {
        if self.visible_level == Some(level) {
            return;
        }
        let layer = match self.boundary_layers.get(&level).copied() {
            Some(layer) => layer,
            None => {
                let Some(registry) = registry else {
                    tracing::warn!(level = level.number(), "boundaries not loaded, nothing to show");
                    return;
                };
                let layer = self.surface.add_boundary_layer(level, registry.level(level));
                self.boundary_layers.insert(level, layer);
                layer
            }
        };
        self.hide_boundaries();
        self.surface.show_layer(layer);
        self.visible_level = Some(level);
    }

    fn hide_boundaries(&mut self) {
        let Some(level) = self.visible_level.take() else {
            return;
        };
        if let Some(layer) = self.boundary_layers.get(&level) {
            self.surface.hide_layer(*layer);
        }
    }

    fn highlight(&mut self, level: AdminLevel, name: &str) {
        self.clear_highlight();
        if let Some(layer) = self.boundary_layers.get(&level) {
            self.surface.set_feature_style(*layer, name, FeatureStyle::Highlighted);
        }
        self.highlighted = Some((level, name.to_string()));
    }

    fn clear_highlight(&mut self) {
        let Some((level, name)) = self.highlighted.take() else {
            return;
        };
        if let Some(layer) = self.boundary_layers.get(&level) {
            self.surface.set_feature_style(*layer, &name, FeatureStyle::Default);
        }
    }
}
