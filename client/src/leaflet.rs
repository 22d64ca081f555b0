//! Leaflet-backed `MapSurface`. Leaflet itself is loaded as a global `L` by index.html.
//! The legend is not drawn by Leaflet; it is published to a signal the app renders.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::LocalBoxFuture;
use leptos::prelude::{RwSignal, Set};
use serde::Serialize;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

use geoportal_shared::config::{BASE_TILE_ATTRIBUTION, BASE_TILE_URL, MAP_CENTER, MAP_ZOOM};
use geoportal_shared::{
    AdminLevel, BoundarySet, Bounds, FeatureStyle, Geometry, LayerHandle, Legend, MapSurface, TileLoadStatus,
};

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_name = Map)]
    type LeafletMap;

    #[wasm_bindgen(js_namespace = L, js_name = map)]
    fn new_map(element_id: &str, options: &JsValue) -> LeafletMap;

    #[wasm_bindgen(method, js_name = fitBounds)]
    fn fit_bounds(this: &LeafletMap, bounds: &JsValue);

    #[wasm_bindgen(method, js_name = on)]
    fn on_map(this: &LeafletMap, event: &str, handler: &js_sys::Function);

    #[wasm_bindgen(method, js_name = remove)]
    fn remove_map(this: &LeafletMap);

    #[wasm_bindgen(js_name = Layer)]
    type LeafletLayer;

    #[wasm_bindgen(js_namespace = L, js_name = tileLayer)]
    fn tile_layer(url_template: &str, options: &JsValue) -> LeafletLayer;

    #[wasm_bindgen(js_namespace = L, js_name = geoJSON)]
    fn geo_json(data: &JsValue, options: &JsValue) -> LeafletLayer;

    #[wasm_bindgen(method, js_name = addTo)]
    fn add_to(this: &LeafletLayer, map: &LeafletMap);

    #[wasm_bindgen(method, js_name = remove)]
    fn remove_layer(this: &LeafletLayer);

    #[wasm_bindgen(method, js_name = on)]
    fn on_layer(this: &LeafletLayer, event: &str, handler: &js_sys::Function);

    #[wasm_bindgen(method, js_name = setStyle)]
    fn set_style(this: &LeafletLayer, style: &JsValue);

    #[wasm_bindgen(method, js_name = bringToFront)]
    fn bring_to_front(this: &LeafletLayer);
}

#[derive(Serialize)]
struct PathStyle {
    color: &'static str,
    weight: f64,
    #[serde(rename = "fillOpacity")]
    fill_opacity: f64,
}

const BOUNDARY_STYLE: PathStyle = PathStyle {
    color: "#3388ff",
    weight: 1.0,
    fill_opacity: 0.05,
};

const HIGHLIGHT_STYLE: PathStyle = PathStyle {
    color: "#ff7800",
    weight: 3.0,
    fill_opacity: 0.2,
};

const CUSTOM_STYLE: PathStyle = PathStyle {
    color: "#e31a1c",
    weight: 2.0,
    fill_opacity: 0.1,
};

fn to_js<T: Serialize + ?Sized>(value: &T) -> JsValue {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .unwrap_or(JsValue::UNDEFINED)
}

type LoadSender = Rc<RefCell<Option<oneshot::Sender<TileLoadStatus>>>>;

enum Entry {
    Vector {
        layer: LeafletLayer,
        /// Per-feature sub-layers, so one feature can be restyled by name.
        features: HashMap<String, LeafletLayer>,
        visible: bool,
    },
    Tiles {
        layer: LeafletLayer,
        loaded: RefCell<Option<oneshot::Receiver<TileLoadStatus>>>,
        _listeners: Vec<Closure<dyn FnMut(JsValue)>>,
    },
    Legend,
}

pub struct LeafletSurface {
    map: LeafletMap,
    entries: HashMap<u64, Entry>,
    next_id: u64,
    legend: RwSignal<Option<Legend>>,
    _on_click: Closure<dyn FnMut(JsValue)>,
}

impl LeafletSurface {
    /// Create the map inside `element_id`; `handler` receives `(lng, lat)` for every map click.
    pub fn mount(
        element_id: &str,
        legend: RwSignal<Option<Legend>>,
        handler: impl Fn(f64, f64) + 'static,
    ) -> Result<Self, String> {
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or("no document")?;
        if document.get_element_by_id(element_id).is_none() {
            return Err(format!("map container #{element_id} not found"));
        }

        let map = new_map(
            element_id,
            &to_js(&serde_json::json!({ "center": MAP_CENTER, "zoom": MAP_ZOOM })),
        );
        tile_layer(
            BASE_TILE_URL,
            &to_js(&serde_json::json!({ "attribution": BASE_TILE_ATTRIBUTION, "maxZoom": 19 })),
        )
        .add_to(&map);

        let on_click = Closure::<dyn FnMut(JsValue)>::new(move |event: JsValue| {
            let Ok(latlng) = js_sys::Reflect::get(&event, &"latlng".into()) else {
                return;
            };
            let coord = |key: &str| js_sys::Reflect::get(&latlng, &key.into()).ok().and_then(|v| v.as_f64());
            if let (Some(lng), Some(lat)) = (coord("lng"), coord("lat")) {
                handler(lng, lat);
            }
        });
        map.on_map("click", on_click.as_ref().unchecked_ref());

        tracing::debug!(element_id, "map mounted");
        Ok(Self {
            map,
            entries: HashMap::new(),
            next_id: 0,
            legend,
            _on_click: on_click,
        })
    }

    fn insert(&mut self, entry: Entry) -> LayerHandle {
        self.next_id += 1;
        self.entries.insert(self.next_id, entry);
        LayerHandle(self.next_id)
    }
}

fn feature_collection<'a>(features: impl Iterator<Item = (&'a str, &'a Geometry)>) -> serde_json::Value {
    let features: Vec<_> = features
        .map(|(name, geometry)| {
            serde_json::json!({
                "type": "Feature",
                "properties": { "name": name },
                "geometry": geometry,
            })
        })
        .collect();
    serde_json::json!({ "type": "FeatureCollection", "features": features })
}

fn feature_name(feature: &JsValue) -> Option<String> {
    let properties = js_sys::Reflect::get(feature, &"properties".into()).ok()?;
    js_sys::Reflect::get(&properties, &"name".into()).ok()?.as_string()
}

impl MapSurface for LeafletSurface {
    fn add_boundary_layer(&mut self, level: AdminLevel, features: &BoundarySet) -> LayerHandle {
        let data = feature_collection(features.values().map(|f| (f.name.as_str(), &f.geometry)));
        let index: Rc<RefCell<HashMap<String, LeafletLayer>>> = Rc::default();
        let on_each = {
            let index = Rc::clone(&index);
            Closure::<dyn FnMut(JsValue, JsValue)>::new(move |feature: JsValue, layer: JsValue| {
                if let Some(name) = feature_name(&feature) {
                    index.borrow_mut().insert(name, layer.unchecked_into());
                }
            })
        };
        let options = js_sys::Object::new();
        js_sys::Reflect::set(&options, &"style".into(), &to_js(&BOUNDARY_STYLE)).ok();
        js_sys::Reflect::set(&options, &"onEachFeature".into(), on_each.as_ref()).ok();

        let layer = geo_json(&to_js(&data), &options);
        // onEachFeature runs synchronously inside geoJSON(), so the closure is done here.
        drop(on_each);
        let features = index.take();
        tracing::debug!(level = level.number(), features = features.len(), "boundary layer built");

        self.insert(Entry::Vector {
            layer,
            features,
            visible: false,
        })
    }

    fn add_geometry_layer(&mut self, geometry: &Geometry) -> LayerHandle {
        let options = to_js(&serde_json::json!({ "style": CUSTOM_STYLE }));
        let layer = geo_json(&to_js(geometry), &options);
        layer.add_to(&self.map);
        self.insert(Entry::Vector {
            layer,
            features: HashMap::new(),
            visible: true,
        })
    }

    fn add_tile_layer(&mut self, url_template: &str) -> LayerHandle {
        let layer = tile_layer(url_template, &to_js(&serde_json::json!({ "opacity": 0.8 })));
        let (tx, rx) = oneshot::channel();
        let sender: LoadSender = Rc::new(RefCell::new(Some(tx)));

        let listeners: Vec<Closure<dyn FnMut(JsValue)>> = [
            ("load", TileLoadStatus::Loaded),
            ("tileerror", TileLoadStatus::Failed),
            ("remove", TileLoadStatus::Detached),
        ]
        .into_iter()
        .map(|(event, status)| {
            let sender = Rc::clone(&sender);
            let listener = Closure::<dyn FnMut(JsValue)>::new(move |_: JsValue| {
                if let Some(tx) = sender.borrow_mut().take() {
                    let _ = tx.send(status);
                }
            });
            layer.on_layer(event, listener.as_ref().unchecked_ref());
            listener
        })
        .collect();

        layer.add_to(&self.map);
        self.insert(Entry::Tiles {
            layer,
            loaded: RefCell::new(Some(rx)),
            _listeners: listeners,
        })
    }

    fn tile_layer_loaded(&self, layer: LayerHandle) -> LocalBoxFuture<'static, TileLoadStatus> {
        let receiver = match self.entries.get(&layer.0) {
            Some(Entry::Tiles { loaded, .. }) => loaded.borrow_mut().take(),
            _ => None,
        };
        match receiver {
            Some(rx) => rx.map(|status| status.unwrap_or(TileLoadStatus::Detached)).boxed_local(),
            None => futures::future::ready(TileLoadStatus::Detached).boxed_local(),
        }
    }

    fn add_legend(&mut self, legend: &Legend) -> LayerHandle {
        self.legend.set(Some(legend.clone()));
        self.insert(Entry::Legend)
    }

    fn show_layer(&mut self, layer: LayerHandle) {
        if let Some(Entry::Vector { layer, visible, .. }) = self.entries.get_mut(&layer.0) {
            if !*visible {
                layer.add_to(&self.map);
                layer.bring_to_front();
                *visible = true;
            }
        }
    }

    fn hide_layer(&mut self, layer: LayerHandle) {
        if let Some(Entry::Vector { layer, visible, .. }) = self.entries.get_mut(&layer.0) {
            if *visible {
                layer.remove_layer();
                *visible = false;
            }
        }
    }

    fn remove_layer(&mut self, layer: LayerHandle) {
        match self.entries.remove(&layer.0) {
            Some(Entry::Vector { layer, .. }) | Some(Entry::Tiles { layer, .. }) => layer.remove_layer(),
            Some(Entry::Legend) => self.legend.set(None),
            None => {}
        }
    }

    fn set_feature_style(&mut self, layer: LayerHandle, feature: &str, style: FeatureStyle) {
        let Some(Entry::Vector { features, .. }) = self.entries.get(&layer.0) else {
            return;
        };
        let Some(sublayer) = features.get(feature) else {
            return;
        };
        match style {
            FeatureStyle::Default => sublayer.set_style(&to_js(&BOUNDARY_STYLE)),
            FeatureStyle::Highlighted => {
                sublayer.set_style(&to_js(&HIGHLIGHT_STYLE));
                sublayer.bring_to_front();
            }
        }
    }

    fn fit_bounds(&mut self, bounds: Bounds) {
        let corners = [[bounds.min_lat, bounds.min_lng], [bounds.max_lat, bounds.max_lng]];
        self.map.fit_bounds(&to_js(&corners));
    }

    fn teardown(&mut self) {
        for (_, entry) in self.entries.drain() {
            if let Entry::Vector { layer, .. } | Entry::Tiles { layer, .. } = entry {
                layer.remove_layer();
            }
        }
        self.legend.set(None);
        self.map.remove_map();
    }
}
