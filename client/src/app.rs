use std::cell::RefCell;
use std::rc::Rc;

use leptos::prelude::*;
use wasm_bindgen_futures::spawn_local;

use geoportal_shared::catalog::{DAYS, MONTHS};
use geoportal_shared::config::ServiceEndpoints;
use geoportal_shared::selection::GeometrySource;
use geoportal_shared::upload::accepts_file_name;
use geoportal_shared::{
    AdminLevel, BoundaryRegistry, CustomGeometryImporter, DatasetCatalog, ExplorerError, Legend, MapSession,
    OverlayManager, PartialDate, SelectionController, SelectionEvent,
};

use crate::api::{BrowserTimer, HttpAnalysisService, HttpBoundarySource};
use crate::files;
use crate::leaflet::LeafletSurface;
use crate::settings::Settings;

const MAP_ELEMENT_ID: &str = "map";

/// Non-reactive explorer core, shared by event handlers and in-flight requests.
struct Explorer {
    session: MapSession<LeafletSurface>,
    selection: RefCell<SelectionController>,
    overlays: OverlayManager<HttpAnalysisService, BrowserTimer>,
}

thread_local! {
    static EXPLORER: RefCell<Option<Rc<Explorer>>> = const { RefCell::new(None) };
}

fn explorer() -> Option<Rc<Explorer>> {
    EXPLORER.with(|slot| slot.borrow().clone())
}

#[derive(Clone, Debug, PartialEq)]
enum Status {
    Idle,
    Busy(String),
    Info(String),
    Error(String),
}

/// Reactive mirror of the selection, refreshed after every transition.
#[derive(Clone, Copy)]
struct ExplorerSignals {
    level: RwSignal<Option<AdminLevel>>,
    feature_names: RwSignal<Vec<String>>,
    feature: RwSignal<String>,
    custom_mode: RwSignal<bool>,
    boundaries_failed: RwSignal<bool>,
    dataset: RwSignal<String>,
    variable: RwSignal<String>,
    variables: RwSignal<Vec<(String, String)>>,
    years: RwSignal<Vec<i32>>,
    from: DateSignals,
    to: DateSignals,
    complete: RwSignal<bool>,
    status: RwSignal<Status>,
    /// Written by the map surface when an overlay's legend is attached or released.
    legend: RwSignal<Option<Legend>>,
}

#[derive(Clone, Copy)]
struct DateSignals {
    year: RwSignal<String>,
    month: RwSignal<String>,
    day: RwSignal<String>,
}

impl DateSignals {
    fn new() -> Self {
        Self {
            year: RwSignal::new(String::new()),
            month: RwSignal::new(String::new()),
            day: RwSignal::new(String::new()),
        }
    }

    fn partial(&self) -> PartialDate {
        PartialDate {
            year: self.year.get_untracked().parse().ok(),
            month: self.month.get_untracked().parse().ok(),
            day: self.day.get_untracked().parse().ok(),
        }
    }

    fn clear(&self) {
        self.year.set(String::new());
        self.month.set(String::new());
        self.day.set(String::new());
    }
}

impl ExplorerSignals {
    fn new() -> Self {
        Self {
            level: RwSignal::new(None),
            feature_names: RwSignal::new(Vec::new()),
            feature: RwSignal::new(String::new()),
            custom_mode: RwSignal::new(false),
            boundaries_failed: RwSignal::new(false),
            dataset: RwSignal::new(String::new()),
            variable: RwSignal::new(String::new()),
            variables: RwSignal::new(Vec::new()),
            years: RwSignal::new(Vec::new()),
            from: DateSignals::new(),
            to: DateSignals::new(),
            complete: RwSignal::new(false),
            status: RwSignal::new(Status::Idle),
            legend: RwSignal::new(None),
        }
    }

    fn sync(&self, controller: &SelectionController) {
        let state = controller.state();
        match &state.source {
            GeometrySource::Boundary(choice) => {
                self.custom_mode.set(false);
                self.level.set(choice.level);
                self.feature_names.set(choice.feature_names.clone());
                self.feature.set(choice.feature.clone().unwrap_or_default());
            }
            GeometrySource::Custom(_) => {
                self.custom_mode.set(true);
                self.feature_names.set(Vec::new());
                self.feature.set(String::new());
            }
        }
        self.boundaries_failed.set(controller.boundaries_failed());
        self.dataset.set(state.dataset.clone().unwrap_or_default());
        self.variable.set(state.variable.clone().unwrap_or_default());
        self.variables.set(
            state
                .variables
                .iter()
                .map(|v| (v.key.to_string(), v.label.to_string()))
                .collect(),
        );
        self.years.set(state.years.clone());
        self.complete.set(controller.is_complete());
    }

    fn report(&self, error: ExplorerError) {
        if error.is_canceled() {
            return;
        }
        tracing::warn!(%error, "explorer action failed");
        self.status.set(Status::Error(error.to_string()));
    }
}

/// Run one selection event against the shared controller and map.
fn dispatch(signals: ExplorerSignals, event: SelectionEvent) {
    let Some(explorer) = explorer() else {
        return;
    };
    let result = explorer.selection.borrow_mut().handle(event, &explorer.session);
    signals.sync(&explorer.selection.borrow());
    if let Err(error) = result {
        signals.report(error);
    }
}

fn set_dates(signals: ExplorerSignals) {
    dispatch(
        signals,
        SelectionEvent::SetDateRange {
            from: signals.from.partial(),
            to: signals.to.partial(),
        },
    );
}

fn load_boundaries(signals: ExplorerSignals, level: AdminLevel) {
    spawn_local(async move {
        let loaded = BoundaryRegistry::load(&HttpBoundarySource).await;
        let Some(explorer) = explorer() else {
            return;
        };
        match loaded {
            Ok(registry) => {
                let registry = Rc::new(registry);
                let effects = explorer.selection.borrow_mut().boundaries_loaded(Rc::clone(&registry));
                explorer.session.apply(&effects, Some(registry.as_ref()));
                signals.sync(&explorer.selection.borrow());
                if signals.level.get_untracked().is_none() && !signals.custom_mode.get_untracked() {
                    dispatch(signals, SelectionEvent::ChooseLevel(level));
                }
            }
            Err(error) => {
                let error = explorer.selection.borrow_mut().boundaries_unavailable(error);
                signals.sync(&explorer.selection.borrow());
                signals.report(error);
            }
        }
    });
}

fn upload(signals: ExplorerSignals, file: web_sys::File) {
    let name = file.name();
    if !accepts_file_name(&name) {
        signals
            .status
            .set(Status::Error(format!("{name}: expected a .geojson or .json file")));
        return;
    }
    spawn_local(async move {
        let contents = match files::read_text(&file).await {
            Ok(contents) => contents,
            Err(e) => {
                signals.status.set(Status::Error(e));
                return;
            }
        };
        let Some(explorer) = explorer() else {
            return;
        };
        let loaded = explorer
            .selection
            .borrow_mut()
            .load_custom(&CustomGeometryImporter, &contents);
        match loaded {
            Ok(effects) => {
                explorer
                    .session
                    .apply(&effects, explorer.selection.borrow().registry());
                signals.status.set(Status::Info(format!("Loaded {name}")));
            }
            Err(error) => signals.report(error),
        }
        signals.sync(&explorer.selection.borrow());
    });
}

fn request_view(signals: ExplorerSignals) {
    let Some(explorer) = explorer() else {
        return;
    };
    let snapshot = explorer.selection.borrow().snapshot();
    signals.status.set(Status::Busy("Loading map layer…".into()));
    spawn_local(async move {
        match explorer.overlays.request_view(&explorer.session, &snapshot).await {
            Ok(outcome) => signals.status.set(Status::Info(outcome.legend.title().to_string())),
            Err(error) => signals.report(error),
        }
    });
}

fn request_download(signals: ExplorerSignals) {
    let Some(explorer) = explorer() else {
        return;
    };
    let snapshot = explorer.selection.borrow().snapshot();
    signals.status.set(Status::Busy("Preparing download…".into()));
    spawn_local(async move {
        match explorer.overlays.request_download(&snapshot).await {
            Ok(download) => match files::save(&download) {
                Ok(()) => signals.status.set(Status::Info(format!("Saved {}", download.filename))),
                Err(e) => signals.status.set(Status::Error(e)),
            },
            Err(error) => signals.report(error),
        }
    });
}

fn reset(signals: ExplorerSignals) {
    if let Some(explorer) = explorer() {
        explorer.overlays.reset(&explorer.session);
    }
    dispatch(signals, SelectionEvent::Reset);
    signals.from.clear();
    signals.to.clear();
    signals.status.set(Status::Idle);
}

fn install(signals: ExplorerSignals, settings: &Settings) {
    let surface = match LeafletSurface::mount(MAP_ELEMENT_ID, signals.legend, move |lng, lat| {
        dispatch(signals, SelectionEvent::ChooseFeatureByMapClick { lng, lat });
    }) {
        Ok(surface) => surface,
        Err(e) => {
            tracing::error!(error = %e, "map could not be created");
            signals.status.set(Status::Error(e));
            return;
        }
    };

    let explorer = Explorer {
        session: MapSession::init(surface),
        selection: RefCell::new(SelectionController::new(DatasetCatalog)),
        overlays: OverlayManager::new(
            HttpAnalysisService::new(ServiceEndpoints::from_env()),
            BrowserTimer,
            DatasetCatalog,
        ),
    };
    EXPLORER.with(|slot| *slot.borrow_mut() = Some(Rc::new(explorer)));

    if let Some(dataset) = settings.dataset.clone() {
        dispatch(signals, SelectionEvent::ChooseDataset(dataset));
    }
    load_boundaries(signals, settings.level());
}

fn uninstall() {
    let Some(explorer) = EXPLORER.with(|slot| slot.borrow_mut().take()) else {
        return;
    };
    // Aborted requests may still hold the explorer; they resume to an empty session.
    explorer.overlays.reset(&explorer.session);
    explorer.session.teardown();
    tracing::debug!(pending = Rc::strong_count(&explorer) - 1, "map session torn down");
}

/// Root component: the map explorer.
#[component]
pub fn App() -> impl IntoView {
    let signals = ExplorerSignals::new();
    let settings = Settings::load();
    provide_context(signals);

    Effect::new(move || {
        if explorer().is_none() {
            install(signals, &settings);
        }
        on_cleanup(uninstall);
    });

    // Persist the last dataset and level across visits.
    Effect::new(move || {
        let dataset = signals.dataset.get();
        let level = signals.level.get();
        Settings {
            dataset: (!dataset.is_empty()).then_some(dataset),
            admin_level: level.map(AdminLevel::number),
        }
        .save();
    });

    view! {
        <div class="explorer">
            <aside class="controls">
                <AreaControls />
                <DatasetControls />
                <DateControls />
                <div class="actions">
                    // Left enabled when incomplete so the missing field is reported.
                    <button class:ready=move || signals.complete.get() on:click=move |_| request_view(signals)>
                        "View"
                    </button>
                    <button class:ready=move || signals.complete.get() on:click=move |_| request_download(signals)>
                        "Download"
                    </button>
                    <button on:click=move |_| reset(signals)>"Reset"</button>
                </div>
                <StatusLine />
            </aside>
            <main class="map-pane">
                <div id=MAP_ELEMENT_ID class="map"></div>
                <div class="legend-container">
                    <LegendPanel />
                </div>
            </main>
        </div>
    }
}

#[component]
fn AreaControls() -> impl IntoView {
    let signals: ExplorerSignals = expect_context();

    let on_mode = move |ev: leptos::ev::Event| {
        let event = if event_target_value(&ev) == "custom" {
            SelectionEvent::SwitchToCustomMode
        } else {
            SelectionEvent::SwitchToBoundaryMode
        };
        dispatch(signals, event);
    };

    let on_file = move |ev: leptos::ev::Event| {
        let input: web_sys::HtmlInputElement = event_target(&ev);
        if let Some(file) = input.files().and_then(|list| list.get(0)) {
            upload(signals, file);
        }
        input.set_value("");
    };

    view! {
        <fieldset class="area">
            <legend>"Area"</legend>
            <label>
                <input type="radio" name="area-mode" value="boundary"
                    prop:checked=move || !signals.custom_mode.get()
                    on:change=on_mode />
                "Administrative boundary"
            </label>
            <label>
                <input type="radio" name="area-mode" value="custom"
                    prop:checked=move || signals.custom_mode.get()
                    on:change=on_mode />
                "Upload GeoJSON"
            </label>
            {move || {
                if signals.custom_mode.get() {
                    view! {
                        <input type="file" accept=".geojson,.json" on:change=on_file />
                    }
                    .into_any()
                } else if signals.boundaries_failed.get() {
                    view! {
                        <p class="hint">"Boundaries are unavailable; upload a GeoJSON area instead."</p>
                    }
                    .into_any()
                } else {
                    view! {
                        <select
                            prop:value=move || signals.level.get().map(AdminLevel::key).unwrap_or_default()
                            on:change=move |ev| {
                                if let Some(level) = AdminLevel::from_key(&event_target_value(&ev)) {
                                    dispatch(signals, SelectionEvent::ChooseLevel(level));
                                }
                            }
                        >
                            <option value="">"Administrative level"</option>
                            {AdminLevel::ALL
                                .into_iter()
                                .map(|level| view! { <option value=level.key()>{level.label()}</option> })
                                .collect_view()}
                        </select>
                        <select
                            prop:value=move || signals.feature.get()
                            on:change=move |ev| {
                                dispatch(signals, SelectionEvent::ChooseFeatureByName(event_target_value(&ev)));
                            }
                        >
                            <option value="">"Feature"</option>
                            <For
                                each=move || signals.feature_names.get()
                                key=|name| name.clone()
                                children=move |name| view! { <option value=name.clone()>{name.clone()}</option> }
                            />
                        </select>
                    }
                    .into_any()
                }
            }}
        </fieldset>
    }
}

#[component]
fn DatasetControls() -> impl IntoView {
    let signals: ExplorerSignals = expect_context();

    view! {
        <fieldset class="dataset">
            <legend>"Dataset"</legend>
            <select
                prop:value=move || signals.dataset.get()
                on:change=move |ev| dispatch(signals, SelectionEvent::ChooseDataset(event_target_value(&ev)))
            >
                <option value="">"Dataset"</option>
                {DatasetCatalog
                    .all()
                    .iter()
                    .map(|d| view! { <option value=d.key>{d.label}</option> })
                    .collect_view()}
            </select>
            <select
                prop:value=move || signals.variable.get()
                on:change=move |ev| dispatch(signals, SelectionEvent::ChooseVariable(event_target_value(&ev)))
            >
                <option value="">"Variable"</option>
                <For
                    each=move || signals.variables.get()
                    key=|(key, _)| key.clone()
                    children=move |(key, label)| view! { <option value=key>{label}</option> }
                />
            </select>
        </fieldset>
    }
}

#[component]
fn DatePicker(label: &'static str, date: DateSignals) -> impl IntoView {
    let signals: ExplorerSignals = expect_context();
    let on_change = move |target: RwSignal<String>| {
        move |ev: leptos::ev::Event| {
            target.set(event_target_value(&ev));
            set_dates(signals);
        }
    };

    view! {
        <div class="date-picker">
            <span>{label}</span>
            <select prop:value=move || date.year.get() on:change=on_change(date.year)>
                <option value="">"Year"</option>
                <For
                    each=move || signals.years.get()
                    key=|year| *year
                    children=move |year| view! { <option value=year.to_string()>{year}</option> }
                />
            </select>
            <select prop:value=move || date.month.get() on:change=on_change(date.month)>
                <option value="">"Month"</option>
                {MONTHS
                    .map(|m| view! { <option value=m.to_string()>{format!("{m:02}")}</option> })
                    .collect_view()}
            </select>
            <select prop:value=move || date.day.get() on:change=on_change(date.day)>
                <option value="">"Day"</option>
                {DAYS
                    .map(|d| view! { <option value=d.to_string()>{format!("{d:02}")}</option> })
                    .collect_view()}
            </select>
        </div>
    }
}

#[component]
fn DateControls() -> impl IntoView {
    let signals: ExplorerSignals = expect_context();

    view! {
        <fieldset class="dates">
            <legend>"Date range"</legend>
            <DatePicker label="From" date=signals.from />
            <DatePicker label="To" date=signals.to />
        </fieldset>
    }
}

#[component]
fn StatusLine() -> impl IntoView {
    let signals: ExplorerSignals = expect_context();

    view! {
        {move || match signals.status.get() {
            Status::Idle => ().into_any(),
            Status::Busy(text) => view! { <p class="status busy">{text}</p> }.into_any(),
            Status::Info(text) => view! { <p class="status">{text}</p> }.into_any(),
            Status::Error(text) => view! { <p class="status error">{text}</p> }.into_any(),
        }}
    }
}

#[component]
fn LegendPanel() -> impl IntoView {
    let signals: ExplorerSignals = expect_context();

    move || {
        signals.legend.get().map(|legend| {
            let body = match &legend {
                Legend::Classes { rows, .. } => rows
                    .iter()
                    .map(|row| {
                        view! {
                            <div class="legend-row">
                                <span class="legend-swatch" style:background=row.color.clone()></span>
                                <span>{row.label.clone()}</span>
                            </div>
                        }
                    })
                    .collect_view()
                    .into_any(),
                Legend::Gradient { .. } => {
                    let (min, max) = legend.range_labels().unwrap_or_default();
                    view! {
                        <div class="legend-gradient" style:background=legend.gradient_css().unwrap_or_default()></div>
                        <div class="legend-range">
                            <span>{min}</span>
                            <span>{max}</span>
                        </div>
                    }
                    .into_any()
                }
            };
            view! {
                <div class="legend">
                    <div class="legend-title">{legend.title().to_string()}</div>
                    {body}
                </div>
            }
        })
    }
}
