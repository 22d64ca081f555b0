use std::cell::{Cell, RefCell};
use std::time::Duration;

use futures::future::{AbortHandle, Abortable, Aborted, LocalBoxFuture};

use crate::catalog::DatasetCatalog;
use crate::config;
use crate::dates::{DateRangeValidator, ValidatedRange};
use crate::download::{RasterDownload, raster_filename, sanitize_label};
use crate::error::{ExplorerError, RequestError, TileRenderError, ValidationError};
use crate::legend::{Legend, LegendRenderer};
use crate::protocol::{DownloadRequest, LayerRequest, LayersResponse, OverlayDescriptor};
use crate::retry::{AttemptResult, Elapsed, RetryOutcome, RetryPolicy, Timer, retry_bounded, with_timeout};
use crate::selection::SelectionSnapshot;
use crate::surface::{LayerHandle, MapSession, MapSurface, TileLoadStatus};

/// The remote analysis service. Futures must own everything they need from the request.
pub trait AnalysisService {
    fn fetch_layers(&self, request: &LayerRequest) -> LocalBoxFuture<'_, Result<LayersResponse, RequestError>>;
    fn fetch_raster(&self, request: &DownloadRequest) -> LocalBoxFuture<'_, Result<Vec<u8>, RequestError>>;
}

/// A rendered overlay together with the legend drawn for it.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewOutcome {
    pub layer: LayerHandle,
    pub descriptor: OverlayDescriptor,
    pub legend: Legend,
    pub attempts: u32,
}

#[derive(Default)]
struct InFlight {
    view: Option<AbortHandle>,
    download: Option<AbortHandle>,
}

/// Fetches analysis overlays and rasters for a selection and keeps the map's overlay
/// and legend slots in step with the latest successful view.
///
/// Starting a view (or download) cancels the one still in flight; the superseded
/// call resolves to `ExplorerError::Canceled`.
pub struct OverlayManager<A, T> {
    service: A,
    timer: T,
    validator: DateRangeValidator,
    legends: LegendRenderer,
    request_timeout: Duration,
    render_policy: RetryPolicy,
    in_flight: RefCell<InFlight>,
    current: RefCell<Option<OverlayDescriptor>>,
}

impl<A: AnalysisService, T: Timer> OverlayManager<A, T> {
    pub fn new(service: A, timer: T, catalog: DatasetCatalog) -> Self {
        Self {
            service,
            timer,
            validator: DateRangeValidator::new(catalog),
            legends: LegendRenderer::new(catalog),
            request_timeout: config::request_timeout(),
            render_policy: RetryPolicy {
                max_attempts: config::RENDER_ATTEMPTS,
                attempt_timeout: config::render_timeout(),
                backoff: config::render_backoff(),
            },
            in_flight: RefCell::default(),
            current: RefCell::default(),
        }
    }

    /// Descriptor of the overlay currently on the map.
    pub fn current(&self) -> Option<OverlayDescriptor> {
        self.current.borrow().clone()
    }

    pub async fn request_view<S: MapSurface>(
        &self,
        session: &MapSession<S>,
        selection: &SelectionSnapshot,
    ) -> Result<ViewOutcome, ExplorerError> {
        let (request, _) = self.prepare(selection)?;

        let (handle, registration) = AbortHandle::new_pair();
        let previous = self.in_flight.borrow_mut().view.replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }

        let attached = Cell::new(None);
        match Abortable::new(self.show(session, request, &attached), registration).await {
            Ok(result) => result,
            Err(Aborted) => {
                if let Some(layer) = attached.take() {
                    session.detach_overlay(layer);
                }
                tracing::debug!("view request superseded");
                Err(ExplorerError::Canceled)
            }
        }
    }

    async fn show<S: MapSurface>(
        &self,
        session: &MapSession<S>,
        request: LayerRequest,
        attached: &Cell<Option<LayerHandle>>,
    ) -> Result<ViewOutcome, ExplorerError> {
        let response = with_timeout(&self.timer, self.request_timeout, self.service.fetch_layers(&request))
            .await
            .map_err(|Elapsed| RequestError::Timeout(self.request_timeout.as_secs()))??;
        let descriptor = OverlayDescriptor::try_from(response)?;

        session.release_overlay_and_legend();
        self.current.replace(None);

        let outcome = retry_bounded(
            &self.timer,
            self.render_policy,
            |_| {
                let layer = session.attach_overlay(&descriptor.tile_url_template);
                attached.set(Some(layer));
                let loaded = session.overlay_loaded(layer);
                async move {
                    match loaded.await {
                        TileLoadStatus::Loaded => AttemptResult::Done(layer),
                        TileLoadStatus::Failed => AttemptResult::Failed,
                        TileLoadStatus::Detached => AttemptResult::Canceled,
                    }
                }
            },
            |attempt| {
                if let Some(layer) = attached.take() {
                    session.detach_overlay(layer);
                }
                tracing::warn!(attempt, "overlay tiles did not render");
            },
        )
        .await;

        let (layer, attempts) = match outcome {
            RetryOutcome::Succeeded { value, attempt } => (value, attempt),
            RetryOutcome::Exhausted { attempts } => {
                return Err(TileRenderError::Exhausted { attempts }.into());
            }
            RetryOutcome::Canceled { .. } => return Err(ExplorerError::Canceled),
        };

        if let Some(bounds) = descriptor.bounds {
            session.fit_bounds(bounds);
        }
        let legend = self.legends.render(&descriptor, &request.dataset, &request.index);
        session.replace_legend(&legend);
        self.current.replace(Some(descriptor.clone()));

        tracing::info!(
            dataset = %request.dataset,
            variable = %request.index,
            attempts,
            "overlay rendered"
        );
        Ok(ViewOutcome {
            layer,
            descriptor,
            legend,
            attempts,
        })
    }

    pub async fn request_download(&self, selection: &SelectionSnapshot) -> Result<RasterDownload, ExplorerError> {
        let (layer, range) = self.prepare(selection)?;
        let filename = raster_filename(&layer.dataset, &layer.index, &range, &selection.label);
        let request = DownloadRequest {
            layer,
            label: sanitize_label(&selection.label),
        };

        let (handle, registration) = AbortHandle::new_pair();
        let previous = self.in_flight.borrow_mut().download.replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }

        let fetch = with_timeout(&self.timer, self.request_timeout, self.service.fetch_raster(&request));
        let bytes = Abortable::new(fetch, registration)
            .await
            .map_err(|Aborted| ExplorerError::Canceled)?
            .map_err(|Elapsed| RequestError::Timeout(self.request_timeout.as_secs()))??;
        if bytes.is_empty() {
            return Err(RequestError::Decode("empty raster payload".into()).into());
        }

        tracing::info!(%filename, size = bytes.len(), "raster downloaded");
        Ok(RasterDownload { filename, bytes })
    }

    /// Cancel anything in flight and clear the overlay and legend.
    pub fn reset<S: MapSurface>(&self, session: &MapSession<S>) {
        let in_flight = std::mem::take(&mut *self.in_flight.borrow_mut());
        for handle in in_flight.view.into_iter().chain(in_flight.download) {
            handle.abort();
        }
        session.release_overlay_and_legend();
        self.current.replace(None);
    }

    fn prepare(&self, selection: &SelectionSnapshot) -> Result<(LayerRequest, ValidatedRange), ValidationError> {
        let geometry = selection
            .geometry
            .clone()
            .ok_or(ValidationError::Missing("an area"))?;
        let dataset = selection
            .dataset
            .as_deref()
            .ok_or(ValidationError::Missing("a dataset"))?;
        let variable = selection
            .variable
            .as_deref()
            .ok_or(ValidationError::Missing("a variable"))?;
        if !selection.from.is_present() {
            return Err(ValidationError::Missing("a start date"));
        }
        if !selection.to.is_present() {
            return Err(ValidationError::Missing("an end date"));
        }

        let range = self.validator.validate(dataset, selection.from, selection.to)?;
        let request = LayerRequest {
            dataset: dataset.to_string(),
            index: variable.to_string(),
            start_date: range.from_iso(),
            end_date: range.to_iso(),
            geometry,
        };
        Ok((request, range))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::PartialDate;
    use crate::error::DateRangeIssue;
    use crate::geometry::{Bounds, Geometry};
    use crate::retry::tests::FakeTimer;
    use crate::surface::tests::RecordingSurface;
    use futures::FutureExt;
    use futures::executor::{LocalPool, block_on};
    use futures::task::LocalSpawnExt;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::rc::Rc;

    type Scripted<T> = RefCell<VecDeque<Option<Result<T, RequestError>>>>;

    /// Replies in order; a `None` entry never resolves.
    #[derive(Default)]
    struct MockService {
        layers: Scripted<LayersResponse>,
        rasters: Scripted<Vec<u8>>,
        layer_calls: RefCell<Vec<LayerRequest>>,
        raster_calls: RefCell<Vec<DownloadRequest>>,
    }

    impl MockService {
        fn with_layers(replies: impl IntoIterator<Item = Option<Result<LayersResponse, RequestError>>>) -> Self {
            Self {
                layers: RefCell::new(replies.into_iter().collect()),
                ..Self::default()
            }
        }
    }

    fn reply<T: 'static>(next: Option<Option<Result<T, RequestError>>>) -> LocalBoxFuture<'static, Result<T, RequestError>> {
        match next {
            Some(Some(result)) => futures::future::ready(result).boxed_local(),
            Some(None) => futures::future::pending().boxed_local(),
            None => futures::future::ready(Err(RequestError::Transport("unexpected call".into()))).boxed_local(),
        }
    }

    impl AnalysisService for MockService {
        fn fetch_layers(&self, request: &LayerRequest) -> LocalBoxFuture<'_, Result<LayersResponse, RequestError>> {
            self.layer_calls.borrow_mut().push(request.clone());
            reply(self.layers.borrow_mut().pop_front())
        }

        fn fetch_raster(&self, request: &DownloadRequest) -> LocalBoxFuture<'_, Result<Vec<u8>, RequestError>> {
            self.raster_calls.borrow_mut().push(request.clone());
            reply(self.rasters.borrow_mut().pop_front())
        }
    }

    fn polygon() -> Geometry {
        Geometry::Polygon(vec![crate::geometry::tests::square(38.0, 39.0)])
    }

    fn snapshot(dataset: &str, variable: &str, from: PartialDate, to: PartialDate) -> SelectionSnapshot {
        SelectionSnapshot {
            geometry: Some(polygon()),
            label: "Addis Ababa".into(),
            dataset: Some(dataset.into()),
            variable: Some(variable.into()),
            from,
            to,
        }
    }

    fn ndvi_2020() -> SelectionSnapshot {
        snapshot(
            "sentinel2",
            "NDVI",
            PartialDate::new(2020, 1, 1),
            PartialDate::new(2020, 12, 31),
        )
    }

    fn landsat_may_june_2019() -> SelectionSnapshot {
        snapshot(
            "landsat",
            "NDWI",
            PartialDate::new(2019, 5, 3),
            PartialDate::new(2019, 6, 17),
        )
    }

    fn with_rasters(replies: impl IntoIterator<Item = Option<Result<Vec<u8>, RequestError>>>) -> MockService {
        MockService {
            rasters: RefCell::new(replies.into_iter().collect()),
            ..MockService::default()
        }
    }

    fn layers(value: serde_json::Value) -> Option<Result<LayersResponse, RequestError>> {
        Some(Ok(serde_json::from_value(value).unwrap()))
    }

    fn ndvi_response() -> Option<Result<LayersResponse, RequestError>> {
        layers(json!({
            "tiles": "https://ee/ndvi/{z}/{x}/{y}",
            "bounds": [[38.0, 38.0], [39.0, 39.0]],
            "vis_params": { "palette": ["#d73027", "#fee08b", "#1a9850"], "min": -0.2, "max": 0.8 }
        }))
    }

    fn manager(service: MockService, timer: FakeTimer) -> OverlayManager<MockService, FakeTimer> {
        OverlayManager::new(service, timer, DatasetCatalog)
    }

    #[test]
    fn ndvi_view_renders_overlay_and_gradient_legend() {
        let manager = manager(MockService::with_layers([ndvi_response()]), FakeTimer::default());
        let session = MapSession::init(RecordingSurface::default());

        let outcome = block_on(manager.request_view(&session, &ndvi_2020())).unwrap();

        let calls = manager.service.layer_calls.borrow();
        let request = &calls[0];
        assert_eq!((request.start_date.as_str(), request.end_date.as_str()), ("2020-01-01", "2020-12-31"));
        assert_eq!(request.index, "NDVI");

        match &outcome.legend {
            Legend::Gradient { title, min, max, .. } => {
                assert!(title.contains("NDVI"));
                assert_eq!((*min, *max), (Some(-0.2), Some(0.8)));
            }
            other => panic!("expected gradient legend, got {other:?}"),
        }
        assert_eq!(outcome.attempts, 1);
        session.with_surface(|surface| {
            assert_eq!(surface.tile_urls(), vec!["https://ee/ndvi/{z}/{x}/{y}"]);
            assert_eq!(surface.legends(), vec![&outcome.legend]);
            assert_eq!(
                surface.fitted,
                vec![Bounds {
                    min_lng: 38.0,
                    min_lat: 38.0,
                    max_lng: 39.0,
                    max_lat: 39.0
                }]
            );
        });
        assert_eq!(manager.current(), Some(outcome.descriptor));
    }

    #[test]
    fn landcover_view_lists_classes_in_order() {
        let service = MockService::with_layers([layers(json!({
            "mode_tiles": "https://ee/lc/{z}/{x}/{y}",
            "legend": { "label": "Dynamic World land cover" },
            "unique_classes": ["water", "trees", "built"]
        }))]);
        let manager = manager(service, FakeTimer::default());
        let session = MapSession::init(RecordingSurface::default());
        let selection = snapshot(
            "landcover",
            "dynamic",
            PartialDate::year_only(2022),
            PartialDate::year_only(2022),
        );

        let outcome = block_on(manager.request_view(&session, &selection)).unwrap();
        let Legend::Classes { title, rows } = outcome.legend else {
            panic!("expected class legend");
        };
        assert_eq!(title, "Dynamic World land cover");
        let rows: Vec<_> = rows.iter().map(|r| (r.label.as_str(), r.color.as_str())).collect();
        assert_eq!(
            rows,
            vec![("Water", "#419bdf"), ("Trees", "#397d49"), ("Built", "#c4281b")]
        );
    }

    #[test]
    fn missing_tiles_keeps_the_previous_overlay() {
        let service = MockService::with_layers([
            ndvi_response(),
            layers(json!({ "vis_params": { "palette": ["#000"] } })),
        ]);
        let manager = manager(service, FakeTimer::default());
        let session = MapSession::init(RecordingSurface::default());

        let first = block_on(manager.request_view(&session, &ndvi_2020())).unwrap();
        let err = block_on(manager.request_view(&session, &ndvi_2020())).unwrap_err();

        assert_eq!(err, ExplorerError::Request(RequestError::NoTiles { detail: None }));
        assert_eq!(session.overlay(), Some(first.layer));
        assert!(session.has_legend());
        session.with_surface(|surface| assert_eq!(surface.tile_urls().len(), 1));
        assert_eq!(manager.current(), Some(first.descriptor));
    }

    #[test]
    fn incomplete_selection_fails_without_network() {
        let manager = manager(MockService::default(), FakeTimer::default());
        let session = MapSession::init(RecordingSurface::default());
        let mut selection = ndvi_2020();
        selection.variable = None;

        let err = block_on(manager.request_view(&session, &selection)).unwrap_err();
        assert_eq!(err, ExplorerError::Validation(ValidationError::Missing("a variable")));

        selection = ndvi_2020();
        selection.to = PartialDate::default();
        let err = block_on(manager.request_download(&selection)).unwrap_err();
        assert_eq!(err, ExplorerError::Validation(ValidationError::Missing("an end date")));

        assert!(manager.service.layer_calls.borrow().is_empty());
        assert!(manager.service.raster_calls.borrow().is_empty());
    }

    #[test]
    fn each_missing_field_is_named() {
        let manager = manager(MockService::default(), FakeTimer::default());
        let session = MapSession::init(RecordingSurface::default());
        let message = |selection: &SelectionSnapshot| {
            block_on(manager.request_view(&session, selection))
                .unwrap_err()
                .to_string()
        };

        let mut selection = SelectionSnapshot::default();
        assert_eq!(message(&selection), "please choose an area");
        selection.geometry = Some(polygon());
        assert_eq!(message(&selection), "please choose a dataset");
        selection.dataset = Some("sentinel2".into());
        assert_eq!(message(&selection), "please choose a variable");
        selection.variable = Some("NDVI".into());
        assert_eq!(message(&selection), "please choose a start date");
        selection.from = PartialDate::year_only(2020);
        assert_eq!(message(&selection), "please choose an end date");

        assert!(manager.service.layer_calls.borrow().is_empty());
    }

    #[test]
    fn invalid_range_fails_without_network() {
        let manager = manager(MockService::default(), FakeTimer::default());
        let session = MapSession::init(RecordingSurface::default());
        let selection = snapshot(
            "sentinel2",
            "NDVI",
            PartialDate::year_only(2016),
            PartialDate::year_only(2018),
        );

        let err = block_on(manager.request_view(&session, &selection)).unwrap_err();
        assert_eq!(
            err,
            ExplorerError::Validation(ValidationError::InvalidDate {
                field: "start date",
                reason: DateRangeIssue::StartBeforeMinimum
            })
        );
        assert!(manager.service.layer_calls.borrow().is_empty());
    }

    #[test]
    fn server_failure_is_reported_with_detail() {
        let service = MockService::with_layers([Some(Err(RequestError::Status {
            status: 500,
            detail: Some("quota exceeded".into()),
        }))]);
        let manager = manager(service, FakeTimer::default());
        let session = MapSession::init(RecordingSurface::default());

        let err = block_on(manager.request_view(&session, &ndvi_2020())).unwrap_err();
        assert_eq!(err.to_string(), "server returned HTTP 500: quota exceeded");
        session.with_surface(|surface| assert!(surface.layers.is_empty()));
    }

    #[test]
    fn slow_fetch_times_out() {
        let manager = manager(MockService::with_layers([None]), FakeTimer::default());
        let session = MapSession::init(RecordingSurface::default());

        let err = block_on(manager.request_view(&session, &ndvi_2020())).unwrap_err();
        assert_eq!(err, ExplorerError::Request(RequestError::Timeout(30)));
        assert_eq!(*manager.timer.slept.borrow(), vec![Duration::from_secs(30)]);
    }

    #[test]
    fn exhausted_render_leaves_no_layer() {
        let manager = manager(MockService::with_layers([ndvi_response()]), FakeTimer::default());
        let session = MapSession::init(RecordingSurface::scripted([None, Some(TileLoadStatus::Failed)]));

        let err = block_on(manager.request_view(&session, &ndvi_2020())).unwrap_err();

        assert_eq!(err, ExplorerError::TileRender(TileRenderError::Exhausted { attempts: 2 }));
        assert!(session.overlay().is_none());
        assert!(!session.has_legend());
        session.with_surface(|surface| assert!(surface.layers.is_empty()));
        assert_eq!(
            *manager.timer.slept.borrow(),
            vec![
                Duration::from_secs(30),
                Duration::from_secs(10),
                Duration::from_secs(1),
                Duration::from_secs(10)
            ]
        );
        assert_eq!(manager.current(), None);
    }

    #[test]
    fn second_render_attempt_can_succeed() {
        let manager = manager(MockService::with_layers([ndvi_response()]), FakeTimer::default());
        let session = MapSession::init(RecordingSurface::scripted([Some(TileLoadStatus::Failed)]));

        let outcome = block_on(manager.request_view(&session, &ndvi_2020())).unwrap();
        assert_eq!(outcome.attempts, 2);
        session.with_surface(|surface| assert_eq!(surface.tile_urls().len(), 1));
    }

    #[test]
    fn detached_layer_cancels_render() {
        let manager = manager(MockService::with_layers([ndvi_response()]), FakeTimer::default());
        let session = MapSession::init(RecordingSurface::scripted([Some(TileLoadStatus::Detached)]));

        let err = block_on(manager.request_view(&session, &ndvi_2020())).unwrap_err();
        assert!(err.is_canceled());
        session.with_surface(|surface| assert!(surface.tile_urls().is_empty()));
    }

    #[test]
    fn newer_view_cancels_the_one_in_flight() {
        let service = MockService::with_layers([None, ndvi_response()]);
        let manager = Rc::new(manager(service, FakeTimer::hanging(Duration::from_secs(30))));
        let session = Rc::new(MapSession::init(RecordingSurface::default()));
        let results: Rc<RefCell<Vec<Result<ViewOutcome, ExplorerError>>>> = Rc::default();

        let mut pool = LocalPool::new();
        let spawn = |pool: &LocalPool| {
            let (manager, session, results) = (Rc::clone(&manager), Rc::clone(&session), Rc::clone(&results));
            pool.spawner()
                .spawn_local(async move {
                    let result = manager.request_view(&*session, &ndvi_2020()).await;
                    results.borrow_mut().push(result);
                })
                .unwrap();
        };

        spawn(&pool);
        pool.run_until_stalled();
        assert!(results.borrow().is_empty());

        spawn(&pool);
        pool.run_until_stalled();

        let results = results.borrow();
        assert_eq!(results.len(), 2);
        assert!(results.iter().any(|r| matches!(r, Err(ExplorerError::Canceled))));
        assert!(results.iter().any(|r| r.is_ok()));
        session.with_surface(|surface| assert_eq!(surface.tile_urls().len(), 1));
    }

    #[test]
    fn download_builds_filename_and_sanitized_label() {
        let service = MockService {
            rasters: RefCell::new(VecDeque::from([Some(Ok(vec![0x49, 0x49, 0x2a, 0x00]))])),
            ..MockService::default()
        };
        let manager = manager(service, FakeTimer::default());
        let selection = snapshot(
            "landsat",
            "NDWI",
            PartialDate::new(2019, 5, 3),
            PartialDate::new(2019, 6, 17),
        );

        let download = block_on(manager.request_download(&selection)).unwrap();
        assert_eq!(download.filename, "landsat_NDWI_03_05_19_to_17_06_19_AddisAbaba.tif");
        assert_eq!(download.bytes, vec![0x49, 0x49, 0x2a, 0x00]);

        let calls = manager.service.raster_calls.borrow();
        assert_eq!(calls[0].label, "AddisAbaba");
        assert_eq!(calls[0].layer.start_date, "2019-05-03");
    }

    #[test]
    fn empty_raster_is_an_error() {
        let service = MockService {
            rasters: RefCell::new(VecDeque::from([Some(Ok(Vec::new()))])),
            ..MockService::default()
        };
        let manager = manager(service, FakeTimer::default());
        let selection = snapshot(
            "landsat",
            "NDWI",
            PartialDate::new(2019, 5, 3),
            PartialDate::new(2019, 6, 17),
        );
        let err = block_on(manager.request_download(&selection)).unwrap_err();
        assert!(matches!(err, ExplorerError::Request(RequestError::Decode(_))));
    }

    #[test]
    fn reset_releases_overlay_and_legend() {
        let manager = manager(MockService::with_layers([ndvi_response()]), FakeTimer::default());
        let session = MapSession::init(RecordingSurface::default());
        block_on(manager.request_view(&session, &ndvi_2020())).unwrap();

        manager.reset(&session);
        assert!(session.overlay().is_none());
        assert!(!session.has_legend());
        assert_eq!(manager.current(), None);
        session.with_surface(|surface| assert!(surface.layers.is_empty()));
    }

    #[test]
    fn slow_download_times_out() {
        let manager = manager(with_rasters([None]), FakeTimer::default());

        let err = block_on(manager.request_download(&landsat_may_june_2019())).unwrap_err();
        assert_eq!(err, ExplorerError::Request(RequestError::Timeout(30)));
        assert_eq!(*manager.timer.slept.borrow(), vec![Duration::from_secs(30)]);
        assert_eq!(manager.service.raster_calls.borrow().len(), 1);
    }

    #[test]
    fn newer_download_cancels_the_one_in_flight() {
        let service = with_rasters([None, Some(Ok(vec![0x49, 0x49, 0x2a, 0x00]))]);
        let manager = Rc::new(manager(service, FakeTimer::hanging(Duration::from_secs(30))));
        let results: Rc<RefCell<Vec<Result<RasterDownload, ExplorerError>>>> = Rc::default();

        let mut pool = LocalPool::new();
        let spawn = |pool: &LocalPool| {
            let (manager, results) = (Rc::clone(&manager), Rc::clone(&results));
            pool.spawner()
                .spawn_local(async move {
                    let result = manager.request_download(&landsat_may_june_2019()).await;
                    results.borrow_mut().push(result);
                })
                .unwrap();
        };

        spawn(&pool);
        pool.run_until_stalled();
        assert!(results.borrow().is_empty());

        spawn(&pool);
        pool.run_until_stalled();

        let results = results.borrow();
        assert_eq!(results.len(), 2);
        assert!(results.iter().any(|r| matches!(r, Err(ExplorerError::Canceled))));
        let finished: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].filename, "landsat_NDWI_03_05_19_to_17_06_19_AddisAbaba.tif");
    }

    #[test]
    fn reset_while_rendering_cancels_the_view() {
        let manager = Rc::new(manager(
            MockService::with_layers([ndvi_response()]),
            FakeTimer::hanging(Duration::from_secs(10)),
        ));
        // The tiles never finish loading, so the view stays in its first render attempt.
        let session = Rc::new(MapSession::init(RecordingSurface::scripted([None])));
        let result: Rc<RefCell<Option<Result<ViewOutcome, ExplorerError>>>> = Rc::default();

        let mut pool = LocalPool::new();
        {
            let (manager, session, result) = (Rc::clone(&manager), Rc::clone(&session), Rc::clone(&result));
            pool.spawner()
                .spawn_local(async move {
                    let outcome = manager.request_view(&*session, &ndvi_2020()).await;
                    *result.borrow_mut() = Some(outcome);
                })
                .unwrap();
        }
        pool.run_until_stalled();
        assert!(result.borrow().is_none());
        assert!(session.overlay().is_some());

        manager.reset(&*session);
        pool.run_until_stalled();

        assert_eq!(*result.borrow(), Some(Err(ExplorerError::Canceled)));
        assert!(session.overlay().is_none());
        assert!(!session.has_legend());
        assert_eq!(manager.current(), None);
        session.with_surface(|surface| assert!(surface.layers.is_empty()));
    }
}
