use std::time::Duration;

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use gloo_net::http::{Request, Response};
use gloo_timers::future::TimeoutFuture;

use geoportal_shared::config::{ServiceEndpoints, boundary_document_path};
use geoportal_shared::protocol::server_reason;
use geoportal_shared::{
    AdminLevel, AnalysisService, BoundarySource, DownloadRequest, LayerRequest, LayersResponse, RequestError, Timer,
};

/// Aborts the underlying fetch when the request future is dropped (timeout or supersede).
struct AbortOnDrop(Option<web_sys::AbortController>);

impl AbortOnDrop {
    fn new() -> Self {
        Self(web_sys::AbortController::new().ok())
    }

    fn signal(&self) -> Option<web_sys::AbortSignal> {
        self.0.as_ref().map(|controller| controller.signal())
    }

    fn disarm(mut self) {
        self.0 = None;
    }
}

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        if let Some(controller) = self.0.take() {
            controller.abort();
        }
    }
}

async fn failure(resp: Response) -> RequestError {
    let status = resp.status();
    let detail = resp.text().await.ok().and_then(|body| server_reason(&body));
    RequestError::Status { status, detail }
}

fn transport(e: gloo_net::Error) -> RequestError {
    RequestError::Transport(e.to_string())
}

/// The analysis service over HTTP.
pub struct HttpAnalysisService {
    endpoints: ServiceEndpoints,
}

impl HttpAnalysisService {
    pub fn new(endpoints: ServiceEndpoints) -> Self {
        Self { endpoints }
    }
}

impl AnalysisService for HttpAnalysisService {
    fn fetch_layers(&self, request: &LayerRequest) -> LocalBoxFuture<'_, Result<LayersResponse, RequestError>> {
        let guard = AbortOnDrop::new();
        let signal = guard.signal();
        let built = Request::post(&self.endpoints.layers)
            .abort_signal(signal.as_ref())
            .json(request);
        async move {
            let resp = built.map_err(transport)?.send().await.map_err(transport)?;
            if !resp.ok() {
                return Err(failure(resp).await);
            }
            let body = resp.text().await.map_err(transport)?;
            guard.disarm();
            serde_json::from_str::<LayersResponse>(&body).map_err(|e| RequestError::Decode(e.to_string()))
        }
        .boxed_local()
    }

    fn fetch_raster(&self, request: &DownloadRequest) -> LocalBoxFuture<'_, Result<Vec<u8>, RequestError>> {
        let guard = AbortOnDrop::new();
        let signal = guard.signal();
        let built = Request::post(&self.endpoints.download)
            .abort_signal(signal.as_ref())
            .json(request);
        async move {
            let resp = built.map_err(transport)?.send().await.map_err(transport)?;
            if !resp.ok() {
                return Err(failure(resp).await);
            }
            let bytes = resp.binary().await.map_err(transport)?;
            guard.disarm();
            Ok(bytes)
        }
        .boxed_local()
    }
}

/// Static boundary documents served next to the client.
pub struct HttpBoundarySource;

impl BoundarySource for HttpBoundarySource {
    fn fetch(&self, level: AdminLevel) -> LocalBoxFuture<'_, Result<String, String>> {
        let url = boundary_document_path(level);
        async move {
            let resp = Request::get(&url)
                .send()
                .await
                .map_err(|e| format!("fetch error: {e}"))?;
            if !resp.ok() {
                return Err(format!("HTTP {}", resp.status()));
            }
            resp.text().await.map_err(|e| format!("read error: {e}"))
        }
        .boxed_local()
    }
}

/// `setTimeout`-backed timer.
pub struct BrowserTimer;

impl Timer for BrowserTimer {
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        let millis = u32::try_from(duration.as_millis()).unwrap_or(u32::MAX);
        TimeoutFuture::new(millis).boxed_local()
    }
}
