use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

use geoportal_shared::RasterDownload;
use geoportal_shared::download::RASTER_MIME;

/// Read an uploaded file as UTF-8 text.
pub async fn read_text(file: &web_sys::File) -> Result<String, String> {
    let value = JsFuture::from(file.text())
        .await
        .map_err(|e| format!("could not read {}: {e:?}", file.name()))?;
    value
        .as_string()
        .ok_or_else(|| format!("{} is not a text file", file.name()))
}

/// Hand a fetched raster to the browser as a file download.
pub fn save(download: &RasterDownload) -> Result<(), String> {
    let window = web_sys::window().ok_or("no window")?;
    let document = window.document().ok_or("no document")?;
    let body = document.body().ok_or("no document body")?;

    let bytes = js_sys::Uint8Array::from(download.bytes.as_slice());
    let parts = js_sys::Array::of1(&bytes);
    let options = web_sys::BlobPropertyBag::new();
    options.set_type(RASTER_MIME);
    let blob = web_sys::Blob::new_with_u8_array_sequence_and_options(&parts, &options)
        .map_err(|e| format!("blob error: {e:?}"))?;
    let url = web_sys::Url::create_object_url_with_blob(&blob).map_err(|e| format!("object url error: {e:?}"))?;

    let anchor = document
        .create_element("a")
        .ok()
        .and_then(|el| el.dyn_into::<web_sys::HtmlAnchorElement>().ok())
        .ok_or("could not create download link")?;
    anchor.set_href(&url);
    anchor.set_download(&download.filename);
    anchor.style().set_property("display", "none").ok();
    body.append_child(&anchor).map_err(|e| format!("dom error: {e:?}"))?;
    anchor.click();
    anchor.remove();

    web_sys::Url::revoke_object_url(&url).ok();
    Ok(())
}
