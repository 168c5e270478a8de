//! WebAssembly bindings for the A4 image splitter

use crate::{MemorySaveTarget, SplitOptions, SplitSession};
use wasm_bindgen::prelude::*;

/// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Whether the page can turn the result into a `Blob` for download
fn blob_supported() -> bool {
    js_sys::Reflect::has(&js_sys::global(), &JsValue::from_str("Blob")).unwrap_or(false)
}

/// Split an uploaded image into A4 pages
///
/// # Arguments
/// * `file_name` - Name of the uploaded file; its stem prefixes the output names
/// * `file_bytes` - The uploaded file as a byte array
/// * `format` - `application/pdf`, `image/jpeg` or `image/png`
/// * `quality` - JPEG quality 1-100 (default: 100)
///
/// # Returns
/// A `SplitResultJs` with the file to save, or throws an error
#[wasm_bindgen]
pub fn split_image(
    file_name: &str,
    file_bytes: &[u8],
    format: &str,
    quality: Option<u8>,
) -> Result<SplitResultJs, JsError> {
    let options = SplitOptions {
        quality: quality.unwrap_or(100),
        ..SplitOptions::default()
    };

    let mut session = SplitSession::new(options).with_binary_output(blob_supported());
    session.select_file(file_name, file_bytes.to_vec());

    let mut target = MemorySaveTarget::default();
    let report = session.submit(format, &mut target).map_err(|e| {
        web_sys::console::error_1(&JsValue::from_str(&e.to_string()));
        JsError::new(&e.to_string())
    })?;

    let entry = target
        .into_entries()
        .pop()
        .ok_or_else(|| JsError::new("no file was produced"))?;

    let summary_json = serde_json::to_string(&report).unwrap_or_else(|_| "{}".to_string());

    Ok(SplitResultJs {
        file_name: entry.name,
        bytes: entry.data,
        page_count: report.page_count,
        summary_json,
    })
}

/// Result of a split, ready to hand to a save dialog
#[wasm_bindgen]
pub struct SplitResultJs {
    file_name: String,
    bytes: Vec<u8>,
    page_count: usize,
    summary_json: String,
}

#[wasm_bindgen]
impl SplitResultJs {
    /// Name to save the file under
    #[wasm_bindgen(getter)]
    pub fn file_name(&self) -> String {
        self.file_name.clone()
    }

    /// The PDF or ZIP bytes
    #[wasm_bindgen(getter)]
    pub fn bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    #[wasm_bindgen(getter)]
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// File name, page count and size as a JSON string
    #[wasm_bindgen(getter)]
    pub fn summary_json(&self) -> String {
        self.summary_json.clone()
    }
}
