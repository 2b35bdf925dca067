//! Bridge WASM <-> JavaScript trung lập framework.

use caregap_core::{CareGapConfig, CareSnapshot, IngestError, ResourceSet};
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

/// Đối tượng bundle JSON -> `ResourceSet`.
#[wasm_bindgen(js_name = parseBundle)]
pub fn parse_bundle(input_bundle: JsValue) -> Result<JsValue, JsValue> {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();

    let bundle_value = from_value::<serde_json::Value>(input_bundle)
        .map_err(|err| JsValue::from_str(&format!("could not read bundle JSON: {err}")))?;

    let set = caregap_fhir::parse_bundle_value(&bundle_value)
        .map_err(|err| JsValue::from_str(&format_ingest_error(err)))?;

    to_value(&set).map_err(|err| JsValue::from_str(&format!("could not serialize set: {err}")))
}

/// Văn bản bản tin phân đoạn -> `ResourceSet` có thêm observation mới.
///
/// Set đầu vào không bị thay đổi; khi lỗi, bên gọi giữ nguyên dữ liệu cũ.
#[wasm_bindgen(js_name = ingestMessage)]
pub fn ingest_message(resource_set: JsValue, message: &str) -> Result<JsValue, JsValue> {
    let set: ResourceSet = from_value(resource_set)
        .map_err(|err| JsValue::from_str(&format!("could not read resource set: {err}")))?;

    let observation = caregap_hl7::parse_message(message, &set.patient.id)
        .map_err(|err| JsValue::from_str(&format_ingest_error(err)))?;

    to_value(&set.with_observation(observation))
        .map_err(|err| JsValue::from_str(&format!("could not serialize set: {err}")))
}

/// `ResourceSet` -> `CareSnapshot` (timeline và care gap).
#[wasm_bindgen]
pub fn summarize(resource_set: JsValue, config: Option<JsValue>) -> Result<JsValue, JsValue> {
    let set: ResourceSet = from_value(resource_set)
        .map_err(|err| JsValue::from_str(&format!("could not read resource set: {err}")))?;

    let cfg = match config {
        Some(js_cfg) => read_config(js_cfg)?,
        None => CareGapConfig::default(),
    };

    let snapshot = CareSnapshot::compute(&set, &cfg);

    to_value(&snapshot)
        .map_err(|err| JsValue::from_str(&format!("could not serialize snapshot: {err}")))
}

/// Chấp nhận object JS thiếu trường; ngưỡng thiếu giữ giá trị mặc định.
fn read_config(js_cfg: JsValue) -> Result<CareGapConfig, JsValue> {
    from_value::<CareGapConfig>(js_cfg)
        .map_err(|err| JsValue::from_str(&format!("could not read config: {err}")))
}

fn format_ingest_error(err: IngestError) -> String {
    format!("Ingest error: {err}")
}
