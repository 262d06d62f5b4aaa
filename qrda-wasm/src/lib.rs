//! Bridge WASM <-> JavaScript cho bộ nhập QRDA Cat I.

use qrda_core::{ImportConfig, ImportError, RankPolicy};
use serde::Deserialize;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

/// Cấu hình từ JS; trường nào thiếu thì giữ giá trị mặc định.
#[derive(Deserialize, Default)]
struct JsImportConfig {
    #[serde(default)]
    rank_policy: Option<RankPolicy>,
    #[serde(default)]
    refine_encounters: Option<bool>,
}

impl From<JsImportConfig> for ImportConfig {
    fn from(cfg: JsImportConfig) -> Self {
        let mut base = ImportConfig::default();
        if let Some(policy) = cfg.rank_policy {
            base.rank_policy = policy;
        }
        if let Some(refine) = cfg.refine_encounters {
            base.refine_encounters = refine;
        }
        base
    }
}

#[wasm_bindgen]
pub fn import_cat1(xml: String, config: Option<JsValue>) -> Result<JsValue, JsValue> {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();

    let cfg = match config {
        Some(js_cfg) if !js_cfg.is_undefined() && !js_cfg.is_null() => {
            let cfg: JsImportConfig = from_value(js_cfg)
                .map_err(|err| JsValue::from_str(&format!("Không đọc được config: {err}")))?;
            ImportConfig::from(cfg)
        }
        _ => ImportConfig::default(),
    };

    let outcome = qrda_cat1::import_cat1_str(&xml, &cfg)
        .map_err(|err| JsValue::from_str(&format_import_error(err)))?;

    to_value(&outcome)
        .map_err(|err| JsValue::from_str(&format!("Không serialize kết quả: {err}")))
}

fn format_import_error(err: ImportError) -> String {
    format!("QRDA import error: {err}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_overlays_the_default() {
        let cfg = ImportConfig::from(JsImportConfig {
            rank_policy: Some(RankPolicy::Reject),
            ..JsImportConfig::default()
        });
        assert_eq!(cfg.rank_policy, RankPolicy::Reject);
        assert!(cfg.refine_encounters);

        assert_eq!(ImportConfig::from(JsImportConfig::default()), ImportConfig::default());
    }

    #[test]
    fn import_errors_are_prefixed() {
        assert!(format_import_error(ImportError::MissingRoot).starts_with("QRDA import error: "));
    }
}
