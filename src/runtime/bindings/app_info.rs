use std::sync::Arc;

use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::value::JsValue;

/// Expose the engine's `AppInfo` as the `_appInfo` global.
pub fn setup_app_info(engine: &Arc<Engine>) -> Result<()> {
    let json = serde_json::to_string(engine.app_info())
        .map_err(|e| Error::Argument(format!("unable to serialize app info: {}", e)))?;

    let app_info = {
        let guard = engine.lock();

        guard.with_scope(|scope| {
            let json = v8_str!(scope, &json)?;
            let value = v8::json::parse(scope, json)
                .ok_or_else(|| Error::Type("app info is not valid JSON".to_string()))?;

            Ok::<_, Error>(JsValue::from_local(engine, scope, value))
        })?
    };

    engine.set_global_property("_appInfo", &app_info)
}
