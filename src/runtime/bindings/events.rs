use std::sync::Arc;

use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::value::JsValue;

/// `_triggerEvent(name, ...args)`
fn trigger_event(engine: &Arc<Engine>, mut params: Vec<JsValue>) -> Result<Option<JsValue>> {
    if params.is_empty() {
        return Err(Error::Argument(
            "_triggerEvent expects at least one parameter".to_string(),
        ));
    }

    let name = params.remove(0).as_string();
    engine.trigger_event(&name, params);

    Ok(None)
}

pub fn setup_events(engine: &Arc<Engine>) -> Result<()> {
    register_fn!(engine, "_triggerEvent", trigger_event);
    Ok(())
}
