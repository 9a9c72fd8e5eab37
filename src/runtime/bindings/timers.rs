use std::sync::Arc;
use std::time::Duration;

use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::value::JsValue;

/// `setTimeout(callback, delay, ...args)`
fn set_timeout(engine: &Arc<Engine>, params: Vec<JsValue>) -> Result<Option<JsValue>> {
    if params.len() < 2 {
        return Err(Error::Argument(
            "setTimeout requires at least 2 parameters".to_string(),
        ));
    }

    crate::callbacks::require_function(&params, 0, "setTimeout")?;

    // Negative and NaN delays fire immediately
    let delay = Duration::from_millis(params[1].as_int().max(0) as u64);
    engine.schedule_delayed(delay, &params[0], &params[2..])?;

    Ok(None)
}

pub fn setup_timers(engine: &Arc<Engine>) -> Result<()> {
    register_fn!(engine, "setTimeout", set_timeout);
    Ok(())
}
