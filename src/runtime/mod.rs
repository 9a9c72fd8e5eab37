//! Built-in script globals installed into every engine's context.

pub mod bindings;

use std::sync::Arc;

use crate::engine::Engine;
use crate::error::Result;

/// Install `_appInfo`, `_triggerEvent`, `setTimeout`, `console` and `_fileSystem`.
pub(crate) fn setup_globals(engine: &Arc<Engine>) -> Result<()> {
    bindings::setup_app_info(engine)?;
    bindings::setup_events(engine)?;
    bindings::setup_timers(engine)?;
    bindings::setup_console(engine)?;
    bindings::setup_file_system(engine)?;

    Ok(())
}
