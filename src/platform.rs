//! Process-wide V8 initialization.
//!
//! V8 can only be initialized once per process and cannot be re-initialized
//! after disposal, so the platform lives until the process exits. Every engine
//! goes through [`get_platform`] before creating its isolate.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering};

static PLATFORM: OnceLock<v8::SharedRef<v8::Platform>> = OnceLock::new();
static LIVE_ENGINES: AtomicUsize = AtomicUsize::new(0);

/// Initialize V8 with extra command-line style flags.
///
/// Flags only take effect if this is the first initialization in the process;
/// later calls return the already-initialized platform and log the ignored flags.
pub fn init_v8(flags: &str) -> &'static v8::SharedRef<v8::Platform> {
    let mut applied = false;

    let platform = PLATFORM.get_or_init(|| {
        applied = true;
        initialize(flags)
    });

    if !applied && !flags.is_empty() {
        log::warn!("V8 already initialized, ignoring flags: {}", flags);
    }

    platform
}

/// Get the global V8 platform, initializing it with default flags if necessary.
///
/// Safe to call from multiple threads.
pub fn get_platform() -> &'static v8::SharedRef<v8::Platform> {
    PLATFORM.get_or_init(|| initialize(""))
}

fn initialize(flags: &str) -> v8::SharedRef<v8::Platform> {
    // Smaller heaps behave better without incremental marking
    v8::V8::set_flags_from_string("--noincremental-marking");

    if !flags.is_empty() {
        v8::V8::set_flags_from_string(flags);
    }

    let platform = v8::new_default_platform(0, false).make_shared();
    v8::V8::initialize_platform(platform.clone());
    v8::V8::initialize();

    log::info!("V8 {} initialized", v8::V8::get_version());

    platform
}

/// Number of engines currently alive in this process.
pub fn live_engines() -> usize {
    LIVE_ENGINES.load(Ordering::SeqCst)
}

pub(crate) fn engine_created() {
    let live = LIVE_ENGINES.fetch_add(1, Ordering::SeqCst) + 1;
    log::debug!("Engine created ({} alive)", live);
}

pub(crate) fn engine_destroyed() {
    let live = LIVE_ENGINES.fetch_sub(1, Ordering::SeqCst) - 1;

    if live == 0 {
        // V8 stays initialized: it cannot be brought back once disposed
        log::debug!("Last engine destroyed, keeping V8 platform for reuse");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_is_initialized_once() {
        let first = get_platform() as *const _;
        let second = init_v8("--expose-gc") as *const _;
        assert_eq!(first, second);
    }
}
