//! Host providers consumed by the engine: file system, timer and log sink.
//!
//! [`HostPlatform`] bundles one of each. Providers left unset on the builder
//! fall back to tokio-backed defaults, driven by a runtime the platform owns.

mod file_system;
mod log_system;
mod timer;

use std::sync::Arc;

pub use file_system::{
    DefaultFileSystem, FileSystem, ReadCallback, StatCallback, StatResult, WriteCallback,
};
pub use log_system::{DefaultLogSystem, LogLevel, LogSystem};
pub use timer::{DefaultTimer, Timer, TimerCallback};

use crate::config::HostConfig;
use crate::error::Result;

pub struct HostPlatform {
    file_system: Arc<dyn FileSystem>,
    timer: Arc<dyn Timer>,
    log_system: Arc<dyn LogSystem>,
    runtime: Option<tokio::runtime::Runtime>,
}

impl HostPlatform {
    pub fn builder() -> HostPlatformBuilder {
        HostPlatformBuilder::default()
    }

    /// Platform with every default provider.
    pub fn new() -> Result<Arc<Self>> {
        Self::builder().build()
    }

    pub fn file_system(&self) -> &Arc<dyn FileSystem> {
        &self.file_system
    }

    pub fn timer(&self) -> &Arc<dyn Timer> {
        &self.timer
    }

    pub fn log_system(&self) -> &Arc<dyn LogSystem> {
        &self.log_system
    }
}

impl Drop for HostPlatform {
    fn drop(&mut self) {
        // May run on one of the runtime's own threads
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl std::fmt::Debug for HostPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostPlatform")
            .field("owns_runtime", &self.runtime.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
pub struct HostPlatformBuilder {
    config: HostConfig,
    file_system: Option<Arc<dyn FileSystem>>,
    timer: Option<Arc<dyn Timer>>,
    log_system: Option<Arc<dyn LogSystem>>,
}

impl HostPlatformBuilder {
    pub fn config(mut self, config: HostConfig) -> Self {
        self.config = config;
        self
    }

    pub fn file_system(mut self, file_system: Arc<dyn FileSystem>) -> Self {
        self.file_system = Some(file_system);
        self
    }

    pub fn timer(mut self, timer: Arc<dyn Timer>) -> Self {
        self.timer = Some(timer);
        self
    }

    pub fn log_system(mut self, log_system: Arc<dyn LogSystem>) -> Self {
        self.log_system = Some(log_system);
        self
    }

    pub fn build(self) -> Result<Arc<HostPlatform>> {
        let (file_system, timer, runtime) = match (self.file_system, self.timer) {
            (Some(file_system), Some(timer)) => (file_system, timer, None),
            (file_system, timer) => {
                let io_threads = self.config.io_threads.max(1);
                let runtime = tokio::runtime::Builder::new_multi_thread()
                    .worker_threads(io_threads)
                    .thread_name("jsengine-io")
                    .enable_all()
                    .build()?;

                tracing::debug!("Started host I/O runtime with {} worker threads", io_threads);

                let handle = runtime.handle().clone();
                let file_system = file_system.unwrap_or_else(|| {
                    Arc::new(DefaultFileSystem::new(
                        handle.clone(),
                        self.config.base_dir.clone(),
                    ))
                });
                let timer = timer.unwrap_or_else(|| Arc::new(DefaultTimer::new(handle)));

                (file_system, timer, Some(runtime))
            }
        };

        let log_system = self
            .log_system
            .unwrap_or_else(|| Arc::new(DefaultLogSystem));

        Ok(Arc::new(HostPlatform {
            file_system,
            timer,
            log_system,
            runtime,
        }))
    }
}
