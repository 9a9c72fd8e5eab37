#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use jsengine_v8::host::{
    FileSystem, LogLevel, LogSystem, ReadCallback, StatCallback, StatResult, Timer,
    TimerCallback, WriteCallback,
};
use jsengine_v8::{AppInfo, Engine, HostConfig, HostPlatform, JsValue};

pub const TIMEOUT: Duration = Duration::from_secs(5);

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn test_app_info() -> AppInfo {
    AppInfo {
        id: "{d4f1d5c3-4b5a-4f0e-9d8e-000000000001}".to_string(),
        name: "jsengine-tests".to_string(),
        version: "1.0".to_string(),
        application: "test-host".to_string(),
        application_version: "2.0".to_string(),
        locale: "en-US".to_string(),
        development: true,
    }
}

/// Engine with default providers.
pub fn new_engine() -> Arc<Engine> {
    init_logging();

    Engine::builder()
        .app_info(test_app_info())
        .build()
        .unwrap()
}

/// Engine whose default file system resolves relative paths against `dir`.
pub fn engine_in_dir(dir: &Path) -> Arc<Engine> {
    let host = HostPlatform::builder()
        .config(HostConfig {
            io_threads: 2,
            base_dir: Some(dir.to_path_buf()),
        })
        .build()
        .unwrap();

    engine_with_host(host)
}

pub fn engine_with_host(host: Arc<HostPlatform>) -> Arc<Engine> {
    init_logging();

    Engine::builder()
        .app_info(test_app_info())
        .host(host)
        .build()
        .unwrap()
}

/// Collects the (stringified) parameters of an engine event.
///
/// Scripts signal completion with `_triggerEvent(name, ...)`.
pub struct Latch {
    rx: mpsc::Receiver<Vec<String>>,
}

impl Latch {
    pub fn listen(engine: &Engine, event: &str) -> Self {
        let (tx, rx) = mpsc::channel();

        engine.set_event_callback(event, move |params: Vec<JsValue>| {
            let values = params.iter().map(JsValue::as_string).collect();
            let _ = tx.send(values);
        });

        Self { rx }
    }

    pub fn wait(&self) -> Vec<String> {
        self.rx
            .recv_timeout(TIMEOUT)
            .expect("event was not triggered in time")
    }

    /// Assert that no event arrives within `wait`.
    pub fn assert_silent(&self, wait: Duration) {
        assert!(self.rx.recv_timeout(wait).is_err(), "unexpected event");
    }
}

type PendingOp = Box<dyn FnOnce() + Send>;

/// In-memory file system whose operations only complete on `complete_all`.
#[derive(Default)]
pub struct LazyFileSystem {
    files: Arc<Mutex<HashMap<String, Bytes>>>,
    pending: Mutex<Vec<PendingOp>>,
}

impl LazyFileSystem {
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), Bytes::from(content.to_string()));
        self
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    pub fn file(&self, path: &str) -> Option<Bytes> {
        self.files.lock().unwrap().get(path).cloned()
    }

    /// Complete every queued operation on the calling thread.
    pub fn complete_all(&self) {
        let ops = std::mem::take(&mut *self.pending.lock().unwrap());

        for op in ops {
            op();
        }
    }

    fn defer(&self, op: impl FnOnce() + Send + 'static) {
        self.pending.lock().unwrap().push(Box::new(op));
    }
}

fn not_found(path: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("{} does not exist", path))
}

impl FileSystem for LazyFileSystem {
    fn read(&self, path: &str, callback: ReadCallback) {
        let files = self.files.clone();
        let path = path.to_string();

        self.defer(move || {
            let result = files.lock().unwrap().get(&path).cloned();
            callback(result.ok_or_else(|| not_found(&path)));
        });
    }

    fn write(&self, path: &str, data: Bytes, callback: WriteCallback) {
        let files = self.files.clone();
        let path = path.to_string();

        self.defer(move || {
            files.lock().unwrap().insert(path, data);
            callback(Ok(()));
        });
    }

    fn move_file(&self, from: &str, to: &str, callback: WriteCallback) {
        let files = self.files.clone();
        let (from, to) = (from.to_string(), to.to_string());

        self.defer(move || {
            let mut files = files.lock().unwrap();

            let result = match files.remove(&from) {
                Some(data) => {
                    files.insert(to, data);
                    Ok(())
                }
                None => Err(not_found(&from)),
            };

            drop(files);
            callback(result);
        });
    }

    fn remove(&self, path: &str, callback: WriteCallback) {
        let files = self.files.clone();
        let path = path.to_string();

        self.defer(move || {
            let removed = files.lock().unwrap().remove(&path);
            callback(removed.map(|_| ()).ok_or_else(|| not_found(&path)));
        });
    }

    fn stat(&self, path: &str, callback: StatCallback) {
        let files = self.files.clone();
        let path = path.to_string();

        self.defer(move || {
            let exists = files.lock().unwrap().contains_key(&path);

            callback(Ok(StatResult {
                exists,
                is_file: exists,
                is_directory: false,
                last_modified: if exists { 1_700_000_000_000 } else { 0 },
            }));
        });
    }

    fn resolve(&self, path: &str) -> String {
        format!("/lazy/{}", path)
    }
}

/// Timer whose callbacks only run on `fire_all`.
#[derive(Default)]
pub struct ManualTimer {
    pending: Mutex<Vec<(Duration, TimerCallback)>>,
}

impl ManualTimer {
    pub fn pending(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.pending.lock().unwrap().iter().map(|(d, _)| *d).collect()
    }

    pub fn fire_all(&self) {
        let timers = std::mem::take(&mut *self.pending.lock().unwrap());

        for (_, callback) in timers {
            callback();
        }
    }
}

impl Timer for ManualTimer {
    fn set_timer(&self, delay: Duration, callback: TimerCallback) {
        self.pending.lock().unwrap().push((delay, callback));
    }
}

/// Log system recording every console message.
#[derive(Default)]
pub struct RecordingLogSystem {
    pub entries: Mutex<Vec<(LogLevel, String, String)>>,
}

impl LogSystem for RecordingLogSystem {
    fn log(&self, level: LogLevel, message: &str, source: &str) {
        self.entries
            .lock()
            .unwrap()
            .push((level, message.to_string(), source.to_string()));
    }
}

/// Host with a lazy file system and a manual timer.
pub fn lazy_host(
    fs: Arc<LazyFileSystem>,
    timer: Arc<ManualTimer>,
) -> Arc<HostPlatform> {
    HostPlatform::builder()
        .file_system(fs)
        .timer(timer)
        .build()
        .unwrap()
}
