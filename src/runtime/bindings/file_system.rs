//! The `_fileSystem` script object.
//!
//! Every asynchronous operation parks its script callbacks in the engine's
//! weak value registry and hands the file system provider a completion that
//! only holds a `Weak<Engine>`. Each callback receives a single result object
//! whose `error` string is empty on success.

use std::io;
use std::sync::{Arc, Weak};

use bytes::Bytes;

use crate::callbacks::{require_arity, require_function};
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::value::JsValue;
use crate::weak_values::WeakValuesId;

const READ: &str = "_fileSystem.read";
const READ_BINARY: &str = "_fileSystem.readBinary";
const READ_FROM_FILE: &str = "_fileSystem.readFromFile";
const WRITE: &str = "_fileSystem.write";
const MOVE: &str = "_fileSystem.move";
const REMOVE: &str = "_fileSystem.remove";
const STAT: &str = "_fileSystem.stat";
const RESOLVE: &str = "_fileSystem.resolve";

/// Run `f` with the parked callbacks if the engine is still alive.
fn deliver<F>(engine: &Weak<Engine>, id: WeakValuesId, operation: &str, f: F)
where
    F: FnOnce(&Arc<Engine>, Vec<JsValue>) -> Result<()>,
{
    let Some(engine) = engine.upgrade() else {
        tracing::trace!("{} completed after engine teardown, dropping result", operation);
        return;
    };

    let _guard = engine.lock();

    let result = engine
        .take_values(id)
        .and_then(|callbacks| f(&engine, callbacks));

    if let Err(e) = result {
        tracing::warn!("Uncaught exception in {} callback: {}", operation, e);
    }
}

fn parked(callbacks: &[JsValue], index: usize) -> Result<&JsValue> {
    callbacks
        .get(index)
        .ok_or_else(|| Error::Argument(format!("missing parked callback #{}", index)))
}

fn error_message<T>(result: &io::Result<T>) -> String {
    match result {
        Ok(_) => String::new(),
        Err(e) => e.to_string(),
    }
}

/// `{error}`
fn result_object(engine: &Arc<Engine>, error: &str) -> Result<JsValue> {
    let result = engine.new_object();
    result.set_property("error", error)?;
    Ok(result)
}

/// Lines of `data`, split on `\n` and `\r`, without empty lines.
fn split_lines(data: &[u8]) -> impl Iterator<Item = &[u8]> {
    data.split(|b| *b == b'\n' || *b == b'\r')
        .filter(|line| !line.is_empty())
}

/// `read(path, callback)`: callback receives `{content, error}`
fn read(engine: &Arc<Engine>, params: Vec<JsValue>) -> Result<Option<JsValue>> {
    require_arity(&params, 2, READ)?;
    require_function(&params, 1, READ)?;

    let path = params[0].as_string();
    let id = engine.store_values(&params[1..])?;
    let weak = engine.weak();

    engine.file_system().read(
        &path,
        Box::new(move |result| {
            deliver(&weak, id, READ, |engine, callbacks| {
                let error = error_message(&result);
                let content = result
                    .map(|data| String::from_utf8_lossy(&data).into_owned())
                    .unwrap_or_default();

                let response = result_object(engine, &error)?;
                response.set_property("content", content)?;
                parked(&callbacks, 0)?.call(&[response])?;

                Ok(())
            });
        }),
    );

    Ok(None)
}

/// Lines of `data` split on `\n` only, empty lines kept, sorted into
/// `(ascii, non_ascii)` by whether any byte is above 127.
fn partition_lines(data: &[u8]) -> (Vec<String>, Vec<String>) {
    let mut pieces: Vec<&[u8]> = data.split(|b| *b == b'\n').collect();
    if pieces.last().is_some_and(|last| last.is_empty()) {
        pieces.pop();
    }

    let (ascii, non_ascii): (Vec<&[u8]>, Vec<&[u8]>) =
        pieces.into_iter().partition(|line| line.is_ascii());

    let to_strings = |lines: Vec<&[u8]>| {
        lines
            .into_iter()
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .collect::<Vec<_>>()
    };

    (to_strings(ascii), to_strings(non_ascii))
}

/// `readOpt(path, callback)`: callback receives `{content_ascii, content, error}`
///
/// Both `content` fields are arrays of lines: `content_ascii` holds the pure
/// ASCII ones, `content` everything else.
fn read_opt(engine: &Arc<Engine>, params: Vec<JsValue>) -> Result<Option<JsValue>> {
    require_arity(&params, 2, READ)?;
    require_function(&params, 1, READ)?;

    let path = params[0].as_string();
    let id = engine.store_values(&params[1..])?;
    let weak = engine.weak();

    engine.file_system().read(
        &path,
        Box::new(move |result| {
            deliver(&weak, id, READ, |engine, callbacks| {
                let error = error_message(&result);
                let (ascii, non_ascii) = result
                    .map(|data| partition_lines(&data))
                    .unwrap_or_default();

                let response = result_object(engine, &error)?;
                response.set_property("content_ascii", ascii)?;
                response.set_property("content", non_ascii)?;
                parked(&callbacks, 0)?.call(&[response])?;

                Ok(())
            });
        }),
    );

    Ok(None)
}

/// `readBinary(path, callback)`: callback receives `{content: Uint8Array, error}`
fn read_binary(engine: &Arc<Engine>, params: Vec<JsValue>) -> Result<Option<JsValue>> {
    require_arity(&params, 2, READ_BINARY)?;
    require_function(&params, 1, READ_BINARY)?;

    let path = params[0].as_string();
    let id = engine.store_values(&params[1..])?;
    let weak = engine.weak();

    engine.file_system().read(
        &path,
        Box::new(move |result| {
            deliver(&weak, id, READ_BINARY, |engine, callbacks| {
                let error = error_message(&result);
                let content = result.unwrap_or_default();

                let response = result_object(engine, &error)?;
                response.set_property("content", content)?;
                parked(&callbacks, 0)?.call(&[response])?;

                Ok(())
            });
        }),
    );

    Ok(None)
}

/// `readFromFile(path, lineCallback, doneCallback)`
///
/// Every non-empty line is passed to `lineCallback`, then `doneCallback`
/// receives `{error}` exactly once. An exception thrown by `lineCallback`
/// stops the iteration and is reported through `error`.
fn read_from_file(engine: &Arc<Engine>, params: Vec<JsValue>) -> Result<Option<JsValue>> {
    require_arity(&params, 3, READ_FROM_FILE)?;
    require_function(&params, 1, READ_FROM_FILE)?;
    require_function(&params, 2, READ_FROM_FILE)?;

    let path = params[0].as_string();
    let id = engine.store_values(&params[1..])?;
    let weak = engine.weak();

    engine.file_system().read(
        &path,
        Box::new(move |result| {
            deliver(&weak, id, READ_FROM_FILE, |engine, callbacks| {
                let on_line = parked(&callbacks, 0)?;
                let on_done = parked(&callbacks, 1)?;

                let error = match result {
                    Ok(data) => {
                        let mut error = String::new();

                        for line in split_lines(&data) {
                            let line = engine.new_value(&*String::from_utf8_lossy(line))?;

                            if let Err(e) = on_line.call(&[line]) {
                                error = e.to_string();
                                break;
                            }
                        }

                        error
                    }
                    Err(e) => e.to_string(),
                };

                on_done.call(&[result_object(engine, &error)?])?;

                Ok(())
            });
        }),
    );

    Ok(None)
}

/// `write(path, content, callback)`: content is a string, `Uint8Array` or `ArrayBuffer`
fn write(engine: &Arc<Engine>, params: Vec<JsValue>) -> Result<Option<JsValue>> {
    require_arity(&params, 3, WRITE)?;
    require_function(&params, 2, WRITE)?;

    let path = params[0].as_string();
    let content = &params[1];
    let data = if content.is_string() {
        Bytes::from(content.as_string())
    } else {
        content
            .as_bytes()
            .unwrap_or_else(|_| Bytes::from(content.as_string()))
    };

    let id = engine.store_values(&params[2..])?;
    let weak = engine.weak();

    engine.file_system().write(
        &path,
        data,
        Box::new(move |result| {
            deliver(&weak, id, WRITE, |engine, callbacks| {
                let response = result_object(engine, &error_message(&result))?;
                parked(&callbacks, 0)?.call(&[response])?;
                Ok(())
            });
        }),
    );

    Ok(None)
}

/// `move(from, to, callback)`
fn move_file(engine: &Arc<Engine>, params: Vec<JsValue>) -> Result<Option<JsValue>> {
    require_arity(&params, 3, MOVE)?;
    require_function(&params, 2, MOVE)?;

    let from = params[0].as_string();
    let to = params[1].as_string();
    let id = engine.store_values(&params[2..])?;
    let weak = engine.weak();

    engine.file_system().move_file(
        &from,
        &to,
        Box::new(move |result| {
            deliver(&weak, id, MOVE, |engine, callbacks| {
                let response = result_object(engine, &error_message(&result))?;
                parked(&callbacks, 0)?.call(&[response])?;
                Ok(())
            });
        }),
    );

    Ok(None)
}

/// `remove(path, callback)`
fn remove(engine: &Arc<Engine>, params: Vec<JsValue>) -> Result<Option<JsValue>> {
    require_arity(&params, 2, REMOVE)?;
    require_function(&params, 1, REMOVE)?;

    let path = params[0].as_string();
    let id = engine.store_values(&params[1..])?;
    let weak = engine.weak();

    engine.file_system().remove(
        &path,
        Box::new(move |result| {
            deliver(&weak, id, REMOVE, |engine, callbacks| {
                let response = result_object(engine, &error_message(&result))?;
                parked(&callbacks, 0)?.call(&[response])?;
                Ok(())
            });
        }),
    );

    Ok(None)
}

/// `stat(path, callback)`: callback receives `{exists, isFile, isDirectory, lastModified, error}`
fn stat(engine: &Arc<Engine>, params: Vec<JsValue>) -> Result<Option<JsValue>> {
    require_arity(&params, 2, STAT)?;
    require_function(&params, 1, STAT)?;

    let path = params[0].as_string();
    let id = engine.store_values(&params[1..])?;
    let weak = engine.weak();

    engine.file_system().stat(
        &path,
        Box::new(move |result| {
            deliver(&weak, id, STAT, |engine, callbacks| {
                let error = error_message(&result);
                let stat = result.unwrap_or_default();

                let response = result_object(engine, &error)?;
                response.set_property("exists", stat.exists)?;
                response.set_property("isFile", stat.is_file)?;
                response.set_property("isDirectory", stat.is_directory)?;
                response.set_property("lastModified", stat.last_modified)?;
                parked(&callbacks, 0)?.call(&[response])?;

                Ok(())
            });
        }),
    );

    Ok(None)
}

/// `resolve(path)`: synchronous, returns the provider's resolved path
fn resolve(engine: &Arc<Engine>, params: Vec<JsValue>) -> Result<Option<JsValue>> {
    require_arity(&params, 1, RESOLVE)?;

    let resolved = engine.file_system().resolve(&params[0].as_string());
    Ok(Some(engine.new_value(resolved)?))
}

pub fn setup_file_system(engine: &Arc<Engine>) -> Result<()> {
    let fs = engine.new_object();

    register_method!(engine, fs, "read", read);
    register_method!(engine, fs, "readOpt", read_opt);
    register_method!(engine, fs, "readBinary", read_binary);
    register_method!(engine, fs, "readFromFile", read_from_file);
    register_method!(engine, fs, "write", write);
    register_method!(engine, fs, "move", move_file);
    register_method!(engine, fs, "remove", remove);
    register_method!(engine, fs, "stat", stat);
    register_method!(engine, fs, "resolve", resolve);

    engine.set_global_property("_fileSystem", &fs)
}
