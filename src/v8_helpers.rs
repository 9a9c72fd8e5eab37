//! Small helpers for building V8 values from Rust data.

use crate::error::{Error, Result};

/// Creates a V8 ArrayBuffer from a Vec<u8>.
///
/// The backing store is created directly from Rust memory (zero-copy).
pub fn create_array_buffer_from_vec<'s>(
    scope: &mut v8::PinScope<'s, '_>,
    data: Vec<u8>,
) -> v8::Local<'s, v8::ArrayBuffer> {
    if data.is_empty() {
        return v8::ArrayBuffer::new(scope, 0);
    }

    let backing_store = v8::ArrayBuffer::new_backing_store_from_vec(data).make_shared();
    v8::ArrayBuffer::with_backing_store(scope, &backing_store)
}

/// Creates a `Uint8Array` spanning the whole of `data`.
pub fn create_uint8_array<'s>(
    scope: &mut v8::PinScope<'s, '_>,
    data: Vec<u8>,
) -> Result<v8::Local<'s, v8::Value>> {
    let len = data.len();
    let array_buffer = create_array_buffer_from_vec(scope, data);

    v8::Uint8Array::new(scope, array_buffer, 0, len)
        .map(Into::into)
        .ok_or_else(|| Error::Type(format!("unable to create a Uint8Array of {} bytes", len)))
}

/// Length for `v8::Array::new`, which only takes an `i32`.
pub fn array_length(len: usize) -> Result<i32> {
    i32::try_from(len)
        .map_err(|_| Error::Argument(format!("{} elements exceed the maximum array length", len)))
}
