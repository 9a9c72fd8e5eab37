//! Parking of script values across asynchronous suspension points.
//!
//! A native operation that completes later (a file read, a timer) must not keep
//! live V8 handles on the side. Instead the values are parked here under a
//! [`WeakValuesId`] and retrieved exactly once, under the context guard, when
//! the operation completes. The registry belongs to its engine: dropping the
//! engine releases every parked group.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::gc::SendGlobal;

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

/// Single-use token for a parked group of values.
///
/// Neither `Clone` nor `Copy`: [`crate::Engine::take_values`] consumes it.
#[derive(Debug, PartialEq, Eq, Hash)]
#[must_use = "parked values are only released by taking them or dropping the engine"]
pub struct WeakValuesId {
    registry: u64,
    group: u64,
}

pub(crate) struct WeakValueRegistry {
    id: u64,
    next_group: AtomicU64,
    groups: Mutex<HashMap<u64, Vec<SendGlobal<v8::Value>>>>,
}

impl WeakValueRegistry {
    pub(crate) fn new() -> Self {
        Self {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            next_group: AtomicU64::new(1),
            groups: Mutex::new(HashMap::new()),
        }
    }

    /// Park a group of handles. Moving handles in does not touch the isolate.
    pub(crate) fn store(&self, values: Vec<v8::Global<v8::Value>>) -> WeakValuesId {
        let group = self.next_group.fetch_add(1, Ordering::Relaxed);
        let values = values.into_iter().map(SendGlobal).collect();

        self.groups.lock().insert(group, values);

        tracing::trace!("Parked weak values group {} (registry {})", group, self.id);

        WeakValuesId {
            registry: self.id,
            group,
        }
    }

    /// Remove a group and hand its handles back.
    ///
    /// A token from another registry is returned inside
    /// [`Error::ForeignToken`] and its group stays parked where it is.
    pub(crate) fn take(&self, id: WeakValuesId) -> Result<Vec<v8::Global<v8::Value>>> {
        if id.registry != self.id {
            return Err(Error::ForeignToken(id));
        }

        let values = self
            .groups
            .lock()
            .remove(&id.group)
            .ok_or(Error::UnknownToken)?;

        Ok(values.into_iter().map(|SendGlobal(global)| global).collect())
    }

    pub(crate) fn len(&self) -> usize {
        self.groups.lock().len()
    }

    /// Release every parked group. Must run under the engine's context guard.
    pub(crate) fn clear(&self) -> usize {
        let groups = std::mem::take(&mut *self.groups.lock());

        let count = groups.len();
        drop(groups);
        count
    }
}
