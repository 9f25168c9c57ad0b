//! Trace ids: plain integers, mangled pointers, and global unique ids
use std::sync::atomic::{AtomicU64, Ordering};

use crate::event::EventFlags;

/// An event id that can either be an integer or a pointer. Pointer-derived
/// ids request mangling with the process id hash so that the same address
/// recorded by different processes is unlikely to collide.
#[derive(Debug, Clone, Copy)]
pub struct TraceId(u64);

impl TraceId {
    /// The "no id" value used when an event carries no `id` field.
    pub const NONE: u64 = 0;

    pub fn from_int(id: u64) -> Self {
        Self(id)
    }

    /// Records the address and flags the event for id mangling.
    pub fn from_ptr<T>(ptr: *const T, flags: &mut EventFlags) -> Self {
        flags.insert(EventFlags::MANGLE_ID);
        Self(ptr as u64)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// A process-unique id usable as a flow or async event id: a counter
    /// biased by a per-process random seed.
    pub fn next_global() -> u64 {
        lazy_static::lazy_static! {
            static ref SEED: u64 = rand::random();
        }
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        *SEED ^ COUNTER.fetch_add(1, Ordering::Relaxed)
    }
}
