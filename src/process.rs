//! Current process & thread identity
use std::hash::{Hash, Hasher};

pub type ProcessId = u32;
pub type ThreadId = u64;

#[inline]
pub fn current_process_id() -> ProcessId {
    std::process::id()
}

#[inline]
pub fn current_thread_id() -> ThreadId {
    thread_id::get() as ThreadId
}

/// Hash of the process id, XOR-ed into mangled trace ids so that the same
/// pointer recorded by two processes is unlikely to collide.
pub fn process_id_hash(process_id: ProcessId) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    process_id.hash(&mut hasher);
    hasher.finish()
}
