//! StringRef is the raw (pointer, length) string view stored inside events.
//!
//! An event holds its category name, event name and argument keys as plain
//! pointer/length pairs rather than `&str` so that a single event type can
//! reference both program-lifetime static strings and bytes inside its own
//! deep-copy storage. Every `StringRef` inside an event points either at
//! `'static` data or into that event's `copy_storage` buffer, and stays valid
//! until the event is dropped.

#[derive(Debug, Clone, Copy)]
pub struct StringRef {
    ptr: *const u8,
    len: u32,
}

// StringRef only ever designates immutable UTF-8 bytes that live at least as
// long as the value holding the reference (static storage or the owning
// event's copy buffer).
unsafe impl Send for StringRef {}
unsafe impl Sync for StringRef {}

impl StringRef {
    /// The empty-slot sentinel; formats as JSON `null` and terminates the
    /// argument list of an event.
    pub const fn null() -> Self {
        Self {
            ptr: std::ptr::null(),
            len: 0,
        }
    }

    /// View into `bytes`, which must stay immutable and outlive every read
    /// through the returned reference.
    pub(crate) fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            ptr: bytes.as_ptr(),
            len: bytes.len() as u32,
        }
    }

    pub fn is_null(&self) -> bool {
        self.ptr.is_null()
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.ptr
    }

    /// `None` for the null sentinel.
    pub fn as_str(&self) -> Option<&str> {
        if self.ptr.is_null() {
            return None;
        }
        // Upheld by construction: the bytes come from a &str (static or
        // deep-copied) and outlive self.
        unsafe {
            let bytes = std::slice::from_raw_parts(self.ptr, self.len as usize);
            Some(std::str::from_utf8_unchecked(bytes))
        }
    }
}

impl From<&'static str> for StringRef {
    fn from(src: &'static str) -> Self {
        Self {
            ptr: src.as_ptr(),
            len: src.len() as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_view() {
        let sref = StringRef::from("hello");
        assert_eq!(sref.len(), 5);
        assert_eq!(sref.as_ptr(), "hello".as_ptr());
        assert_eq!(sref.as_str(), Some("hello"));
        assert!(!sref.is_null());
    }

    #[test]
    fn test_null_sentinel() {
        let sref = StringRef::null();
        assert!(sref.is_null());
        assert!(sref.is_empty());
        assert_eq!(sref.as_str(), None);
    }
}
