//! TraceValue, the tagged variant carried by event arguments
use crate::string_ref::StringRef;

/// One event argument value. Conversions from unsigned integer widths funnel
/// into `U64`, signed widths into `I64`; strings are stored as views with no
/// allocation (see [`StringRef`] for the lifetime rules).
#[derive(Debug, Clone, Copy, Default)]
pub enum TraceValue {
    #[default]
    None,
    Bool(bool),
    U64(u64),
    I64(i64),
    F64(f64),
    Str(StringRef),
    Ptr(*const ()),
}

// The Ptr case records an address for display only and is never dereferenced;
// the Str case follows the StringRef validity invariant.
unsafe impl Send for TraceValue {}
unsafe impl Sync for TraceValue {}

impl TraceValue {
    pub fn empty(&self) -> bool {
        matches!(self, TraceValue::None)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TraceValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            TraceValue::U64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            TraceValue::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TraceValue::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TraceValue::Str(sref) => sref.as_str(),
            _ => None,
        }
    }

    pub fn as_ptr(&self) -> Option<*const ()> {
        match self {
            TraceValue::Ptr(p) => Some(*p),
            _ => None,
        }
    }

    pub fn from_ptr<T>(ptr: *const T) -> Self {
        TraceValue::Ptr(ptr.cast())
    }
}

macro_rules! impl_from_unsigned {
    ($($t:ty),*) => {
        $(impl From<$t> for TraceValue {
            fn from(v: $t) -> Self {
                TraceValue::U64(v as u64)
            }
        })*
    };
}

macro_rules! impl_from_signed {
    ($($t:ty),*) => {
        $(impl From<$t> for TraceValue {
            fn from(v: $t) -> Self {
                TraceValue::I64(v as i64)
            }
        })*
    };
}

impl_from_unsigned!(u8, u16, u32, u64, usize);
impl_from_signed!(i8, i16, i32, i64, isize);

impl From<bool> for TraceValue {
    fn from(v: bool) -> Self {
        TraceValue::Bool(v)
    }
}

impl From<f32> for TraceValue {
    fn from(v: f32) -> Self {
        TraceValue::F64(f64::from(v))
    }
}

impl From<f64> for TraceValue {
    fn from(v: f64) -> Self {
        TraceValue::F64(v)
    }
}

impl From<&'static str> for TraceValue {
    fn from(v: &'static str) -> Self {
        TraceValue::Str(StringRef::from(v))
    }
}

impl From<StringRef> for TraceValue {
    fn from(v: StringRef) -> Self {
        TraceValue::Str(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_empty() {
        let value = TraceValue::default();
        assert!(value.empty());
        assert_eq!(value.as_i64(), None);
    }

    #[test]
    fn test_signed_funnels_to_i64() {
        let value = TraceValue::from(42);
        assert!(!value.empty());
        assert_eq!(value.as_i64(), Some(42));
        assert_eq!(value.as_u64(), None);

        assert_eq!(TraceValue::from(-7i8).as_i64(), Some(-7));
    }

    #[test]
    fn test_unsigned_funnels_to_u64() {
        let value = TraceValue::from(42u64);
        assert_eq!(value.as_u64(), Some(42));
        assert_eq!(TraceValue::from(42u16).as_u64(), Some(42));
    }

    #[test]
    fn test_bool_is_not_an_integer() {
        let value = TraceValue::from(true);
        assert_eq!(value.as_bool(), Some(true));
        assert_eq!(value.as_u64(), None);
    }

    #[test]
    fn test_double() {
        let value = TraceValue::from(3.14);
        assert_eq!(value.as_f64(), Some(3.14));
    }

    #[test]
    fn test_str_stores_the_view() {
        let value = TraceValue::from("Hello World");
        assert_eq!(value.as_str(), Some("Hello World"));
        if let TraceValue::Str(sref) = value {
            assert_eq!(sref.as_ptr(), "Hello World".as_ptr());
        } else {
            panic!("expected Str case");
        }
    }

    #[test]
    fn test_pointer() {
        let i = 42;
        let value = TraceValue::from_ptr(&i);
        assert_eq!(value.as_ptr(), Some(std::ptr::addr_of!(i).cast()));
    }
}
