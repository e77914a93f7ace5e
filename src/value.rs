use core::{
    any::{type_name, Any},
    fmt,
    fmt::{Debug, Formatter},
};
#[cfg(feature = "shared")]
use std::sync::Arc;

/// Result of a service or a plain value stored in a `Container`.
/// Keeps the name of the erased type around for diagnostics.
pub struct Value {
    inner: Box<dyn Any>,
    type_name: &'static str,
}

impl Value {
    pub fn new<T: Any>(value: T) -> Self {
        Self {
            inner: Box::new(value),
            type_name: type_name::<T>(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.inner.downcast_mut::<T>()
    }

    /// Moves the inner value out. Returns `self` unchanged if `T` doesn't match.
    pub fn downcast<T: Any>(self) -> Result<T, Self> {
        let type_name = self.type_name;
        self.inner
            .downcast::<T>()
            .map(|b| *b)
            .map_err(|inner| Self { inner, type_name })
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Value({})", self.type_name)
    }
}

/// Thread-safe counterpart of `Value` used by `SharedContainer`.
/// Clones share the same instance.
#[cfg(feature = "shared")]
#[derive(Clone)]
pub struct SharedValue {
    inner: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

#[cfg(feature = "shared")]
impl SharedValue {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self {
            inner: value,
            type_name: type_name::<T>(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.inner.clone().downcast::<T>().ok()
    }
}

#[cfg(feature = "shared")]
impl Debug for SharedValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "SharedValue({})", self.type_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downcast_to_stored_type() {
        let mut value = Value::new(42i32);
        assert!(value.is::<i32>());
        assert_eq!(Some(&42), value.downcast_ref::<i32>());
        assert_eq!(None, value.downcast_ref::<i64>());

        *value.downcast_mut::<i32>().unwrap() += 1;
        assert_eq!(Ok(43), value.downcast::<i32>().map_err(|_| ()));
    }

    #[test]
    fn failed_downcast_returns_original() {
        let value = Value::new(String::from("1.0.0"));
        let value = value.downcast::<i32>().expect_err("Expected type mismatch");
        assert_eq!("alloc::string::String", value.type_name());
        assert_eq!(Some("1.0.0"), value.downcast_ref::<String>().map(|s| s.as_str()));
    }

    #[test]
    fn debug_contains_type_name() {
        assert_eq!("Value(i32)", format!("{:?}", Value::new(1i32)));
    }

    #[test]
    #[cfg(feature = "shared")]
    fn shared_value_debug_contains_type_name() {
        assert_eq!("SharedValue(u8)", format!("{:?}", SharedValue::new(1u8)));
    }

    #[test]
    #[cfg(feature = "shared")]
    fn shared_value_clones_share_instance() {
        let value = SharedValue::new(vec![1, 2, 3]);
        let a = value.downcast::<Vec<i32>>().unwrap();
        let b = value.clone().downcast::<Vec<i32>>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(value.downcast::<String>().is_none());
    }
}
