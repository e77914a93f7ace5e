#[cfg(feature = "shared")]
use crate::value::SharedValue;
use {
    crate::value::Value,
    core::{
        any::{type_name, Any},
        fmt,
        fmt::{Debug, Formatter},
    },
};

/// Zero-argument initializer of a service. Calling it produces the value which
/// replaces the service in its container. A failing call can be retried.
pub struct Service {
    creator: Box<dyn FnMut() -> anyhow::Result<Value>>,
    type_name: &'static str,
}

impl Service {
    pub fn new<T: Any, TFn: FnMut() -> T + 'static>(mut creator: TFn) -> Self {
        Self::fallible(move || Ok(creator()))
    }

    pub fn fallible<T, TFn>(mut creator: TFn) -> Self
    where
        T: Any,
        TFn: FnMut() -> anyhow::Result<T> + 'static,
    {
        Self {
            creator: Box::new(move || creator().map(Value::new)),
            type_name: type_name::<T>(),
        }
    }

    /// Name of the type this service produces
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn call(&mut self) -> anyhow::Result<Value> {
        (self.creator)()
    }
}

impl Debug for Service {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Service(-> {})", self.type_name)
    }
}

/// Anything which can be written into a `Container`: either a plain value or a service
#[derive(Debug)]
pub enum Slot {
    Raw(Value),
    Service(Service),
}

impl Slot {
    pub fn raw<T: Any>(value: T) -> Self {
        Slot::Raw(Value::new(value))
    }

    pub fn service<T: Any, TFn: FnMut() -> T + 'static>(creator: TFn) -> Self {
        Slot::Service(Service::new(creator))
    }

    pub fn try_service<T, TFn>(creator: TFn) -> Self
    where
        T: Any,
        TFn: FnMut() -> anyhow::Result<T> + 'static,
    {
        Slot::Service(Service::fallible(creator))
    }

    pub fn is_invokable(&self) -> bool {
        matches!(self, Slot::Service(_))
    }
}

impl From<Value> for Slot {
    fn from(value: Value) -> Self {
        Slot::Raw(value)
    }
}

impl From<Service> for Slot {
    fn from(service: Service) -> Self {
        Slot::Service(service)
    }
}

/// State of a single entry within a `Container`
pub(crate) enum Entry {
    Raw(Value),
    Pending { service: Service, deferred: bool },
}

impl Entry {
    pub(crate) fn eager(slot: Slot) -> Self {
        match slot {
            Slot::Raw(value) => Entry::Raw(value),
            Slot::Service(service) => Entry::Pending {
                service,
                deferred: false,
            },
        }
    }

    pub(crate) fn as_raw(&self) -> Option<&Value> {
        match self {
            Entry::Raw(value) => Some(value),
            Entry::Pending { .. } => None,
        }
    }

    pub(crate) fn is_pending(&self) -> bool {
        matches!(self, Entry::Pending { .. })
    }
}

#[cfg(feature = "shared")]
type SharedCreator = dyn Fn() -> anyhow::Result<SharedValue> + Send + Sync;

/// Service stored in a `SharedContainer`. In contrast to `Service`, it might be
/// called from any thread, so it is `Fn` instead of `FnMut`.
#[cfg(feature = "shared")]
pub struct SharedService {
    creator: Box<SharedCreator>,
    type_name: &'static str,
}

#[cfg(feature = "shared")]
impl SharedService {
    pub fn new<T, TFn>(creator: TFn) -> Self
    where
        T: Any + Send + Sync,
        TFn: Fn() -> T + Send + Sync + 'static,
    {
        Self::fallible(move || Ok(creator()))
    }

    pub fn fallible<T, TFn>(creator: TFn) -> Self
    where
        T: Any + Send + Sync,
        TFn: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
    {
        Self {
            creator: Box::new(move || creator().map(SharedValue::new)),
            type_name: type_name::<T>(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn call(&self) -> anyhow::Result<SharedValue> {
        (self.creator)()
    }
}

#[cfg(feature = "shared")]
impl Debug for SharedService {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "SharedService(-> {})", self.type_name)
    }
}

#[cfg(feature = "shared")]
#[derive(Debug)]
pub enum SharedSlot {
    Raw(SharedValue),
    Service(SharedService),
}

#[cfg(feature = "shared")]
impl SharedSlot {
    pub fn raw<T: Any + Send + Sync>(value: T) -> Self {
        SharedSlot::Raw(SharedValue::new(value))
    }

    pub fn service<T, TFn>(creator: TFn) -> Self
    where
        T: Any + Send + Sync,
        TFn: Fn() -> T + Send + Sync + 'static,
    {
        SharedSlot::Service(SharedService::new(creator))
    }

    pub fn try_service<T, TFn>(creator: TFn) -> Self
    where
        T: Any + Send + Sync,
        TFn: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
    {
        SharedSlot::Service(SharedService::fallible(creator))
    }

    pub fn is_invokable(&self) -> bool {
        matches!(self, SharedSlot::Service(_))
    }
}

#[cfg(feature = "shared")]
impl From<SharedValue> for SharedSlot {
    fn from(value: SharedValue) -> Self {
        SharedSlot::Raw(value)
    }
}

#[cfg(feature = "shared")]
impl From<SharedService> for SharedSlot {
    fn from(service: SharedService) -> Self {
        SharedSlot::Service(service)
    }
}
