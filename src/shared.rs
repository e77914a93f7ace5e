use {
    crate::{
        error::{Error, Result},
        key::{has_marker, strip_marker, AutoIndex, Options},
        slot::{SharedService, SharedSlot},
        value::SharedValue,
    },
    core::{
        any::{type_name, Any},
        fmt,
        fmt::{Debug, Formatter},
        sync::atomic::{AtomicBool, Ordering},
    },
    indexmap::IndexMap,
    once_cell::sync::OnceCell,
    parking_lot::RwLock,
    std::sync::Arc,
};

/// Thread-safe variant of `Container`.
///
/// Every service is initialized at most once, even if multiple threads request it
/// simultaneously. Concurrent readers of the same key wait for the first one to finish.
/// The internal lock is never held while a service is running, so services might
/// use the container themselves, as long as they don't request their own key.
pub struct SharedContainer {
    state: RwLock<SharedState>,
    options: Options,
}

#[derive(Default)]
struct SharedState {
    entries: IndexMap<String, Arc<SharedEntry>>,
    auto_index: AutoIndex,
}

enum SharedEntry {
    Raw(SharedValue),
    Lazy {
        cell: OnceCell<SharedValue>,
        service: SharedService,
        deferred: AtomicBool,
    },
}

impl SharedEntry {
    fn eager(slot: SharedSlot) -> Self {
        match slot {
            SharedSlot::Raw(value) => SharedEntry::Raw(value),
            SharedSlot::Service(service) => SharedEntry::lazy(service, false),
        }
    }

    fn lazy(service: SharedService, deferred: bool) -> Self {
        SharedEntry::Lazy {
            cell: OnceCell::new(),
            service,
            deferred: AtomicBool::new(deferred),
        }
    }

    fn resolve(&self, key: &str) -> Result<SharedValue> {
        match self {
            SharedEntry::Raw(value) => Ok(value.clone()),
            SharedEntry::Lazy { cell, service, .. } => cell
                .get_or_try_init(|| {
                    tracing::trace!(key, produces = service.type_name(), "evaluating service");
                    service.call().map_err(|source| {
                        tracing::debug!(key, error = %source, "service failed");
                        Error::Service {
                            key: key.to_owned(),
                            source,
                        }
                    })
                })
                .cloned(),
        }
    }

    fn is_evaluated(&self) -> bool {
        match self {
            SharedEntry::Raw(_) => true,
            SharedEntry::Lazy { cell, .. } => cell.get().is_some(),
        }
    }
}

impl Default for SharedContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedContainer {
    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    pub fn with_options(options: Options) -> Self {
        Self {
            state: RwLock::new(SharedState::default()),
            options,
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Same semantics as `Container::insert`
    pub fn insert(&self, key: Option<&str>, slot: impl Into<SharedSlot>) -> String {
        let slot = slot.into();
        let mut guard = self.state.write();
        let state = &mut *guard;
        match key {
            None => {
                let entries = &state.entries;
                let key = state.auto_index.next_key(|k| entries.contains_key(k));
                state
                    .entries
                    .insert(key.clone(), Arc::new(SharedEntry::eager(slot)));
                key
            }
            Some(key) => {
                let (key, entry) = match slot {
                    SharedSlot::Service(service)
                        if has_marker(key, self.options.deferred_marker) =>
                    {
                        let key = strip_marker(key, self.options.deferred_marker);
                        tracing::trace!(key, "registering deferred service");
                        (key, SharedEntry::lazy(service, true))
                    }
                    slot => (key, SharedEntry::eager(slot)),
                };
                state.auto_index.observe(key);
                state.entries.insert(key.to_owned(), Arc::new(entry));
                key.to_owned()
            }
        }
    }

    pub fn set(&self, key: &str, slot: impl Into<SharedSlot>) {
        self.insert(Some(key), slot);
    }

    pub fn push(&self, slot: impl Into<SharedSlot>) -> String {
        self.insert(None, slot)
    }

    pub fn is_deferrable(&self, key: &str, slot: &SharedSlot) -> bool {
        slot.is_invokable() && has_marker(key, self.options.deferred_marker)
    }

    pub fn register_deferred(&self, key: &str, slot: impl Into<SharedSlot>) -> Result<()> {
        match slot.into() {
            SharedSlot::Service(service) => {
                tracing::trace!(key, "registering deferred service");
                let mut state = self.state.write();
                state.auto_index.observe(key);
                state
                    .entries
                    .insert(key.to_owned(), Arc::new(SharedEntry::lazy(service, true)));
                Ok(())
            }
            SharedSlot::Raw(_) => Err(Error::NotInvokable {
                key: key.to_owned(),
            }),
        }
    }

    /// Returns the value of `key`, initializing it if necessary
    pub fn get(&self, key: &str) -> Result<Option<SharedValue>> {
        // Clone the entry so the lock is released before the service runs
        let entry = match self.state.read().entries.get(key) {
            Some(entry) => entry.clone(),
            None => return Ok(None),
        };
        entry.resolve(key).map(Some)
    }

    pub fn get_as<T: Any + Send + Sync>(&self, key: &str) -> Result<Option<Arc<T>>> {
        match self.get(key)? {
            None => Ok(None),
            Some(value) => value.downcast::<T>().map(Some).ok_or_else(|| Error::TypeMismatch {
                key: key.to_owned(),
                expected: type_name::<T>(),
                found: value.type_name(),
            }),
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.state.read().entries.contains_key(key)
    }

    pub fn is_evaluated(&self, key: &str) -> bool {
        self.state
            .read()
            .entries
            .get(key)
            .is_some_and(|e| e.is_evaluated())
    }

    pub fn remove(&self, key: &str) -> bool {
        self.state.write().entries.shift_remove(key).is_some()
    }

    /// Evaluates all services which exist when `run()` is called.
    /// Deferred services are handled like in `Container::run`.
    pub fn run(&self) -> Result<()> {
        let snapshot: Vec<(String, Arc<SharedEntry>)> = self
            .state
            .read()
            .entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect();

        let _span = tracing::debug_span!("run", entries = snapshot.len()).entered();
        for (key, entry) in snapshot {
            if let SharedEntry::Lazy { deferred, .. } = &*entry {
                if deferred.swap(false, Ordering::AcqRel) {
                    tracing::trace!(key = key.as_str(), "keeping deferred service pending");
                    continue;
                }
            }
            entry.resolve(&key)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }

    /// Snapshot of all keys in insertion order
    pub fn keys(&self) -> Vec<String> {
        self.state.read().entries.keys().cloned().collect()
    }
}

impl Debug for SharedContainer {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.write_fmt(format_args!(
            "SharedContainer (entries: {}, pending: {})",
            state.entries.len(),
            state.entries.values().filter(|e| !e.is_evaluated()).count()
        ))
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        std::sync::atomic::{AtomicUsize, Ordering},
    };

    fn counted(result: i32) -> (Arc<AtomicUsize>, SharedSlot) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let slot = SharedSlot::service(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            result
        });
        (calls, slot)
    }

    #[test]
    fn get_evaluates_once() {
        let (calls, slot) = counted(42);
        let container = SharedContainer::new();
        container.set("answer", slot);
        assert_eq!(Some(42), container.get_as::<i32>("answer").unwrap().map(|i| *i));
        assert_eq!(Some(42), container.get_as::<i32>("answer").unwrap().map(|i| *i));
        assert_eq!(1, calls.load(Ordering::SeqCst));
    }

    #[test]
    fn run_skips_deferred_once() {
        let (eager_calls, eager) = counted(1);
        let (deferred_calls, deferred) = counted(2);
        let container = SharedContainer::new();
        container.set("admin_side", eager);
        assert_eq!("mailer", container.insert(Some("*mailer"), deferred));

        container.run().unwrap();
        assert_eq!(1, eager_calls.load(Ordering::SeqCst));
        assert_eq!(0, deferred_calls.load(Ordering::SeqCst));
        assert!(!container.is_evaluated("mailer"));

        assert_eq!(Some(2), container.get_as::<i32>("mailer").unwrap().map(|i| *i));
        container.run().unwrap();
        assert_eq!(1, deferred_calls.load(Ordering::SeqCst));
    }

    #[test]
    fn concurrent_access_initializes_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let container = Arc::new(SharedContainer::new());
        container
            .register_deferred(
                "pool",
                SharedSlot::service(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    std::thread::sleep(std::time::Duration::from_millis(10));
                    String::from("pool")
                }),
            )
            .unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let container = container.clone();
                std::thread::spawn(move || container.get_as::<String>("pool").unwrap())
            })
            .collect();
        for handle in handles {
            let pool = handle.join().unwrap().expect("Expected pool to exist");
            assert_eq!("pool", pool.as_str());
        }
        assert_eq!(1, calls.load(Ordering::SeqCst));
    }

    #[test]
    fn failed_initialization_is_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let container = SharedContainer::new();
        container.set(
            "db",
            SharedSlot::try_service(move || {
                match counter.fetch_add(1, Ordering::SeqCst) {
                    0 => Err(anyhow::anyhow!("connection refused")),
                    _ => Ok(5u8),
                }
            }),
        );
        assert!(container.run().is_err());
        assert!(!container.is_evaluated("db"));
        assert_eq!(Some(5), container.get_as::<u8>("db").unwrap().map(|i| *i));
        assert_eq!(2, attempts.load(Ordering::SeqCst));
    }

    #[test]
    fn register_deferred_rejects_raw_values() {
        let container = SharedContainer::new();
        assert!(matches!(
            container.register_deferred("mailer", SharedSlot::raw(42)),
            Err(Error::NotInvokable { .. })
        ));
        assert!(!container.has("mailer"));
        assert!(container.is_empty());
    }

    #[test]
    fn push_remove_and_missing_keys() {
        let container = SharedContainer::new();
        assert_eq!("0", container.push(SharedSlot::raw("a")));
        assert_eq!("1", container.push(SharedSlot::raw("b")));
        assert_eq!(vec!["0", "1"], container.keys());
        assert!(container.remove("0"));
        assert!(!container.has("0"));
        assert!(container.get("0").unwrap().is_none());
        assert_eq!(1, container.len());
        assert!(matches!(
            container.get_as::<i32>("1"),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn push_after_largest_index_never_overwrites() {
        let max = usize::MAX.to_string();
        let container = SharedContainer::new();
        container.set(&max, SharedSlot::raw("explicit"));
        assert_eq!("0", container.push(SharedSlot::raw("appended")));
        assert_eq!(
            Some("explicit"),
            container.get_as::<&str>(&max).unwrap().map(|v| *v)
        );
    }

    #[test]
    fn debug_counts_pending_entries() {
        let container = SharedContainer::new();
        container.set("a", SharedSlot::raw(1));
        container.set("b", SharedSlot::service(|| 2));
        assert_eq!(
            "SharedContainer (entries: 2, pending: 1)",
            format!("{:?}", container)
        );
    }
}
