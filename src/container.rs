use {
    crate::{
        error::{Error, Result},
        key::{has_marker, strip_marker, AutoIndex, Options},
        slot::{Entry, Service, Slot},
        value::Value,
    },
    core::{
        any::{type_name, Any},
        fmt,
        fmt::{Debug, Formatter},
    },
    indexmap::IndexMap,
};

/// Key-value store whose values are either plain data or services.
///
/// Services are evaluated at most once: either by `run()`, or on first access.
/// The result replaces the service. Deferred services are skipped by the first
/// `run()` they encounter and are therefore only initialized when accessed.
///
/// The container is single threaded. See `SharedContainer` for concurrent access.
pub struct Container {
    entries: IndexMap<String, Entry>,
    auto_index: AutoIndex,
    options: Options,
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    /// Creates an empty Container which treats keys prefixed with `*` as deferred services
    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    pub fn with_options(options: Options) -> Self {
        Self {
            entries: IndexMap::new(),
            auto_index: AutoIndex::default(),
            options,
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Writes `slot` under `key` and returns the key it was stored with.
    ///
    /// - `None` appends the slot under a newly generated key
    /// - Keys starting with the deferred marker register services as deferred
    ///   under the stripped key
    /// - Everything else overwrites `key`
    pub fn insert(&mut self, key: Option<&str>, slot: impl Into<Slot>) -> String {
        let slot = slot.into();
        match key {
            None => {
                let entries = &self.entries;
                let key = self.auto_index.next_key(|k| entries.contains_key(k));
                self.entries.insert(key.clone(), Entry::eager(slot));
                key
            }
            Some(key) => match slot {
                Slot::Service(service) if has_marker(key, self.options.deferred_marker) => {
                    let key = strip_marker(key, self.options.deferred_marker);
                    self.defer(key, service);
                    key.to_owned()
                }
                slot => {
                    self.auto_index.observe(key);
                    self.entries.insert(key.to_owned(), Entry::eager(slot));
                    key.to_owned()
                }
            },
        }
    }

    pub fn set(&mut self, key: &str, slot: impl Into<Slot>) {
        self.insert(Some(key), slot);
    }

    /// Appends `slot` and returns its generated key
    pub fn push(&mut self, slot: impl Into<Slot>) -> String {
        self.insert(None, slot)
    }

    /// True, if writing `slot` to `key` would register a deferred service
    pub fn is_deferrable(&self, key: &str, slot: &Slot) -> bool {
        slot.is_invokable() && has_marker(key, self.options.deferred_marker)
    }

    /// Registers a service which is not evaluated by the next `run()`, but on first access.
    /// Raw values are rejected and leave the container untouched.
    pub fn register_deferred(&mut self, key: &str, slot: impl Into<Slot>) -> Result<()> {
        match slot.into() {
            Slot::Service(service) => {
                self.defer(key, service);
                Ok(())
            }
            Slot::Raw(_) => Err(Error::NotInvokable {
                key: key.to_owned(),
            }),
        }
    }

    fn defer(&mut self, key: &str, service: Service) {
        tracing::trace!(key, "registering deferred service");
        self.auto_index.observe(key);
        self.entries.insert(
            key.to_owned(),
            Entry::Pending {
                service,
                deferred: true,
            },
        );
    }

    /// Returns the value stored under `key`, evaluating and caching it if it's a service.
    /// Missing keys are not an error and result in `Ok(None)`.
    pub fn get(&mut self, key: &str) -> Result<Option<&Value>> {
        let Some(entry) = self.entries.get_mut(key) else {
            return Ok(None);
        };
        if let Entry::Pending { service, .. } = entry {
            let value = evaluate(key, service)?;
            *entry = Entry::Raw(value);
        }
        Ok(entry.as_raw())
    }

    /// Like `get`, but downcasts the value to `T`
    pub fn get_as<T: Any>(&mut self, key: &str) -> Result<Option<&T>> {
        match self.get(key)? {
            None => Ok(None),
            Some(value) => match value.downcast_ref::<T>() {
                Some(x) => Ok(Some(x)),
                None => Err(Error::TypeMismatch {
                    key: key.to_owned(),
                    expected: type_name::<T>(),
                    found: value.type_name(),
                }),
            },
        }
    }

    /// True, if `key` is present, regardless of whether it was evaluated yet
    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// True, if `key` is present and holds a plain value
    pub fn is_evaluated(&self, key: &str) -> bool {
        self.entries.get(key).is_some_and(|e| !e.is_pending())
    }

    /// Removes `key`. Returns whether it was present.
    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.shift_remove(key).is_some()
    }

    /// Evaluates all pending services in insertion order.
    ///
    /// Deferred services are not evaluated. Instead, they lose their deferral and
    /// are treated like every other service by subsequent `run()` calls.
    /// Stops at the first failing service, which stays pending.
    pub fn run(&mut self) -> Result<()> {
        let _span = tracing::debug_span!("run", entries = self.entries.len()).entered();
        for (key, entry) in self.entries.iter_mut() {
            match entry {
                Entry::Raw(_) => {}
                Entry::Pending { deferred, .. } if *deferred => {
                    tracing::trace!(key = key.as_str(), "keeping deferred service pending");
                    *deferred = false;
                }
                Entry::Pending { service, .. } => {
                    let value = evaluate(key, service)?;
                    *entry = Entry::Raw(value);
                }
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

fn evaluate(key: &str, service: &mut Service) -> Result<Value> {
    tracing::trace!(key, produces = service.type_name(), "evaluating service");
    service.call().map_err(|source| {
        tracing::debug!(key, error = %source, "service failed");
        Error::Service {
            key: key.to_owned(),
            source,
        }
    })
}

impl<T: Into<Slot>> Extend<T> for Container {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for slot in iter {
            self.push(slot);
        }
    }
}

impl Debug for Container {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!(
            "Container (entries: {}, pending: {})",
            self.entries.len(),
            self.entries.values().filter(|e| e.is_pending()).count()
        ))
    }
}
