//! # Minimal service container for plugins
//!
//! A `Container` stores plain values and services (zero-argument initializers) by key.
//!
//! - `run()` evaluates all registered services and replaces them by their results
//! - Accessing a service evaluates it on demand. Each service is evaluated at most once
//! - Deferred services are skipped by `run()` and only initialized when accessed.
//!   They are registered with `register_deferred` or by prefixing the key with `*`
//!
//! Complete example:
//! ```
//! use {
//!     plugin_container::{Container, Slot},
//!     std::{cell::Cell, rc::Rc},
//! };
//! let mailer_calls = Rc::new(Cell::new(0));
//! let counter = mailer_calls.clone();
//!
//! let mut plugin = Container::new();
//! plugin.set("version", Slot::raw("1.0.0"));
//! plugin.set("admin_side", Slot::service(|| "Admin side object loaded"));
//! plugin.set("*mailer", Slot::service(move || {
//!     counter.set(counter.get() + 1);
//!     "Mailer service loaded"
//! }));
//!
//! plugin.run().expect("All services are infallible");
//! assert_eq!(0, mailer_calls.get()); // Deferred until accessed
//! assert!(plugin.is_evaluated("admin_side"));
//!
//! assert_eq!(Some(&"1.0.0"), plugin.get_as::<&str>("version").unwrap());
//! assert_eq!(Some(&"Mailer service loaded"), plugin.get_as::<&str>("mailer").unwrap());
//! plugin.get("mailer").unwrap();
//! assert_eq!(1, mailer_calls.get());
//! ```
//! # Notes
//! - Reading a missing key is not an error, it returns `Ok(None)`
//! - A failing service is not cached and will be called again on the next access
//! - `Container` is single threaded. `SharedContainer` (feature `shared`, enabled by default)
//!   offers the same API for concurrent use and guarantees that every service is initialized
//!   at most once

mod container;
mod error;
mod key;
#[cfg(feature = "shared")]
mod shared;
mod slot;
mod value;

pub use {
    container::Container,
    error::{Error, Result},
    key::{has_marker, strip_marker, Options, DEFERRED_MARKER},
    slot::{Service, Slot},
    value::Value,
};

#[cfg(feature = "shared")]
pub use {
    shared::SharedContainer,
    slot::{SharedService, SharedSlot},
    value::SharedValue,
};
