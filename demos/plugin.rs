//! Loads a plugin container and shows when services are initialized.
//!
//! All services are executed by `run()`, except deferred ones, which are
//! initialized once they are accessed, e.g. `plugin.get("mailer")`.
//!
//! Run with `RUST_LOG=trace cargo run --example plugin` to see the container's own events.

use {
    plugin_container::{Container, Slot},
    tracing_subscriber::EnvFilter,
};

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut plugin = Container::new();

    plugin.set("version", Slot::raw("1.0.0"));

    plugin.set(
        "admin_side",
        Slot::service(|| {
            tracing::info!("Admin side object loaded");
        }),
    );

    // Won't be executed by `run()`, only when accessed
    plugin.set(
        "*mailer",
        Slot::service(|| {
            tracing::info!("Mailer service loaded");
            "mailer"
        }),
    );

    plugin.run()?;
    tracing::info!(?plugin, "plugin is running");

    let version = plugin.get_as::<&str>("version")?.copied().unwrap_or("unknown");
    tracing::info!(version, "plugin version");

    plugin.get("mailer")?;
    Ok(())
}
