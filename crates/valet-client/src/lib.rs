pub mod client;
pub mod config;
pub mod events;
pub mod join;
pub mod registry;

pub use client::{ClientError, ValetClient};
pub use config::ClientConfig;
pub use events::ShiftEvent;
pub use join::{JoinOutcome, JoinProtocol};
pub use registry::ShiftStore;

use tracing_subscriber::{fmt, EnvFilter};

/// Install the default `tracing` subscriber for an embedding application.
/// `RUST_LOG` overrides the built-in filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("valet_client=debug,valet_sync=debug,valet_store=info,warn")
    });

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}
