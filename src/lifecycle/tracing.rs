//! # Observability & Tracing
//!
//! [`setup_tracing`] installs the subscriber the `fleetd` binary uses.
//!
//! - **Structured logging** with the `tracing` crate
//! - **Configurable log levels** via the `RUST_LOG` environment variable
//! - **Compact format** with span names inline
//!
//! ```bash
//! RUST_LOG=info cargo run            # lifecycle, forwarding, propagation summaries
//! RUST_LOG=debug cargo run           # every store request with payloads
//! RUST_LOG=fleetd::cluster=debug cargo run
//! ```
//!
//! Propagation failures are logged at `warn` with `member` and `reason` fields; that
//! stream is the place to look when a member serves stale data.

/// Install the global subscriber. Call once, at the start of `main`.
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}
