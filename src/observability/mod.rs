//! Observability for the paginated query engine
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. Structured `tracing` events, one `event` name per record
//! 3. Parameter keys may be logged; parameter values never are
//!
//! # Usage
//!
//! ```ignore
//! use pagewise::observability::{Phase, PhaseTimings, Timer};
//!
//! let mut timings = PhaseTimings::new();
//! let timer = Timer::new();
//! // ... count ...
//! timer.stop(&mut timings, Phase::Count);
//! timings.report("bugs", Duration::from_millis(500));
//! ```

mod events;
mod timing;

pub use events::Event;
pub use timing::{Phase, PhaseTimings, Timer};

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is absent or invalid
pub const DEFAULT_LOG_FILTER: &str = "pagewise=info,sqlx=warn,warn";

/// Install the global tracing subscriber.
///
/// `json` selects newline-delimited JSON output. Installing twice is a no-op.
pub fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
