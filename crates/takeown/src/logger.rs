//! Trace-level diagnostics, gated behind a sentinel file.
//!
//! The upstream tool refused `-T`/`--trace` outright unless `/.trace`
//! existed, so that a set-uid-root binary couldn't be made to dump internal
//! state just by passing a flag on the command line. `try_enable_trace`
//! preserves that refusal; `init` sets up the subscriber itself once the
//! flag (if any) has already been validated.

use std::path::Path;

const TRACE_SENTINEL: &str = "/.trace";

/// Check whether `--trace` may be honored. Returns `Ok(())` if tracing
/// wasn't requested, or was requested and the sentinel file exists; returns
/// `Err(())` if it was requested but the sentinel is missing, in which case
/// the caller must refuse to start rather than silently downgrade.
pub fn try_enable_trace(trace_requested: bool) -> Result<(), ()> {
    if !trace_requested || Path::new(TRACE_SENTINEL).exists() {
        Ok(())
    } else {
        Err(())
    }
}

pub fn init(trace_enabled: bool) {
    let filter = if trace_enabled {
        "takeown=trace,takeown_core=trace"
    } else {
        "takeown=warn,takeown_core=warn"
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_new(filter).unwrap_or_default())
        .with_writer(std::io::stderr)
        .try_init();
}
