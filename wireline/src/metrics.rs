//! wireline engine metrics.
//!
//! Process-wide counters for request turnover, bytes and connection
//! failures. Exposed through `metriken` for whichever exporter the
//! application registers.

use metriken::{Counter, metric};

// ── Requests ─────────────────────────────────────────────────────

#[metric(
    name = "wireline/request/created",
    description = "Requests admitted onto a connection"
)]
pub static REQUESTS_CREATED: Counter = Counter::new();

#[metric(
    name = "wireline/request/recycled",
    description = "Request slots returned to a connection's free list"
)]
pub static REQUESTS_RECYCLED: Counter = Counter::new();

// ── Bytes ────────────────────────────────────────────────────────

#[metric(
    name = "wireline/bytes/sent",
    description = "Bytes written to transports"
)]
pub static BYTES_SENT: Counter = Counter::new();

#[metric(
    name = "wireline/bytes/received",
    description = "Bytes read from transports"
)]
pub static BYTES_RECEIVED: Counter = Counter::new();

// ── Connections ──────────────────────────────────────────────────

#[metric(
    name = "wireline/connection/failed",
    description = "Connections torn down by a latched failure"
)]
pub static CONNECTIONS_FAILED: Counter = Counter::new();
