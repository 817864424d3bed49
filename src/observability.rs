use std::net::SocketAddr;

use crate::engine::EngineError;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: candidate searches executed.
pub const SEARCHES_TOTAL: &str = "cagebnb_searches_total";

/// Histogram: candidates returned per search.
pub const CANDIDATES_RETURNED: &str = "cagebnb_candidates_returned";

/// Counter: booking attempts. Labels: status.
pub const BOOKINGS_TOTAL: &str = "cagebnb_bookings_total";

/// Histogram: booking attempt latency in seconds, lock wait included.
pub const BOOKING_DURATION_SECONDS: &str = "cagebnb_booking_duration_seconds";

// ── USE metrics (resource utilization) ──────────────────────────

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "cagebnb_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "cagebnb_wal_flush_batch_size";

/// Counter: WAL compactions run.
pub const WAL_COMPACTIONS_TOTAL: &str = "cagebnb_wal_compactions_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Status label for a booking attempt.
pub fn booking_status<T>(result: &Result<T, EngineError>) -> &'static str {
    match result {
        Ok(_) => "claimed",
        Err(EngineError::BookingConflict(_)) => "conflict",
        Err(EngineError::InvalidRange { .. }) => "invalid_range",
        Err(EngineError::NotFound(_)) => "not_found",
        Err(_) => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    #[test]
    fn status_labels() {
        assert_eq!(booking_status(&Ok::<(), EngineError>(())), "claimed");
        assert_eq!(booking_status::<()>(&Err(EngineError::BookingConflict(Ulid::new()))), "conflict");
        assert_eq!(
            booking_status::<()>(&Err(EngineError::InvalidRange { checkin: 2, checkout: 1 })),
            "invalid_range"
        );
        assert_eq!(booking_status::<()>(&Err(EngineError::NotFound(Ulid::new()))), "not_found");
        assert_eq!(booking_status::<()>(&Err(EngineError::WalError("disk".into()))), "error");
    }

    #[test]
    fn init_without_port_is_noop() {
        assert!(init(None).is_ok());
    }
}
