use crate::limits::*;
use crate::model::*;

use super::EngineError;

pub(crate) fn now_ms() -> Ms {
    chrono::Utc::now().timestamp_millis()
}

/// Turn a requested stay into a span, rejecting `checkin >= checkout`.
pub(crate) fn stay_span(checkin: Ms, checkout: Ms) -> Result<Span, EngineError> {
    if checkin >= checkout {
        return Err(EngineError::InvalidRange { checkin, checkout });
    }
    Ok(Span::new(checkin, checkout))
}

/// Bounds for a window being published on a cage.
pub(crate) fn window_span(checkin: Ms, checkout: Ms) -> Result<Span, EngineError> {
    let span = stay_span(checkin, checkout)?;
    if span.start < MIN_VALID_TIMESTAMP_MS || span.end > MAX_VALID_TIMESTAMP_MS {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    if span.duration_ms() > MAX_SPAN_DURATION_MS {
        return Err(EngineError::LimitExceeded("window too long"));
    }
    Ok(span)
}

pub(crate) fn check_name(name: &str, what: &'static str) -> Result<(), EngineError> {
    if name.trim().is_empty() {
        return Err(EngineError::Invalid(what));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("name too long"));
    }
    Ok(())
}

pub(crate) fn check_email(email: &str) -> Result<(), EngineError> {
    if email.len() > MAX_EMAIL_LEN {
        return Err(EngineError::LimitExceeded("email too long"));
    }
    match email.trim().split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(EngineError::Invalid("email must look like name@domain")),
    }
}

pub(crate) fn check_measure(value: f64, what: &'static str) -> Result<(), EngineError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(EngineError::Invalid(what))
    }
}
