//! Panic guards for `extern "C"` trampolines.
//!
//! Unwinding across the C boundary is undefined behaviour, so every callback
//! the host can reach runs inside one of these helpers. A caught panic is
//! logged with its backtrace and the callback returns its neutral value.

use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::error;

/// Extract a human-readable message from a panic payload.
pub fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        return (*msg).to_string();
    }
    if let Some(msg) = payload.downcast_ref::<String>() {
        return msg.clone();
    }
    "non-string panic payload".to_string()
}

fn report(op: &'static str, payload: Box<dyn std::any::Any + Send>) {
    let msg = panic_message(payload);
    let bt = std::backtrace::Backtrace::force_capture();
    error!(op, "panic in ffi `{op}`: {msg}\nbacktrace:\n{bt}");
}

/// Run `f`, returning `default` if it panics.
pub fn guard_with_default<T>(op: &'static str, default: T, f: impl FnOnce() -> T) -> T {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(payload) => {
            report(op, payload);
            default
        }
    }
}

/// Run `f`, swallowing a panic after logging it.
pub fn guard_void(op: &'static str, f: impl FnOnce()) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(f)) {
        report(op, payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_variants() {
        let static_payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(static_payload), "boom");

        let owned_payload: Box<dyn std::any::Any + Send> = Box::new(String::from("owned boom"));
        assert_eq!(panic_message(owned_payload), "owned boom");

        let other_payload: Box<dyn std::any::Any + Send> = Box::new(17u8);
        assert_eq!(panic_message(other_payload), "non-string panic payload");
    }

    #[test]
    fn test_guard_returns_value_or_default() {
        assert!(guard_with_default("ok", false, || true));
        assert!(!guard_with_default("panics", false, || panic!("callback failed")));
    }

    #[test]
    fn test_guard_void_swallows_panic() {
        let mut ran = false;
        guard_void("ok", || ran = true);
        assert!(ran);

        guard_void("panics", || panic!("callback failed"));
    }
}
