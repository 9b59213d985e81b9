//! Failure isolation for user-supplied callbacks
//!
//! Every listener and subscriber invocation goes through [`isolate`], which
//! turns both `Err` returns and panics into a [`CallbackFailure`] for the
//! dispatcher to log before moving on to the next callback.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Why a callback did not complete
#[derive(Debug, thiserror::Error)]
pub enum CallbackFailure {
    /// Callback returned an error
    #[error("callback returned error: {0:#}")]
    Error(anyhow::Error),

    /// Callback panicked
    #[error("callback panicked: {0}")]
    Panic(String),
}

impl CallbackFailure {
    /// Check if the failure was a panic
    #[inline]
    #[must_use]
    pub fn is_panic(&self) -> bool {
        matches!(self, Self::Panic(_))
    }
}

/// Run a callback, capturing errors and panics
///
/// # Errors
/// Returns [`CallbackFailure`] if `f` returns `Err` or panics.
pub fn isolate<T, F>(f: F) -> Result<T, CallbackFailure>
where
    F: FnOnce() -> anyhow::Result<T>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(CallbackFailure::Error(err)),
        Err(payload) => Err(CallbackFailure::Panic(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isolate_ok() {
        let result = isolate(|| Ok(7));
        assert_eq!(result.unwrap(), 7);
    }

    #[test]
    fn isolate_error() {
        let result: Result<(), _> = isolate(|| Err(anyhow::anyhow!("boom")));
        let failure = result.unwrap_err();
        assert!(!failure.is_panic());
        assert!(failure.to_string().contains("boom"));
    }

    #[test]
    fn isolate_panic_str() {
        let result: Result<(), _> = isolate(|| panic!("static message"));
        let failure = result.unwrap_err();
        assert!(failure.is_panic());
        assert_eq!(failure.to_string(), "callback panicked: static message");
    }

    #[test]
    fn isolate_panic_formatted() {
        let code = 42;
        let result: Result<(), _> = isolate(|| panic!("code {code}"));
        assert!(result.unwrap_err().to_string().contains("code 42"));
    }
}
