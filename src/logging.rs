//! Logging utilities for structured tracing

use std::time::Instant;

/// Log how long an operation on one subject (an entity or file) took, on drop
pub struct Timer {
    start: Instant,
    operation: &'static str,
    subject: String,
}

impl Timer {
    pub fn new(operation: &'static str, subject: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            operation,
            subject: subject.into(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        tracing::debug!(
            operation = self.operation,
            subject = %self.subject,
            duration_ms = self.elapsed_ms(),
            "Operation completed"
        );
    }
}

/// Log a non-fatal failure with structured context
pub fn log_error(operation: &str, subject: &str, error: &impl std::error::Error) {
    tracing::warn!(
        operation = %operation,
        subject = %subject,
        error = %error,
        error_kind = std::any::type_name_of_val(error),
        "Operation failed"
    );
}
