//! Error types for the invariant rewrite.
//!
//! Every variant is fatal for the compilation unit being transformed: the
//! unit is left untouched and the error is handed back to the host.
//! A registry miss is not an error and never shows up here.

use swc_core::common::Span;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("error code registry `{source_name}` is unreadable: {reason}")]
    RegistryUnreadable { source_name: String, reason: String },

    #[error("invariant message at {location} cannot be folded to a string literal")]
    MessageNotStaticallyFoldable { span: Span, location: String },

    #[error("invariant call at {location} must be used as a statement")]
    UnsupportedCallPosition { span: Span, location: String },

    #[error("malformed invariant call at {location}: {reason}")]
    MalformedAssertionCall {
        span: Span,
        location: String,
        reason: &'static str,
    },

    #[error("invalid plugin config: {0}")]
    Config(#[from] serde_json::Error),
}

impl TransformError {
    /// Span of the offending call site, when the error has one.
    pub fn span(&self) -> Option<Span> {
        match self {
            TransformError::MessageNotStaticallyFoldable { span, .. }
            | TransformError::UnsupportedCallPosition { span, .. }
            | TransformError::MalformedAssertionCall { span, .. } => Some(*span),
            TransformError::RegistryUnreadable { .. } | TransformError::Config(_) => None,
        }
    }
}
