//! Error taxonomy.
//!
//! Only [`ArbError::Configuration`] is allowed to escape the core at
//! construction time. Every other variant is absorbed at the lowest level
//! that can produce a sensible fallback and never panics its way out —
//! see each component's `// never panics:` comments at the absorption point.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ArbError {
    /// Source timeout, chain RPC failure, adapter call that timed out.
    /// Logged and skipped by the caller; the owning loop continues.
    #[error("transient I/O failure in {component}: {detail}")]
    TransientIo { component: String, detail: String },

    /// Negative price, unknown symbol, stale quote, malformed payload.
    /// Rejected at ingress; no entry is created or updated.
    #[error("malformed data from {source}: {detail}")]
    MalformedData { source: String, detail: String },

    /// Non-positive price reaching the graph builder, NaN reaching scoring math.
    /// Treated as an absent edge / worst-case score, never a panic.
    #[error("numerical pathology in {stage}: {detail}")]
    NumericalPathology { stage: String, detail: String },

    /// Missing required config or weights summing outside the allowed range.
    /// The only category allowed to escape the core, and only at construction.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Surfaced when an in-flight operation observes a cancellation signal
    /// at its next suspension point.
    #[error("operation cancelled: {0}")]
    Cancelled(String),
}

impl ArbError {
    pub fn transient(component: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::TransientIo {
            component: component.into(),
            detail: detail.into(),
        }
    }

    pub fn malformed(source: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::MalformedData {
            source: source.into(),
            detail: detail.into(),
        }
    }

    pub fn numerical(stage: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::NumericalPathology {
            stage: stage.into(),
            detail: detail.into(),
        }
    }

    pub fn config(detail: impl Into<String>) -> Self {
        Self::Configuration(detail.into())
    }

    /// Is this category one that a caller should absorb and continue past,
    /// rather than propagate?
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ArbError::Configuration(_))
    }
}

pub type ArbResult<T> = Result<T, ArbError>;
