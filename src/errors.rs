use thiserror::Error;

// ── Editor errors ─────────────────────────────────────────────────────────────

/// Failures local to one embedded editor instance. A mount failure is fatal
/// to that instance only — the caller renders a plain-text placeholder and
/// does not retry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditorError {
    #[error("editor failed to mount: no attachment point")]
    Mount,
}

// ── Query errors ──────────────────────────────────────────────────────────────

/// A collaborator call failed. Contained at the channel that issued it and
/// rendered as a local "unavailable" affordance; never propagated to the
/// navigation layer. Distinct from an empty result set.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("service unreachable")]
    Unreachable,
    #[error("{0}")]
    Service(String),
}

impl From<reqwest::Error> for QueryError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            QueryError::Unreachable
        } else {
            QueryError::Service(e.to_string())
        }
    }
}
