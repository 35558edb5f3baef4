//! Error types for external compound lookups.
//!
//! A compound that is definitively absent from the database is not an error;
//! the lookup seam reports it as `Ok(None)` so the negative answer can be
//! cached. This enum covers only the failure modes of the transport itself.

use thiserror::Error;

/// Failure modes of the external compound database transport.
///
/// Both variants are subject to the bounded retry policy: a malformed payload
/// is handled the same way as an unreachable service, since either can clear
/// up on a later attempt.
#[derive(Debug, Clone, Error)]
pub enum LookupError {
    /// Service unreachable, request timed out, or server-side error status.
    #[error("transient lookup failure: {0}")]
    Transient(String),

    /// Service responded but the payload could not be interpreted.
    #[error("malformed lookup response: {0}")]
    Malformed(String),
}
