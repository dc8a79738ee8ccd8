use thiserror::Error;

/// Failure taxonomy for every remote and local operation in the crate.
///
/// The cleanup workflow reacts specially to `AuthExpired` and
/// `PermissionDenied` (forced sign-out); everything else passes through to
/// the caller unmodified.
#[derive(Error, Debug)]
pub enum Error {
    /// The bearer token is stale or missing and could not be refreshed.
    #[error("authentication expired, sign in again")]
    AuthExpired,

    /// The token is live but lacks the scopes the operation requires.
    #[error("permission denied: token is missing required scopes")]
    PermissionDenied,

    /// Any non-2xx response that is not a 401/403.
    #[error("remote API error: HTTP {status}")]
    RemoteError { status: u16 },

    /// A batch mutation was invoked with zero message ids.
    #[error("empty selection: no messages to act on")]
    EmptySelection,

    /// Transport-level failure before an HTTP status was obtained.
    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),

    /// A bounded status check ran out of time. Never produced by mutations.
    #[error("operation timed out")]
    Timeout,

    /// Key/value token store fault.
    #[error("token store error: {0}")]
    Storage(String),

    /// Identity-provider flow fault (consent flow, token exchange, revoke).
    #[error("identity provider error: {0}")]
    Identity(String),

    /// The remote answered 2xx with a body that does not parse.
    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::NetworkUnavailable(e.to_string())
    }
}

impl From<keyring::Error> for Error {
    fn from(e: keyring::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
