//! The NoiseSocket error taxonomy.
//!
//! One variant per kind named in the spec; each carries enough context to
//! write a useful log line without attaching a debugger.

use thiserror::Error;

/// Errors raised by any NoiseSocket operation.
///
/// After any variant other than [`NoiseSocketError::Crypto`] on a
/// `read_handshake` during a Switch, the session should be treated as
/// unusable — only [`crate::socket::NoiseSocket::dispose`] is safe to call.
#[derive(Debug, Error)]
pub enum NoiseSocketError {
    /// Inputs exceed size limits, omit a mandatory value, or violate the
    /// Accept/Switch/Retry role matrix at construction time.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A call was made in a state the session state machine forbids —
    /// wrong next handshake op, a second reinitialization, a handshake op
    /// after completion, a transport op before completion, or any call
    /// after dispose.
    #[error("operation out of order: {0}")]
    OutOfOrder(String),

    /// A field would exceed 65535 bytes, or a transport message would
    /// exceed it once the AEAD tag (and any padding) is added.
    #[error("value too large for a 16-bit length-prefixed field: {0}")]
    TooLarge(String),

    /// The on-wire byte structure is inconsistent with what this layer
    /// requires (truncated packet, inner length past the end of the
    /// plaintext, transport packet below the minimum size, and so on).
    #[error("malformed wire data: {0}")]
    Malformed(String),

    /// The Noise cryptographic collaborator signalled a failure:
    /// decryption/authentication failure, a missing required key, or an
    /// unsupported pattern modifier.
    ///
    /// This is the one kind an application may legitimately catch and act
    /// on: the expected failure mode after a peer has unilaterally
    /// switched protocols is a `Crypto` error on the first `read_handshake`,
    /// which the catching side answers with its own `switch`.
    #[error("Noise cryptographic failure: {0}")]
    Crypto(#[from] snow::Error),

    /// The underlying byte stream failed.
    #[error("stream I/O error: {0}")]
    StreamError(#[from] std::io::Error),

    /// The caller's cancellation signal fired while an I/O call was
    /// suspended. The session's logical state was not advanced past the
    /// point of cancellation; the byte stream position is nonetheless
    /// unknown and the session should be disposed.
    #[error("operation cancelled")]
    Cancelled,

    /// The session has already been disposed.
    #[error("session already disposed")]
    Disposed,
}

pub type Result<T> = std::result::Result<T, NoiseSocketError>;
