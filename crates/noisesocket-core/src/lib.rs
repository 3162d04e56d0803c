//! NoiseSocket: protocol negotiation and message framing for the Noise
//! Protocol Framework over a reliable, ordered byte stream.
//!
//! A [`socket::NoiseSocket`] wraps a byte stream and drives it through
//! three phases: negotiation (exchanging unencrypted negotiation data
//! alongside Noise handshake messages, with optional reinitialization via
//! `accept`/`switch`/`retry`), handshake completion, and transport
//! (length-framed, padded, AEAD-encrypted application messages). Every
//! byte exchanged before the handshake state exists is bound into the
//! handshake's prologue, so an attacker who rewrites negotiation data in
//! flight is caught by the handshake's own authentication rather than by
//! a side channel.
//!
//! ```no_run
//! use noisesocket_core::{NoiseSocket, Protocol, ProtocolConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run(stream: tokio::net::TcpStream) -> noisesocket_core::Result<()> {
//! let protocol = Protocol::parse("Noise_XX_25519_AESGCM_BLAKE2b")?;
//! let config = ProtocolConfig::new(true).with_local_static_private(vec![0u8; 32]);
//! let mut socket = NoiseSocket::new_client(stream, protocol, config)?;
//!
//! let cancel = CancellationToken::new();
//! socket.write_handshake(&cancel, b"", b"", None).await?;
//! # Ok(())
//! # }
//! ```

mod codec;
mod error;
mod handshake;
mod padding;
mod prologue;
mod protocol;
mod session;
mod socket;
mod transport;

pub use error::{NoiseSocketError, Result};
pub use prologue::InitTag;
pub use protocol::{Protocol, ProtocolConfig};
pub use session::StreamRole;
pub use socket::NoiseSocket;
