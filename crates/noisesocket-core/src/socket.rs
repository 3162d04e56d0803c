//! The public façade (spec §4.6): `NoiseSocket<S>` wraps a byte stream and
//! a [`Session`], exposing the handshake and transport operations as a
//! single cohesive API, with cancellation honored at the call boundary.

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::{instrument, trace, warn};

use crate::error::{NoiseSocketError, Result};
use crate::handshake;
use crate::protocol::{Protocol, ProtocolConfig};
use crate::session::{ReinitOp, Session, StreamRole};
use crate::transport;

/// A NoiseSocket wrapping an underlying reliable byte stream `S`.
///
/// Every public operation is `&mut self` — NoiseSocket does not hand out
/// split read/write halves, matching the call-order discipline described
/// in spec §4.3 (each side's reads and writes interleave in a fixed
/// pattern, so there is no benefit to concurrent halves and considerable
/// risk of violating the cycle).
///
/// `leave_open` controls whether [`close`](Self::close) shuts down the
/// underlying stream: set it when the stream is owned by something else
/// (a connection pool, a multiplexer) that outlives this socket.
pub struct NoiseSocket<S> {
    stream: S,
    session: Session,
    leave_open: bool,
}

impl<S> NoiseSocket<S> {
    /// Construct a client-side (byte-stream initiator) socket, already
    /// committed to a protocol and configuration.
    pub fn new_client(stream: S, protocol: Protocol, config: ProtocolConfig) -> Result<Self> {
        let session = Session::new_client(protocol, config)?;
        Ok(Self {
            stream,
            session,
            leave_open: false,
        })
    }

    /// Construct a server-side (byte-stream responder) socket with no
    /// protocol chosen yet; the first call must be [`accept`](Self::accept),
    /// [`switch`](Self::switch), or [`retry`](Self::retry).
    pub fn new_server(stream: S) -> Self {
        Self {
            stream,
            session: Session::new_server(),
            leave_open: false,
        }
    }

    /// Whether dropping or disposing this socket should leave the
    /// underlying stream open rather than closing it.
    pub fn set_leave_open(&mut self, leave_open: bool) {
        self.leave_open = leave_open;
    }

    pub fn stream_role(&self) -> StreamRole {
        self.session.stream_role()
    }

    pub fn is_handshake_finished(&self) -> bool {
        self.session.is_handshake_finished()
    }

    pub fn is_transport(&self) -> bool {
        self.session.is_transport()
    }

    pub fn is_disposed(&self) -> bool {
        self.session.is_disposed()
    }

    pub fn protocol(&self) -> Option<&Protocol> {
        self.session.protocol()
    }

    pub fn handshake_hash(&self) -> Result<&[u8]> {
        self.session.handshake_hash()
    }

    pub fn remote_static(&self) -> Option<&[u8]> {
        self.session.remote_static()
    }

    /// Confirm the protocol implied by the negotiation data just read and
    /// continue the handshake under it. Server-only (byte-stream role);
    /// the session's Noise-level role stays responder.
    pub fn accept(&mut self, protocol: Protocol, config: ProtocolConfig) -> Result<()> {
        self.session.reinitialize(ReinitOp::Accept, protocol, config)
    }

    /// Unilaterally restart the handshake under a different protocol,
    /// taking over as Noise-level initiator. Server-only.
    pub fn switch(&mut self, protocol: Protocol, config: ProtocolConfig) -> Result<()> {
        self.session.reinitialize(ReinitOp::Switch, protocol, config)
    }

    /// Restart the handshake under a different protocol at the server's
    /// request, taking over as Noise-level responder. Client-only.
    pub fn retry(&mut self, protocol: Protocol, config: ProtocolConfig) -> Result<()> {
        self.session.reinitialize(ReinitOp::Retry, protocol, config)
    }

    /// Tear down the session: drop any live handshake/transport state and
    /// mark it unusable. Does not touch the underlying stream — see
    /// [`close`](Self::close) for that.
    pub fn dispose(&mut self) {
        self.session.dispose();
    }
}

impl<S> NoiseSocket<S>
where
    S: AsyncWrite + Unpin,
{
    /// Dispose the session and, unless [`set_leave_open`](Self::set_leave_open)
    /// was set, shut down the underlying stream.
    pub async fn close(&mut self) -> Result<()> {
        self.session.dispose();
        if !self.leave_open {
            use tokio::io::AsyncWriteExt;
            self.stream.shutdown().await?;
        }
        Ok(())
    }
}

impl<S> NoiseSocket<S>
where
    S: AsyncWrite + Unpin,
{
    /// Write negotiation data and a real handshake message as one atomic
    /// wire unit, honoring `cancel` while the write is in flight.
    #[instrument(level = "trace", skip(self, cancel, message_body))]
    pub async fn write_handshake(
        &mut self,
        cancel: &CancellationToken,
        negotiation_data: &[u8],
        message_body: &[u8],
        padded_length: Option<u16>,
    ) -> Result<()> {
        let result = run_cancellable(cancel, handshake::write_handshake(
            &mut self.session,
            &mut self.stream,
            negotiation_data,
            message_body,
            padded_length,
        ))
        .await;
        self.dispose_if_cancelled(&result);
        self.log_handshake_outcome(&result);
        result
    }

    /// Write negotiation data paired with an empty handshake message —
    /// the responder's way of requesting a Switch or Retry without
    /// processing the message it is rejecting.
    #[instrument(level = "trace", skip(self, cancel))]
    pub async fn write_empty_handshake(
        &mut self,
        cancel: &CancellationToken,
        negotiation_data: &[u8],
    ) -> Result<()> {
        let result = run_cancellable(cancel, handshake::write_empty_handshake(
            &mut self.session,
            &mut self.stream,
            negotiation_data,
        ))
        .await;
        self.dispose_if_cancelled(&result);
        result
    }

    /// Encrypt and write one transport message.
    #[instrument(level = "trace", skip(self, cancel, body))]
    pub async fn write_message(
        &mut self,
        cancel: &CancellationToken,
        body: &[u8],
        padded_length: Option<u16>,
    ) -> Result<()> {
        let result = run_cancellable(cancel, transport::write_message(
            &mut self.session,
            &mut self.stream,
            body,
            padded_length,
        ))
        .await;
        self.dispose_if_cancelled(&result);
        result
    }
}

impl<S> NoiseSocket<S>
where
    S: AsyncRead + Unpin,
{
    /// Read the negotiation-data half of one handshake wire unit.
    #[instrument(level = "trace", skip(self, cancel))]
    pub async fn read_negotiation(&mut self, cancel: &CancellationToken) -> Result<Vec<u8>> {
        let result = run_cancellable(cancel, handshake::read_negotiation(&mut self.session, &mut self.stream)).await;
        self.dispose_if_cancelled(&result);
        result
    }

    /// Read (and, once a handshake state exists, decrypt) the
    /// Noise-message half of one handshake wire unit.
    #[instrument(level = "trace", skip(self, cancel))]
    pub async fn read_handshake(&mut self, cancel: &CancellationToken) -> Result<Vec<u8>> {
        let result = run_cancellable(cancel, handshake::read_handshake(&mut self.session, &mut self.stream)).await;
        self.dispose_if_cancelled(&result);
        self.log_handshake_outcome(&result);
        result
    }

    /// Read and discard the Noise-message half of one handshake wire
    /// unit, without attempting any crypto on it.
    #[instrument(level = "trace", skip(self, cancel))]
    pub async fn ignore_handshake(&mut self, cancel: &CancellationToken) -> Result<()> {
        let result = run_cancellable(cancel, handshake::ignore_handshake(&mut self.session, &mut self.stream)).await;
        self.dispose_if_cancelled(&result);
        result
    }

    /// Read and decrypt one transport message.
    #[instrument(level = "trace", skip(self, cancel))]
    pub async fn read_message(&mut self, cancel: &CancellationToken) -> Result<Vec<u8>> {
        let result = run_cancellable(cancel, transport::read_message(&mut self.session, &mut self.stream)).await;
        self.dispose_if_cancelled(&result);
        result
    }
}

impl<S> NoiseSocket<S> {
    fn dispose_if_cancelled<T>(&mut self, result: &Result<T>) {
        if matches!(result, Err(NoiseSocketError::Cancelled)) {
            trace!("handshake/transport call cancelled; disposing session");
            self.session.dispose();
        }
    }

    /// Surface the two handshake moments worth a line in the log even
    /// outside `RUST_LOG=trace`: completion (so an operator can confirm
    /// which protocol a connection landed on) and a crypto failure (the
    /// expected trigger for an application-level `switch`).
    fn log_handshake_outcome<T>(&self, result: &Result<T>) {
        match result {
            Ok(_) if self.session.is_handshake_finished() => {
                if let (Ok(hash), Some(protocol)) = (self.session.handshake_hash(), self.session.protocol()) {
                    tracing::info!(
                        protocol = %protocol,
                        handshake_hash = %hex::encode(hash),
                        "handshake complete"
                    );
                }
            }
            Err(NoiseSocketError::Crypto(e)) => {
                warn!(error = %e, "handshake message failed to decrypt/authenticate");
            }
            _ => {}
        }
    }
}

/// Race `fut` against `cancel`. The byte stream's position is unknown to
/// the loser of the race either way, so the caller disposes the session
/// on a `Cancelled` result (spec §7) rather than trying to roll anything
/// back here.
async fn run_cancellable<T>(
    cancel: &CancellationToken,
    fut: impl std::future::Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(NoiseSocketError::Cancelled),
        result = fut => result,
    }
}

impl<S> Drop for NoiseSocket<S> {
    fn drop(&mut self) {
        self.session.dispose();
    }
}
