//! Handshake framing (spec §4.4): negotiation data plus Noise handshake
//! messages, wrapped in the packet codec, with lazy handshake-state
//! construction and padded plaintext encoding once a message is carried
//! under an already-established symmetric key.

use tokio::io::{AsyncRead, AsyncWrite};

use crate::codec;
use crate::error::Result;
use crate::padding;
use crate::session::{HandshakeOp, Session};

/// Headroom added on top of the padded plaintext length when sizing the
/// output buffer for a Noise handshake write — two DH public keys, a MAC,
/// and psk mixing all land inside a handshake message, none of which snow
/// needs more than this to fit.
const HANDSHAKE_OVERHEAD: usize = 256;

/// Write one handshake wire unit: negotiation data followed by a real
/// Noise handshake message, emitted as two packets in a single atomic
/// write (spec §5). Lazily builds the handshake state on first use,
/// freezing the prologue accumulator in the process.
pub async fn write_handshake<S>(
    session: &mut Session,
    stream: &mut S,
    negotiation_data: &[u8],
    message_body: &[u8],
    padded_length: Option<u16>,
) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    session.ensure_negotiating()?;
    session.expect(HandshakeOp::WriteNeg)?;

    session.prologue_mut().push(negotiation_data);
    ensure_handshake_state(session)?;

    let plaintext = if session.is_next_message_encrypted() {
        padding::pad(message_body, padded_length)
    } else {
        message_body.to_vec()
    };

    let mut buf = vec![0u8; plaintext.len() + HANDSHAKE_OVERHEAD];
    let written = session
        .handshake_state_mut()?
        .write_message(&plaintext, &mut buf)?;
    buf.truncate(written);

    session.prologue_mut().push(&buf);
    codec::write_packets(stream, negotiation_data, &buf).await?;

    session.mark_real_message_exchanged();
    session.finish_handshake_if_ready()?;
    session.advance(2);
    Ok(())
}

/// Write one handshake wire unit where the Noise message itself is
/// empty — no handshake state is touched at all. Used by the responder
/// in the Switch and Retry flows to hand back a reinitialization request
/// without attempting to process the message it is rejecting.
pub async fn write_empty_handshake<S>(
    session: &mut Session,
    stream: &mut S,
    negotiation_data: &[u8],
) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    session.ensure_negotiating()?;
    session.expect(HandshakeOp::WriteNeg)?;

    session.prologue_mut().push(negotiation_data);
    session.prologue_mut().push(b"");

    codec::write_packets(stream, negotiation_data, b"").await?;
    session.advance(2);
    Ok(())
}

/// Read the negotiation-data half of one handshake wire unit.
pub async fn read_negotiation<S>(session: &mut Session, stream: &mut S) -> Result<Vec<u8>>
where
    S: AsyncRead + Unpin,
{
    session.ensure_negotiating()?;
    session.expect(HandshakeOp::ReadNeg)?;

    let data = codec::read_packet(stream).await?;
    session.prologue_mut().push(&data);
    session.advance(1);
    Ok(data)
}

/// Read the Noise-message half of one handshake wire unit, decrypting it
/// if a handshake state already carries a symmetric key. A zero-length
/// packet short-circuits with an empty body and no crypto call — the
/// responder's empty response in a Retry flow read back by a caller that
/// chooses `read_handshake` over [`ignore_handshake`].
pub async fn read_handshake<S>(session: &mut Session, stream: &mut S) -> Result<Vec<u8>>
where
    S: AsyncRead + Unpin,
{
    session.ensure_negotiating()?;
    session.expect(HandshakeOp::ReadHs)?;

    let packet = codec::read_packet(stream).await?;

    if packet.is_empty() {
        session.prologue_mut().push(&packet);
        session.advance(1);
        return Ok(Vec::new());
    }

    ensure_handshake_state(session)?;
    session.prologue_mut().push(&packet);

    let mut buf = vec![0u8; packet.len()];
    let written = session
        .handshake_state_mut()?
        .read_message(&packet, &mut buf)?;
    buf.truncate(written);

    let body = if session.is_next_message_encrypted() {
        padding::unpad(&buf)?
    } else {
        buf
    };

    session.mark_real_message_exchanged();
    session.finish_handshake_if_ready()?;
    session.advance(1);
    Ok(body)
}

/// Read the Noise-message half of one handshake wire unit and discard it
/// without attempting any crypto — the raw bytes still count toward the
/// prologue. Used by the receiver in Switch and Retry to drop a message
/// it can no longer (or never intended to) process.
pub async fn ignore_handshake<S>(session: &mut Session, stream: &mut S) -> Result<()>
where
    S: AsyncRead + Unpin,
{
    session.ensure_negotiating()?;
    session.expect(HandshakeOp::ReadHs)?;

    let packet = codec::read_packet(stream).await?;
    session.prologue_mut().push(&packet);
    session.advance(1);
    Ok(())
}

/// Build the handshake state from the session's current protocol/config
/// and the prologue accumulated so far, if it hasn't been built already.
/// Freezes the prologue accumulator as a side effect.
fn ensure_handshake_state(session: &mut Session) -> Result<()> {
    if session.has_handshake_state() {
        return Ok(());
    }

    let protocol = session.protocol_config()?.0.clone();
    let app_prologue = session.protocol_config()?.1.application_prologue().to_vec();
    let tag = session.init_tag();

    let prologue_bytes = session.prologue_mut().freeze(tag, &app_prologue);
    let state = session
        .protocol_config()?
        .1
        .build_handshake_state(&protocol, &prologue_bytes)?;
    session.set_handshake_state(state);
    Ok(())
}
