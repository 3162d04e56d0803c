//! Packet codec — the universal length-prefixed framing primitive.
//!
//! Every byte this library puts on the wire is a packet: a big-endian
//! 16-bit length followed by exactly that many bytes. Handshake framing
//! and transport framing are both built on top of this.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::error::{NoiseSocketError, Result};

/// Maximum payload a single packet may carry (fits the u16 length field).
pub const MAX_PACKET_LEN: usize = u16::MAX as usize;

/// Encode `data` as `be16(len(data)) || data`.
///
/// Returns [`NoiseSocketError::TooLarge`] if `data` exceeds 65535 bytes.
pub fn encode(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() > MAX_PACKET_LEN {
        return Err(NoiseSocketError::TooLarge(format!(
            "packet body of {} bytes exceeds {MAX_PACKET_LEN}",
            data.len()
        )));
    }
    let mut out = Vec::with_capacity(2 + data.len());
    out.extend_from_slice(&(data.len() as u16).to_be_bytes());
    out.extend_from_slice(data);
    Ok(out)
}

/// Write `data` to `stream` as a single packet in one `write_all` call.
pub async fn write_packet<W>(stream: &mut W, data: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let packet = encode(data)?;
    trace!(bytes = data.len(), "wrote packet");
    stream.write_all(&packet).await?;
    Ok(())
}

/// Write two packets back to back in a single buffer, so the caller's
/// view of the call is one atomic write.
pub async fn write_packets<W>(stream: &mut W, first: &[u8], second: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let a = encode(first)?;
    let b = encode(second)?;
    let mut combined = Vec::with_capacity(a.len() + b.len());
    combined.extend_from_slice(&a);
    combined.extend_from_slice(&b);
    stream.write_all(&combined).await?;
    Ok(())
}

/// Read one length-prefixed packet from `stream`.
///
/// Fails with [`NoiseSocketError::StreamError`] wrapping an
/// [`std::io::ErrorKind::UnexpectedEof`] if the stream ends before the
/// full 2+n bytes arrive — `AsyncReadExt::read_exact` already surfaces
/// that as `UnexpectedEof`, so there is no separate `Truncated` kind to
/// construct here.
pub async fn read_packet<R>(stream: &mut R) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 2];
    stream.read_exact(&mut len_buf).await?;
    let len = u16::from_be_bytes(len_buf) as usize;

    let mut body = vec![0u8; len];
    if len > 0 {
        stream.read_exact(&mut body).await?;
    }
    trace!(bytes = body.len(), "read packet");
    Ok(body)
}
