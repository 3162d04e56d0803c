//! Transport message framing (spec §4.2): padded, AEAD-encrypted
//! application messages exchanged once the handshake has completed.

use tokio::io::{AsyncRead, AsyncWrite};

use crate::codec;
use crate::error::{NoiseSocketError, Result};
use crate::padding;
use crate::session::Session;

/// AEAD authentication tag length for every cipher suite `snow` supports
/// (AESGCM and ChaChaPoly are both 16-byte-tag constructions).
const TAG_LEN: usize = 16;

/// Encrypt `body` and write it as one packet.
///
/// `plaintext_total = max(len(body) + 2, padded_length)`; the emitted
/// packet carries `plaintext_total + 16` ciphertext bytes. Fails with
/// [`NoiseSocketError::TooLarge`] if the resulting packet would exceed
/// the 65535-byte ceiling.
pub async fn write_message<S>(
    session: &mut Session,
    stream: &mut S,
    body: &[u8],
    padded_length: Option<u16>,
) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    let plaintext = padding::pad(body, padded_length);
    if plaintext.len() + TAG_LEN + 2 > codec::MAX_PACKET_LEN {
        return Err(NoiseSocketError::TooLarge(format!(
            "transport message of {} plaintext bytes would exceed the 65535-byte packet ceiling once encrypted and length-prefixed",
            plaintext.len()
        )));
    }

    let mut buf = vec![0u8; plaintext.len() + TAG_LEN];
    let transport = session.transport_mut()?;
    let written = transport.write_message(&plaintext, &mut buf)?;
    buf.truncate(written);

    codec::write_packet(stream, &buf).await?;
    Ok(())
}

/// Read and decrypt one transport message packet.
///
/// Fails with [`NoiseSocketError::Malformed`] if the packet is shorter
/// than the minimum possible ciphertext (a 16-byte tag plus the 2-byte
/// inner length prefix), and with [`NoiseSocketError::Crypto`] if
/// decryption/authentication fails.
pub async fn read_message<S>(session: &mut Session, stream: &mut S) -> Result<Vec<u8>>
where
    S: AsyncRead + Unpin,
{
    let packet = codec::read_packet(stream).await?;
    if packet.len() < TAG_LEN + 2 {
        return Err(NoiseSocketError::Malformed(format!(
            "transport packet of {} bytes is smaller than the minimum {} bytes",
            packet.len(),
            TAG_LEN + 2
        )));
    }

    let mut buf = vec![0u8; packet.len()];
    let transport = session.transport_mut()?;
    let written = transport.read_message(&packet, &mut buf)?;
    buf.truncate(written);

    padding::unpad(&buf)
}
