//! Wire framing.
//!
//! Every unit on a connection starts with a one-byte discriminant:
//!
//! ```text
//! MESSAGE: 0x01 | len: u32 LE | payload[len]
//! STREAM:  0x02
//! ```
//!
//! A STREAM marker carries no length. Whatever follows it is raw
//! application bytes, and the decoder must not touch them until the
//! application has consumed them (see [`crate::gate`]).

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Result, TransportError};
use crate::rpc::Rpc;

/// Discriminant of a length-prefixed message.
pub const INCOMING_MESSAGE: u8 = 0x01;

/// Discriminant of a raw byte stream.
pub const INCOMING_STREAM: u8 = 0x02;

/// Default cap on MESSAGE payloads.
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024;

/// Decode the next unit from `reader`.
///
/// Returns `Ok(None)` on a clean end of stream at a unit boundary. EOF in
/// the middle of a unit is an error.
pub async fn read_rpc<R>(reader: &mut R, from: &str, max_len: usize) -> Result<Option<Rpc>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let tag = match reader.read_u8().await {
        Ok(tag) => tag,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    match tag {
        INCOMING_STREAM => Ok(Some(Rpc::stream_marker(from))),
        INCOMING_MESSAGE => {
            let len = reader.read_u32_le().await? as usize;
            if len > max_len {
                return Err(TransportError::FrameTooLarge { len, max: max_len });
            }
            let mut payload = vec![0u8; len];
            reader.read_exact(&mut payload).await?;
            Ok(Some(Rpc::message(from, Bytes::from(payload))))
        }
        other => Err(TransportError::UnknownFrame(other)),
    }
}

/// Write one MESSAGE frame and flush.
pub async fn write_message<W>(writer: &mut W, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let len = u32::try_from(payload.len()).map_err(|_| TransportError::FrameTooLarge {
        len: payload.len(),
        max: u32::MAX as usize,
    })?;

    writer.write_u8(INCOMING_MESSAGE).await?;
    writer.write_u32_le(len).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Write a STREAM marker. The caller writes the raw bytes after it.
pub async fn write_stream_marker<W>(writer: &mut W) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    writer.write_u8(INCOMING_STREAM).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[tokio::test]
    async fn test_message_frame_layout() {
        let mut wire = Vec::new();
        write_message(&mut wire, b"abc").await.unwrap();
        assert_eq!(wire, [0x01, 3, 0, 0, 0, b'a', b'b', b'c']);
    }

    #[tokio::test]
    async fn test_decode_message_and_stream() {
        let mut wire = Vec::new();
        write_message(&mut wire, b"hello").await.unwrap();
        write_stream_marker(&mut wire).await.unwrap();
        wire.extend_from_slice(b"raw");

        let mut reader = wire.as_slice();
        let first = read_rpc(&mut reader, "peer", DEFAULT_MAX_FRAME_LEN)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first, Rpc::message("peer", &b"hello"[..]));

        let second = read_rpc(&mut reader, "peer", DEFAULT_MAX_FRAME_LEN)
            .await
            .unwrap()
            .unwrap();
        assert!(second.stream);
        assert!(second.payload.is_empty());

        // The raw bytes are left untouched.
        assert_eq!(reader, b"raw");
    }

    #[tokio::test]
    async fn test_clean_eof_is_none() {
        let mut reader: &[u8] = &[];
        assert!(read_rpc(&mut reader, "peer", 16).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_truncated_message_is_error() {
        let mut reader: &[u8] = &[0x01, 10, 0, 0, 0, 1, 2];
        assert!(matches!(
            read_rpc(&mut reader, "peer", 16).await,
            Err(TransportError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_discriminant() {
        let mut reader: &[u8] = &[0x7f];
        assert!(matches!(
            read_rpc(&mut reader, "peer", 16).await,
            Err(TransportError::UnknownFrame(0x7f))
        ));
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let mut reader: &[u8] = &[0x01, 0xff, 0xff, 0, 0];
        assert!(matches!(
            read_rpc(&mut reader, "peer", 1024).await,
            Err(TransportError::FrameTooLarge { len: 0xffff, max: 1024 })
        ));
    }

    proptest! {
        #[test]
        fn decoded_payload_matches_written(payload in prop::collection::vec(any::<u8>(), 0..2048)) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let decoded = rt.block_on(async {
                let mut wire = Vec::new();
                write_message(&mut wire, &payload).await.unwrap();
                read_rpc(&mut wire.as_slice(), "p", DEFAULT_MAX_FRAME_LEN).await.unwrap()
            });
            let decoded = decoded.unwrap();
            prop_assert!(!decoded.stream);
            prop_assert_eq!(decoded.payload.as_ref(), payload.as_slice());
        }
    }
}
