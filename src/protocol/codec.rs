//! Splits the transport byte stream into frames on the divider byte.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::FRAME_DIVIDER;

/// Decodes divider-delimited frames (divider not included in the
/// yielded frames), and appends the divider when encoding.
#[derive(Debug, Clone, Default)]
pub(crate) struct FrameCodec {
    // How far into the buffer we have already looked for a divider.
    cursor: usize,
}

impl Decoder for FrameCodec {
    type Item = Vec<u8>;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let look_at = &src[self.cursor..];

        if let Some(position) = look_at.iter().position(|&byte| byte == FRAME_DIVIDER) {
            let frame_end = self.cursor + position;
            self.cursor = 0;

            let frame = src.split_to(frame_end);

            // Discard the divider itself.
            src.advance(1);

            Ok(Some(frame[..].to_vec()))
        } else {
            // No full frame yet. Next time we are called the same buffer
            // is handed to us again, possibly with more data appended;
            // no need to re-scan what we already looked at.
            self.cursor = src.len();

            Ok(None)
        }
    }
}

impl Encoder<Vec<u8>> for FrameCodec {
    type Error = std::io::Error;

    fn encode(&mut self, frame: Vec<u8>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(frame.len() + 1);
        dst.put_slice(&frame);
        dst.put_u8(FRAME_DIVIDER);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn decodes_across_partial_reads() {
        let mut codec = FrameCodec::default();
        let mut buffer = BytesMut::new();

        buffer.extend_from_slice(b"alp://dred/2");
        assert_eq!(codec.decode(&mut buffer).unwrap(), None);

        buffer.extend_from_slice(b"/1\nalp://ared");
        assert_eq!(
            codec.decode(&mut buffer).unwrap(),
            Some(b"alp://dred/2/1".to_vec())
        );
        assert_eq!(codec.decode(&mut buffer).unwrap(), None);

        buffer.extend_from_slice(b"/0/77\n");
        assert_eq!(
            codec.decode(&mut buffer).unwrap(),
            Some(b"alp://ared/0/77".to_vec())
        );
    }

    #[test]
    fn empty_frames_are_yielded() {
        let mut codec = FrameCodec::default();
        let mut buffer = BytesMut::from(&b"\n\n"[..]);

        assert_eq!(codec.decode(&mut buffer).unwrap(), Some(vec![]));
        assert_eq!(codec.decode(&mut buffer).unwrap(), Some(vec![]));
        assert_eq!(codec.decode(&mut buffer).unwrap(), None);
    }

    #[test]
    fn encoding_appends_the_divider() {
        let mut codec = FrameCodec::default();
        let mut buffer = BytesMut::new();

        codec.encode(b"alp://ppsw/1/1".to_vec(), &mut buffer).unwrap();
        assert_eq!(&buffer[..], b"alp://ppsw/1/1\n");
    }
}
