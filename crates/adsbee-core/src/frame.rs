//! Minimal WebSocket framing for the device console link.
//!
//! Only the subset the ADSBee firmware speaks: single final frames, a
//! fixed-length header with the three length forms, client-side masking.
//! No fragmentation, no extensions.

use thiserror::Error;

/// Upper bound on a declared payload length. The device sends short log
/// lines; anything near this is a corrupted header.
pub const MAX_PAYLOAD_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Text,
    Binary,
    Close,
    Ping,
    Pong,
    Other(u8),
}

impl Opcode {
    pub fn from_bits(bits: u8) -> Self {
        match bits {
            0x1 => Opcode::Text,
            0x2 => Opcode::Binary,
            0x8 => Opcode::Close,
            0x9 => Opcode::Ping,
            0xA => Opcode::Pong,
            other => Opcode::Other(other & 0x0f),
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            Opcode::Text => 0x1,
            Opcode::Binary => 0x2,
            Opcode::Close => 0x8,
            Opcode::Ping => 0x9,
            Opcode::Pong => 0xA,
            Opcode::Other(bits) => bits & 0x0f,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub fin: bool,
    pub opcode: Opcode,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("declared payload exceeds max size: {size} > {max}")]
    OversizedPayload { size: u64, max: usize },
}

/// Encode a single final frame, masked with `mask_key` (every
/// client-originated frame must carry a mask).
pub fn encode_frame(opcode: Opcode, payload: &[u8], mask_key: [u8; 4]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + 14);
    frame.push(0x80 | opcode.bits());

    let len = payload.len();
    if len <= 125 {
        frame.push(0x80 | len as u8);
    } else if len <= 65535 {
        frame.push(0x80 | 126);
        frame.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        frame.push(0x80 | 127);
        frame.extend_from_slice(&(len as u64).to_be_bytes());
    }

    frame.extend_from_slice(&mask_key);
    frame.extend(
        payload
            .iter()
            .enumerate()
            .map(|(i, byte)| byte ^ mask_key[i % 4]),
    );
    frame
}

/// Incremental frame decoder. Bytes go in via [`push_chunk`]; complete
/// frames come out once the declared byte count has arrived. Partial input
/// stays pending, so the caller can feed whatever chunk sizes the socket
/// hands it.
///
/// [`push_chunk`]: FrameDecoder::push_chunk
#[derive(Debug, Default)]
pub struct FrameDecoder {
    pending: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_chunk(&mut self, chunk: &[u8]) -> Result<Vec<Frame>, FrameError> {
        if !chunk.is_empty() {
            self.pending.extend_from_slice(chunk);
        }

        let mut frames = Vec::new();
        while let Some(frame) = self.try_take_frame()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    /// True when a partially received frame is still buffered. An EOF in
    /// this state is a mid-frame disconnect.
    pub fn has_partial(&self) -> bool {
        !self.pending.is_empty()
    }

    fn try_take_frame(&mut self) -> Result<Option<Frame>, FrameError> {
        if self.pending.len() < 2 {
            return Ok(None);
        }

        let fin = self.pending[0] & 0x80 != 0;
        let opcode = Opcode::from_bits(self.pending[0] & 0x0f);
        let masked = self.pending[1] & 0x80 != 0;
        let len_bits = self.pending[1] & 0x7f;

        let (ext_len, payload_len) = match len_bits {
            126 => {
                if self.pending.len() < 4 {
                    return Ok(None);
                }
                let mut ext = [0u8; 2];
                ext.copy_from_slice(&self.pending[2..4]);
                (2usize, u64::from(u16::from_be_bytes(ext)))
            }
            127 => {
                if self.pending.len() < 10 {
                    return Ok(None);
                }
                let mut ext = [0u8; 8];
                ext.copy_from_slice(&self.pending[2..10]);
                (8usize, u64::from_be_bytes(ext))
            }
            inline => (0usize, u64::from(inline)),
        };

        if payload_len > MAX_PAYLOAD_BYTES as u64 {
            return Err(FrameError::OversizedPayload {
                size: payload_len,
                max: MAX_PAYLOAD_BYTES,
            });
        }
        let payload_len = payload_len as usize;

        let mask_len = if masked { 4 } else { 0 };
        let total = 2 + ext_len + mask_len + payload_len;
        if self.pending.len() < total {
            return Ok(None);
        }

        let raw = self.pending.drain(..total).collect::<Vec<u8>>();
        let payload_start = 2 + ext_len + mask_len;
        let mut payload = raw[payload_start..].to_vec();
        if masked {
            let mask = &raw[2 + ext_len..2 + ext_len + 4];
            for (i, byte) in payload.iter_mut().enumerate() {
                *byte ^= mask[i % 4];
            }
        }

        Ok(Some(Frame {
            fin,
            opcode,
            payload,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASK: [u8; 4] = [0x37, 0x42, 0x13, 0x99];

    fn round_trip(payload: &[u8]) -> Frame {
        let encoded = encode_frame(Opcode::Text, payload, MASK);
        let mut decoder = FrameDecoder::new();
        let mut frames = decoder.push_chunk(&encoded).expect("decode");
        assert_eq!(frames.len(), 1);
        assert!(!decoder.has_partial());
        frames.remove(0)
    }

    #[test]
    fn round_trip_selects_length_form_by_magnitude() {
        for (len, header_bytes) in [
            (0usize, 2usize),
            (1, 2),
            (125, 2),
            (126, 4),
            (65535, 4),
            (65536, 10),
        ] {
            let payload = vec![0xA5u8; len];
            let encoded = encode_frame(Opcode::Text, &payload, MASK);
            assert_eq!(encoded.len(), header_bytes + 4 + len, "len={len}");

            let frame = round_trip(&payload);
            assert!(frame.fin);
            assert_eq!(frame.opcode, Opcode::Text);
            assert_eq!(frame.payload, payload, "len={len}");
        }
    }

    #[test]
    fn encoded_frames_always_carry_the_mask_bit() {
        let encoded = encode_frame(Opcode::Text, b"AT+FEED?\r\n", MASK);
        assert_eq!(encoded[0], 0x81);
        assert_eq!(encoded[1] & 0x80, 0x80);
        // Payload on the wire is not cleartext.
        assert_ne!(&encoded[6..], b"AT+FEED?\r\n");
    }

    #[test]
    fn decodes_unmasked_server_frames() {
        let mut raw = vec![0x81, 0x05];
        raw.extend_from_slice(b"hello");
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push_chunk(&raw).expect("decode");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload, b"hello");
    }

    #[test]
    fn partial_input_is_retained_across_pushes() {
        let encoded = encode_frame(Opcode::Text, b"duplicate packet icao=0xaa7f03", MASK);
        let mut decoder = FrameDecoder::new();
        for byte in &encoded[..encoded.len() - 1] {
            assert!(decoder.push_chunk(&[*byte]).expect("decode").is_empty());
            assert!(decoder.has_partial());
        }
        let frames = decoder
            .push_chunk(&encoded[encoded.len() - 1..])
            .expect("decode");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload, b"duplicate packet icao=0xaa7f03");
    }

    #[test]
    fn multiple_frames_in_one_chunk_come_out_in_order() {
        let mut raw = encode_frame(Opcode::Text, b"first", MASK);
        raw.extend(encode_frame(Opcode::Ping, b"beat", MASK));
        raw.extend(encode_frame(Opcode::Text, b"second", MASK));

        let mut decoder = FrameDecoder::new();
        let frames = decoder.push_chunk(&raw).expect("decode");
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].payload, b"first");
        assert_eq!(frames[1].opcode, Opcode::Ping);
        assert_eq!(frames[2].payload, b"second");
    }

    #[test]
    fn unknown_opcodes_decode_without_error() {
        let encoded = encode_frame(Opcode::Other(0x5), b"", MASK);
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push_chunk(&encoded).expect("decode");
        assert_eq!(frames[0].opcode, Opcode::Other(0x5));
    }

    #[test]
    fn oversized_declared_length_is_rejected() {
        let mut raw = vec![0x81, 127];
        raw.extend_from_slice(&(MAX_PAYLOAD_BYTES as u64 + 1).to_be_bytes());
        let mut decoder = FrameDecoder::new();
        let err = decoder.push_chunk(&raw).expect_err("oversized");
        assert!(matches!(err, FrameError::OversizedPayload { .. }));
    }
}
