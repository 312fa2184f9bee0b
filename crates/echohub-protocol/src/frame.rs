use crate::error::ProtocolError;

pub const HEADER_LEN: usize = 4;

/// Binary envelope on the device audio channel:
/// `{ type: u8, reserved: u8, payload_size: u16 BE }` followed by one
/// compressed audio frame at the negotiated parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryFrame {
    pub frame_type: u8,
    pub reserved: u8,
    pub payload: Vec<u8>,
}

impl BinaryFrame {
    pub fn audio(payload: Vec<u8>) -> Self {
        Self {
            frame_type: 0,
            reserved: 0,
            payload,
        }
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        if buf.len() < HEADER_LEN {
            return Err(ProtocolError::MalformedFrame {
                expected: HEADER_LEN,
                actual: buf.len(),
            });
        }

        let payload_size = u16::from_be_bytes([buf[2], buf[3]]) as usize;
        if buf.len() < HEADER_LEN + payload_size {
            return Err(ProtocolError::MalformedFrame {
                expected: HEADER_LEN + payload_size,
                actual: buf.len(),
            });
        }

        Ok(Self {
            frame_type: buf[0],
            reserved: buf[1],
            payload: buf[HEADER_LEN..HEADER_LEN + payload_size].to_vec(),
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.payload.len());
        out.push(self.frame_type);
        out.push(self.reserved);
        out.extend_from_slice(&(self.payload.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.payload);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let frame = BinaryFrame {
            frame_type: 0,
            reserved: 0,
            payload: vec![0xDE, 0xAD, 0xBE, 0xEF],
        };
        let encoded = frame.encode();
        assert_eq!(BinaryFrame::decode(&encoded).unwrap(), frame);
    }

    #[test]
    fn round_trip_empty_payload() {
        let frame = BinaryFrame::audio(Vec::new());
        assert_eq!(BinaryFrame::decode(&frame.encode()).unwrap(), frame);
    }

    #[test]
    fn short_header_is_malformed() {
        assert!(matches!(
            BinaryFrame::decode(&[0, 0, 0]),
            Err(ProtocolError::MalformedFrame {
                expected: 4,
                actual: 3
            })
        ));
    }

    #[test]
    fn truncated_payload_is_malformed() {
        // Header claims 16 payload bytes, only 2 present.
        let buf = [0u8, 0, 0, 16, 1, 2];
        assert!(matches!(
            BinaryFrame::decode(&buf),
            Err(ProtocolError::MalformedFrame {
                expected: 20,
                actual: 6
            })
        ));
    }
}
