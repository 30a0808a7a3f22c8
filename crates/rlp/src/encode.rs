use bytes::{BufMut, BytesMut};

pub struct Encoder {
    buffer: BytesMut,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder {
    pub fn new() -> Self {
        Encoder {
            buffer: BytesMut::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Encoder {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    pub fn finish(self) -> Vec<u8> {
        self.buffer.to_vec()
    }

    /// Append a byte string.
    pub fn append_bytes(&mut self, bytes: &[u8]) {
        if bytes.len() == 1 && bytes[0] < 0x80 {
            self.buffer.put_u8(bytes[0]);
            return;
        }
        self.append_header(0x80, bytes.len());
        self.buffer.put_slice(bytes);
    }

    /// Append a list whose items are already encoded.
    pub fn append_list(&mut self, items: &[Vec<u8>]) {
        let payload_len: usize = items.iter().map(Vec::len).sum();
        self.append_header(0xc0, payload_len);
        for item in items {
            self.buffer.put_slice(item);
        }
    }

    /// Append an unsigned integer in its minimal big-endian form.
    pub fn append_u64(&mut self, value: u64) {
        let bytes = value.to_be_bytes();
        let first = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
        self.append_bytes(&bytes[first..]);
    }

    fn append_header(&mut self, offset: u8, len: usize) {
        if len < 56 {
            self.buffer.put_u8(offset + len as u8);
        } else {
            let len_bytes = (len as u64).to_be_bytes();
            let first = len_bytes.iter().position(|&b| b != 0).unwrap_or(7);
            let len_bytes = &len_bytes[first..];
            self.buffer.put_u8(offset + 55 + len_bytes.len() as u8);
            self.buffer.put_slice(len_bytes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_byte() {
        let mut encoder = Encoder::new();
        encoder.append_bytes(&[0x7f]);
        assert_eq!(encoder.finish(), vec![0x7f]);

        let mut encoder = Encoder::new();
        encoder.append_bytes(&[0x80]);
        assert_eq!(encoder.finish(), vec![0x81, 0x80]);
    }

    #[test]
    fn test_empty_string_and_zero() {
        let mut encoder = Encoder::new();
        encoder.append_bytes(&[]);
        encoder.append_u64(0);
        assert_eq!(encoder.finish(), vec![0x80, 0x80]);
    }

    #[test]
    fn test_integers() {
        let mut encoder = Encoder::new();
        encoder.append_u64(15);
        encoder.append_u64(1024);
        assert_eq!(encoder.finish(), vec![0x0f, 0x82, 0x04, 0x00]);
    }

    #[test]
    fn test_long_string() {
        let data = vec![b'a'; 56];
        let mut encoder = Encoder::new();
        encoder.append_bytes(&data);
        let out = encoder.finish();
        assert_eq!(&out[..2], &[0xb8, 56]);
        assert_eq!(out.len(), 58);
    }

    #[test]
    fn test_long_list() {
        let items: Vec<Vec<u8>> = (0..60).map(|_| vec![0x01]).collect();
        let mut encoder = Encoder::new();
        encoder.append_list(&items);
        let out = encoder.finish();
        assert_eq!(&out[..2], &[0xf8, 60]);
    }
}
