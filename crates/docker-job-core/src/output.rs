//! Incremental UTF-8 decoding of container output.

/// Decodes a byte stream chunk by chunk.
///
/// A multi-byte sequence split across chunks is held back until it is
/// complete; invalid bytes become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `chunk`, returning all text that is complete so far.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut text = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(valid) => {
                    text.push_str(valid);
                    self.pending.clear();
                    return text;
                }
                Err(e) => {
                    let valid_up_to = e.valid_up_to();
                    text.push_str(&String::from_utf8_lossy(&self.pending[..valid_up_to]));
                    match e.error_len() {
                        Some(invalid) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid_up_to + invalid);
                        }
                        // incomplete sequence at the end: wait for more bytes
                        None => {
                            self.pending.drain(..valid_up_to);
                            return text;
                        }
                    }
                }
            }
        }
    }

    /// Flush whatever is still held back once the stream has ended.
    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_passes_through() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(b"hello\n"), "hello\n");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn test_split_multibyte_sequence_is_reassembled() {
        let bytes = "héllo €".as_bytes();
        let euro = bytes.len() - 3;
        let mut decoder = Utf8Decoder::new();

        let mut out = decoder.decode(&bytes[..2]);
        assert_eq!(out, "h");
        out.push_str(&decoder.decode(&bytes[2..euro + 1]));
        out.push_str(&decoder.decode(&bytes[euro + 1..euro + 2]));
        out.push_str(&decoder.decode(&bytes[euro + 2..]));
        out.push_str(&decoder.finish());
        assert_eq!(out, "héllo €");
    }

    #[test]
    fn test_invalid_bytes_are_replaced() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(b"a\xffb"), "a\u{FFFD}b");
    }

    #[test]
    fn test_truncated_sequence_flushed_on_finish() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(&[b'x', 0xe2, 0x82]), "x");
        assert_eq!(decoder.finish(), "\u{FFFD}");
    }
}
