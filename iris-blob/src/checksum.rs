//! CRC32C (Castagnoli) over a payload, fed chunk by chunk.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Bytes hashed per step when checksumming a whole payload.
pub const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, Default)]
pub struct Crc32cHasher {
    state: u32,
    len: u64,
}

impl Crc32cHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.state = crc32c::crc32c_append(self.state, chunk);
        self.len += chunk.len() as u64;
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn finish(&self) -> Checksum {
        Checksum(self.state)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checksum(pub u32);

impl Checksum {
    pub fn of(payload: &[u8]) -> Self {
        let mut hasher = Crc32cHasher::new();
        for chunk in payload.chunks(CHUNK_SIZE) {
            hasher.update(chunk);
        }
        hasher.finish()
    }

    /// Base64 of the big-endian bytes, the form object stores accept.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0.to_be_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunked_matches_one_shot() {
        let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        assert_eq!(Checksum::of(&payload).0, crc32c::crc32c(&payload));
    }

    #[test]
    fn known_vector() {
        // RFC 3720 appendix B.4: 32 bytes of zeros
        assert_eq!(Checksum::of(&[0u8; 32]).0, 0x8A91_36AA);
        assert_eq!(Checksum(0x8A91_36AA).to_base64(), "ipE2qg==");
    }

    #[test]
    fn tracks_length() {
        let mut h = Crc32cHasher::new();
        assert!(h.is_empty());
        h.update(b"abc");
        h.update(b"de");
        assert_eq!(h.len(), 5);
        assert_eq!(h.finish(), Checksum::of(b"abcde"));
    }
}
