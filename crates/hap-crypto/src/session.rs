use bytes::{Bytes, BytesMut};
use chacha20poly1305::{
    ChaCha20Poly1305, Nonce,
    aead::{Aead, KeyInit, Payload},
};

use crate::error::CryptoError;
use crate::keys::SessionKeys;

/// Maximum plaintext payload carried by a single encrypted frame.
pub const MAX_FRAME_PLAINTEXT: usize = 1024;

const TAG_SIZE: usize = 16;
const LENGTH_PREFIX_SIZE: usize = 2;

/// Per-connection ChaCha20-Poly1305 session used once pair-verify has
/// established a shared secret.
///
/// Wire format per frame: a 2-byte little-endian length prefix (also used
/// as the AEAD's associated data), followed by that many bytes of
/// ciphertext, followed by a 16-byte Poly1305 tag. The nonce is 12 bytes:
/// 4 zero bytes followed by the frame's 8-byte little-endian counter value.
/// Read and write directions keep independent counters, starting at zero.
///
/// Once built, a session's keys never change; there is no re-key
/// operation. Both a failed authentication check and a counter overflow
/// are fatal: the caller must close the connection rather than attempt to
/// continue.
pub struct CryptoSession {
    write_cipher: ChaCha20Poly1305,
    read_cipher: ChaCha20Poly1305,
    write_counter: u64,
    read_counter: u64,
    inbound: BytesMut,
}

impl CryptoSession {
    /// Build a session from HKDF-derived keys.
    #[must_use]
    pub fn new(keys: &SessionKeys) -> Self {
        Self {
            write_cipher: ChaCha20Poly1305::new((&*keys.write_key).into()),
            read_cipher: ChaCha20Poly1305::new((&*keys.read_key).into()),
            write_counter: 0,
            read_counter: 0,
            inbound: BytesMut::new(),
        }
    }

    /// Encrypt `plaintext`, splitting it into `MAX_FRAME_PLAINTEXT`-sized
    /// blocks as necessary, and return the fully framed wire bytes ready
    /// to write to the socket.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<Bytes, CryptoError> {
        let mut out = BytesMut::with_capacity(plaintext.len() + plaintext.len() / MAX_FRAME_PLAINTEXT * (LENGTH_PREFIX_SIZE + TAG_SIZE) + LENGTH_PREFIX_SIZE + TAG_SIZE);

        if plaintext.is_empty() {
            self.encrypt_block(&[], &mut out)?;
            return Ok(out.freeze());
        }

        for block in plaintext.chunks(MAX_FRAME_PLAINTEXT) {
            self.encrypt_block(block, &mut out)?;
        }
        Ok(out.freeze())
    }

    fn encrypt_block(&mut self, block: &[u8], out: &mut BytesMut) -> Result<(), CryptoError> {
        let len = u16::try_from(block.len()).map_err(|_| CryptoError::FrameTooLarge(block.len()))?;
        let aad = len.to_le_bytes();
        let nonce = counter_nonce(self.write_counter);
        let payload = Payload { msg: block, aad: &aad };

        let ciphertext = self
            .write_cipher
            .encrypt(Nonce::from_slice(&nonce), payload)
            .map_err(|_| CryptoError::AuthenticationFailed)?;

        self.write_counter = self.write_counter.checked_add(1).ok_or(CryptoError::CounterOverflow)?;

        out.extend_from_slice(&aad);
        out.extend_from_slice(&ciphertext);
        Ok(())
    }

    /// Feed newly received ciphertext bytes into the session's inbound
    /// buffer. Call [`Self::drain_plaintext`] afterward to extract any
    /// complete frames.
    pub fn feed_ciphertext(&mut self, data: &[u8]) {
        self.inbound.extend_from_slice(data);
    }

    /// Decrypt and return the next complete frame buffered by
    /// [`Self::feed_ciphertext`], or `None` if a full frame has not
    /// arrived yet. Returns `Err` on a declared length over
    /// `MAX_FRAME_PLAINTEXT`, authentication failure, or counter overflow;
    /// the caller must treat any of these as fatal and stop calling this
    /// method on the session.
    pub fn drain_plaintext(&mut self) -> Result<Option<Bytes>, CryptoError> {
        if self.inbound.len() < LENGTH_PREFIX_SIZE {
            return Ok(None);
        }
        let len = u16::from_le_bytes([self.inbound[0], self.inbound[1]]) as usize;
        if len > MAX_FRAME_PLAINTEXT {
            return Err(CryptoError::FrameTooLarge(len));
        }
        let frame_len = LENGTH_PREFIX_SIZE + len + TAG_SIZE;
        if self.inbound.len() < frame_len {
            return Ok(None);
        }

        let frame = self.inbound.split_to(frame_len);
        let aad = &frame[..LENGTH_PREFIX_SIZE];
        let ciphertext = &frame[LENGTH_PREFIX_SIZE..];
        let nonce = counter_nonce(self.read_counter);
        let payload = Payload { msg: ciphertext, aad };

        let plaintext = self
            .read_cipher
            .decrypt(Nonce::from_slice(&nonce), payload)
            .map_err(|_| CryptoError::AuthenticationFailed)?;

        self.read_counter = self.read_counter.checked_add(1).ok_or(CryptoError::CounterOverflow)?;

        Ok(Some(Bytes::from(plaintext)))
    }
}

fn counter_nonce(counter: u64) -> [u8; 12] {
    let mut nonce = [0u8; 12];
    nonce[4..12].copy_from_slice(&counter.to_le_bytes());
    nonce
}
