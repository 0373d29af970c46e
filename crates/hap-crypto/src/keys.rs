use hkdf::Hkdf;
use sha2::Sha512;
use zeroize::Zeroizing;

const CONTROL_SALT: &[u8] = b"Control-Salt";
const WRITE_INFO: &[u8] = b"Control-Write-Encryption-Key";
const READ_INFO: &[u8] = b"Control-Read-Encryption-Key";

/// The two 32-byte session keys derived from a pair-verify shared secret.
///
/// Named from the accessory's (server's) point of view: `write` is the key
/// this side uses to encrypt outbound frames, `read` is the key it uses to
/// decrypt inbound ones.
pub struct SessionKeys {
    /// Key used to encrypt frames sent to the controller.
    pub write_key: Zeroizing<[u8; 32]>,
    /// Key used to decrypt frames received from the controller.
    pub read_key: Zeroizing<[u8; 32]>,
}

/// Derive the per-direction session keys from a 32-byte pair-verify shared
/// secret, using HKDF-SHA-512 with the fixed HAP salt and info strings.
pub fn derive_session_keys(shared_secret: &[u8; 32]) -> SessionKeys {
    let hkdf = Hkdf::<Sha512>::new(Some(CONTROL_SALT), shared_secret);

    let mut write_key = Zeroizing::new([0u8; 32]);
    let mut read_key = Zeroizing::new([0u8; 32]);

    // HKDF-Expand only fails when the requested output length exceeds
    // 255 * hash_len; 32 bytes never does for SHA-512.
    hkdf.expand(WRITE_INFO, write_key.as_mut())
        .unwrap_or_else(|_| unreachable!("32-byte HKDF expand cannot fail"));
    hkdf.expand(READ_INFO, read_key.as_mut())
        .unwrap_or_else(|_| unreachable!("32-byte HKDF expand cannot fail"));

    SessionKeys { write_key, read_key }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_distinct_keys() {
        let secret = [0x42u8; 32];
        let keys = derive_session_keys(&secret);
        assert_ne!(*keys.write_key, *keys.read_key);
    }

    #[test]
    fn is_deterministic() {
        let secret = [0x7Au8; 32];
        let a = derive_session_keys(&secret);
        let b = derive_session_keys(&secret);
        assert_eq!(*a.write_key, *b.write_key);
        assert_eq!(*a.read_key, *b.read_key);
    }

    #[test]
    fn different_secrets_produce_different_keys() {
        let a = derive_session_keys(&[0x01u8; 32]);
        let b = derive_session_keys(&[0x02u8; 32]);
        assert_ne!(*a.write_key, *b.write_key);
    }
}
