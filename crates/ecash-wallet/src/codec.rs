//! Hybrid authenticated encryption for wallet-private event content.
//!
//! The scheme is self-encryption: the "recipient" is the holder's own key,
//! so every wallet-private event can be decrypted with nothing but the
//! holder's secret key. Construction follows the NIP-44 v2 shape (ECDH ->
//! HKDF-SHA256 conversation key -> padded ChaCha20 -> HMAC-SHA256 tag), kept
//! as a standalone implementation since it is core protocol surface owned
//! by this wallet rather than a thin pass-through to a Nostr library.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::ChaCha20;
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;

const VERSION: u8 = 0x02;
const SALT: &[u8] = b"nip44-v2";
const NONCE_LEN: usize = 12;
const MAC_LEN: usize = 32;
const MIN_PLAINTEXT_LEN: usize = 1;
const MAX_PLAINTEXT_LEN: usize = 65_535;

/// Errors from the encrypted event codec.
#[derive(Debug, Error)]
pub enum Error {
    /// Plaintext is empty or exceeds the 65535-byte ceiling.
    #[error("plaintext length out of bounds")]
    PlaintextLength,
    /// The wire payload was too short to contain version + nonce + tag.
    #[error("ciphertext too short")]
    CiphertextTooShort,
    /// The payload's version byte was not recognized.
    #[error("unsupported codec version {0}")]
    UnsupportedVersion(u8),
    /// HMAC verification failed: the payload was tampered with or the wrong
    /// key was used.
    #[error("integrity check failed")]
    IntegrityCheck,
    /// Base64 decoding of the wire payload failed.
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
}

type HmacSha256 = Hmac<Sha256>;

/// A derived per-pair conversation key, reusable across many messages.
#[derive(Clone)]
pub struct ConversationKey([u8; 32]);

impl std::fmt::Debug for ConversationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationKey").finish_non_exhaustive()
    }
}

/// Derive the conversation key for self-encryption: ECDH between the
/// holder's secret scalar and the holder's own public point, fed through
/// HKDF-extract with the fixed NIP-44 salt.
pub fn derive_self_conversation_key(key: &cashu_core::SecretKey) -> ConversationKey {
    let shared = k256::ecdh::diffie_hellman(
        &key.inner().to_nonzero_scalar(),
        key.public_key().inner().as_affine(),
    );
    let (extracted, _) = Hkdf::<Sha256>::extract(Some(SALT), shared.raw_secret_bytes().as_slice());
    let mut out = [0u8; 32];
    out.copy_from_slice(&extracted);
    ConversationKey(out)
}

struct MessageKeys {
    chacha_key: [u8; 32],
    chacha_nonce: [u8; 12],
    hmac_key: [u8; 32],
}

fn expand_message_keys(conversation_key: &ConversationKey, nonce: &[u8; NONCE_LEN]) -> MessageKeys {
    let hk = Hkdf::<Sha256>::from_prk(&conversation_key.0).expect("32-byte PRK is valid length");
    let mut okm = [0u8; 76];
    hk.expand(nonce, &mut okm).expect("76 bytes is a valid HKDF-expand length");

    let mut chacha_key = [0u8; 32];
    let mut chacha_nonce = [0u8; 12];
    let mut hmac_key = [0u8; 32];
    chacha_key.copy_from_slice(&okm[0..32]);
    chacha_nonce.copy_from_slice(&okm[32..44]);
    hmac_key.copy_from_slice(&okm[44..76]);
    MessageKeys {
        chacha_key,
        chacha_nonce,
        hmac_key,
    }
}

/// Compute the padded length for a given plaintext length: a minimum of 32
/// bytes, then chunk granularity that grows with magnitude (the next power
/// of two above `len`, subdivided into 8 size classes).
fn padded_len(len: usize) -> usize {
    if len <= 32 {
        return 32;
    }
    let next_power = 1usize << (usize::BITS - (len - 1).leading_zeros());
    let chunk = if next_power <= 256 { 32 } else { next_power / 8 };
    chunk * ((len - 1) / chunk + 1)
}

fn pad(plaintext: &[u8]) -> Vec<u8> {
    let target = padded_len(plaintext.len());
    let mut out = Vec::with_capacity(2 + target);
    out.extend_from_slice(&(plaintext.len() as u16).to_be_bytes());
    out.extend_from_slice(plaintext);
    out.resize(2 + target, 0);
    out
}

fn unpad(padded: &[u8]) -> Result<Vec<u8>, Error> {
    if padded.len() < 2 {
        return Err(Error::CiphertextTooShort);
    }
    let len = u16::from_be_bytes([padded[0], padded[1]]) as usize;
    if 2 + len > padded.len() {
        return Err(Error::CiphertextTooShort);
    }
    Ok(padded[2..2 + len].to_vec())
}

/// Encrypt `plaintext` under the self-encryption conversation key, producing
/// the base64 wire payload.
pub fn encrypt(conversation_key: &ConversationKey, plaintext: &[u8]) -> Result<String, Error> {
    if plaintext.is_empty() || plaintext.len() > MAX_PLAINTEXT_LEN {
        return Err(Error::PlaintextLength);
    }

    let mut nonce = [0u8; NONCE_LEN];
    rand::rng().fill_bytes(&mut nonce);
    let keys = expand_message_keys(conversation_key, &nonce);

    let mut padded = pad(plaintext);
    let mut cipher = ChaCha20::new((&keys.chacha_key).into(), (&keys.chacha_nonce).into());
    cipher.apply_keystream(&mut padded);
    let ciphertext = padded;

    let mut mac = HmacSha256::new_from_slice(&keys.hmac_key).expect("HMAC accepts any key length");
    mac.update(&[VERSION]);
    mac.update(&nonce);
    mac.update(&ciphertext);
    let tag = mac.finalize().into_bytes();

    let mut wire = Vec::with_capacity(1 + NONCE_LEN + ciphertext.len() + MAC_LEN);
    wire.push(VERSION);
    wire.extend_from_slice(&nonce);
    wire.extend_from_slice(&ciphertext);
    wire.extend_from_slice(&tag);
    Ok(STANDARD.encode(wire))
}

/// Decrypt a base64 wire payload produced by [`encrypt`], verifying its tag
/// before returning the plaintext.
pub fn decrypt(conversation_key: &ConversationKey, payload: &str) -> Result<Vec<u8>, Error> {
    let wire = STANDARD.decode(payload)?;
    if wire.len() < 1 + NONCE_LEN + MAC_LEN {
        return Err(Error::CiphertextTooShort);
    }
    let version = wire[0];
    if version != VERSION {
        return Err(Error::UnsupportedVersion(version));
    }
    let nonce: [u8; NONCE_LEN] = wire[1..1 + NONCE_LEN].try_into().expect("slice length checked above");
    let tag_start = wire.len() - MAC_LEN;
    let ciphertext = &wire[1 + NONCE_LEN..tag_start];
    let tag = &wire[tag_start..];

    let keys = expand_message_keys(conversation_key, &nonce);

    let mut mac = HmacSha256::new_from_slice(&keys.hmac_key).expect("HMAC accepts any key length");
    mac.update(&[VERSION]);
    mac.update(&nonce);
    mac.update(ciphertext);
    mac.verify_slice(tag).map_err(|_| Error::IntegrityCheck)?;

    let mut padded = ciphertext.to_vec();
    let mut cipher = ChaCha20::new((&keys.chacha_key).into(), (&keys.chacha_nonce).into());
    cipher.apply_keystream(&mut padded);

    unpad(&padded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_short_and_long_plaintexts() {
        let key = cashu_core::SecretKey::generate();
        let conv = derive_self_conversation_key(&key);

        for len in [1usize, 31, 32, 33, 1000, 65535] {
            let plaintext = vec![0x5a_u8; len];
            let payload = encrypt(&conv, &plaintext).expect("encrypt");
            let decrypted = decrypt(&conv, &payload).expect("decrypt");
            assert_eq!(decrypted, plaintext, "length {len}");
        }
    }

    #[test]
    fn rejects_empty_and_oversized_plaintext() {
        let key = cashu_core::SecretKey::generate();
        let conv = derive_self_conversation_key(&key);
        assert!(encrypt(&conv, &[]).is_err());
        assert!(encrypt(&conv, &vec![0u8; MAX_PLAINTEXT_LEN + 1]).is_err());
    }

    #[test]
    fn tamper_detection() {
        let key = cashu_core::SecretKey::generate();
        let conv = derive_self_conversation_key(&key);
        let payload = encrypt(&conv, b"hello wallet").expect("encrypt");
        let mut wire = STANDARD.decode(&payload).expect("valid base64");

        let last = wire.len() - 1;
        wire[last] ^= 0x01;
        let tampered = STANDARD.encode(wire);

        assert!(matches!(decrypt(&conv, &tampered), Err(Error::IntegrityCheck)));
    }

    #[test]
    fn padded_length_is_monotone_and_floored() {
        let mut prev = 0;
        for len in 1..=2000 {
            let p = padded_len(len);
            assert!(p >= 32);
            assert!(p >= prev);
            prev = p;
        }
    }
}
