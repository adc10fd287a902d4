use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// The secret nonce underlying a proof's blind signature.
///
/// Stored internally as raw bytes (32 bytes when freshly generated, per the
/// Cashu convention). On the relay it is carried as base64; when fed to the
/// hash-to-curve primitive it is the hex-ASCII encoding of these bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Secret(Vec<u8>);

impl Secret {
    const BYTE_LENGTH: usize = 32;

    /// Generate a fresh random secret.
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; Self::BYTE_LENGTH];
        rand::rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Wrap already-decoded bytes (used when a secret round-trips through the
    /// wire formats).
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// The raw secret bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The hex-ASCII encoding fed to `hash_to_curve` (Cashu's `x_bytes`
    /// convention: hash the *hex string*, not the raw bytes).
    pub fn hex_ascii(&self) -> Vec<u8> {
        hex::encode(&self.0).into_bytes()
    }

    /// Hex encoding, used on the wire for NUT-00 `Proof.secret` (v3 token
    /// format and mint RPC bodies).
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Parse from a hex string as seen in mint RPC bodies.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        Ok(Self(hex::decode(s)?))
    }

    /// Base64 encoding, used when a secret is stored inside a relay event.
    pub fn to_base64(&self) -> String {
        URL_SAFE.encode(&self.0)
    }

    /// Parse from base64 as stored in relay events.
    pub fn from_base64(s: &str) -> Result<Self, base64::DecodeError> {
        Ok(Self(URL_SAFE.decode(s)?))
    }
}

impl Serialize for Secret {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Secret::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip() {
        let s = Secret::generate();
        let hex = s.to_hex();
        let back = Secret::from_hex(&hex).expect("valid hex");
        assert_eq!(s, back);
    }

    #[test]
    fn base64_round_trip() {
        let s = Secret::generate();
        let b64 = s.to_base64();
        let back = Secret::from_base64(&b64).expect("valid base64");
        assert_eq!(s, back);
    }

    #[test]
    fn fresh_secrets_are_unique() {
        let a = Secret::generate();
        let b = Secret::generate();
        assert_ne!(a, b);
    }
}
