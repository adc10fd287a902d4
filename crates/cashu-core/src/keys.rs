use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::error::{Error, Result};

/// A compressed secp256k1 public key, serialized on the wire as 33-byte hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicKey(#[serde(with = "serde_public_key")] k256::PublicKey);

impl PublicKey {
    /// Build from a k256 public key.
    pub fn new(inner: k256::PublicKey) -> Self {
        Self(inner)
    }

    /// The underlying point.
    pub fn inner(&self) -> &k256::PublicKey {
        &self.0
    }

    /// 33-byte compressed SEC1 encoding.
    pub fn to_compressed_bytes(&self) -> Vec<u8> {
        self.0.to_sec1_bytes().to_vec()
    }

    /// Hex encoding of the compressed point.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_compressed_bytes())
    }

    /// Parse a compressed-point hex string, validating it is exactly 33
    /// bytes as required of mint response keys.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 33 {
            return Err(Error::InvalidCompressedPoint);
        }
        let inner = k256::PublicKey::from_sec1_bytes(&bytes)
            .map_err(|_| Error::InvalidCompressedPoint)?;
        Ok(Self(inner))
    }
}

/// A secp256k1 scalar used as a blinding factor or signing key.
#[derive(Clone)]
pub struct SecretKey(k256::SecretKey);

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretKey").finish_non_exhaustive()
    }
}

impl SecretKey {
    /// Build from a k256 secret key.
    pub fn new(inner: k256::SecretKey) -> Self {
        Self(inner)
    }

    /// Generate a fresh random scalar.
    pub fn generate() -> Self {
        Self(k256::SecretKey::random(&mut rand::rng()))
    }

    /// The underlying scalar.
    pub fn inner(&self) -> &k256::SecretKey {
        &self.0
    }

    /// The corresponding public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.public_key())
    }

    /// 32-byte big-endian scalar encoding.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes().into()
    }

    /// Hex decode a 32-byte scalar.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)?;
        let inner = k256::SecretKey::from_slice(&bytes).map_err(|_| Error::InvalidCompressedPoint)?;
        Ok(Self(inner))
    }
}

mod serde_public_key {
    use serde::Deserialize;

    pub fn serialize<S>(key: &k256::PublicKey, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&hex::encode(key.to_sec1_bytes()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<k256::PublicKey, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        k256::PublicKey::from_sec1_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

/// A mint keyset's amount -> public-key table, as returned by `GET
/// /v1/keys[/{id}]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keys(BTreeMap<u64, PublicKey>);

impl Keys {
    /// Build from an amount-ordered map.
    pub fn new(keys: BTreeMap<u64, PublicKey>) -> Self {
        Self(keys)
    }

    /// Iterate amount -> key pairs in ascending amount order.
    pub fn iter(&self) -> impl Iterator<Item = (Amount, &PublicKey)> {
        self.0.iter().map(|(amt, key)| (Amount::from(*amt), key))
    }

    /// The key for a given denomination, if the keyset has one.
    pub fn amount_key(&self, amount: Amount) -> Option<&PublicKey> {
        self.0.get(&amount.as_u64())
    }

    /// The largest denomination this keyset supports, used to cap greedy
    /// output planning.
    pub fn max_amount(&self) -> Amount {
        self.0.keys().next_back().copied().map(Amount::from).unwrap_or(Amount::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_key_hex_round_trip() {
        let sk = SecretKey::generate();
        let pk = sk.public_key();
        let hex = pk.to_hex();
        let back = PublicKey::from_hex(&hex).expect("valid hex");
        assert_eq!(pk, back);
    }

    #[test]
    fn rejects_short_compressed_key() {
        assert!(PublicKey::from_hex("02aabb").is_err());
    }
}
