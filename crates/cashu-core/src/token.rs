//! Token transport formats (NUT-00 appendix): `cashuA…` (v3, JSON) and
//! `cashuB…` (v4, CBOR).

use std::collections::BTreeMap;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::error::{Error, Result};
use crate::keys::PublicKey;
use crate::nuts::nut00::Proof;
use crate::nuts::nut02::Id as KeysetId;
use crate::secret::Secret;

const V3_PREFIX: &str = "cashuA";
const V4_PREFIX: &str = "cashuB";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct V3ProofEntry {
    id: KeysetId,
    amount: Amount,
    secret: Secret,
    #[serde(rename = "C")]
    c: PublicKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct V3MintEntry {
    mint: String,
    proofs: Vec<V3ProofEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct V3TokenBody {
    token: Vec<V3MintEntry>,
    unit: Option<String>,
    memo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct V4ProofEntry {
    a: Amount,
    #[serde(with = "serde_bytes_secret")]
    s: Secret,
    #[serde(with = "serde_bytes_pubkey")]
    c: PublicKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct V4TokenEntry {
    #[serde(with = "serde_bytes_keyset_id")]
    i: KeysetId,
    p: Vec<V4ProofEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct V4TokenBody {
    m: String,
    u: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    d: Option<String>,
    t: Vec<V4TokenEntry>,
}

mod serde_bytes_secret {
    use super::Secret;
    use serde::Deserialize;

    pub fn serialize<S>(secret: &Secret, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serde_bytes::serialize(secret.as_bytes(), serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Secret, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bytes: Vec<u8> = serde_bytes::deserialize(deserializer)?;
        Ok(Secret::from_bytes(bytes))
    }
}

mod serde_bytes_pubkey {
    use super::PublicKey;
    use serde::Deserialize;

    pub fn serialize<S>(key: &PublicKey, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serde_bytes::serialize(&key.to_compressed_bytes(), serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<PublicKey, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bytes: Vec<u8> = serde_bytes::deserialize(deserializer)?;
        let hex = hex::encode(bytes);
        PublicKey::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

mod serde_bytes_keyset_id {
    use super::KeysetId;
    use serde::Deserialize;

    pub fn serialize<S>(id: &KeysetId, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serde_bytes::serialize(&id.to_bytes(), serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<KeysetId, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bytes: Vec<u8> = serde_bytes::deserialize(deserializer)?;
        let hex = hex::encode(bytes);
        hex.parse().map_err(serde::de::Error::custom)
    }
}

/// A proof together with the mint it belongs to, as carried inside a
/// serialized token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenProof {
    /// Mint base URL.
    pub mint_url: String,
    /// The proof itself.
    pub proof: Proof,
}

/// A parsed token: one or more mints' worth of proofs, a unit, and an
/// optional memo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Proofs grouped by owning mint.
    pub entries: Vec<TokenProof>,
    /// Currency unit.
    pub unit: String,
    /// Optional human-readable memo.
    pub memo: Option<String>,
}

impl Token {
    /// Total value across all proofs.
    pub fn total_amount(&self) -> Amount {
        self.entries.iter().map(|e| e.proof.amount).sum()
    }

    /// Parse either a `cashuA…` or `cashuB…` token string.
    pub fn parse(s: &str) -> Result<Self> {
        if let Some(rest) = s.strip_prefix(V3_PREFIX) {
            Self::parse_v3(rest)
        } else if let Some(rest) = s.strip_prefix(V4_PREFIX) {
            Self::parse_v4(rest)
        } else {
            Err(Error::UnsupportedToken)
        }
    }

    fn parse_v3(encoded: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD.decode(encoded.trim_end_matches('='))?;
        let body: V3TokenBody = serde_json::from_slice(&bytes)?;
        let unit = body.unit.unwrap_or_else(|| "sat".to_string());
        let mut entries = Vec::new();
        for mint_entry in body.token {
            for p in mint_entry.proofs {
                entries.push(TokenProof {
                    mint_url: mint_entry.mint.clone(),
                    proof: Proof {
                        keyset_id: p.id,
                        amount: p.amount,
                        secret: p.secret,
                        c: p.c,
                    },
                });
            }
        }
        Ok(Self {
            entries,
            unit,
            memo: body.memo,
        })
    }

    fn parse_v4(encoded: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD.decode(encoded.trim_end_matches('='))?;
        let body: V4TokenBody =
            ciborium::de::from_reader(bytes.as_slice()).map_err(|e| Error::CborDecode(e.to_string()))?;
        let mut entries = Vec::new();
        for t in body.t {
            for p in t.p {
                entries.push(TokenProof {
                    mint_url: body.m.clone(),
                    proof: Proof {
                        keyset_id: t.i,
                        amount: p.a,
                        secret: p.s,
                        c: p.c,
                    },
                });
            }
        }
        Ok(Self {
            entries,
            unit: body.u,
            memo: body.d,
        })
    }

    /// Serialize as the current (v4, CBOR) wire format.
    pub fn to_v4_string(&self) -> Result<String> {
        let mint_url = self
            .entries
            .first()
            .map(|e| e.mint_url.clone())
            .unwrap_or_default();

        let mut by_keyset: BTreeMap<KeysetId, Vec<V4ProofEntry>> = BTreeMap::new();
        for e in &self.entries {
            by_keyset.entry(e.proof.keyset_id).or_default().push(V4ProofEntry {
                a: e.proof.amount,
                s: e.proof.secret.clone(),
                c: e.proof.c,
            });
        }
        let t = by_keyset
            .into_iter()
            .map(|(i, p)| V4TokenEntry { i, p })
            .collect();

        let body = V4TokenBody {
            m: mint_url,
            u: self.unit.clone(),
            d: self.memo.clone(),
            t,
        };
        let mut buf = Vec::new();
        ciborium::ser::into_writer(&body, &mut buf).map_err(|e| Error::CborEncode(e.to_string()))?;
        Ok(format!("{V4_PREFIX}{}", URL_SAFE_NO_PAD.encode(buf)))
    }

    /// Serialize as the legacy (v3, JSON) wire format.
    pub fn to_v3_string(&self) -> Result<String> {
        let mut by_mint: BTreeMap<String, Vec<V3ProofEntry>> = BTreeMap::new();
        for e in &self.entries {
            by_mint.entry(e.mint_url.clone()).or_default().push(V3ProofEntry {
                id: e.proof.keyset_id,
                amount: e.proof.amount,
                secret: e.proof.secret.clone(),
                c: e.proof.c,
            });
        }
        let token = by_mint
            .into_iter()
            .map(|(mint, proofs)| V3MintEntry { mint, proofs })
            .collect();
        let body = V3TokenBody {
            token,
            unit: Some(self.unit.clone()),
            memo: self.memo.clone(),
        };
        let json = serde_json::to_vec(&body)?;
        Ok(format!("{V3_PREFIX}{}", URL_SAFE_NO_PAD.encode(json)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::SecretKey;

    fn sample_token() -> Token {
        let keyset_id: KeysetId = "00aabbccddeeff00".parse().expect("valid id");
        let proof = Proof {
            keyset_id,
            amount: Amount::from(4),
            secret: Secret::generate(),
            c: SecretKey::generate().public_key(),
        };
        Token {
            entries: vec![TokenProof {
                mint_url: "https://mint.example".to_string(),
                proof,
            }],
            unit: "sat".to_string(),
            memo: Some("thanks".to_string()),
        }
    }

    #[test]
    fn v4_round_trips() {
        let token = sample_token();
        let encoded = token.to_v4_string().expect("encode");
        assert!(encoded.starts_with("cashuB"));
        let decoded = Token::parse(&encoded).expect("decode");
        assert_eq!(decoded.total_amount(), token.total_amount());
        assert_eq!(decoded.entries[0].proof, token.entries[0].proof);
    }

    #[test]
    fn v3_round_trips() {
        let token = sample_token();
        let encoded = token.to_v3_string().expect("encode");
        assert!(encoded.starts_with("cashuA"));
        let decoded = Token::parse(&encoded).expect("decode");
        assert_eq!(decoded.total_amount(), token.total_amount());
        assert_eq!(decoded.entries[0].proof, token.entries[0].proof);
    }

    #[test]
    fn rejects_unknown_prefix() {
        assert!(Token::parse("cashuZdeadbeef").is_err());
    }
}
