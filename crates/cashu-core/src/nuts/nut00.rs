//! NUT-00: notation. Proofs and the blinded-message/blind-signature pair
//! that produces them.

use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::keys::PublicKey;
use crate::nuts::nut02::Id as KeysetId;
use crate::secret::Secret;

/// An unblinded mint signature over a secret: the unit of value this wallet
/// holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    /// Keyset the signature was issued under.
    #[serde(rename = "id")]
    pub keyset_id: KeysetId,
    /// Denomination. Must equal a key the keyset actually has.
    pub amount: Amount,
    /// The secret nonce, hex-encoded on the wire.
    pub secret: Secret,
    /// The mint's unblinded signature, hex-encoded compressed point.
    #[serde(rename = "C")]
    pub c: PublicKey,
}

impl Proof {
    /// The `(secret, C)` pair that uniquely fingerprints this proof across
    /// duplicate/superseded token events.
    pub fn fingerprint(&self) -> (Secret, PublicKey) {
        (self.secret.clone(), self.c)
    }
}

/// A collection of proofs, as carried inside token bundles and RPC bodies.
pub type Proofs = Vec<Proof>;

/// Sum the denominations of a proof collection.
pub fn total_amount(proofs: &[Proof]) -> Amount {
    proofs.iter().map(|p| p.amount).sum()
}

/// A blinded commitment sent to the mint to be signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindedMessage {
    /// Requested denomination. Zero for NUT-08 blank (fee-return) outputs.
    pub amount: Amount,
    /// Keyset the signature should be issued under.
    pub id: KeysetId,
    /// The blinded point, hex-encoded compressed.
    #[serde(rename = "B_")]
    pub b: PublicKey,
}

/// The mint's signature over a `BlindedMessage`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindSignature {
    /// Denomination the mint assigned (may differ from a blank output's
    /// nominal zero).
    pub amount: Amount,
    /// Keyset used to sign.
    pub id: KeysetId,
    /// The blinded signature point, hex-encoded compressed.
    #[serde(rename = "C_")]
    pub c: PublicKey,
}
