//! NUT-08: overpaid Lightning fee return via blank outputs appended to a
//! melt request.

use serde::{Deserialize, Serialize};

use super::nut00::{total_amount, BlindSignature, BlindedMessage, Proofs};
use crate::amount::Amount;

/// `POST /v1/melt/bolt11` request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeltRequest {
    /// The paid-for melt quote this request settles.
    pub quote: String,
    /// Proofs to consume.
    pub inputs: Proofs,
    /// Optional blank outputs the mint may fill with overpaid-fee change.
    /// Present only when the quote's `fee_reserve` is nonzero.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<BlindedMessage>>,
}

impl MeltRequest {
    /// Sum of the consumed proofs.
    pub fn proofs_amount(&self) -> Amount {
        total_amount(&self.inputs)
    }
}

/// `POST /v1/melt/bolt11` response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeltResponse {
    /// Whether the Lightning payment succeeded.
    pub paid: bool,
    /// Lightning payment preimage, on success.
    pub payment_preimage: Option<String>,
    /// Blind signatures over the blank outputs, if any were supplied.
    pub change: Option<Vec<BlindSignature>>,
}

impl MeltResponse {
    /// Total value returned via blank-output change.
    pub fn change_amount(&self) -> Amount {
        match &self.change {
            Some(change) => change.iter().map(|c| c.amount).sum(),
            None => Amount::ZERO,
        }
    }
}
