//! NUT-03: swap (exchange input proofs for fresh outputs).

use serde::{Deserialize, Serialize};

use super::nut00::{BlindSignature, BlindedMessage, Proofs};

/// `POST /v1/swap` request body. `outputs` must be ascending by amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRequest {
    /// Proofs to consume.
    pub inputs: Proofs,
    /// Blinded messages to be signed, ascending by amount.
    pub outputs: Vec<BlindedMessage>,
}

/// `POST /v1/swap` response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapResponse {
    /// Blind signatures over `SwapRequest::outputs`, same order.
    pub signatures: Vec<BlindSignature>,
}
