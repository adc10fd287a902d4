//! NUT-04: minting (receiving value by paying an invoice).

use serde::{Deserialize, Serialize};

use super::nut00::{BlindSignature, BlindedMessage};
use crate::amount::Amount;

/// Mint quote lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MintQuoteState {
    /// Invoice issued, not yet paid.
    Unpaid,
    /// Invoice paid; proofs not yet minted.
    Paid,
    /// Proofs have been minted for this quote.
    Issued,
}

/// `POST /v1/mint/quote/bolt11` request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintQuoteRequest {
    /// Requested amount.
    pub amount: Amount,
    /// Unit the amount is denominated in.
    pub unit: String,
}

/// `POST /v1/mint/quote/bolt11` and `GET
/// /v1/mint/quote/bolt11/{id}` response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintQuoteResponse {
    /// Quote identifier.
    pub quote: String,
    /// Payable bolt11 invoice.
    pub request: String,
    /// Current state.
    pub state: MintQuoteState,
    /// Unix timestamp the quote expires at.
    pub expiry: u64,
}

/// `POST /v1/mint/bolt11` request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintRequest {
    /// The paid quote being redeemed for proofs.
    pub quote: String,
    /// Blinded messages to sign, ascending by amount.
    pub outputs: Vec<BlindedMessage>,
}

/// `POST /v1/mint/bolt11` response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintResponse {
    /// Blind signatures over `MintRequest::outputs`, same order.
    pub signatures: Vec<BlindSignature>,
}
