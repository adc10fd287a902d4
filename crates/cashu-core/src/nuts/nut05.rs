//! NUT-05: melting (spending value by paying an invoice through the mint).

use serde::{Deserialize, Serialize};

use crate::amount::Amount;

/// Melt quote lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MeltQuoteState {
    /// Quote issued, payment not yet attempted.
    Unpaid,
    /// Payment in flight.
    Pending,
    /// Payment succeeded.
    Paid,
    /// Payment failed.
    Failed,
}

/// `POST /v1/melt/quote/bolt11` request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeltQuoteRequest {
    /// Invoice to be paid.
    pub request: String,
    /// Unit the wallet's input amount is denominated in.
    pub unit: String,
}

/// `POST /v1/melt/quote/bolt11` and `GET
/// /v1/melt/quote/bolt11/{id}` response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeltQuoteResponse {
    /// Quote identifier.
    pub quote: String,
    /// Invoice amount.
    pub amount: Amount,
    /// Extra amount the wallet must provide to cover routing fees.
    pub fee_reserve: Amount,
    /// Current state.
    pub state: MeltQuoteState,
    /// Lightning payment preimage, once paid.
    pub payment_preimage: Option<String>,
    /// Unix timestamp the quote expires at.
    pub expiry: u64,
}
