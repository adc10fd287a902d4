//! NUT (Notation, Usage, and Terminology) protocol types.
//!
//! Each submodule covers one numbered NUT from the Cashu protocol, mirroring
//! how the upstream reference implementation organizes the same material.

pub mod nut00;
pub mod nut02;
pub mod nut03;
pub mod nut04;
pub mod nut05;
pub mod nut07;
pub mod nut08;

pub use nut00::{BlindSignature, BlindedMessage, Proof, Proofs};
pub use nut02::{Id as KeysetId, KeySet, KeySetInfo, KeysetResponse};
pub use nut03::{SwapRequest, SwapResponse};
pub use nut04::{MintQuoteRequest, MintQuoteResponse, MintQuoteState, MintRequest, MintResponse};
pub use nut05::{MeltQuoteRequest, MeltQuoteResponse, MeltQuoteState};
pub use nut07::{CheckStateRequest, CheckStateResponse, ProofState, State};
pub use nut08::{MeltRequest, MeltResponse};
