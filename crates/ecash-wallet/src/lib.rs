//! Stateless Cashu ecash wallet whose proof set lives entirely on a
//! federated Nostr relay network.
//!
//! The engine ([`engine::WalletEngine`]) never persists anything locally
//! beyond an in-memory spent-proof cache and an at-most-once minted-quote
//! set; every operation reconstructs wallet state from relay events
//! ([`state::reconstruct`]) before acting on it.

pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod lnurl;
pub mod mint_client;
pub mod nip60;
pub mod relay;
pub mod state;

pub use config::WalletConfig;
pub use engine::WalletEngine;
pub use error::{Error, Result};
pub use state::WalletState;
