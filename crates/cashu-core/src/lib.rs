//! Cashu protocol types and blind-signature primitives, shared between the
//! wallet engine and anything else that needs to speak the mint's wire
//! protocol.

pub mod amount;
pub mod dhke;
pub mod error;
pub mod keys;
pub mod nuts;
pub mod secret;
pub mod token;

pub use amount::Amount;
pub use error::{Error, Result};
pub use keys::{PublicKey, SecretKey};
pub use secret::Secret;
pub use token::Token;
