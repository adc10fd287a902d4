//! NUT-07: check proof state without revealing the secret.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::keys::PublicKey;

/// Outcome of checking whether a proof's secret has been spent.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum State {
    /// The mint has recorded the proof as spent.
    Spent,
    /// The mint has not seen the proof spent.
    Unspent,
    /// The proof is currently part of an in-flight melt.
    Pending,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Spent => "SPENT",
            Self::Unspent => "UNSPENT",
            Self::Pending => "PENDING",
        };
        write!(f, "{s}")
    }
}

/// Error parsing a [`State`] from its wire string.
#[derive(Debug, thiserror::Error)]
#[error("unknown proof state: {0}")]
pub struct UnknownState(String);

impl FromStr for State {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SPENT" => Ok(Self::Spent),
            "UNSPENT" => Ok(Self::Unspent),
            "PENDING" => Ok(Self::Pending),
            other => Err(UnknownState(other.to_string())),
        }
    }
}

/// `POST /v1/checkstate` request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckStateRequest {
    /// Y-values (`hash_to_curve(secret)`, compressed) of the proofs to
    /// check.
    #[serde(rename = "Ys")]
    pub ys: Vec<PublicKey>,
}

/// A single proof's reported state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofState {
    /// The y-value identifying the proof.
    #[serde(rename = "Y")]
    pub y: PublicKey,
    /// Reported state.
    pub state: State,
}

/// `POST /v1/checkstate` response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckStateResponse {
    /// One entry per requested y-value, same order as the request.
    pub states: Vec<ProofState>,
}
