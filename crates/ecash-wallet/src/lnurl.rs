//! LNURL / Lightning-address resolution.
//!
//! Kept thin: resolves an address to a payable invoice and nothing more.

use cashu_core::Amount;
use serde::Deserialize;
use thiserror::Error;

/// Errors resolving a Lightning address to a payable invoice.
#[derive(Debug, Error)]
pub enum Error {
    /// The address was not `user@host` shaped.
    #[error("malformed lightning address: {0}")]
    MalformedAddress(String),
    /// The HTTP request to the well-known endpoint failed.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    /// The requested amount fell outside the payee's advertised bounds.
    #[error("amount {requested} msat outside bounds [{min}, {max}]")]
    AmountOutOfBounds {
        /// Requested millisatoshi amount.
        requested: u64,
        /// Payee's minimum sendable millisatoshi amount.
        min: u64,
        /// Payee's maximum sendable millisatoshi amount.
        max: u64,
    },
    /// The callback did not return a usable invoice.
    #[error("no invoice returned")]
    NoInvoice,
}

#[derive(Debug, Deserialize)]
struct PayRequestMetadata {
    callback: String,
    #[serde(rename = "minSendable")]
    min_sendable: u64,
    #[serde(rename = "maxSendable")]
    max_sendable: u64,
}

#[derive(Debug, Deserialize)]
struct CallbackResponse {
    pr: String,
}

fn parse_address(address: &str) -> Result<(&str, &str), Error> {
    address
        .split_once('@')
        .filter(|(user, host)| !user.is_empty() && !host.is_empty())
        .ok_or_else(|| Error::MalformedAddress(address.to_string()))
}

/// Resolve `user@host` to a bolt11 invoice for `amount` (in the wallet's
/// unit, assumed satoshis here; callers in other units must convert before
/// calling).
pub async fn resolve_invoice(address: &str, amount: Amount, client: &reqwest::Client) -> Result<String, Error> {
    let (user, host) = parse_address(address)?;

    let well_known = format!("https://{host}/.well-known/lnurlp/{user}");
    let metadata: PayRequestMetadata = client.get(&well_known).send().await?.json().await?;

    let msat = amount.as_u64() * 1000;
    if msat < metadata.min_sendable || msat > metadata.max_sendable {
        return Err(Error::AmountOutOfBounds {
            requested: msat,
            min: metadata.min_sendable,
            max: metadata.max_sendable,
        });
    }

    let separator = if metadata.callback.contains('?') { '&' } else { '?' };
    let callback_url = format!("{}{separator}amount={msat}", metadata.callback);
    let response: CallbackResponse = client.get(&callback_url).send().await?.json().await?;

    if response.pr.is_empty() {
        return Err(Error::NoInvoice);
    }
    Ok(response.pr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_address_without_at_sign() {
        assert!(parse_address("not-an-address").is_err());
    }

    #[test]
    fn accepts_well_formed_address() {
        assert_eq!(parse_address("user@host.example").expect("valid"), ("user", "host.example"));
    }
}
