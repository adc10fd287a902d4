use thiserror::Error;

/// Errors surfaced by the wallet engine and its components.
#[derive(Debug, Error)]
pub enum Error {
    /// A protocol-primitive operation failed (hash-to-curve, blind/unblind,
    /// keyset id parsing).
    #[error("cashu protocol error: {0}")]
    Cashu(#[from] cashu_core::Error),
    /// The encrypted event codec failed to encrypt or decrypt.
    #[error("codec error: {0}")]
    Codec(#[from] crate::codec::Error),
    /// The relay pool could not reach a usable quorum.
    #[error("relay error: {0}")]
    Relay(#[from] crate::relay::Error),
    /// The mint's HTTP API returned an error response.
    #[error("mint error: {0}")]
    Mint(#[from] crate::mint_client::Error),
    /// JSON (de)serialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// Building or signing a Nostr event failed.
    #[error("event builder error: {0}")]
    EventBuilder(#[from] nostr_sdk::event::builder::Error),
    /// A relay-filter tag value could not be parsed back into its typed
    /// form (e.g. a malformed `a` link tag).
    #[error("malformed event tag: {0}")]
    MalformedTag(String),
    /// The wallet does not have enough spendable value to cover the request.
    #[error("insufficient balance: need {needed}, have {available}")]
    InsufficientBalance {
        /// Amount required.
        needed: u64,
        /// Amount actually available.
        available: u64,
    },
    /// The caller referenced a mint the wallet has no keyset cache for.
    #[error("unknown mint: {0}")]
    UnknownMint(String),
    /// A token could not be parsed in either v3 or v4 form.
    #[error("invalid token: {0}")]
    InvalidToken(String),
    /// A cross-mint swap redeemed the source leg but failed on the
    /// destination leg; funds are not lost (they are fresh change on the
    /// source mint) but the operation did not complete.
    #[error("cross-mint swap partially completed: {0}")]
    CrossMintPartial(String),
    /// A long-running operation (quote polling, multi-relay fetch) was
    /// cancelled or timed out.
    #[error("operation timed out")]
    Timeout,
    /// A melt's Lightning payment did not succeed. Carries the melt-quote
    /// state the mint last reported so the caller can tell a definitive
    /// failure from one still worth retrying.
    #[error("melt quote {quote} did not settle: {state:?}")]
    MeltNotPaid {
        /// The melt quote id.
        quote: String,
        /// State the mint reported.
        state: cashu_core::nuts::MeltQuoteState,
    },
}

/// Convenience alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
