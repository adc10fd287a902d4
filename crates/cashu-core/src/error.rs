use thiserror::Error;

/// Errors produced by the protocol primitives in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// `hash_to_curve` tried every counter/prefix combination without landing
    /// on a valid curve point. Astronomically unlikely; callers should retry
    /// with a fresh secret.
    #[error("curve search exhausted")]
    CurveSearchExhausted,
    /// A value received from a mint did not decode to a valid compressed
    /// secp256k1 point.
    #[error("invalid compressed point")]
    InvalidCompressedPoint,
    /// Hex decoding failed.
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    /// Base64 decoding failed.
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    /// JSON (de)serialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// CBOR deserialization failed.
    #[error("cbor decode error: {0}")]
    CborDecode(String),
    /// CBOR serialization failed.
    #[error("cbor encode error: {0}")]
    CborEncode(String),
    /// secp256k1 operation failed.
    #[error("secp256k1 error: {0}")]
    Secp256k1(#[from] k256::elliptic_curve::Error),
    /// A token string did not carry a recognized `cashuA`/`cashuB` prefix.
    #[error("unsupported token version")]
    UnsupportedToken,
    /// A keyset id string was malformed.
    #[error("malformed keyset id: {0}")]
    MalformedKeysetId(String),
    /// The requested amount has no corresponding key in the keyset.
    #[error("no key for amount {0}")]
    AmountNotInKeyset(u64),
    /// URL parsing failed.
    #[error("invalid url: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// Convenience alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
