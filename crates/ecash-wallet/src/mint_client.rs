//! Typed HTTP client for the mint's wire protocol.
//!
//! One method per endpoint; parses into the expected type first and falls
//! back to a mint error-response shape on mismatch.

use cashu_core::nuts::{
    CheckStateRequest, CheckStateResponse, KeySet, KeysetResponse, MeltQuoteRequest,
    MeltQuoteResponse, MeltRequest, MeltResponse, MintQuoteRequest, MintQuoteResponse, MintRequest,
    MintResponse, SwapRequest, SwapResponse,
};
use std::time::Duration;

use cashu_core::nuts::KeysetId;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use url::Url;

/// Attempts a retryable request gets before the error is surfaced.
const MAX_ATTEMPTS: u32 = 4;
/// Backoff after the first failure; doubled on each subsequent attempt.
const BASE_BACKOFF: Duration = Duration::from_millis(200);

/// Errors talking to a mint.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport-level failure (DNS, connect, TLS, timeout).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    /// The mint returned a structured error response.
    #[error("mint error {status}: {detail}")]
    MintError {
        /// HTTP status code.
        status: u16,
        /// The mint's `code`/`detail` fields, or the raw body if unstructured.
        detail: String,
    },
    /// The response did not parse as the expected shape or as an error
    /// response.
    #[error("unparseable mint response: {0}")]
    Unparseable(String),
    /// A keyset response contained a malformed pubkey or id.
    #[error("invalid keyset data: {0}")]
    InvalidKeysetData(String),
    /// URL construction failed.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    /// Network failures and 5xx responses are worth retrying; 4xx responses
    /// mean the request itself was wrong and retrying changes nothing.
    fn is_retryable(&self) -> bool {
        match self {
            Error::Network(_) => true,
            Error::MintError { status, .. } => *status >= 500,
            Error::Unparseable(_) | Error::InvalidKeysetData(_) | Error::Url(_) => false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MintErrorResponse {
    code: Option<i64>,
    error: Option<String>,
    detail: Option<String>,
}

impl MintErrorResponse {
    fn describe(&self) -> String {
        let msg = self
            .detail
            .clone()
            .or_else(|| self.error.clone())
            .unwrap_or_else(|| "unknown mint error".to_string());
        match self.code {
            Some(code) => format!("[{code}] {msg}"),
            None => msg,
        }
    }
}

/// Stateless HTTP client for one mint's API surface.
#[derive(Debug, Clone)]
pub struct MintClient {
    inner: reqwest::Client,
}

impl Default for MintClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MintClient {
    /// Build a client with the default TLS configuration.
    pub fn new() -> Self {
        Self {
            inner: reqwest::Client::new(),
        }
    }

    fn join(base: &Url, segments: &[&str]) -> Result<Url, Error> {
        let mut url = base.clone();
        {
            let mut path_segments = url
                .path_segments_mut()
                .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?;
            path_segments.pop_if_empty();
            for segment in segments {
                path_segments.push(segment);
            }
        }
        Ok(url)
    }

    /// Run a request-building closure with retry-with-exponential-backoff on
    /// network errors and 5xx responses. 4xx responses and unparseable
    /// bodies surface immediately.
    async fn with_retry<T, F, Fut>(&self, mut op: F) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, Error>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(err) if attempt + 1 < MAX_ATTEMPTS && err.is_retryable() => {
                    let backoff = BASE_BACKOFF * 2u32.pow(attempt);
                    tracing::warn!(attempt, ?backoff, error = %err, "retrying mint request");
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        self.with_retry(|| async {
            let res = self.inner.get(url.clone()).send().await?;
            Self::parse_or_error(res).await
        })
        .await
    }

    async fn post<B: serde::Serialize, T: DeserializeOwned>(&self, url: Url, body: &B) -> Result<T, Error> {
        self.with_retry(|| async {
            let res = self.inner.post(url.clone()).json(body).send().await?;
            Self::parse_or_error(res).await
        })
        .await
    }

    async fn parse_or_error<T: DeserializeOwned>(res: reqwest::Response) -> Result<T, Error> {
        let status = res.status();
        let value: Value = res.json().await?;
        if status.is_success() {
            return serde_json::from_value::<T>(value)
                .map_err(|parse_err| Error::Unparseable(parse_err.to_string()));
        }
        let detail = serde_json::from_value::<MintErrorResponse>(value)
            .map(|err| err.describe())
            .unwrap_or_else(|_| format!("http {status}"));
        Err(Error::MintError {
            status: status.as_u16(),
            detail,
        })
    }

    /// `GET /v1/keys` or `/v1/keys/{id}`.
    pub async fn get_mint_keys(&self, mint_url: &Url, id: Option<KeysetId>) -> Result<Vec<KeySet>, Error> {
        let url = match id {
            Some(id) => Self::join(mint_url, &["v1", "keys", &id.to_string()])?,
            None => Self::join(mint_url, &["v1", "keys"])?,
        };
        #[derive(Deserialize)]
        struct Resp {
            keysets: Vec<KeySet>,
        }
        let resp: Resp = self.get(url).await?;
        Ok(resp.keysets)
    }

    /// `GET /v1/keysets`.
    pub async fn get_mint_keysets(&self, mint_url: &Url) -> Result<KeysetResponse, Error> {
        let url = Self::join(mint_url, &["v1", "keysets"])?;
        let resp: KeysetResponse = self.get(url).await?;
        for info in &resp.keysets {
            if info.input_fee_ppk > i64::MAX as u64 {
                return Err(Error::InvalidKeysetData(format!(
                    "keyset {} has an implausible fee rate",
                    info.id
                )));
            }
        }
        Ok(resp)
    }

    /// `POST /v1/mint/quote/bolt11`.
    pub async fn post_mint_quote(&self, mint_url: &Url, req: MintQuoteRequest) -> Result<MintQuoteResponse, Error> {
        let url = Self::join(mint_url, &["v1", "mint", "quote", "bolt11"])?;
        self.post(url, &req).await
    }

    /// `GET /v1/mint/quote/bolt11/{id}`.
    pub async fn get_mint_quote_status(&self, mint_url: &Url, quote_id: &str) -> Result<MintQuoteResponse, Error> {
        let url = Self::join(mint_url, &["v1", "mint", "quote", "bolt11", quote_id])?;
        self.get(url).await
    }

    /// `POST /v1/mint/bolt11`.
    pub async fn post_mint(&self, mint_url: &Url, req: MintRequest) -> Result<MintResponse, Error> {
        let url = Self::join(mint_url, &["v1", "mint", "bolt11"])?;
        self.post(url, &req).await
    }

    /// `POST /v1/melt/quote/bolt11`.
    pub async fn post_melt_quote(&self, mint_url: &Url, req: MeltQuoteRequest) -> Result<MeltQuoteResponse, Error> {
        let url = Self::join(mint_url, &["v1", "melt", "quote", "bolt11"])?;
        self.post(url, &req).await
    }

    /// `GET /v1/melt/quote/bolt11/{id}`.
    pub async fn get_melt_quote_status(&self, mint_url: &Url, quote_id: &str) -> Result<MeltQuoteResponse, Error> {
        let url = Self::join(mint_url, &["v1", "melt", "quote", "bolt11", quote_id])?;
        self.get(url).await
    }

    /// `POST /v1/melt/bolt11`.
    pub async fn post_melt(&self, mint_url: &Url, req: MeltRequest) -> Result<MeltResponse, Error> {
        let url = Self::join(mint_url, &["v1", "melt", "bolt11"])?;
        self.post(url, &req).await
    }

    /// `POST /v1/swap`.
    pub async fn post_swap(&self, mint_url: &Url, req: SwapRequest) -> Result<SwapResponse, Error> {
        let url = Self::join(mint_url, &["v1", "swap"])?;
        self.post(url, &req).await
    }

    /// `POST /v1/checkstate`.
    pub async fn post_check_state(&self, mint_url: &Url, req: CheckStateRequest) -> Result<CheckStateResponse, Error> {
        let url = Self::join(mint_url, &["v1", "checkstate"])?;
        self.post(url, &req).await
    }
}
