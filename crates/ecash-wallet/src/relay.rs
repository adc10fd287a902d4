//! Relay transport: a thin, invariant-carrying wrapper around
//! `nostr_sdk::Client` exposing a publish/fetch/subscribe vocabulary.

use std::time::Duration;

use nostr_sdk::{Client, Event, Filter, Keys, SubscriptionId, Timestamp};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use url::Url;

/// Number of attempts a retryable relay operation gets before giving up.
const MAX_ATTEMPTS: u32 = 5;
/// Backoff after the first failure; doubled on each subsequent attempt.
const BASE_BACKOFF: Duration = Duration::from_millis(250);

/// Errors from relay transport.
#[derive(Debug, Error)]
pub enum Error {
    /// No relay in the pool accepted the event.
    #[error("no relay accepted the event")]
    NoQuorum,
    /// No configured relay could be reached at all.
    #[error("no relay reachable: {0}")]
    Unreachable(String),
    /// A relay replied with something that does not fit the expected shape.
    #[error("relay protocol violation: {0}")]
    ProtocolViolation(String),
    /// A relay explicitly rejected the event (NIP-20 `OK false`).
    #[error("rejected by relay: {0}")]
    RejectedByRelay(String),
    /// The operation did not complete before its deadline.
    #[error("relay operation timed out")]
    Timeout,
    /// The underlying client reported an error.
    #[error("nostr client error: {0}")]
    Client(#[from] nostr_sdk::client::Error),
}

impl Error {
    /// Whether retrying this operation, after a backoff, stands a chance of
    /// succeeding. Rejections and protocol violations are the relay telling
    /// us no; retrying would just ask the same question again.
    fn is_retryable(&self) -> bool {
        !matches!(self, Error::RejectedByRelay(_) | Error::ProtocolViolation(_))
    }
}

/// A relay pool with an explicit wallet-level ordering discipline layered
/// on top of the underlying client's own per-connection locks.
#[derive(Debug)]
pub struct RelayPool {
    client: Client,
    pubkey: nostr_sdk::PublicKey,
    burst_lock: Mutex<Instant>,
    rate_limit: Duration,
    default_fetch_timeout: Duration,
}

impl RelayPool {
    /// Build a pool signed by `keys`, connected to `relays`.
    pub async fn new(keys: &Keys, relays: Vec<Url>, rate_limit_seconds: u64) -> Result<Self, Error> {
        let client = Client::builder().signer(keys.clone()).build();
        for relay in relays {
            client.add_relay(relay).await?;
        }
        client.connect().await;
        Ok(Self {
            client,
            pubkey: keys.public_key(),
            burst_lock: Mutex::new(Instant::now() - Duration::from_secs(rate_limit_seconds)),
            rate_limit: Duration::from_secs(rate_limit_seconds),
            default_fetch_timeout: Duration::from_secs(10),
        })
    }

    async fn throttle(&self) {
        let mut last = self.burst_lock.lock().await;
        let elapsed = last.elapsed();
        if elapsed < self.rate_limit {
            tokio::time::sleep(self.rate_limit - elapsed).await;
        }
        *last = Instant::now();
    }

    /// Run `op` with exponential backoff between attempts, honoring the
    /// pool's own rate limit before each try. Stops early on an error
    /// [`Error::is_retryable`] says isn't worth retrying.
    async fn with_backoff<T, F, Fut>(&self, mut op: F) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, Error>>,
    {
        let mut attempt = 0;
        loop {
            self.throttle().await;
            match op().await {
                Ok(v) => return Ok(v),
                Err(err) if attempt + 1 < MAX_ATTEMPTS && err.is_retryable() => {
                    let backoff = BASE_BACKOFF * 2u32.pow(attempt);
                    tracing::warn!(attempt, ?backoff, error = %err, "retrying relay operation");
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Publish a single already-signed event, requiring at least one relay
    /// acknowledgement. Retries with backoff on transient failures.
    pub async fn publish(&self, event: Event) -> Result<(), Error> {
        self.with_backoff(|| async {
            let output = self.client.send_event(event.clone()).await?;
            if output.success.is_empty() {
                tracing::warn!(failed = output.failed.len(), "publish saw no relay acknowledgements");
                return Err(Error::NoQuorum);
            }
            Ok(())
        })
        .await
    }

    /// Publish several events as one burst.
    pub async fn publish_all(&self, events: Vec<Event>) -> Result<(), Error> {
        for event in events {
            self.publish(event).await?;
        }
        Ok(())
    }

    /// One-shot fetch: best-effort union of every relay's matching events
    /// within `timeout` (or the pool's default). Retries with backoff on
    /// transient failures.
    pub async fn fetch(&self, filter: Filter, timeout: Option<Duration>) -> Result<Vec<Event>, Error> {
        let timeout = timeout.unwrap_or(self.default_fetch_timeout);
        self.with_backoff(|| async {
            let events = self.client.fetch_events(filter.clone(), timeout).await?;
            Ok(events.into_iter().collect())
        })
        .await
    }

    /// Open a live subscription for `filter`, returning its id. Matching
    /// events stream through the client's own notification channel; callers
    /// that want push delivery rather than one-shot [`Self::fetch`] polls
    /// subscribe and then drain `Client::notifications()`.
    pub async fn subscribe(&self, filter: Filter) -> Result<SubscriptionId, Error> {
        self.with_backoff(|| async {
            let output = self.client.subscribe(vec![filter.clone()], None).await?;
            Ok(output.val)
        })
        .await
    }

    /// Cancel a subscription opened with [`Self::subscribe`].
    pub async fn unsubscribe(&self, id: SubscriptionId) {
        self.client.unsubscribe(&id).await;
    }

    /// Add and connect a relay discovered at runtime (kind-10019 relay
    /// recommendations), beyond the set the pool was built with.
    pub async fn add_relay(&self, relay: Url) -> Result<(), Error> {
        self.client.add_relay(relay.clone()).await?;
        self.client.connect_relay(relay).await?;
        Ok(())
    }

    /// The pool's signing identity.
    pub fn public_key(&self) -> nostr_sdk::PublicKey {
        self.pubkey
    }

    /// Newest-first filter helper for replaceable-kind lookups (wallet-info,
    /// relay recommendations).
    pub fn newest_since(filter: Filter, since: Timestamp) -> Filter {
        filter.since(since)
    }
}
