use url::Url;

/// Wallet-wide configuration. The embedding application is responsible for
/// loading this from a file or environment; this crate never reads either
/// itself.
#[derive(Debug, Clone)]
pub struct WalletConfig {
    /// Mint base URLs, ordered; the first is the default target for
    /// cross-mint swaps and the primary receive destination.
    pub mint_urls: Vec<Url>,
    /// Relay URLs used for both publish and fetch; auto-augmented at
    /// runtime by kind-10019 relay-recommendation discovery.
    pub relays: Vec<Url>,
    /// Currency unit this wallet operates in.
    pub unit: String,
    /// How long a spent-proof cache entry for an `UNSPENT` proof is trusted
    /// before the engine re-checks it with the mint.
    pub cache_ttl_seconds: u64,
    /// Size threshold above which a token bundle is split across multiple
    /// kind-7375 events.
    pub max_event_bytes: usize,
    /// Minimum interval between bursts of relay operations.
    pub rate_limit_seconds: u64,
    /// Whether to reconstruct wallet state immediately on construction.
    pub auto_init: bool,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            mint_urls: Vec::new(),
            relays: Vec::new(),
            unit: "sat".to_string(),
            cache_ttl_seconds: 300,
            max_event_bytes: 60_000,
            rate_limit_seconds: 1,
            auto_init: true,
        }
    }
}

impl WalletConfig {
    /// The TTL for an `UNKNOWN`/not-yet-confirmed cache entry, which expires
    /// faster than a confirmed `UNSPENT` entry because the mint may not yet
    /// have recorded a pending use.
    pub fn unknown_cache_ttl_seconds(&self) -> u64 {
        self.cache_ttl_seconds.min(300)
    }

    /// The wallet's primary mint, used as the default receive/swap target.
    pub fn primary_mint(&self) -> Option<&Url> {
        self.mint_urls.first()
    }
}
