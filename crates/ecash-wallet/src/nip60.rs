//! NIP-60-shaped event kinds: wallet metadata, token bundles, spending
//! history, and mint-quote trackers, each self-encrypted with the codec in
//! [`crate::codec`].

use cashu_core::nuts::Proof;
use nostr_sdk::{Event, EventBuilder, Keys, Kind, Tag, TagKind, Timestamp};
use serde::{Deserialize, Serialize};

use crate::codec::{self, ConversationKey};

/// Wallet metadata event kind (replaceable).
pub const WALLET_INFO_KIND: Kind = Kind::Custom(17375);
/// Token bundle event kind.
pub const TOKEN_KIND: Kind = Kind::Custom(7375);
/// Spending history event kind (append-only).
pub const HISTORY_KIND: Kind = Kind::Custom(7376);
/// Mint-quote tracker event kind.
pub const QUOTE_TRACKER_KIND: Kind = Kind::Custom(7374);
/// Relay recommendation event kind (replaceable, plaintext).
pub const RELAY_REC_KIND: Kind = Kind::Custom(10019);

const ID_TAG: char = 'd';
const LINK_TAG: char = 'a';
const MINT_TAG: &str = "mint";
const RELAY_TAG: &str = "relay";

fn content_key(keys: &Keys) -> Result<ConversationKey, crate::error::Error> {
    let sk = cashu_core::SecretKey::from_hex(&keys.secret_key().to_secret_hex())?;
    Ok(codec::derive_self_conversation_key(&sk))
}

fn encrypt_json<T: Serialize>(keys: &Keys, value: &T) -> crate::error::Result<String> {
    let plaintext = serde_json::to_vec(value)?;
    let key = content_key(keys)?;
    Ok(codec::encrypt(&key, &plaintext)?)
}

fn decrypt_json<T: for<'de> Deserialize<'de>>(keys: &Keys, content: &str) -> crate::error::Result<T> {
    let key = content_key(keys)?;
    let plaintext = codec::decrypt(&key, content)?;
    Ok(serde_json::from_slice(&plaintext)?)
}

/// Content of a kind-17375 wallet metadata event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletMetadata {
    /// Trusted mint base URLs.
    pub mints: Vec<String>,
    /// Currency unit.
    pub unit: String,
    /// Private key used to unwrap nutzaps. Unused by this wallet; carried
    /// only for cross-client compatibility.
    pub privkey: Option<String>,
}

impl WalletMetadata {
    /// Build the signed, encrypted kind-17375 event. Each trusted mint also
    /// gets a plaintext `mint` tag, so clients can filter for this wallet's
    /// events by mint without decrypting the content first.
    pub fn to_event(&self, keys: &Keys, wallet_id: &str, created_at: Timestamp) -> crate::error::Result<Event> {
        let content = encrypt_json(keys, self)?;
        let mut tags = vec![Tag::custom(TagKind::custom(ID_TAG.to_string()), [wallet_id])];
        tags.extend(self.mints.iter().map(|m| mint_tag(m)));
        Ok(EventBuilder::new(WALLET_INFO_KIND, content)
            .tags(tags)
            .custom_created_at(created_at)
            .sign_with_keys(keys)?)
    }

    /// Decrypt a fetched kind-17375 event.
    pub fn from_event(event: &Event, keys: &Keys) -> crate::error::Result<Self> {
        decrypt_json(keys, &event.content)
    }
}

/// Content of a kind-10019 relay-recommendation event. Unlike the other
/// kinds here, this one is plaintext: relay hints are meant to be readable
/// by any client trying to find this pubkey's wallet events at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayRecommendations {
    /// Recommended relay URLs.
    pub relays: Vec<String>,
}

impl RelayRecommendations {
    /// Build the signed, unencrypted kind-10019 event.
    pub fn to_event(&self, keys: &Keys) -> crate::error::Result<Event> {
        let tags: Vec<Tag> = self.relays.iter().map(|r| relay_tag(r)).collect();
        Ok(EventBuilder::new(RELAY_REC_KIND, "").tags(tags).sign_with_keys(keys)?)
    }

    /// Recover the relay list from a fetched kind-10019 event's tags.
    pub fn from_event(event: &Event) -> Self {
        let relays = event
            .tags
            .iter()
            .filter(|t| t.kind() == TagKind::custom(RELAY_TAG))
            .filter_map(|t| t.content().map(|s| s.to_string()))
            .collect();
        Self { relays }
    }
}

/// One proof carried inside a token bundle.
pub type BundledProof = Proof;

/// Content of a kind-7375 token bundle event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBundle {
    /// Owning mint.
    pub mint: String,
    /// Currency unit.
    pub unit: String,
    /// Proofs this bundle carries.
    pub proofs: Vec<BundledProof>,
    /// Ids of token events this bundle supersedes.
    pub del: Vec<String>,
}

impl TokenBundle {
    /// Build the signed, encrypted kind-7375 event, linked back to the
    /// owning wallet-info event via an `a` tag.
    pub fn to_event(&self, keys: &Keys, wallet_id: &str, quote_id: Option<&str>) -> crate::error::Result<Event> {
        let content = encrypt_json(keys, self)?;
        let mut tags = vec![wallet_link_tag(keys, wallet_id)];
        if let Some(quote_id) = quote_id {
            tags.push(Tag::custom(TagKind::custom("quote"), [quote_id]));
        }
        Ok(EventBuilder::new(TOKEN_KIND, content).tags(tags).sign_with_keys(keys)?)
    }

    /// Decrypt a fetched kind-7375 event.
    pub fn from_event(event: &Event, keys: &Keys) -> crate::error::Result<Self> {
        decrypt_json(keys, &event.content)
    }
}

/// Direction of a spending-history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Value entered the wallet.
    In,
    /// Value left the wallet.
    Out,
}

/// Content of a kind-7376 spending-history event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpendingHistory {
    /// Whether value entered or left the wallet.
    pub direction: Direction,
    /// Value moved, in the wallet's unit.
    pub amount: u64,
    /// Fee charged by the mint for this operation.
    pub fee: u64,
    /// Ids of the token events this operation touched.
    pub token_event_refs: Vec<String>,
}

impl SpendingHistory {
    /// Build the signed, encrypted kind-7376 event.
    pub fn to_event(&self, keys: &Keys, wallet_id: &str) -> crate::error::Result<Event> {
        let content = encrypt_json(keys, self)?;
        let tags = vec![wallet_link_tag(keys, wallet_id)];
        Ok(EventBuilder::new(HISTORY_KIND, content).tags(tags).sign_with_keys(keys)?)
    }

    /// Decrypt a fetched kind-7376 event.
    pub fn from_event(event: &Event, keys: &Keys) -> crate::error::Result<Self> {
        decrypt_json(keys, &event.content)
    }
}

/// Content of a kind-7374 mint-quote tracker event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteTracker {
    /// Quote identifier at the mint.
    pub quote_id: String,
    /// Mint the quote was created against.
    pub mint: String,
    /// Requested amount.
    pub amount: u64,
    /// Unix timestamp the quote expires at.
    pub expiry: u64,
}

impl QuoteTracker {
    /// Build the signed, encrypted kind-7374 event.
    pub fn to_event(&self, keys: &Keys, wallet_id: &str) -> crate::error::Result<Event> {
        let content = encrypt_json(keys, self)?;
        let tags = vec![wallet_link_tag(keys, wallet_id), Tag::custom(TagKind::custom("quote"), [self.quote_id.clone()])];
        Ok(EventBuilder::new(QUOTE_TRACKER_KIND, content).tags(tags).sign_with_keys(keys)?)
    }

    /// Decrypt a fetched kind-7374 event.
    pub fn from_event(event: &Event, keys: &Keys) -> crate::error::Result<Self> {
        decrypt_json(keys, &event.content)
    }
}

/// Build a deletion request (NIP-09, kind 5) for the given superseded event
/// ids. Correctness never depends on a relay actually honoring it (see
/// reconstruction rule using each token event's own `del` field); it is
/// purely an optimization to shrink the relay's working set.
pub fn deletion_event(keys: &Keys, event_ids: &[nostr_sdk::EventId]) -> crate::error::Result<Event> {
    let tags = event_ids.iter().map(|id| Tag::event(*id)).collect::<Vec<_>>();
    Ok(EventBuilder::new(Kind::EventDeletion, "").tags(tags).sign_with_keys(keys)?)
}

fn wallet_link_tag(keys: &Keys, wallet_id: &str) -> Tag {
    let value = format!("{}:{}:{}", WALLET_INFO_KIND.as_u16(), keys.public_key(), wallet_id);
    Tag::custom(TagKind::custom(LINK_TAG.to_string()), [value])
}

/// Tag value used to filter for events belonging to one wallet's mint.
pub fn mint_tag(mint_url: &str) -> Tag {
    Tag::custom(TagKind::custom(MINT_TAG), [mint_url])
}

/// Tag value carrying a relay recommendation.
pub fn relay_tag(relay_url: &str) -> Tag {
    Tag::custom(TagKind::custom(RELAY_TAG), [relay_url])
}
