//! Proof lifecycle engine: the component that composes every other
//! primitive into receive/send/redeem/melt/swap-mints.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use cashu_core::dhke::{blind_message, unblind_message};
use cashu_core::nuts::{
    BlindSignature, BlindedMessage, CheckStateRequest, KeySet, KeysetId, MeltQuoteRequest,
    MeltQuoteResponse, MeltQuoteState, MeltRequest, MintQuoteRequest, MintQuoteState, MintRequest,
    Proof, State as ProofMintState, SwapRequest,
};
use cashu_core::{Amount, PublicKey, Secret, SecretKey};
use nostr_sdk::{Filter, Keys as NostrKeys, Timestamp};
use tokio::sync::Mutex;
use url::Url;

use crate::config::WalletConfig;
use crate::error::{Error, Result};
use crate::mint_client::MintClient;
use crate::nip60::{self, QuoteTracker, SpendingHistory, TokenBundle, TOKEN_KIND, WALLET_INFO_KIND};
use crate::relay::RelayPool;
use crate::state::{self, ProofRecord, SpentProofCache, WalletState};

/// Floor-division fee for a set of proofs, summed per keyset (NUT-05).
pub fn input_fee(proofs: &[ProofRecord], fee_rates: &HashMap<KeysetId, u64>) -> Amount {
    let mut counts: HashMap<KeysetId, u64> = HashMap::new();
    for p in proofs {
        *counts.entry(p.proof.keyset_id).or_insert(0) += 1;
    }
    let mut total_ppk = 0u64;
    for (keyset_id, count) in counts {
        let ppk = fee_rates.get(&keyset_id).copied().unwrap_or(0);
        total_ppk += count * ppk;
    }
    Amount::from(total_ppk / 1000)
}

/// Select the smallest set of proofs whose sum covers `target` plus their
/// own input fee, iterating to a fixed point because adding a proof raises
/// both the sum and the fee.
pub fn select_proofs(
    available: &[ProofRecord],
    target: Amount,
    fee_rates: &HashMap<KeysetId, u64>,
) -> Option<(Vec<ProofRecord>, Amount)> {
    let mut sorted: Vec<ProofRecord> = available.to_vec();
    sorted.sort_by_key(|p| std::cmp::Reverse(p.proof.amount));

    let mut need = target;
    loop {
        let mut selected: Vec<ProofRecord> = Vec::new();
        let mut selected_sum = Amount::ZERO;
        for p in &sorted {
            if selected_sum >= need {
                break;
            }
            selected.push(p.clone());
            selected_sum += p.proof.amount;
        }
        if selected_sum < need {
            return None;
        }
        let fee = input_fee(&selected, fee_rates);
        let required = target + fee;
        if selected_sum >= required {
            return Some((selected, fee));
        }
        if selected.len() == sorted.len() {
            return None;
        }
        need = required;
    }
}

/// What an ascending-ordered blinded output was minted for, so the engine
/// can re-partition the mint's response after the wire-required sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputRole {
    /// Leaves the wallet as part of a send token.
    Send,
    /// Stays in the wallet as change.
    Change,
    /// A NUT-08 blank output: nominally zero, the mint assigns its real
    /// amount when returning overpaid Lightning fees.
    Blank,
}

/// One planned blinded output together with the secret/blinding-factor pair
/// needed to unblind whatever signature comes back.
pub struct PlannedOutput {
    /// Role this output plays once signed.
    pub role: OutputRole,
    /// The secret underlying this output's eventual proof.
    pub secret: Secret,
    /// The blinding factor used; required to unblind the response.
    pub blinding_factor: SecretKey,
    /// The wire message sent to the mint.
    pub message: BlindedMessage,
}

fn plan_output(amount: Amount, keyset_id: KeysetId, role: OutputRole) -> Result<PlannedOutput> {
    let secret = Secret::generate();
    let (blinded, r) = blind_message(&secret.hex_ascii(), None)?;
    Ok(PlannedOutput {
        role,
        secret,
        blinding_factor: r,
        message: BlindedMessage {
            amount: if role == OutputRole::Blank { Amount::ZERO } else { amount },
            id: keyset_id,
            b: PublicKey::new(blinded),
        },
    })
}

/// Build and ascending-sort the outputs for a swap/mint/melt request,
/// preserving each output's role so the caller can re-partition the
/// response (NUT-03 ascending output ordering).
fn plan_outputs(amounts: Vec<(Amount, OutputRole)>, keyset_id: KeysetId) -> Result<Vec<PlannedOutput>> {
    let mut planned: Vec<PlannedOutput> = amounts
        .into_iter()
        .map(|(amount, role)| plan_output(amount, keyset_id, role))
        .collect::<Result<_>>()?;
    planned.sort_by_key(|o| o.message.amount);
    Ok(planned)
}

/// Number of NUT-08 blank outputs to request for a given fee reserve.
fn blank_output_count(fee_reserve: Amount) -> u32 {
    let reserve = fee_reserve.as_u64();
    if reserve == 0 {
        return 0;
    }
    (u64::BITS - (reserve.max(1) - 1).leading_zeros()).max(1)
}

fn unblind_outputs(planned: &[PlannedOutput], signatures: &[BlindSignature], mint_keys: &KeySet) -> Result<Vec<Proof>> {
    if planned.len() != signatures.len() {
        return Err(Error::InvalidToken("signature count mismatch".to_string()));
    }
    let mut proofs = Vec::with_capacity(planned.len());
    for (output, sig) in planned.iter().zip(signatures) {
        let mint_pubkey = mint_keys
            .keys
            .amount_key(sig.amount)
            .ok_or_else(|| Error::UnknownMint(format!("no key for amount {}", sig.amount)))?;
        let unblinded = unblind_message(sig.c.inner(), &output.blinding_factor, mint_pubkey.inner())?;
        proofs.push(Proof {
            keyset_id: sig.id,
            amount: sig.amount,
            secret: output.secret.clone(),
            c: PublicKey::new(unblinded),
        });
    }
    Ok(proofs)
}

/// The stateless proof-lifecycle engine. Holds no proof set of its own:
/// every operation fetches, reconstructs, and rolls over.
pub struct WalletEngine {
    keys: NostrKeys,
    wallet_id: String,
    config: WalletConfig,
    relay_pool: RelayPool,
    mint_client: MintClient,
    minted_quotes: Mutex<HashSet<String>>,
    spent_proof_cache: Mutex<SpentProofCache>,
    known_relays: Mutex<HashSet<Url>>,
    op_lock: Mutex<()>,
}

impl std::fmt::Debug for WalletEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletEngine")
            .field("wallet_id", &self.wallet_id)
            .finish_non_exhaustive()
    }
}

impl WalletEngine {
    /// Build the engine, then publish this wallet's own kind-17375 metadata
    /// and kind-10019 relay-recommendation events (both idempotent and
    /// replaceable) so the wallet's mints/unit and relay set are
    /// reconstructible from relays alone. Call [`Self::state`] separately
    /// (or rely on `config.auto_init`, which the embedding application acts
    /// on) to reconstruct the proof set itself.
    pub async fn new(keys: NostrKeys, wallet_id: String, config: WalletConfig) -> Result<Self> {
        let relay_pool = RelayPool::new(&keys, config.relays.clone(), config.rate_limit_seconds)
            .await?;
        let known_relays: HashSet<Url> = config.relays.iter().cloned().collect();
        let engine = Self {
            keys,
            wallet_id,
            config,
            relay_pool,
            mint_client: MintClient::new(),
            minted_quotes: Mutex::new(HashSet::new()),
            spent_proof_cache: Mutex::new(SpentProofCache::new()),
            known_relays: Mutex::new(known_relays),
            op_lock: Mutex::new(()),
        };
        engine.publish_wallet_metadata().await?;
        engine.sync_relay_recommendations().await?;
        Ok(engine)
    }

    fn wallet_filter(&self, kind: nostr_sdk::Kind) -> Filter {
        Filter::new().author(self.keys.public_key()).kind(kind)
    }

    /// Publish (or re-publish) this wallet's kind-17375 metadata event.
    async fn publish_wallet_metadata(&self) -> Result<()> {
        let metadata = nip60::WalletMetadata {
            mints: self.config.mint_urls.iter().map(|u| u.to_string()).collect(),
            unit: self.config.unit.clone(),
            privkey: None,
        };
        let event = metadata.to_event(&self.keys, &self.wallet_id, Timestamp::now())?;
        self.relay_pool.publish(event).await?;
        Ok(())
    }

    /// Adopt any relay a prior kind-10019 event of ours recommended that we
    /// don't already know about, then republish the (possibly grown)
    /// recommendation set.
    async fn sync_relay_recommendations(&self) -> Result<()> {
        let events = self.relay_pool.fetch(self.wallet_filter(nip60::RELAY_REC_KIND), None).await?;
        if let Some(event) = events.into_iter().max_by_key(|e| e.created_at) {
            let recommended = nip60::RelayRecommendations::from_event(&event);
            let mut known = self.known_relays.lock().await;
            for relay in recommended.relays {
                let Ok(url) = relay.parse::<Url>() else { continue };
                if known.insert(url.clone()) {
                    if let Err(err) = self.relay_pool.add_relay(url).await {
                        tracing::warn!(error = %err, "failed to connect recommended relay");
                    }
                }
            }
        }

        let relays: Vec<String> = self.known_relays.lock().await.iter().map(|u| u.to_string()).collect();
        let event = nip60::RelayRecommendations { relays }.to_event(&self.keys)?;
        self.relay_pool.publish(event).await?;
        Ok(())
    }

    /// Reconstruct current wallet state from the relay set.
    #[tracing::instrument(skip(self))]
    pub async fn state(&self) -> Result<WalletState> {
        let wallet_info = self
            .relay_pool
            .fetch(self.wallet_filter(WALLET_INFO_KIND), None)
            .await?;
        let tokens = self.relay_pool.fetch(self.wallet_filter(TOKEN_KIND), None).await?;
        let deletions = self
            .relay_pool
            .fetch(self.wallet_filter(nostr_sdk::Kind::EventDeletion), None)
            .await?;

        let mut reconstructed = state::reconstruct(&self.keys, &wallet_info, &tokens, &deletions)?;
        reconstructed.proofs = self.reconcile_with_mint(reconstructed.proofs).await?;
        Ok(reconstructed)
    }

    /// Validate live proofs against the mint's `checkstate`, dropping any
    /// the mint reports `SPENT` and scheduling their event for rollover.
    /// Proofs it reports `UNSPENT` that the cache had marked spent are
    /// returned to active use.
    async fn reconcile_with_mint(&self, proofs: Vec<ProofRecord>) -> Result<Vec<ProofRecord>> {
        let mut by_mint: HashMap<String, Vec<ProofRecord>> = HashMap::new();
        for p in proofs {
            by_mint.entry(p.mint_url.clone()).or_default().push(p);
        }

        let mut cache = self.spent_proof_cache.lock().await;
        let mut surviving = Vec::new();

        for (mint_url, mint_proofs) in by_mint {
            let (cached, stale) = cache.partition(
                &mint_proofs,
                Duration::from_secs(self.config.cache_ttl_seconds),
                Duration::from_secs(self.config.unknown_cache_ttl_seconds()),
            );
            for (record, cached_state) in &cached {
                if *cached_state != ProofMintState::Spent {
                    surviving.push((*record).clone());
                }
            }

            if stale.is_empty() {
                continue;
            }
            let url: Url = mint_url.parse().map_err(cashu_core::Error::from)?;
            let ys: Vec<PublicKey> = stale
                .iter()
                .map(|p| cashu_core::dhke::hash_to_curve(&p.proof.secret.hex_ascii()).map(PublicKey::new))
                .collect::<cashu_core::Result<_>>()?;
            let response = self
                .mint_client
                .post_check_state(&url, CheckStateRequest { ys: ys.clone() })
                .await?;

            for (record, y, reported) in itertools::izip!(stale, ys, response.states.iter().map(|s| s.state)) {
                cache.record(record.fingerprint(), reported);
                if reported != ProofMintState::Spent {
                    surviving.push(record.clone());
                } else {
                    tracing::debug!(secret = %record.proof.secret.to_hex(), y = %y.to_hex(), "dropping mint-reported spent proof");
                }
            }
        }
        Ok(surviving)
    }

    async fn fetch_fee_rates(&self, mint_url: &Url) -> Result<(KeySet, HashMap<KeysetId, u64>)> {
        let keysets = self
            .mint_client
            .get_mint_keysets(mint_url)
            .await?;
        let mut fee_rates = HashMap::new();
        let mut active_id = None;
        for info in &keysets.keysets {
            fee_rates.insert(info.id, info.input_fee_ppk);
            if info.active && info.unit == self.config.unit {
                active_id = Some(info.id);
            }
        }
        let active_id = active_id.ok_or_else(|| Error::UnknownMint(mint_url.to_string()))?;
        let keys = self
            .mint_client
            .get_mint_keys(mint_url, Some(active_id))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::UnknownMint(mint_url.to_string()))?;
        Ok((keys, fee_rates))
    }

    /// Publish the replacement token event, then (only once at least one
    /// relay acknowledged it) request deletion of the superseded events.
    /// Ordering here is the durability invariant the whole engine depends
    /// on: a crash between the two calls leaves duplicate proofs, which
    /// reconstruction tolerates and the next rollover cleans up.
    async fn rollover(
        &self,
        mint_url: &str,
        new_proofs: Vec<Proof>,
        consumed_events: Vec<nostr_sdk::EventId>,
        quote_id: Option<&str>,
    ) -> Result<()> {
        let bundle = TokenBundle {
            mint: mint_url.to_string(),
            unit: self.config.unit.clone(),
            proofs: new_proofs,
            del: consumed_events.iter().map(|id| id.to_string()).collect(),
        };
        let event = bundle.to_event(&self.keys, &self.wallet_id, quote_id)?;
        self.relay_pool.publish(event).await?;

        if !consumed_events.is_empty() {
            let deletion = nip60::deletion_event(&self.keys, &consumed_events)?;
            // Best-effort: relays differ in whether they honor deletion
            //. Correctness never depends on this
            // succeeding.
            if let Err(err) = self.relay_pool.publish(deletion).await {
                tracing::warn!(error = %err, "deletion event publish failed; reconstruction still drops superseded proofs via `del`");
            }
        }
        Ok(())
    }

    async fn publish_history(&self, direction: nip60::Direction, amount: Amount, fee: Amount, refs: Vec<String>) -> Result<()> {
        let history = SpendingHistory {
            direction,
            amount: amount.as_u64(),
            fee: fee.as_u64(),
            token_event_refs: refs,
        };
        let event = history.to_event(&self.keys, &self.wallet_id)?;
        self.relay_pool.publish(event).await?;
        Ok(())
    }

    /// Begin a receive: create a mint quote and publish its tracker. The
    /// caller polls [`Self::complete_receive`] once the invoice is paid.
    #[tracing::instrument(skip(self))]
    pub async fn create_receive_quote(&self, mint_url: &Url, amount: Amount) -> Result<(String, String)> {
        let quote = self
            .mint_client
            .post_mint_quote(
                mint_url,
                MintQuoteRequest {
                    amount,
                    unit: self.config.unit.clone(),
                },
            )
            .await?;

        let tracker = QuoteTracker {
            quote_id: quote.quote.clone(),
            mint: mint_url.to_string(),
            amount: amount.as_u64(),
            expiry: quote.expiry,
        };
        let event = tracker.to_event(&self.keys, &self.wallet_id)?;
        self.relay_pool.publish(event).await?;

        Ok((quote.request, quote.quote))
    }

    /// Poll a mint quote until it is paid (or the deadline elapses), then
    /// mint proofs for it exactly once, even under concurrent callers.
    #[tracing::instrument(skip(self))]
    pub async fn complete_receive(&self, mint_url: &Url, quote_id: &str, amount: Amount, poll_interval: Duration, deadline: Duration) -> Result<Amount> {
        let start = tokio::time::Instant::now();
        loop {
            let status = self
                .mint_client
                .get_mint_quote_status(mint_url, quote_id)
                .await?;
            if status.state == MintQuoteState::Paid {
                break;
            }
            if status.state == MintQuoteState::Issued {
                return Ok(Amount::ZERO); // another caller already minted this quote
            }
            if start.elapsed() >= deadline {
                return Err(Error::Timeout);
            }
            tokio::time::sleep(poll_interval).await;
        }

        let _guard = self.op_lock.lock().await;
        {
            let mut minted = self.minted_quotes.lock().await;
            if !minted.insert(quote_id.to_string()) {
                return Ok(Amount::ZERO);
            }
        }

        let (keyset, _fee_rates) = self.fetch_fee_rates(mint_url).await?;
        let outputs: Vec<(Amount, OutputRole)> = amount.split().into_iter().map(|a| (a, OutputRole::Change)).collect();
        let planned = plan_outputs(outputs, keyset.id)?;

        let response = self
            .mint_client
            .post_mint(
                mint_url,
                MintRequest {
                    quote: quote_id.to_string(),
                    outputs: planned.iter().map(|p| p.message.clone()).collect(),
                },
            )
            .await?;

        let proofs = unblind_outputs(&planned, &response.signatures, &keyset)?;
        let minted_amount: Amount = proofs.iter().map(|p| p.amount).sum();

        self.rollover(&mint_url.to_string(), proofs, Vec::new(), Some(quote_id)).await?;
        Ok(minted_amount)
    }

    /// Send `amount` from `mint_url`, returning a serialized v4 token.
    #[tracing::instrument(skip(self))]
    pub async fn send(&self, mint_url: &Url, amount: Amount) -> Result<String> {
        let _guard = self.op_lock.lock().await;
        let state = self.state().await?;
        let (keyset, fee_rates) = self.fetch_fee_rates(mint_url).await?;

        let available: Vec<ProofRecord> = state.proofs_for_mint(mint_url.as_str()).cloned().collect();
        let (selected, fee) = select_proofs(&available, amount, &fee_rates).ok_or_else(|| Error::InsufficientBalance {
            needed: amount.as_u64(),
            available: available.iter().map(|p| p.proof.amount).sum::<Amount>().as_u64(),
        })?;
        let selected_sum: Amount = selected.iter().map(|p| p.proof.amount).sum();
        let change_amount = selected_sum - amount - fee;

        if change_amount == Amount::ZERO && fee == Amount::ZERO {
            // Selected proofs already total exactly `amount`; no change and
            // no fee to pay, so there's nothing for a swap to accomplish.
            // Hand the selected proofs over as the token directly.
            let consumed_events: Vec<nostr_sdk::EventId> =
                selected.iter().map(|p| p.owning_event).collect::<HashSet<_>>().into_iter().collect();
            self.rollover(mint_url.as_str(), Vec::new(), consumed_events.clone(), None).await?;
            self.publish_history(
                nip60::Direction::Out,
                amount,
                Amount::ZERO,
                consumed_events.iter().map(|id| id.to_string()).collect(),
            )
            .await?;

            let token = cashu_core::Token {
                entries: selected
                    .into_iter()
                    .map(|record| cashu_core::token::TokenProof {
                        mint_url: mint_url.to_string(),
                        proof: record.proof,
                    })
                    .collect(),
                unit: self.config.unit.clone(),
                memo: None,
            };
            return Ok(token.to_v4_string()?);
        }

        let mut outputs: Vec<(Amount, OutputRole)> = amount.split().into_iter().map(|a| (a, OutputRole::Send)).collect();
        outputs.extend(change_amount.split().into_iter().map(|a| (a, OutputRole::Change)));
        let planned = plan_outputs(outputs, keyset.id)?;

        let swap_response = self
            .mint_client
            .post_swap(
                mint_url,
                SwapRequest {
                    inputs: selected.iter().map(|p| p.proof.clone()).collect(),
                    outputs: planned.iter().map(|p| p.message.clone()).collect(),
                },
            )
            .await?;

        let new_proofs = unblind_outputs(&planned, &swap_response.signatures, &keyset)?;
        let (send_proofs, change_proofs): (Vec<Proof>, Vec<Proof>) = planned
            .iter()
            .zip(new_proofs)
            .fold((Vec::new(), Vec::new()), |(mut send, mut change), (plan, proof)| {
                match plan.role {
                    OutputRole::Send => send.push(proof),
                    _ => change.push(proof),
                }
                (send, change)
            });

        let consumed_events: Vec<nostr_sdk::EventId> = selected.iter().map(|p| p.owning_event).collect::<HashSet<_>>().into_iter().collect();
        self.rollover(mint_url.as_str(), change_proofs, consumed_events.clone(), None).await?;
        self.publish_history(
            nip60::Direction::Out,
            amount,
            fee,
            consumed_events.iter().map(|id| id.to_string()).collect(),
        )
        .await?;

        let token = cashu_core::Token {
            entries: send_proofs
                .into_iter()
                .map(|proof| cashu_core::token::TokenProof {
                    mint_url: mint_url.to_string(),
                    proof,
                })
                .collect(),
            unit: self.config.unit.clone(),
            memo: None,
        };
        Ok(token.to_v4_string()?)
    }

    /// Redeem a received token by swapping its proofs for fresh ones on the
    /// configured primary mint.
    #[tracing::instrument(skip(self, token))]
    pub async fn redeem(&self, token: &str) -> Result<Amount> {
        let _guard = self.op_lock.lock().await;
        let parsed = cashu_core::Token::parse(token).map_err(|e| Error::InvalidToken(e.to_string()))?;
        if parsed.entries.is_empty() {
            return Err(Error::InvalidToken("token carries no proofs".to_string()));
        }
        let mint_url: Url = parsed.entries[0]
            .mint_url
            .parse()
            .map_err(|_| Error::InvalidToken("malformed mint url".to_string()))?;

        let (keyset, fee_rates) = self.fetch_fee_rates(&mint_url).await?;
        let input_proofs: Vec<Proof> = parsed.entries.into_iter().map(|e| e.proof).collect();
        let fee = input_fee(
            &input_proofs
                .iter()
                .cloned()
                .map(|proof| ProofRecord {
                    proof,
                    mint_url: mint_url.to_string(),
                    owning_event: nostr_sdk::EventId::all_zeros(),
                })
                .collect::<Vec<_>>(),
            &fee_rates,
        );
        let token_amount: Amount = input_proofs.iter().map(|p| p.amount).sum();
        if token_amount < fee {
            return Err(Error::InsufficientBalance {
                needed: fee.as_u64(),
                available: token_amount.as_u64(),
            });
        }
        let receive_amount = token_amount - fee;

        let outputs: Vec<(Amount, OutputRole)> = receive_amount.split().into_iter().map(|a| (a, OutputRole::Change)).collect();
        let planned = plan_outputs(outputs, keyset.id)?;

        let response = self
            .mint_client
            .post_swap(
                &mint_url,
                SwapRequest {
                    inputs: input_proofs,
                    outputs: planned.iter().map(|p| p.message.clone()).collect(),
                },
            )
            .await?;
        let new_proofs = unblind_outputs(&planned, &response.signatures, &keyset)?;

        self.rollover(mint_url.as_str(), new_proofs, Vec::new(), None).await?;
        self.publish_history(nip60::Direction::In, receive_amount, fee, Vec::new()).await?;
        Ok(receive_amount)
    }

    /// Poll a melt quote until the mint reports it `Paid`, `Failed`, or the
    /// deadline elapses. Only the `Paid` case returns `Ok`; the caller must
    /// not treat an `Err` here as license to consume the input proofs.
    async fn await_melt_settlement(&self, mint_url: &Url, quote_id: &str, poll_interval: Duration, deadline: Duration) -> Result<MeltQuoteResponse> {
        let start = tokio::time::Instant::now();
        loop {
            let status = self.mint_client.get_melt_quote_status(mint_url, quote_id).await?;
            match status.state {
                MeltQuoteState::Paid => return Ok(status),
                MeltQuoteState::Failed => {
                    return Err(Error::MeltNotPaid {
                        quote: quote_id.to_string(),
                        state: MeltQuoteState::Failed,
                    })
                }
                MeltQuoteState::Pending | MeltQuoteState::Unpaid => {
                    if start.elapsed() >= deadline {
                        return Err(Error::MeltNotPaid {
                            quote: quote_id.to_string(),
                            state: status.state,
                        });
                    }
                    tokio::time::sleep(poll_interval).await;
                }
            }
        }
    }

    /// Pay `invoice` by melting wallet proofs at `mint_url`.
    #[tracing::instrument(skip(self, invoice))]
    pub async fn melt(&self, mint_url: &Url, invoice: &str) -> Result<Amount> {
        let _guard = self.op_lock.lock().await;
        let quote = self
            .mint_client
            .post_melt_quote(
                mint_url,
                MeltQuoteRequest {
                    request: invoice.to_string(),
                    unit: self.config.unit.clone(),
                },
            )
            .await?;

        let need = quote.amount + quote.fee_reserve;
        let state = self.state().await?;
        let (keyset, fee_rates) = self.fetch_fee_rates(mint_url).await?;
        let available: Vec<ProofRecord> = state.proofs_for_mint(mint_url.as_str()).cloned().collect();
        let (selected, actual_fee) = select_proofs(&available, need, &fee_rates).ok_or(Error::InsufficientBalance {
            needed: need.as_u64(),
            available: available.iter().map(|p| p.proof.amount).sum::<Amount>().as_u64(),
        })?;
        let selected_sum: Amount = selected.iter().map(|p| p.proof.amount).sum();
        let change_amount = selected_sum - need - actual_fee;

        let blanks = blank_output_count(quote.fee_reserve);
        let mut outputs: Vec<(Amount, OutputRole)> = change_amount.split().into_iter().map(|a| (a, OutputRole::Change)).collect();
        outputs.extend((0..blanks).map(|_| (Amount::ZERO, OutputRole::Blank)));
        let planned = plan_outputs(outputs, keyset.id)?;

        let melt_outputs = if planned.is_empty() {
            None
        } else {
            Some(planned.iter().map(|p| p.message.clone()).collect())
        };

        let response = self
            .mint_client
            .post_melt(
                mint_url,
                MeltRequest {
                    quote: quote.quote.clone(),
                    inputs: selected.iter().map(|p| p.proof.clone()).collect(),
                    outputs: melt_outputs,
                },
            )
            .await?;

        if !response.paid {
            // Payment wasn't confirmed synchronously; poll the melt quote
            // itself. Returns only on a definitive Paid state; Failed or a
            // deadline both abort here, before any proof is consumed.
            self.await_melt_settlement(mint_url, &quote.quote, Duration::from_secs(2), Duration::from_secs(60))
                .await?;
        }

        let mut new_proofs = Vec::new();
        if let Some(signatures) = &response.change {
            new_proofs = unblind_outputs(&planned, signatures, &keyset)?;
        }

        let consumed_events: Vec<nostr_sdk::EventId> = selected.iter().map(|p| p.owning_event).collect::<HashSet<_>>().into_iter().collect();
        self.rollover(mint_url.as_str(), new_proofs, consumed_events.clone(), None).await?;
        self.publish_history(
            nip60::Direction::Out,
            quote.amount,
            actual_fee,
            consumed_events.iter().map(|id| id.to_string()).collect(),
        )
        .await?;

        Ok(quote.amount)
    }

    /// Swap value from `source_mint` to `destination_mint` atomically from
    /// the caller's perspective: redeem on the source, mint on the
    /// destination. If the destination leg fails, the source-mint swap's
    /// outputs still exist as fresh wallet change, so no value is lost —
    /// only the cross-mint transfer itself did not complete.
    #[tracing::instrument(skip(self))]
    pub async fn swap_mints(&self, source_mint: &Url, destination_mint: &Url, amount: Amount) -> Result<Amount> {
        let sent_token = self.send(source_mint, amount).await?;
        match self.redeem(&sent_token).await {
            Ok(received) => Ok(received),
            Err(err) => Err(Error::CrossMintPartial(format!(
                "redeemed {amount} worth of change on {source_mint} but destination mint {destination_mint} leg failed: {err}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyset_id() -> KeysetId {
        "00aabbccddeeff00".parse().expect("valid id")
    }

    #[test]
    fn fee_floors_per_keyset() {
        let mut rates = HashMap::new();
        rates.insert(keyset_id(), 2u64);
        let record = |amount: u64| ProofRecord {
            proof: Proof {
                keyset_id: keyset_id(),
                amount: Amount::from(amount),
                secret: Secret::generate(),
                c: SecretKey::generate().public_key(),
            },
            mint_url: "https://mint.example".to_string(),
            owning_event: nostr_sdk::EventId::all_zeros(),
        };

        // 1 proof @ 2ppk -> floor(2/1000) = 0
        assert_eq!(input_fee(&[record(4)], &rates), Amount::from(0));
        // 500 proofs @ 2ppk -> floor(1000/1000) = 1
        let many: Vec<_> = (0..500).map(|_| record(1)).collect();
        assert_eq!(input_fee(&many, &rates), Amount::from(1));
    }

    #[test]
    fn blank_output_count_matches_ceil_log2() {
        assert_eq!(blank_output_count(Amount::from(0)), 0);
        assert_eq!(blank_output_count(Amount::from(1)), 1);
        assert_eq!(blank_output_count(Amount::from(1000)), 10);
    }

    #[test]
    fn selection_reaches_fixed_point_covering_fee() {
        let mut rates = HashMap::new();
        rates.insert(keyset_id(), 2u64);
        let make = |amount: u64| ProofRecord {
            proof: Proof {
                keyset_id: keyset_id(),
                amount: Amount::from(amount),
                secret: Secret::generate(),
                c: SecretKey::generate().public_key(),
            },
            mint_url: "https://mint.example".to_string(),
            owning_event: nostr_sdk::EventId::all_zeros(),
        };
        let available = vec![make(64), make(32), make(16), make(8), make(4), make(2), make(1)];
        let (selected, fee) = select_proofs(&available, Amount::from(100), &rates).expect("selectable");
        let sum: Amount = selected.iter().map(|p| p.proof.amount).sum();
        assert!(sum >= Amount::from(100) + fee);
    }

    #[test]
    fn selection_fails_when_insufficient() {
        let rates = HashMap::new();
        let make = |amount: u64| ProofRecord {
            proof: Proof {
                keyset_id: keyset_id(),
                amount: Amount::from(amount),
                secret: Secret::generate(),
                c: SecretKey::generate().public_key(),
            },
            mint_url: "https://mint.example".to_string(),
            owning_event: nostr_sdk::EventId::all_zeros(),
        };
        let available = vec![make(1), make(2)];
        assert!(select_proofs(&available, Amount::from(100), &rates).is_none());
    }
}
