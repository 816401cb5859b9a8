//! Call consolidator service
//!
//! Consumes the pool's merged message stream, buffers call events per
//! account, and on every debounce flush publishes each account's reduced
//! call list to the cache and announces it on a broadcast channel. Reads are
//! served straight from the cache.

use crate::call_filter::accepted_account;
use crate::call_reducer::consolidate;
use crate::constants::UPDATE_CHANNEL_CAPACITY;
use crate::event_buffer::EventBuffer;
use chrono::{DateTime, Utc};
use pabx_ami::AmiMessage;
use pabx_cache::keys;
use pabx_core::{
    config::ConsolidatorConfig, models::ConsolidatedCall, traits::CacheService, AppResult,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, instrument, warn};

/// Notification raised after an account's snapshot was rewritten
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallsUpdated {
    pub account_code: String,
    pub calls: Vec<ConsolidatedCall>,
    pub timestamp: DateTime<Utc>,
}

/// Call consolidator
///
/// The buffer lives inside the consolidator's own task, so exactly one
/// writer ever touches it.
pub struct CallConsolidator<C: CacheService> {
    cache: Arc<C>,
    config: ConsolidatorConfig,
    updates: broadcast::Sender<CallsUpdated>,
}

impl<C: CacheService + 'static> CallConsolidator<C> {
    /// Create a new consolidator publishing into `cache`
    pub fn new(cache: Arc<C>, config: ConsolidatorConfig) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            cache,
            config,
            updates,
        }
    }

    /// "Calls updated" notifications
    pub fn subscribe(&self) -> broadcast::Receiver<CallsUpdated> {
        self.updates.subscribe()
    }

    /// Run the consolidation loop on its own task
    pub fn spawn(self: &Arc<Self>, messages: broadcast::Receiver<AmiMessage>) -> JoinHandle<()> {
        let consolidator = Arc::clone(self);
        tokio::spawn(async move { consolidator.run(messages).await })
    }

    /// Consume `messages` until the stream closes
    ///
    /// Whatever is still buffered when the stream closes is flushed.
    pub async fn run(&self, mut messages: broadcast::Receiver<AmiMessage>) {
        let mut buffer = EventBuffer::new(self.config.debounce());
        info!(
            debounce_ms = self.config.debounce_ms,
            ttl_secs = self.config.cache_ttl_secs,
            "Call consolidator started"
        );

        loop {
            let deadline = buffer.deadline();

            tokio::select! {
                received = messages.recv() => match received {
                    Ok(message) => {
                        if let Some(account_code) = accepted_account(&message) {
                            let account_code = account_code.to_string();
                            buffer.push(account_code, message);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Consolidator lagged behind the event stream");
                    }
                    Err(RecvError::Closed) => {
                        if !buffer.is_empty() {
                            self.flush(&mut buffer).await;
                        }
                        break;
                    }
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.flush(&mut buffer).await;
                }
            }
        }

        info!("Call consolidator stopped");
    }

    /// Reduce and publish every queued account
    pub async fn flush(&self, buffer: &mut EventBuffer) {
        let batch = buffer.take_all();
        let now = Utc::now();
        debug!(accounts = batch.len(), "Flushing call events");

        for (account_code, entries) in batch {
            let calls = consolidate(&account_code, &entries, now);
            self.publish(account_code, calls, now).await;
        }
    }

    async fn publish(&self, account_code: String, calls: Vec<ConsolidatedCall>, now: DateTime<Utc>) {
        let key = keys::active_calls_key(&account_code);

        if let Err(e) = self
            .cache
            .set(&key, &calls, self.config.cache_ttl_secs)
            .await
        {
            error!(account_code = %account_code, error = %e, "Failed to publish active calls");
        } else {
            debug!(account_code = %account_code, calls = calls.len(), "Published active calls");
        }

        // Nobody listening is fine
        let _ = self.updates.send(CallsUpdated {
            account_code,
            calls,
            timestamp: now,
        });
    }

    /// Latest published calls of one account
    #[instrument(skip(self))]
    pub async fn get_active_calls_by_account(
        &self,
        account_code: &str,
    ) -> AppResult<Vec<ConsolidatedCall>> {
        let key = keys::active_calls_key(account_code);
        Ok(self.cache.get(&key).await?.unwrap_or_default())
    }

    /// Latest published calls of every account
    #[instrument(skip(self))]
    pub async fn get_all_active_calls(&self) -> AppResult<Vec<ConsolidatedCall>> {
        let mut keys = self.cache.keys(&keys::active_calls_pattern()).await?;
        keys.sort();

        let mut all = Vec::new();
        for key in keys {
            // Entries may expire between the scan and the read
            if let Some(calls) = self.cache.get::<Vec<ConsolidatedCall>>(&key).await? {
                all.extend(calls);
            }
        }

        Ok(all)
    }
}
