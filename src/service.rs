use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, Utc};
use tokio::sync::Mutex;

use crate::card::CardRenderer;
use crate::config::Config;
use crate::progress::{ProgressStore, SelectionMode};
use crate::push::HostClient;
use crate::registry::Registry;
use crate::words::{Word, WordBank};

pub struct DailyCard {
    pub word: Word,
    pub png: Vec<u8>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PushReport {
    pub delivered: usize,
    pub targets: usize,
}

/// Shared core wired into both the command surface and the scheduler.
/// Holds the word bank, the stores, and the card cached between the
/// daily generate and push steps.
pub struct Service {
    pub bank: WordBank,
    pub progress: ProgressStore,
    pub registry: Registry,
    pub host: HostClient,
    pub mode: SelectionMode,
    pub push_at: String,
    renderer: Arc<CardRenderer>,
    tz: FixedOffset,
    daily: Mutex<Option<DailyCard>>,
}

impl Service {
    pub fn new(config: &Config) -> Result<Self> {
        let data_dir = crate::config::expand_tilde(
            &config.data.base_dir.to_string_lossy(),
        );
        let tz = FixedOffset::east_opt(config.schedule.tz_offset_hours * 3600)
            .context("tz_offset_hours out of range")?;

        let bank = WordBank::load(&data_dir);
        if bank.is_empty() {
            tracing::warn!(
                "Word bank is empty, run `vocabcard init` to seed {}",
                data_dir.display()
            );
        } else {
            tracing::info!("Loaded {} words", bank.len());
        }

        Ok(Self {
            bank,
            progress: ProgressStore::load(&data_dir),
            registry: Registry::load(&data_dir),
            host: HostClient::new(&config.host),
            mode: SelectionMode::parse(&config.learning.mode),
            push_at: config.schedule.push_at.clone(),
            renderer: Arc::new(CardRenderer::new(&data_dir)),
            tz,
            daily: Mutex::new(None),
        })
    }

    pub fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.tz)
    }

    pub fn today(&self) -> String {
        self.now().format("%Y-%m-%d").to_string()
    }

    /// Rasterize off the async runtime.
    pub async fn render_card(&self, word: Word) -> Result<Vec<u8>> {
        let renderer = self.renderer.clone();
        let date = self.today();
        tokio::task::spawn_blocking(move || renderer.render(&word, &date))
            .await
            .context("Render task panicked")?
    }

    /// Select a word for the global scope, render it, and cache the card
    /// for the push step. Global progress is marked at generation time so
    /// a failed push never repeats a word.
    pub async fn generate_daily_card(&self) -> Result<Option<Word>> {
        let Some(word) = self.progress.select_word(&self.bank, None, self.mode)? else {
            tracing::warn!("No word available for the daily card");
            return Ok(None);
        };

        let png = self.render_card(word.clone()).await?;
        self.progress
            .mark_sent(&self.bank, None, &word.word, &self.today())?;
        *self.daily.lock().await = Some(DailyCard {
            word: word.clone(),
            png,
        });
        tracing::info!("Generated daily card: {}", word.word);
        Ok(Some(word))
    }

    /// Fan the cached card out to every registered destination. Failures
    /// are logged per destination; the cache is dropped either way.
    pub async fn push_daily_card(&self) -> Result<PushReport> {
        let Some(card) = self.daily.lock().await.take() else {
            tracing::warn!("No generated card to push");
            return Ok(PushReport::default());
        };

        let targets = self.registry.all();
        if targets.is_empty() {
            tracing::warn!("No registered destinations, dropping daily card");
            return Ok(PushReport::default());
        }

        let caption = format!("📚 Word of the day: {}", card.word.word);
        let mut delivered = 0;
        for dest in &targets {
            match self.host.send_card(dest, &caption, &card.png).await {
                Ok(()) => {
                    delivered += 1;
                    tracing::info!("Delivered daily card to {dest}");
                }
                Err(e) => tracing::error!("Delivery to {dest} failed: {e:#}"),
            }
        }
        tracing::info!("Daily push complete: {delivered}/{}", targets.len());
        Ok(PushReport {
            delivered,
            targets: targets.len(),
        })
    }
}
