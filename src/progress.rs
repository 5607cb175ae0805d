use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use crate::words::{Word, WordBank};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    Random,
    Sequential,
}

impl SelectionMode {
    pub fn parse(s: &str) -> Self {
        match s {
            "sequential" => Self::Sequential,
            "random" => Self::Random,
            other => {
                tracing::warn!("Unknown learning mode '{other}', falling back to random");
                Self::Random
            }
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct GlobalProgress {
    #[serde(default)]
    sent_words: Vec<String>,
    #[serde(default)]
    last_push_date: String,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct UserProgress {
    #[serde(default)]
    sent_words: Vec<String>,
    #[serde(default)]
    last_seen_date: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProgressData {
    #[serde(default)]
    global: GlobalProgress,
    #[serde(default)]
    users: HashMap<String, UserProgress>,
}

#[derive(Debug, Clone)]
pub struct ProgressStatus {
    pub sent: usize,
    pub total: usize,
    /// YYYY-MM-DD of the last send, empty when the scope has never seen a word.
    pub last_date: String,
}

/// Per-user and global learning progress, persisted as `progress.json`.
/// `user: None` addresses the global scope used by the daily push.
pub struct ProgressStore {
    path: PathBuf,
    data: Mutex<ProgressData>,
}

impl ProgressStore {
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join("progress.json");
        let data = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<ProgressData>(&content) {
                Ok(data) => data,
                Err(e) => {
                    tracing::error!(
                        "Corrupt progress file {}, starting fresh: {e}",
                        path.display()
                    );
                    ProgressData::default()
                }
            },
            Err(_) => ProgressData::default(),
        };
        Self {
            path,
            data: Mutex::new(data),
        }
    }

    /// Pick the next word for a scope. A scope that has seen the whole bank
    /// is reset (persisted) and selection restarts from the full bank.
    pub fn select_word(
        &self,
        bank: &WordBank,
        user: Option<&str>,
        mode: SelectionMode,
    ) -> Result<Option<Word>> {
        if bank.is_empty() {
            return Ok(None);
        }

        let mut data = self.data.lock().expect("progress lock poisoned");
        let sent = sent_words(&data, user);
        let mut available: Vec<&Word> = bank
            .words()
            .iter()
            .filter(|w| !sent.contains(&w.word))
            .collect();

        if available.is_empty() {
            tracing::info!(
                "Scope {} finished the bank, resetting progress",
                user.unwrap_or("global")
            );
            match user {
                Some(id) => data.users.entry(id.to_string()).or_default().sent_words.clear(),
                None => data.global.sent_words.clear(),
            }
            self.save(&mut data)?;
            available = bank.words().iter().collect();
        }

        let picked = match mode {
            SelectionMode::Sequential => available.first().copied(),
            SelectionMode::Random => available.choose(&mut rand::rng()).copied(),
        };
        Ok(picked.cloned())
    }

    /// Record a send. Idempotent; words not in the bank are ignored.
    pub fn mark_sent(
        &self,
        bank: &WordBank,
        user: Option<&str>,
        word: &str,
        today: &str,
    ) -> Result<()> {
        if bank.get(word).is_none() {
            return Ok(());
        }

        let mut data = self.data.lock().expect("progress lock poisoned");
        match user {
            Some(id) => {
                let entry = data.users.entry(id.to_string()).or_default();
                if !entry.sent_words.iter().any(|w| w == word) {
                    entry.sent_words.push(word.to_string());
                }
                entry.last_seen_date = today.to_string();
            }
            None => {
                if !data.global.sent_words.iter().any(|w| w == word) {
                    data.global.sent_words.push(word.to_string());
                }
                data.global.last_push_date = today.to_string();
            }
        }
        self.save(&mut data)
    }

    pub fn status(&self, bank: &WordBank, user: Option<&str>) -> ProgressStatus {
        let data = self.data.lock().expect("progress lock poisoned");
        let (sent, last_date) = match user {
            Some(id) => data
                .users
                .get(id)
                .map(|u| (u.sent_words.len(), u.last_seen_date.clone()))
                .unwrap_or((0, String::new())),
            None => (
                data.global.sent_words.len(),
                data.global.last_push_date.clone(),
            ),
        };
        ProgressStatus {
            sent,
            total: bank.len(),
            last_date,
        }
    }

    pub fn learned_count(&self, user: &str) -> usize {
        let data = self.data.lock().expect("progress lock poisoned");
        data.users.get(user).map_or(0, |u| u.sent_words.len())
    }

    /// Sample up to `count` distinct learned words for review. Words that
    /// have since left the bank are skipped.
    pub fn recap_words(&self, bank: &WordBank, user: &str, count: usize) -> Vec<Word> {
        let data = self.data.lock().expect("progress lock poisoned");
        let Some(progress) = data.users.get(user) else {
            return Vec::new();
        };
        progress
            .sent_words
            .choose_multiple(&mut rand::rng(), count.min(progress.sent_words.len()))
            .filter_map(|w| bank.get(w).cloned())
            .collect()
    }

    fn save(&self, data: &mut ProgressData) -> Result<()> {
        // Sorted lists keep the file diff-stable across runs.
        data.global.sent_words.sort();
        for user in data.users.values_mut() {
            user.sent_words.sort();
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(&*data)?;
        std::fs::write(&tmp, &json)
            .with_context(|| format!("Failed to write progress: {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace progress: {}", self.path.display()))?;
        Ok(())
    }
}

fn sent_words(data: &ProgressData, user: Option<&str>) -> Vec<String> {
    match user {
        Some(id) => data
            .users
            .get(id)
            .map(|u| u.sent_words.clone())
            .unwrap_or_default(),
        None => data.global.sent_words.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank(words: &[&str]) -> WordBank {
        WordBank::from_words(
            words
                .iter()
                .map(|w| Word {
                    word: w.to_string(),
                    phonetic: String::new(),
                    pos: String::new(),
                    definition: String::new(),
                    example: String::new(),
                    example_translation: String::new(),
                })
                .collect(),
        )
    }

    #[test]
    fn test_select_skips_sent_words() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProgressStore::load(dir.path());
        let bank = bank(&["a", "b"]);

        store.mark_sent(&bank, Some("u1"), "a", "2026-08-07").unwrap();
        let word = store
            .select_word(&bank, Some("u1"), SelectionMode::Random)
            .unwrap()
            .unwrap();
        assert_eq!(word.word, "b");
    }

    #[test]
    fn test_sequential_mode_follows_bank_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProgressStore::load(dir.path());
        let bank = bank(&["zeta", "alpha", "mid"]);

        let first = store
            .select_word(&bank, Some("u1"), SelectionMode::Sequential)
            .unwrap()
            .unwrap();
        assert_eq!(first.word, "zeta");

        store.mark_sent(&bank, Some("u1"), "zeta", "2026-08-07").unwrap();
        let second = store
            .select_word(&bank, Some("u1"), SelectionMode::Sequential)
            .unwrap()
            .unwrap();
        assert_eq!(second.word, "alpha");
    }

    #[test]
    fn test_exhausted_scope_resets() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProgressStore::load(dir.path());
        let bank = bank(&["a", "b"]);

        store.mark_sent(&bank, None, "a", "2026-08-06").unwrap();
        store.mark_sent(&bank, None, "b", "2026-08-07").unwrap();
        assert_eq!(store.status(&bank, None).sent, 2);

        let word = store.select_word(&bank, None, SelectionMode::Random).unwrap();
        assert!(word.is_some());
        assert_eq!(store.status(&bank, None).sent, 0);
    }

    #[test]
    fn test_mark_sent_is_idempotent_and_ignores_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProgressStore::load(dir.path());
        let bank = bank(&["a"]);

        store.mark_sent(&bank, Some("u1"), "a", "2026-08-07").unwrap();
        store.mark_sent(&bank, Some("u1"), "a", "2026-08-07").unwrap();
        store.mark_sent(&bank, Some("u1"), "ghost", "2026-08-07").unwrap();

        let status = store.status(&bank, Some("u1"));
        assert_eq!(status.sent, 1);
        assert_eq!(status.last_date, "2026-08-07");
    }

    #[test]
    fn test_progress_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let bank = bank(&["a", "b", "c"]);
        {
            let store = ProgressStore::load(dir.path());
            store.mark_sent(&bank, Some("u1"), "c", "2026-08-07").unwrap();
            store.mark_sent(&bank, Some("u1"), "a", "2026-08-07").unwrap();
        }

        let store = ProgressStore::load(dir.path());
        assert_eq!(store.learned_count("u1"), 2);

        // Sent lists are stored sorted.
        let raw = std::fs::read_to_string(dir.path().join("progress.json")).unwrap();
        assert!(raw.find("\"a\"").unwrap() < raw.find("\"c\"").unwrap());
    }

    #[test]
    fn test_corrupt_progress_heals_to_default() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("progress.json"), "{not json").unwrap();
        let store = ProgressStore::load(dir.path());
        assert_eq!(store.learned_count("u1"), 0);
    }

    #[test]
    fn test_recap_clamps_and_resolves() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProgressStore::load(dir.path());
        let bank = bank(&["a", "b"]);

        store.mark_sent(&bank, Some("u1"), "a", "2026-08-07").unwrap();
        store.mark_sent(&bank, Some("u1"), "b", "2026-08-07").unwrap();

        let words = store.recap_words(&bank, "u1", 10);
        assert_eq!(words.len(), 2);

        assert!(store.recap_words(&bank, "stranger", 3).is_empty());
    }
}
