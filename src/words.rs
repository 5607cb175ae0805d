use std::path::Path;

use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Word {
    pub word: String,
    #[serde(default)]
    pub phonetic: String,
    #[serde(default)]
    pub pos: String,
    #[serde(default)]
    pub definition: String,
    #[serde(default)]
    pub example: String,
    #[serde(default)]
    pub example_translation: String,
}

pub struct WordBank {
    words: Vec<Word>,
}

impl WordBank {
    /// Load `words.json` from the data dir. A missing or broken file
    /// degrades to an empty bank so the service still comes up.
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join("words.json");
        let words = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Vec<Word>>(&content) {
                Ok(words) => words,
                Err(e) => {
                    tracing::error!("Failed to parse {}: {e}", path.display());
                    Vec::new()
                }
            },
            Err(e) => {
                tracing::warn!("No word bank at {}: {e}", path.display());
                Vec::new()
            }
        };
        Self::from_words(words)
    }

    pub fn from_words(words: Vec<Word>) -> Self {
        Self { words }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn words(&self) -> &[Word] {
        &self.words
    }

    /// Case-insensitive exact lookup.
    pub fn get(&self, name: &str) -> Option<&Word> {
        self.words
            .iter()
            .find(|w| w.word.eq_ignore_ascii_case(name))
    }

    pub fn random(&self) -> Option<&Word> {
        self.words.choose(&mut rand::rng())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(word: &str) -> Word {
        Word {
            word: word.to_string(),
            phonetic: String::new(),
            pos: "noun".to_string(),
            definition: format!("definition of {word}"),
            example: String::new(),
            example_translation: String::new(),
        }
    }

    #[test]
    fn test_get_is_case_insensitive() {
        let bank = WordBank::from_words(vec![sample("Alleviate")]);
        assert!(bank.get("alleviate").is_some());
        assert!(bank.get("ALLEVIATE").is_some());
        assert!(bank.get("alleviated").is_none());
    }

    #[test]
    fn test_empty_bank() {
        let bank = WordBank::from_words(vec![]);
        assert!(bank.is_empty());
        assert!(bank.random().is_none());
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let bank = WordBank::load(dir.path());
        assert!(bank.is_empty());
    }

    #[test]
    fn test_load_parses_optional_fields() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("words.json"),
            r#"[{"word": "terse", "definition": "brief"}]"#,
        )
        .unwrap();
        let bank = WordBank::load(dir.path());
        assert_eq!(bank.len(), 1);
        assert_eq!(bank.get("terse").unwrap().phonetic, "");
    }
}
