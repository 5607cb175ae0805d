use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions};

use crate::words::Word;

const DEFAULT_TEMPLATE: &str = include_str!("../assets/card.html");

static RENDER_SEQ: AtomicU64 = AtomicU64::new(0);

/// Fills the card template and rasterizes it with headless Chrome.
/// Rendering is blocking; async callers go through `spawn_blocking`.
pub struct CardRenderer {
    template: String,
    work_dir: PathBuf,
}

impl CardRenderer {
    /// Uses `card.html` from the data dir when present (so the card can be
    /// restyled without rebuilding), otherwise the built-in template.
    pub fn new(data_dir: &Path) -> Self {
        let custom = data_dir.join("card.html");
        let template = match std::fs::read_to_string(&custom) {
            Ok(t) => {
                tracing::info!("Using card template {}", custom.display());
                t
            }
            Err(_) => DEFAULT_TEMPLATE.to_string(),
        };
        Self {
            template,
            work_dir: std::env::temp_dir(),
        }
    }

    /// Render a card to PNG bytes. The intermediate HTML file is removed
    /// before returning.
    pub fn render(&self, word: &Word, date: &str) -> Result<Vec<u8>> {
        let html = self.fill_template(word, date);
        let seq = RENDER_SEQ.fetch_add(1, Ordering::Relaxed);
        let html_path = self
            .work_dir
            .join(format!("vocabcard-{}-{seq}.html", std::process::id()));
        std::fs::write(&html_path, &html)
            .with_context(|| format!("Failed to write {}", html_path.display()))?;

        let result = rasterize(&html_path);
        if let Err(e) = std::fs::remove_file(&html_path) {
            tracing::debug!("Could not remove {}: {e}", html_path.display());
        }
        result.with_context(|| format!("Failed to render card for '{}'", word.word))
    }

    fn fill_template(&self, word: &Word, date: &str) -> String {
        let translation_display = if word.example_translation.trim().is_empty() {
            "none"
        } else {
            "block"
        };
        self.template
            .replace("{{word}}", &escape_html(&word.word))
            .replace("{{phonetic}}", &escape_html(&word.phonetic))
            .replace("{{pos}}", &escape_html(&word.pos))
            .replace("{{definition}}", &escape_html(&word.definition))
            .replace("{{example}}", &escape_html(&word.example))
            .replace(
                "{{example_translation}}",
                &escape_html(&word.example_translation),
            )
            .replace("{{translation_display}}", translation_display)
            .replace("{{date}}", &escape_html(date))
    }
}

fn rasterize(html_path: &Path) -> Result<Vec<u8>> {
    let options = LaunchOptions::default_builder()
        .headless(true)
        .window_size(Some((820, 1100)))
        .build()
        .map_err(|e| anyhow::anyhow!("Bad browser launch options: {e}"))?;
    let browser = Browser::new(options).context("Failed to launch headless Chrome")?;

    let tab = browser.new_tab()?;
    let url = format!("file://{}", html_path.display());
    tab.navigate_to(&url)?.wait_until_navigated()?;

    let card = tab
        .wait_for_element(".card")
        .context("Card element did not appear")?;
    let png = card.capture_screenshot(CaptureScreenshotFormatOption::Png)?;
    Ok(png)
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer_with_default_template() -> CardRenderer {
        CardRenderer {
            template: DEFAULT_TEMPLATE.to_string(),
            work_dir: std::env::temp_dir(),
        }
    }

    fn sample_word() -> Word {
        Word {
            word: "alleviate".to_string(),
            phonetic: "/əˈliː.vi.eɪt/".to_string(),
            pos: "verb".to_string(),
            definition: "to make something <bad> less severe".to_string(),
            example: "The bridge should alleviate congestion.".to_string(),
            example_translation: String::new(),
        }
    }

    #[test]
    fn test_fill_template_substitutes_and_escapes() {
        let renderer = renderer_with_default_template();
        let html = renderer.fill_template(&sample_word(), "2026-08-07");

        assert!(html.contains("alleviate"));
        assert!(html.contains("2026-08-07"));
        assert!(html.contains("&lt;bad&gt;"));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn test_empty_translation_is_hidden() {
        let renderer = renderer_with_default_template();
        let html = renderer.fill_template(&sample_word(), "2026-08-07");
        assert!(html.contains("display: none"));

        let mut word = sample_word();
        word.example_translation = "缓解".to_string();
        let html = renderer.fill_template(&word, "2026-08-07");
        assert!(html.contains("display: block"));
        assert!(html.contains("缓解"));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a & b"), "a &amp; b");
        assert_eq!(escape_html("<i>\"x\"</i>"), "&lt;i&gt;&quot;x&quot;&lt;/i&gt;");
    }
}
