use std::sync::Arc;
use std::time::Duration;

use crate::service::Service;
use crate::words::Word;

/// One segment of a command response; the host relays these in order.
pub enum Reply {
    Text(String),
    Image(Vec<u8>),
}

const HELP: &str = "📚 vocabcard commands
  vocab             draw a new word card (counts toward your progress)
  recap [n]         review up to n learned words (1-10, default 1)
  status            your learning progress
  register          receive the daily card in this destination
  unregister        stop receiving the daily card here
  preview [word]    render a card without recording progress
  now               generate and push today's card immediately
  test [delay]      pipeline self-test, optionally delayed by seconds
  help              this message";

const MAX_RECAP: usize = 10;

pub async fn dispatch(
    service: &Arc<Service>,
    command: &str,
    args: &[String],
    user: &str,
    destination: &str,
) -> Vec<Reply> {
    let first = args.first().map(String::as_str);
    match command {
        "vocab" => handle_vocab(service, user).await,
        "recap" => handle_recap(service, user, first.unwrap_or("1")).await,
        "status" => handle_status(service, user),
        "register" => handle_register(service, destination),
        "unregister" => handle_unregister(service, destination),
        "preview" => handle_preview(service, first).await,
        "now" => handle_now(service).await,
        "test" => handle_test(service, user, destination, first.unwrap_or("0")).await,
        "help" => vec![Reply::Text(HELP.to_string())],
        other => vec![Reply::Text(format!(
            "Unknown command '{other}', see `help` for the list"
        ))],
    }
}

async fn handle_vocab(service: &Service, user: &str) -> Vec<Reply> {
    let word = match service
        .progress
        .select_word(&service.bank, Some(user), service.mode)
    {
        Ok(Some(word)) => word,
        Ok(None) => return vec![Reply::Text("No words available".to_string())],
        Err(e) => return error_reply("Word selection failed", e),
    };

    match service.render_card(word.clone()).await {
        Ok(png) => {
            if let Err(e) =
                service
                    .progress
                    .mark_sent(&service.bank, Some(user), &word.word, &service.today())
            {
                tracing::error!("Failed to record progress: {e:#}");
            }
            vec![Reply::Image(png)]
        }
        Err(e) => error_reply("Card generation failed", e),
    }
}

async fn handle_recap(service: &Service, user: &str, count_arg: &str) -> Vec<Reply> {
    let count = match count_arg.parse::<i64>() {
        Ok(n) if n <= 0 => {
            return vec![Reply::Text("❌ The review count must be greater than 0".into())];
        }
        Ok(n) if n as usize > MAX_RECAP => {
            return vec![Reply::Text(format!(
                "❌ At most {MAX_RECAP} words per review"
            ))];
        }
        Ok(n) => n as usize,
        Err(_) => return vec![Reply::Text("❌ Please give a valid number".into())],
    };

    let learned = service.progress.learned_count(user);
    if learned == 0 {
        return vec![Reply::Text(
            "📚 You haven't learned any words yet, start with `vocab`".into(),
        )];
    }

    let mut replies = Vec::new();
    let count = if count > learned {
        replies.push(Reply::Text(format!(
            "⚠️ You have learned {learned} words, reviewing all of them"
        )));
        learned
    } else {
        count
    };

    let words = service.progress.recap_words(&service.bank, user, count);
    if words.is_empty() {
        replies.push(Reply::Text("❌ Nothing to review".into()));
        return replies;
    }

    replies.push(Reply::Text(format!("📖 Reviewing {} words...", words.len())));
    let total = words.len();
    for (idx, word) in words.into_iter().enumerate() {
        replies.push(Reply::Text(format!("[{}/{total}] {}", idx + 1, word.word)));
        let name = word.word.clone();
        match service.render_card(word).await {
            Ok(png) => replies.push(Reply::Image(png)),
            Err(e) => {
                tracing::error!("Recap card for '{name}' failed: {e:#}");
                replies.push(Reply::Text(format!("❌ Card generation failed: {name}")));
            }
        }
    }
    replies.push(Reply::Text(format!("✅ Review done, {total} words covered")));
    replies
}

fn handle_status(service: &Service, user: &str) -> Vec<Reply> {
    let status = service.progress.status(&service.bank, Some(user));
    let percent = if status.total > 0 {
        status.sent * 100 / status.total
    } else {
        0
    };
    let last = if status.last_date.is_empty() {
        "never".to_string()
    } else {
        status.last_date
    };
    vec![Reply::Text(format!(
        "📊 Learning progress\n━━━━━━━━━━━━━━━━\n  - learned: {} / {}\n  - complete: {percent}%\n  - last seen: {last}\n━━━━━━━━━━━━━━━━",
        status.sent, status.total
    ))]
}

fn handle_register(service: &Service, destination: &str) -> Vec<Reply> {
    match service.registry.register(destination) {
        Ok(true) => vec![Reply::Text(format!(
            "Registered! 🎉\nThe daily card arrives at {}",
            service.push_at
        ))],
        Ok(false) => vec![Reply::Text("This destination is already registered ✅".into())],
        Err(e) => error_reply("Registration failed", e),
    }
}

fn handle_unregister(service: &Service, destination: &str) -> Vec<Reply> {
    match service.registry.unregister(destination) {
        Ok(true) => vec![Reply::Text("Unregistered 👋".into())],
        Ok(false) => vec![Reply::Text("This destination is not registered ❌".into())],
        Err(e) => error_reply("Unregistration failed", e),
    }
}

async fn handle_preview(service: &Service, name: Option<&str>) -> Vec<Reply> {
    let word = match name {
        Some(name) => match service.bank.get(name) {
            Some(word) => word.clone(),
            None => return vec![Reply::Text(format!("No such word: {name}"))],
        },
        None => match service.bank.random() {
            Some(word) => word.clone(),
            None => return vec![Reply::Text("No words available".into())],
        },
    };

    let mut replies = vec![Reply::Text(preview_summary(&word))];
    match service.render_card(word).await {
        Ok(png) => replies.push(Reply::Image(png)),
        Err(e) => replies.push(Reply::Text(format!("❌ Card generation failed: {e}"))),
    }
    replies
}

fn preview_summary(word: &Word) -> String {
    format!(
        "🔍 Preview\n━━━━━━━━━━━━━━━━\n📝 word: {}\n🔊 phonetic: {}\n📚 pos: {}\n📖 definition: {}\n💬 example: {}\n━━━━━━━━━━━━━━━━",
        word.word,
        word.phonetic,
        word.pos,
        word.definition,
        truncate(&word.example, 50)
    )
}

async fn handle_now(service: &Service) -> Vec<Reply> {
    let targets = service.registry.len();
    if targets == 0 {
        return vec![Reply::Text(
            "⚠️ No registered destinations, use `register` first".into(),
        )];
    }

    let mut replies = vec![Reply::Text(format!(
        "🚀 Pushing to {targets} registered destinations..."
    ))];
    match service.generate_daily_card().await {
        Ok(Some(word)) => replies.push(Reply::Text(format!("✅ Card generated: {}", word.word))),
        Ok(None) => {
            replies.push(Reply::Text("❌ No word available for the card".into()));
            return replies;
        }
        Err(e) => {
            replies.extend(error_reply("Card generation failed", e));
            return replies;
        }
    }

    match service.push_daily_card().await {
        Ok(report) => replies.push(Reply::Text(format!(
            "✅ Push complete: {}/{}",
            report.delivered, report.targets
        ))),
        Err(e) => replies.extend(error_reply("Push failed", e)),
    }
    replies
}

async fn handle_test(
    service: &Arc<Service>,
    user: &str,
    destination: &str,
    delay_arg: &str,
) -> Vec<Reply> {
    let delay = delay_arg.parse::<u64>().unwrap_or(0);

    if delay == 0 {
        // Quick self-test: one card for the caller, progress recorded.
        let word = match service
            .progress
            .select_word(&service.bank, Some(user), service.mode)
        {
            Ok(Some(word)) => word,
            Ok(None) => return vec![Reply::Text("No words available".into())],
            Err(e) => return error_reply("Word selection failed", e),
        };
        let mut replies = vec![Reply::Text(format!("📚 Test word: {}", word.word))];
        match service.render_card(word.clone()).await {
            Ok(png) => {
                replies.push(Reply::Image(png));
                if let Err(e) = service.progress.mark_sent(
                    &service.bank,
                    Some(user),
                    &word.word,
                    &service.today(),
                ) {
                    tracing::error!("Failed to record progress: {e:#}");
                }
            }
            Err(e) => replies.extend(error_reply("Card generation failed", e)),
        }
        return replies;
    }

    // Full pipeline test: temporarily register the caller, run the daily
    // generate+push after the delay, then restore the registry.
    let mut replies = Vec::new();
    let temporary = !service.registry.contains(destination);
    if temporary {
        if let Err(e) = service.registry.register(destination) {
            return error_reply("Registration failed", e);
        }
        replies.push(Reply::Text("✅ Temporarily registered this destination".into()));
    } else {
        replies.push(Reply::Text("ℹ️ This destination is already registered".into()));
    }

    replies.push(Reply::Text(format!(
        "⏰ Running the full generate+push pipeline in {delay}s"
    )));

    let service = service.clone();
    let destination = destination.to_string();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(delay)).await;
        if let Err(e) = service
            .host
            .send_text(&destination, "⏱️ Time's up, running the test pipeline...")
            .await
        {
            tracing::warn!("Test notice to {destination} failed: {e:#}");
        }
        if let Err(e) = service.generate_daily_card().await {
            tracing::error!("Test generate failed: {e:#}");
        } else if let Err(e) = service.push_daily_card().await {
            tracing::error!("Test push failed: {e:#}");
        }
        if temporary && let Err(e) = service.registry.unregister(&destination) {
            tracing::error!("Failed to restore registry: {e:#}");
        }
    });

    replies
}

fn error_reply(what: &str, e: anyhow::Error) -> Vec<Reply> {
    tracing::error!("{what}: {e:#}");
    vec![Reply::Text(format!("❌ {what}: {e}"))]
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let cut: String = s.chars().take(max_chars).collect();
    format!("{cut}...")
}
