use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, NaiveDateTime, NaiveTime, Timelike};

use crate::config::ScheduleConfig;
use crate::service::Service;

/// Daily two-step cycle: generate the card at `generate_at`, push it at
/// `push_at`. Sleeps coarsely until ~30s before the next target, then
/// precisely, so a long sleep never overshoots a slot.
pub struct Scheduler {
    service: Arc<Service>,
    generate_at: NaiveTime,
    push_at: NaiveTime,
}

impl Scheduler {
    pub fn new(service: Arc<Service>, config: &ScheduleConfig) -> Self {
        let generate_at = parse_hhmm(&config.generate_at).unwrap_or_else(|| {
            tracing::warn!("Bad generate_at '{}', using 07:30", config.generate_at);
            NaiveTime::from_hms_opt(7, 30, 0).unwrap()
        });
        let push_at = parse_hhmm(&config.push_at).unwrap_or_else(|| {
            tracing::warn!("Bad push_at '{}', using 08:00", config.push_at);
            NaiveTime::from_hms_opt(8, 0, 0).unwrap()
        });
        Self {
            service,
            generate_at,
            push_at,
        }
    }

    pub async fn run(self) {
        tracing::info!(
            "Scheduler running: generate {} / push {}",
            self.generate_at.format("%H:%M"),
            self.push_at.format("%H:%M")
        );
        let mut generated_today = false;
        let mut last_check_date = String::new();
        loop {
            if let Err(e) = self
                .cycle(&mut generated_today, &mut last_check_date)
                .await
            {
                tracing::error!("Scheduler cycle failed: {e:#}");
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
        }
    }

    async fn cycle(
        &self,
        generated_today: &mut bool,
        last_check_date: &mut String,
    ) -> anyhow::Result<()> {
        let now = self.service.now().naive_local();
        let today = now.format("%Y-%m-%d").to_string();
        if *last_check_date != today {
            *generated_today = false;
            *last_check_date = today;
        }

        let target = next_target(now, *generated_today, self.generate_at, self.push_at);
        let wait = (target - now).num_seconds();
        if wait > 60 {
            tracing::debug!("Next slot in {wait}s, coarse sleep");
            tokio::time::sleep(Duration::from_secs((wait - 30) as u64)).await;
            return Ok(());
        }
        if wait > 0 {
            tokio::time::sleep(Duration::from_secs(wait as u64)).await;
        }

        let now = self.service.now().naive_local();
        if at_slot(now, self.generate_at) && !*generated_today {
            self.service.generate_daily_card().await?;
            *generated_today = true;
        }
        if at_slot(now, self.push_at) {
            self.service.push_daily_card().await?;
        }

        // Skip past the minute so one slot never fires twice.
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok(())
    }
}

fn at_slot(now: NaiveDateTime, slot: NaiveTime) -> bool {
    now.hour() == slot.hour() && now.minute() == slot.minute()
}

pub fn parse_hhmm(s: &str) -> Option<NaiveTime> {
    let (h, m) = s.split_once(':')?;
    NaiveTime::from_hms_opt(h.trim().parse().ok()?, m.trim().parse().ok()?, 0)
}

/// The nearest future slot: today's generate (unless done), today's push,
/// or failing both, tomorrow's generate.
fn next_target(
    now: NaiveDateTime,
    generated_today: bool,
    generate_at: NaiveTime,
    push_at: NaiveTime,
) -> NaiveDateTime {
    let today = now.date();
    let mut targets = Vec::new();

    let generate = today.and_time(generate_at);
    if !generated_today && generate > now {
        targets.push(generate);
    }
    let push = today.and_time(push_at);
    if push > now {
        targets.push(push);
    }

    targets.into_iter().min().unwrap_or_else(|| {
        today
            .checked_add_days(Days::new(1))
            .unwrap_or(today)
            .and_time(generate_at)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 8, 7)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_parse_hhmm() {
        assert_eq!(parse_hhmm("07:30"), Some(t(7, 30)));
        assert_eq!(parse_hhmm("8:05"), Some(t(8, 5)));
        assert_eq!(parse_hhmm("24:00"), None);
        assert_eq!(parse_hhmm("0800"), None);
        assert_eq!(parse_hhmm("a:b"), None);
    }

    #[test]
    fn test_next_target_before_generate() {
        let target = next_target(dt(6, 0), false, t(7, 30), t(8, 0));
        assert_eq!(target, dt(7, 30));
    }

    #[test]
    fn test_next_target_between_slots() {
        let target = next_target(dt(7, 45), true, t(7, 30), t(8, 0));
        assert_eq!(target, dt(8, 0));
    }

    #[test]
    fn test_next_target_generated_flag_skips_generate() {
        // Generate slot is still ahead but already done today.
        let target = next_target(dt(6, 0), true, t(7, 30), t(8, 0));
        assert_eq!(target, dt(8, 0));
    }

    #[test]
    fn test_next_target_rolls_to_tomorrow() {
        let target = next_target(dt(9, 0), true, t(7, 30), t(8, 0));
        assert_eq!(
            target,
            NaiveDate::from_ymd_opt(2026, 8, 8)
                .unwrap()
                .and_hms_opt(7, 30, 0)
                .unwrap()
        );
    }

    #[test]
    fn test_at_slot_matches_minute() {
        assert!(at_slot(dt(8, 0), t(8, 0)));
        assert!(!at_slot(dt(8, 1), t(8, 0)));
    }
}
