use crate::core::sweep::ExpirySweeper;
use chrono::{DateTime, Local, NaiveTime, TimeDelta, TimeZone, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleTimezone {
    Utc,
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    /// 每天固定時間
    Daily {
        at: NaiveTime,
        timezone: ScheduleTimezone,
    },
    Interval(Duration),
}

impl Schedule {
    pub fn daily_utc(at: NaiveTime) -> Self {
        Schedule::Daily {
            at,
            timezone: ScheduleTimezone::Utc,
        }
    }

    /// 下一次觸發時間，一定晚於 `now`
    pub fn next_run_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Schedule::Daily { at, timezone } => match timezone {
                ScheduleTimezone::Utc => next_daily(&Utc, *at, now),
                ScheduleTimezone::Local => next_daily(&Local, *at, now),
            },
            Schedule::Interval(interval) => {
                now + TimeDelta::from_std(*interval).unwrap_or(TimeDelta::days(1))
            }
        }
    }
}

fn next_daily<Tz: TimeZone>(tz: &Tz, at: NaiveTime, now: DateTime<Utc>) -> DateTime<Utc> {
    let today = now.with_timezone(tz).date_naive();
    // 夏令時間跳過的時刻不存在，往後找下一天
    for offset in 0..=2 {
        let Some(date) = today.checked_add_days(chrono::Days::new(offset)) else {
            break;
        };
        if let Some(candidate) = tz.from_local_datetime(&date.and_time(at)).earliest() {
            let candidate = candidate.with_timezone(&Utc);
            if candidate > now {
                return candidate;
            }
        }
    }
    now + TimeDelta::days(1)
}

/// 依排程呼叫 sweep，直到 `shutdown` 完成；進行中的 sweep 不會被中斷
pub struct Scheduler {
    schedule: Schedule,
    sweeper: Arc<ExpirySweeper>,
}

impl Scheduler {
    pub fn new(schedule: Schedule, sweeper: Arc<ExpirySweeper>) -> Self {
        Self { schedule, sweeper }
    }

    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let now = Utc::now();
            let next = self.schedule.next_run_after(now);
            let wait = (next - now).to_std().unwrap_or_default();
            tracing::info!("⏰ Next certificate sweep at {}", next.to_rfc3339());

            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("🛑 Scheduler stopped");
                    return;
                }
                _ = tokio::time::sleep(wait) => {}
            }

            if let Some(report) = self.sweeper.run_and_report().await {
                tracing::debug!("Scheduled sweep report: {:?}", report);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::MemoryStorage;
    use crate::core::registry::DocumentRegistry;
    use crate::core::{CertificateInfo, CertificateProber, Notifier};
    use crate::utils::error::{MonitorError, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn nine() -> NaiveTime {
        NaiveTime::from_hms_opt(9, 0, 0).unwrap()
    }

    #[test]
    fn test_daily_later_today() {
        let next = Schedule::daily_utc(nine()).next_run_after(utc(2026, 10, 19, 7, 30));
        assert_eq!(next, utc(2026, 10, 19, 9, 0));
    }

    #[test]
    fn test_daily_rolls_to_tomorrow() {
        let schedule = Schedule::daily_utc(nine());
        assert_eq!(
            schedule.next_run_after(utc(2026, 10, 19, 9, 0)),
            utc(2026, 10, 20, 9, 0)
        );
        assert_eq!(
            schedule.next_run_after(utc(2026, 12, 31, 23, 59)),
            utc(2027, 1, 1, 9, 0)
        );
    }

    #[test]
    fn test_local_daily_is_in_future() {
        let now = Utc::now();
        let schedule = Schedule::Daily {
            at: nine(),
            timezone: ScheduleTimezone::Local,
        };
        let next = schedule.next_run_after(now);
        assert!(next > now);
        assert!(next - now <= TimeDelta::hours(26));
    }

    #[test]
    fn test_interval() {
        let schedule = Schedule::Interval(Duration::from_secs(3600));
        assert_eq!(
            schedule.next_run_after(utc(2026, 10, 19, 9, 0)),
            utc(2026, 10, 19, 10, 0)
        );
    }

    struct NoProber;

    #[async_trait]
    impl CertificateProber for NoProber {
        async fn check(&self, host: &str) -> Result<()> {
            Err(MonitorError::probe(host, "offline"))
        }
        async fn certificate(&self, host: &str) -> Result<CertificateInfo> {
            Err(MonitorError::probe(host, "offline"))
        }
    }

    #[derive(Default)]
    struct CountingNotifier {
        count: AtomicUsize,
    }

    #[async_trait]
    impl Notifier for CountingNotifier {
        async fn send(&self, _destination: &str, _message: &str) -> Result<()> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_runs_sweeps_until_shutdown() {
        let notifier = Arc::new(CountingNotifier::default());
        let sweeper = ExpirySweeper::new(
            Arc::new(DocumentRegistry::new(MemoryStorage::new())),
            Arc::new(NoProber),
            notifier.clone(),
            "ops",
        );
        let scheduler = Scheduler::new(
            Schedule::Interval(Duration::from_millis(20)),
            Arc::new(sweeper),
        );

        scheduler
            .run_until(tokio::time::sleep(Duration::from_millis(150)))
            .await;

        // 空 registry 每次 sweep 只送一則摘要
        assert!(notifier.count.load(Ordering::SeqCst) >= 2);
    }
}
