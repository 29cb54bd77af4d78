use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Subscription tier. Caps are enforced by the quota gate and are
/// configuration in the store; the defaults live here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Trial,
    Basic,
    Premium,
}

impl Tier {
    pub fn from_db(value: &str) -> Self {
        match value {
            "basic" => Self::Basic,
            "premium" => Self::Premium,
            _ => Self::Trial,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trial => "trial",
            Self::Basic => "basic",
            Self::Premium => "premium",
        }
    }

    pub fn notifications_per_day(&self) -> i64 {
        match self {
            Self::Trial => 20,
            Self::Basic => 50,
            Self::Premium => 100,
        }
    }

    pub fn oracle_calls_per_day(&self) -> i64 {
        match self {
            Self::Trial => 20,
            Self::Basic => 100,
            Self::Premium => 10_000,
        }
    }
}

/// Daily do-not-disturb interval in subscriber-local wall time. The window
/// may span midnight (22:00–09:00). A zero-length window disables it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl QuietHours {
    pub fn contains(&self, local_time: NaiveTime) -> bool {
        if self.start == self.end {
            return false;
        }
        if self.start < self.end {
            local_time >= self.start && local_time < self.end
        } else {
            local_time >= self.start || local_time < self.end
        }
    }
}

/// Subscriber record. Quiet hours, timezone and the blocked flag are typed
/// fields; the free-form `data` pouch only carries legacy flags migrated
/// from the previous schema and is not part of any contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: i64,
    pub chat_id: i64,
    pub tier: Tier,
    #[serde(default)]
    pub quiet_hours: Option<QuietHours>,
    /// IANA zone, e.g. `Europe/Moscow`. Drives quota resets and quiet hours.
    pub tz: Tz,
    #[serde(default)]
    pub delivery_blocked: bool,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Subscriber {
    pub fn local_now(&self, now: DateTime<Utc>) -> DateTime<Tz> {
        now.with_timezone(&self.tz)
    }

    /// Calendar date in the subscriber's zone; the unit of quota accounting.
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        self.local_now(now).date_naive()
    }

    pub fn in_quiet_hours(&self, now: DateTime<Utc>) -> bool {
        match &self.quiet_hours {
            Some(window) => window.contains(self.local_now(now).time()),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn subscriber(tz: &str, quiet: Option<(u32, u32)>) -> Subscriber {
        Subscriber {
            id: 1,
            chat_id: 100,
            tier: Tier::Basic,
            quiet_hours: quiet.map(|(start, end)| QuietHours {
                start: NaiveTime::from_hms_opt(start, 0, 0).unwrap(),
                end: NaiveTime::from_hms_opt(end, 0, 0).unwrap(),
            }),
            tz: tz.parse().unwrap(),
            delivery_blocked: false,
            data: serde_json::Value::Null,
        }
    }

    #[test]
    fn quiet_window_spanning_midnight() {
        let sub = subscriber("Europe/Moscow", Some((22, 9)));
        // 12:00 Moscow == 09:00 UTC
        let noon = Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).single().unwrap();
        assert!(!sub.in_quiet_hours(noon));
        // 23:30 Moscow == 20:30 UTC
        let night = Utc.with_ymd_and_hms(2026, 3, 10, 20, 30, 0).single().unwrap();
        assert!(sub.in_quiet_hours(night));
        // 08:59 Moscow == 05:59 UTC
        let early = Utc.with_ymd_and_hms(2026, 3, 10, 5, 59, 0).single().unwrap();
        assert!(sub.in_quiet_hours(early));
    }

    #[test]
    fn local_date_respects_zone() {
        let sub = subscriber("Asia/Vladivostok", None);
        // 22:00 UTC is already the next day at UTC+10.
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 22, 0, 0).single().unwrap();
        assert_eq!(
            sub.local_date(now),
            NaiveDate::from_ymd_opt(2026, 3, 11).unwrap()
        );
    }

    #[test]
    fn zero_length_window_never_matches() {
        let sub = subscriber("Europe/Moscow", Some((9, 9)));
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 6, 0, 0).single().unwrap();
        assert!(!sub.in_quiet_hours(now));
    }

    #[test]
    fn tier_caps() {
        assert_eq!(Tier::Trial.notifications_per_day(), 20);
        assert_eq!(Tier::Basic.oracle_calls_per_day(), 100);
        assert_eq!(Tier::Premium.oracle_calls_per_day(), 10_000);
    }
}
