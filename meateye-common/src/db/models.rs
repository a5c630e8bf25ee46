//! Database models

use crate::parts::CanonicalPart;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = crate::Error;

            fn from_str(s: &str) -> crate::Result<Self> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(crate::Error::Internal(format!(
                        "Unknown {} value: {}",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

/// Lifecycle state of a stored item; `Consumed` is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Stored,
    Consumed,
}

text_enum!(ItemStatus {
    Stored => "stored",
    Consumed => "consumed",
});

/// Persisted notification status
///
/// `InFlight` is the claim marker a sweep worker sets before dispatch.
/// `Cancelled` marks intents superseded by recomputation or orphaned by
/// consumption/deletion; sweeps never select it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Pending,
    InFlight,
    Sent,
    Failed,
    Cancelled,
}

text_enum!(NotificationStatus {
    Pending => "pending",
    InFlight => "in_flight",
    Sent => "sent",
    Failed => "failed",
    Cancelled => "cancelled",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    ExpiryAlert,
    Custom,
}

text_enum!(NotificationType {
    ExpiryAlert => "expiry_alert",
    Custom => "custom",
});

/// Which expiry alert an intent represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Lead-time alert, `alert_before` days ahead of expiry
    ExpiringSoon,
    /// Alert on (or after) the expiry date itself
    Expired,
}

text_enum!(AlertKind {
    ExpiringSoon => "expiring_soon",
    Expired => "expired",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryChannel {
    Push,
    InApp,
}

text_enum!(DeliveryChannel {
    Push => "push",
    InApp => "in_app",
});

/// Traceability data copied onto an item at ingestion time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceSnapshot {
    pub trace_number: Option<String>,
    pub slaughter_date: Option<NaiveDate>,
    pub grade: Option<String>,
    pub origin: Option<String>,
    pub company_name: Option<String>,
}

impl TraceSnapshot {
    pub fn is_empty(&self) -> bool {
        self.trace_number.is_none()
            && self.slaughter_date.is_none()
            && self.grade.is_none()
            && self.origin.is_none()
            && self.company_name.is_none()
    }
}

/// One physical stored cut of meat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FridgeItem {
    pub id: Uuid,
    pub member_id: Uuid,
    pub part: Option<CanonicalPart>,
    pub custom_name: Option<String>,
    pub storage_date: NaiveDate,
    pub expiry_date: NaiveDate,
    /// When the member plans to eat it; informational only
    pub desired_consumption_date: Option<NaiveDate>,
    pub trace: TraceSnapshot,
    pub status: ItemStatus,
    /// Days before expiry to send the lead-time alert; 0 disables it
    pub alert_before: u32,
    pub use_push: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FridgeItem {
    /// Custom name when set, otherwise the part's display name
    pub fn display_name(&self) -> String {
        match (&self.custom_name, self.part) {
            (Some(name), _) => name.clone(),
            (None, Some(part)) => part.display_name().to_string(),
            (None, None) => "Unknown".to_string(),
        }
    }

    /// Days until expiry relative to `today`; negative once expired
    pub fn d_day(&self, today: NaiveDate) -> i64 {
        (self.expiry_date - today).num_days()
    }

    pub fn is_consumed(&self) -> bool {
        self.status == ItemStatus::Consumed
    }
}

/// One scheduled or historical alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationIntent {
    pub id: Uuid,
    pub member_id: Uuid,
    /// Non-owning back-reference, cleared when the item is deleted
    pub fridge_item_id: Option<Uuid>,
    pub notification_type: NotificationType,
    pub alert_kind: Option<AlertKind>,
    pub title: String,
    pub body: String,
    pub scheduled_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub status: NotificationStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub channel: Option<DeliveryChannel>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Push endpoint registered by a member's client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSubscription {
    pub id: Uuid,
    pub member_id: Uuid,
    pub endpoint: String,
    pub p256dh_key: String,
    pub auth_key: String,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(custom_name: Option<&str>, part: Option<CanonicalPart>) -> FridgeItem {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        FridgeItem {
            id: Uuid::new_v4(),
            member_id: Uuid::new_v4(),
            part,
            custom_name: custom_name.map(str::to_string),
            storage_date: today,
            expiry_date: today + chrono::Duration::days(3),
            desired_consumption_date: None,
            trace: TraceSnapshot::default(),
            status: ItemStatus::Stored,
            alert_before: 3,
            use_push: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_status_text_roundtrip() {
        for status in [
            NotificationStatus::Pending,
            NotificationStatus::InFlight,
            NotificationStatus::Sent,
            NotificationStatus::Failed,
            NotificationStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<NotificationStatus>().unwrap(), status);
        }
        assert!("bogus".parse::<NotificationStatus>().is_err());
        assert_eq!(ItemStatus::Consumed.to_string(), "consumed");
        assert_eq!(AlertKind::ExpiringSoon.as_str(), "expiring_soon");
    }

    #[test]
    fn test_display_name_prefers_custom_name() {
        assert_eq!(item(Some("Sunday roast"), Some(CanonicalPart::BeefRib)).display_name(), "Sunday roast");
        assert_eq!(item(None, Some(CanonicalPart::PorkBelly)).display_name(), "돼지/삼겹살");
        assert_eq!(item(None, None).display_name(), "Unknown");
    }

    #[test]
    fn test_d_day_goes_negative_after_expiry() {
        let it = item(Some("x"), None);
        assert_eq!(it.d_day(it.storage_date), 3);
        assert_eq!(it.d_day(it.expiry_date), 0);
        assert_eq!(it.d_day(it.expiry_date + chrono::Duration::days(2)), -2);
    }

    #[test]
    fn test_trace_snapshot_is_empty() {
        assert!(TraceSnapshot::default().is_empty());
        let snapshot = TraceSnapshot {
            grade: Some("1++".to_string()),
            ..Default::default()
        };
        assert!(!snapshot.is_empty());
    }
}
