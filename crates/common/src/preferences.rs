use crate::events::EventType;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Per-user delivery preferences, including opt-in channels and a DND
/// window. `timezone` drives whether the DND window is evaluated in the
/// user's local time or UTC — see [`crate::dnd::is_within_dnd`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPreference {
    pub user_id: String,
    pub push_enabled: bool,
    pub email_enabled: bool,
    pub sms_enabled: bool,
    /// Event types this user has opted out of entirely; empty means all
    /// enabled.
    pub muted_types: HashSet<EventType>,
    pub dnd_enabled: bool,
    /// `HH:MM` in the user's local time (or UTC if `timezone` is `None`).
    pub dnd_start: Option<String>,
    pub dnd_end: Option<String>,
    pub timezone: Option<String>,
    pub email_address: Option<String>,
    pub phone_number: Option<String>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl NotificationPreference {
    pub fn default_for(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            push_enabled: true,
            email_enabled: true,
            sms_enabled: false,
            muted_types: HashSet::new(),
            dnd_enabled: false,
            dnd_start: None,
            dnd_end: None,
            timezone: None,
            email_address: None,
            phone_number: None,
            updated_at: chrono::Utc::now(),
        }
    }

    pub fn is_muted(&self, event_type: EventType) -> bool {
        self.muted_types.contains(&event_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_opted_in_except_sms() {
        let prefs = NotificationPreference::default_for("user-1");
        assert!(prefs.push_enabled);
        assert!(prefs.email_enabled);
        assert!(!prefs.sms_enabled);
        assert!(!prefs.is_muted(EventType::Like));
    }
}
