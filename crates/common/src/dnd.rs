use crate::preferences::NotificationPreference;
use chrono::{NaiveTime, Timelike};

/// Parses an `HH:MM` string into a `NaiveTime`, returning `None` on any
/// malformed input rather than erroring — a bad DND string should fail
/// open (never suppress delivery), not crash the evaluator.
fn parse_hhmm(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M").ok()
}

/// True if `now` falls within the user's configured DND window. Handles
/// windows that wrap past midnight (e.g. 22:00-07:00). Evaluated in the
/// user's local time if `preference.timezone` parses, else UTC.
pub fn is_within_dnd(preference: &NotificationPreference, now: chrono::DateTime<chrono::Utc>) -> bool {
    if !preference.dnd_enabled {
        return false;
    }
    let (Some(start), Some(end)) = (preference.dnd_start.as_deref(), preference.dnd_end.as_deref()) else {
        return false;
    };
    let (Some(start), Some(end)) = (parse_hhmm(start), parse_hhmm(end)) else {
        return false;
    };

    let local_time = preference
        .timezone
        .as_deref()
        .and_then(|tz| tz.parse::<chrono_tz::Tz>().ok())
        .map(|tz| now.with_timezone(&tz).time())
        .unwrap_or_else(|| now.time());

    let current = NaiveTime::from_hms_opt(local_time.hour(), local_time.minute(), local_time.second()).unwrap_or(local_time);

    if start <= end {
        current >= start && current < end
    } else {
        current >= start || current < end
    }
}

/// Whether a notification of `event_type` should be delivered at all for
/// this user on this channel, combining mute preference and DND gating.
/// DND suppresses delivery but the notification is still recorded in
/// history — this function only answers "should we push
/// to a channel right now", not "should we create the history row".
pub fn should_deliver_now(preference: &NotificationPreference, event_type: crate::events::EventType, now: chrono::DateTime<chrono::Utc>) -> bool {
    !preference.is_muted(event_type) && !is_within_dnd(preference, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventType;

    fn prefs_with_dnd(start: &str, end: &str, timezone: Option<&str>) -> NotificationPreference {
        let mut prefs = NotificationPreference::default_for("user-1");
        prefs.dnd_enabled = true;
        prefs.dnd_start = Some(start.to_string());
        prefs.dnd_end = Some(end.to_string());
        prefs.timezone = timezone.map(|t| t.to_string());
        prefs
    }

    #[test]
    fn dnd_disabled_never_suppresses() {
        let prefs = NotificationPreference::default_for("user-1");
        assert!(!is_within_dnd(&prefs, chrono::Utc::now()));
    }

    #[test]
    fn wrapping_window_spans_midnight() {
        let prefs = prefs_with_dnd("22:00", "07:00", None);
        let at_23 = chrono::Utc::now().date_naive().and_hms_opt(23, 0, 0).unwrap().and_utc();
        let at_06 = chrono::Utc::now().date_naive().and_hms_opt(6, 0, 0).unwrap().and_utc();
        let at_12 = chrono::Utc::now().date_naive().and_hms_opt(12, 0, 0).unwrap().and_utc();
        assert!(is_within_dnd(&prefs, at_23));
        assert!(is_within_dnd(&prefs, at_06));
        assert!(!is_within_dnd(&prefs, at_12));
    }

    #[test]
    fn should_deliver_respects_mute() {
        let mut prefs = NotificationPreference::default_for("user-1");
        prefs.muted_types.insert(EventType::Like);
        assert!(!should_deliver_now(&prefs, EventType::Like, chrono::Utc::now()));
        assert!(should_deliver_now(&prefs, EventType::Comment, chrono::Utc::now()));
    }
}
