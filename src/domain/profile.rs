// ============================================================
// Layer 3 — Activity Profile Fixes
// ============================================================
// Interactive callers can type impossible activity profiles,
// e.g. sessions without a single active day. These rules nudge
// such records back to something the models have seen, and
// report every change so nothing happens silently.
//
// Rules only touch fields that are present; they never add one.

use serde::Serialize;

use crate::domain::record::FeatureRecord;

const SESSIONS: &str = "sessions_7d";
const ACTIVE_DAYS: &str = "active_days_7d";
const PER_SESSION: [&str; 3] = [
    "avg_turns_per_session_7d",
    "tokens_per_session_7d",
    "model_switch_rate_7d",
];

/// One applied change, e.g. `active_days_7d: 0 -> 1`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileFix {
    pub field:  String,
    pub from:   f64,
    pub to:     f64,
    pub reason: String,
}

/// Apply the realism rules in place and return what changed.
pub fn normalize_profile(record: &mut FeatureRecord) -> Vec<ProfileFix> {
    let mut fixes = Vec::new();

    if let (Some(sessions), Some(days)) = (record.number(SESSIONS), record.number(ACTIVE_DAYS)) {
        if sessions > 0.0 && days == 0.0 {
            set(record, &mut fixes, ACTIVE_DAYS, days, 1.0, format!("{SESSIONS} > 0"));
        }
    }

    if let (Some(sessions), Some(days)) = (record.number(SESSIONS), record.number(ACTIVE_DAYS)) {
        if days > 0.0 && sessions == 0.0 {
            set(record, &mut fixes, SESSIONS, sessions, days, format!("{ACTIVE_DAYS} > 0"));
        }
    }

    if record.number(SESSIONS) == Some(0.0) {
        for field in PER_SESSION {
            if let Some(v) = record.number(field) {
                if v != 0.0 {
                    set(record, &mut fixes, field, v, 0.0, format!("{SESSIONS} = 0"));
                }
            }
        }
    }

    fixes
}

fn set(
    record: &mut FeatureRecord,
    fixes:  &mut Vec<ProfileFix>,
    field:  &str,
    from:   f64,
    to:     f64,
    reason: String,
) {
    tracing::debug!(field, from, to, "profile fix: {reason}");
    record.insert(field, to);
    fixes.push(ProfileFix { field: field.to_string(), from, to, reason });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sessions_without_active_days() {
        let mut rec = FeatureRecord::new().with(SESSIONS, 4.0).with(ACTIVE_DAYS, 0.0);
        let fixes = normalize_profile(&mut rec);
        assert_eq!(fixes.len(), 1);
        assert_eq!(rec.number(ACTIVE_DAYS), Some(1.0));
    }

    #[test]
    fn test_active_days_without_sessions_and_per_session_reset() {
        let mut rec = FeatureRecord::new()
            .with(SESSIONS, 0.0)
            .with(ACTIVE_DAYS, 3.0)
            .with("tokens_per_session_7d", 250.0);
        let fixes = normalize_profile(&mut rec);
        // sessions becomes 3, so per-session metrics stay untouched
        assert_eq!(fixes.len(), 1);
        assert_eq!(rec.number(SESSIONS), Some(3.0));
        assert_eq!(rec.number("tokens_per_session_7d"), Some(250.0));
    }

    #[test]
    fn test_idle_profile_zeroes_per_session_metrics() {
        let mut rec = FeatureRecord::new()
            .with(SESSIONS, 0.0)
            .with(ACTIVE_DAYS, 0.0)
            .with("avg_turns_per_session_7d", 8.0)
            .with("tokens_per_session_7d", 300.0)
            .with("model_switch_rate_7d", 0.0);
        let fixes = normalize_profile(&mut rec);
        assert_eq!(fixes.len(), 2);
        assert_eq!(rec.number("avg_turns_per_session_7d"), Some(0.0));
        assert_eq!(rec.number("tokens_per_session_7d"), Some(0.0));
    }

    #[test]
    fn test_missing_fields_are_never_added() {
        let mut rec = FeatureRecord::new().with(SESSIONS, 0.0);
        assert!(normalize_profile(&mut rec).is_empty());
        assert_eq!(rec.len(), 1);
    }
}
