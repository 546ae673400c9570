//! Idempotent condition setter (spec.md §4.6).
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Truth value of a [`Condition`], mirroring `metav1.ConditionStatus`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// One status condition on a parent CR.
///
/// Deliberately a local type rather than `k8s_openapi`'s `meta::v1::Condition`
/// directly: `last_transition_time` bookkeeping here is owned by
/// [`set_condition`], not by the apiserver, so the shape is controlled here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: ConditionStatus,
    pub reason: String,
    pub message: String,
    #[serde(rename = "lastTransitionTime", skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<Time>,
}

impl Condition {
    pub fn new(type_: impl Into<String>, status: ConditionStatus, reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_: type_.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: None,
        }
    }

    pub fn is_true(&self) -> bool {
        self.status == ConditionStatus::True
    }
}

/// Replace-by-type; preserves `last_transition_time` when neither `status`
/// nor `reason` changed (spec.md §4.6).
pub fn set_condition(conditions: &mut Vec<Condition>, mut new: Condition, now: Time) {
    match conditions.iter_mut().find(|c| c.type_ == new.type_) {
        Some(existing) => {
            let unchanged = existing.status == new.status && existing.reason == new.reason;
            new.last_transition_time = if unchanged {
                existing.last_transition_time.clone()
            } else {
                Some(now)
            };
            *existing = new;
        }
        None => {
            new.last_transition_time = Some(now);
            conditions.push(new);
        }
    }
}

/// Look up a condition by type.
pub fn find_condition<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}

/// `true` iff a condition of this type is present and `status == True`.
pub fn is_condition_true(conditions: &[Condition], type_: &str) -> bool {
    find_condition(conditions, type_).is_some_and(Condition::is_true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time(secs: i64) -> Time {
        Time(chrono::DateTime::from_timestamp(secs, 0).unwrap())
    }

    #[test]
    fn new_condition_gets_transition_time() {
        let mut conds = Vec::new();
        set_condition(
            &mut conds,
            Condition::new("Ready", ConditionStatus::True, "AllGood", "ok"),
            time(100),
        );
        assert_eq!(conds[0].last_transition_time, Some(time(100)));
    }

    #[test]
    fn unchanged_status_and_reason_preserves_transition_time() {
        let mut conds = vec![Condition {
            last_transition_time: Some(time(100)),
            ..Condition::new("Ready", ConditionStatus::True, "AllGood", "ok")
        }];
        set_condition(
            &mut conds,
            Condition::new("Ready", ConditionStatus::True, "AllGood", "still ok, new message"),
            time(200),
        );
        assert_eq!(conds[0].last_transition_time, Some(time(100)));
        assert_eq!(conds[0].message, "still ok, new message");
    }

    #[test]
    fn status_change_bumps_transition_time() {
        let mut conds = vec![Condition {
            last_transition_time: Some(time(100)),
            ..Condition::new("Ready", ConditionStatus::True, "AllGood", "ok")
        }];
        set_condition(
            &mut conds,
            Condition::new("Ready", ConditionStatus::False, "Broken", "oh no"),
            time(200),
        );
        assert_eq!(conds[0].last_transition_time, Some(time(200)));
    }

    #[test]
    fn reason_change_alone_bumps_transition_time() {
        let mut conds = vec![Condition {
            last_transition_time: Some(time(100)),
            ..Condition::new("Ready", ConditionStatus::True, "AllGood", "ok")
        }];
        set_condition(
            &mut conds,
            Condition::new("Ready", ConditionStatus::True, "StillGoodDifferentReason", "ok"),
            time(200),
        );
        assert_eq!(conds[0].last_transition_time, Some(time(200)));
    }
}
