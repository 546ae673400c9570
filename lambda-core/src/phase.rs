//! `derivePhase`: deterministic table from condition truth assignment to
//! phase (spec.md §4.6, invariant 9).
use crate::agent::{conditions as ac, AgentPhase};
use crate::condition::{is_condition_true, Condition};
use crate::function::{conditions as fc, FunctionPhase};

/// Reasons that mark a condition's falseness as *terminal* (no further
/// progress axis viable) rather than merely in-progress.
const TERMINAL_REASONS: &[&str] = &["MaxAttempts", "ForwardNotAllowed"];

fn is_terminal_false(conditions: &[Condition], type_: &str) -> bool {
    conditions
        .iter()
        .find(|c| c.type_ == type_)
        .is_some_and(|c| !c.is_true() && TERMINAL_REASONS.contains(&c.reason.as_str()))
}

/// Derive a [`FunctionPhase`] from the current condition set.
///
/// `eventing_enabled` gates whether `EventingReady` participates in the
/// readiness conjunction (invariant 9).
pub fn derive_function_phase(conditions: &[Condition], eventing_enabled: bool) -> FunctionPhase {
    if is_condition_true(conditions, fc::SPEC_INVALID) {
        return FunctionPhase::Failed;
    }
    // SpecInvalid absent means not yet checked or checked-and-passed; a
    // *present* False SpecInvalid would have returned above, so presence
    // with False here cannot happen without is_condition_true catching it.
    let source_ready = is_condition_true(conditions, fc::SOURCE_READY);
    let build_ready = is_condition_true(conditions, fc::BUILD_READY);
    let eventing_ready = !eventing_enabled || is_condition_true(conditions, fc::EVENTING_READY);
    let service_ready = is_condition_true(conditions, fc::SERVICE_READY);

    if source_ready && build_ready && eventing_ready && service_ready {
        return FunctionPhase::Ready;
    }
    if is_terminal_false(conditions, fc::BUILD_READY) || is_terminal_false(conditions, fc::DEPLOY_READY) {
        return FunctionPhase::Failed;
    }
    if !source_ready {
        return FunctionPhase::Pending;
    }
    if !build_ready {
        return FunctionPhase::Building;
    }
    if !eventing_ready || !service_ready {
        return FunctionPhase::Deploying;
    }
    // Ambiguity (e.g. conflicting Unknown) resolves to Pending.
    FunctionPhase::Pending
}

/// Derive an [`AgentPhase`] from the current condition set.
///
/// `ai_gates_ready` is `true` only in `supervised` mode with no
/// `ApprovalReady` condition recorded yet — see `SPEC_FULL.md` §9 Open
/// Question 1: `AIReady` itself never gates `Ready`; `ApprovalReady` does,
/// in supervised mode.
pub fn derive_agent_phase(conditions: &[Condition], eventing_enabled: bool, supervised: bool) -> AgentPhase {
    if is_condition_true(conditions, ac::SPEC_INVALID) {
        return AgentPhase::Failed;
    }
    let permissions_ready = is_condition_true(conditions, ac::PERMISSIONS_READY);
    let service_ready = is_condition_true(conditions, ac::SERVICE_READY);
    let eventing_ready = !eventing_enabled || is_condition_true(conditions, ac::EVENTING_READY);
    let approval_ready = !supervised || is_condition_true(conditions, ac::APPROVAL_READY);

    if is_terminal_false(conditions, ac::PERMISSIONS_READY) {
        return AgentPhase::Failed;
    }

    if permissions_ready && service_ready && eventing_ready && approval_ready {
        return AgentPhase::Ready;
    }
    if !permissions_ready {
        return AgentPhase::Pending;
    }
    if !service_ready || !eventing_ready || !approval_ready {
        return AgentPhase::Deploying;
    }
    AgentPhase::Pending
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::ConditionStatus;

    fn cond(type_: &str, status: ConditionStatus, reason: &str) -> Condition {
        Condition::new(type_, status, reason, "")
    }

    #[test]
    fn function_ready_requires_all_four_axes() {
        let conds = vec![
            cond(fc::SOURCE_READY, ConditionStatus::True, "Resolved"),
            cond(fc::BUILD_READY, ConditionStatus::True, "Prebuilt"),
            cond(fc::EVENTING_READY, ConditionStatus::True, "Ready"),
            cond(fc::SERVICE_READY, ConditionStatus::True, "Ready"),
        ];
        assert_eq!(derive_function_phase(&conds, true), FunctionPhase::Ready);
    }

    #[test]
    fn function_ready_ignores_eventing_when_disabled() {
        let conds = vec![
            cond(fc::SOURCE_READY, ConditionStatus::True, "Resolved"),
            cond(fc::BUILD_READY, ConditionStatus::True, "Prebuilt"),
            cond(fc::SERVICE_READY, ConditionStatus::True, "Ready"),
        ];
        assert_eq!(derive_function_phase(&conds, false), FunctionPhase::Ready);
    }

    #[test]
    fn function_max_attempts_is_terminal_failed() {
        let conds = vec![
            cond(fc::SOURCE_READY, ConditionStatus::True, "Resolved"),
            cond(fc::BUILD_READY, ConditionStatus::False, "MaxAttempts"),
        ];
        assert_eq!(derive_function_phase(&conds, false), FunctionPhase::Failed);
    }

    #[test]
    fn function_building_when_source_ready_but_not_build() {
        let conds = vec![cond(fc::SOURCE_READY, ConditionStatus::True, "Resolved")];
        assert_eq!(derive_function_phase(&conds, false), FunctionPhase::Building);
    }

    #[test]
    fn function_pending_with_no_conditions() {
        assert_eq!(derive_function_phase(&[], false), FunctionPhase::Pending);
    }

    #[test]
    fn agent_ready_requires_permissions_service_and_eventing() {
        let conds = vec![
            cond(ac::PERMISSIONS_READY, ConditionStatus::True, "Allowed"),
            cond(ac::SERVICE_READY, ConditionStatus::True, "Ready"),
            cond(ac::EVENTING_READY, ConditionStatus::True, "Ready"),
        ];
        assert_eq!(derive_agent_phase(&conds, true, false), AgentPhase::Ready);
    }

    #[test]
    fn agent_ai_not_ready_does_not_block_ready_in_autonomous_mode() {
        let conds = vec![
            cond(ac::PERMISSIONS_READY, ConditionStatus::True, "Allowed"),
            cond(ac::SERVICE_READY, ConditionStatus::True, "Ready"),
            cond(ac::EVENTING_READY, ConditionStatus::True, "Ready"),
            cond(ac::AI_READY, ConditionStatus::False, "Unreachable"),
        ];
        assert_eq!(derive_agent_phase(&conds, true, false), AgentPhase::Ready);
    }

    #[test]
    fn agent_supervised_without_approval_stays_deploying() {
        let conds = vec![
            cond(ac::PERMISSIONS_READY, ConditionStatus::True, "Allowed"),
            cond(ac::SERVICE_READY, ConditionStatus::True, "Ready"),
        ];
        assert_eq!(derive_agent_phase(&conds, false, true), AgentPhase::Deploying);
    }

    #[test]
    fn scenario_5_forward_denied_without_other_progress_is_failed() {
        let conds = vec![cond(ac::PERMISSIONS_READY, ConditionStatus::False, "ForwardNotAllowed")];
        assert_eq!(derive_agent_phase(&conds, true, false), AgentPhase::Failed);
    }
}
