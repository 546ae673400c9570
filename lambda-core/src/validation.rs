//! Structural invariant checker (spec.md §4.1, §6.1, §3.2).
//!
//! A pure function from spec to an ordered sequence of [`Violation`]s. Run
//! both at admission time and defensively inside the reconciler, since a
//! spec may arrive from a peer controller before admission (spec.md §4.1).
use crate::agent::AgentSpec;
use crate::error::{Violation, Violations};
use crate::function::FunctionSpec;

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn check_length(field: &str, s: &str, min: usize, max: usize, violations: &mut Violations) {
    if s.len() < min || s.len() > max {
        violations.push(Violation::LengthOutOfRange {
            field: field.to_string(),
            actual: s.len(),
            min,
            max,
        });
    }
}

/// `^[A-Za-z0-9][-A-Za-z0-9.]*[A-Za-z0-9](:[0-9]{1,5})?$`, <=253 chars.
fn check_endpoint(field: &str, s: &str, violations: &mut Violations) {
    check_length(field, s, 1, 253, violations);
    let (host, port) = match s.rsplit_once(':') {
        Some((h, p)) if p.chars().all(|c| c.is_ascii_digit()) && !p.is_empty() && p.len() <= 5 => (h, Some(p)),
        _ => (s, None),
    };
    let host_ok = {
        let chars: Vec<char> = host.chars().collect();
        !chars.is_empty()
            && chars[0].is_ascii_alphanumeric()
            && chars[chars.len() - 1].is_ascii_alphanumeric()
            && chars.iter().all(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '.')
    };
    if !host_ok || (port.is_none() && s.contains(':')) {
        violations.push(Violation::Pattern {
            field: field.to_string(),
            message: "must be a host[:port] matching ^[A-Za-z0-9][-A-Za-z0-9.]*[A-Za-z0-9](:[0-9]{1,5})?$".into(),
        });
    }
}

/// 3-63 chars, lowercase/digits/dots/hyphens, start/end alphanumeric.
fn check_bucket(field: &str, s: &str, violations: &mut Violations) {
    check_length(field, s, 3, 63, violations);
    let chars: Vec<char> = s.chars().collect();
    let ok = !chars.is_empty()
        && chars[0].is_ascii_alphanumeric()
        && chars[chars.len() - 1].is_ascii_alphanumeric()
        && chars.iter().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '.' || *c == '-');
    if !ok {
        violations.push(Violation::Pattern {
            field: field.to_string(),
            message: "must be lowercase alphanumeric/./- and start/end alphanumeric".into(),
        });
    }
}

/// 1-1024 chars, `[A-Za-z0-9!_.*'()/-]+`.
fn check_object_key(field: &str, s: &str, violations: &mut Violations) {
    check_length(field, s, 1, 1024, violations);
    let ok = !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "!_.*'()/-".contains(c));
    if !ok {
        violations.push(Violation::Pattern {
            field: field.to_string(),
            message: "must match [A-Za-z0-9!_.*'()/-]+".into(),
        });
    }
}

/// `^[a-z]{2}-[a-z]+-[0-9]+$`.
fn check_region(field: &str, s: &str, violations: &mut Violations) {
    let parts: Vec<&str> = s.split('-').collect();
    let ok = parts.len() == 3
        && parts[0].len() == 2
        && parts[0].chars().all(|c| c.is_ascii_lowercase())
        && !parts[1].is_empty()
        && parts[1].chars().all(|c| c.is_ascii_lowercase())
        && !parts[2].is_empty()
        && parts[2].chars().all(|c| c.is_ascii_digit());
    if !ok {
        violations.push(Violation::Pattern {
            field: field.to_string(),
            message: "must match ^[a-z]{2}-[a-z]+-[0-9]+$".into(),
        });
    }
}

/// https/git/ssh-style, <=2048 chars, no control characters.
fn check_git_url(field: &str, s: &str, violations: &mut Violations) {
    check_length(field, s, 1, 2048, violations);
    let scheme_ok = s.starts_with("https://") || s.starts_with("git://") || s.starts_with("ssh://") || s.contains('@');
    let no_control = !s.chars().any(|c| c.is_control());
    if !scheme_ok || !no_control {
        violations.push(Violation::Pattern {
            field: field.to_string(),
            message: "must be an https/git/ssh-style URL with no control characters".into(),
        });
    }
}

/// `^[A-Za-z0-9][A-Za-z0-9._/-]*$`; no `..` segments.
fn check_git_ref_or_path(field: &str, s: &str, violations: &mut Violations) {
    if s.is_empty() {
        return;
    }
    let chars: Vec<char> = s.chars().collect();
    let ok = chars[0].is_ascii_alphanumeric()
        && chars.iter().all(|c| c.is_ascii_alphanumeric() || "._/-".contains(*c));
    let no_dotdot = !s.split('/').any(|seg| seg == "..");
    if !ok || !no_dotdot {
        violations.push(Violation::Pattern {
            field: field.to_string(),
            message: "must match ^[A-Za-z0-9][A-Za-z0-9._/-]*$ with no '..' segments".into(),
        });
    }
}

/// exactly one `.`, both halves identifier-form, <=100 chars.
fn check_handler(field: &str, s: &str, violations: &mut Violations) {
    check_length(field, s, 1, 100, violations);
    let parts: Vec<&str> = s.split('.').collect();
    let valid = parts.len() == 2 && is_identifier(parts[0]) && is_identifier(parts[1]);
    if !valid {
        violations.push(Violation::InvalidHandler {
            field: field.to_string(),
            actual: s.to_string(),
        });
    }
}

/// `^[0-9]+(\.[0-9]+)*(-[A-Za-z0-9]+)?$`, <=20 chars.
fn check_runtime_version(field: &str, s: &str, violations: &mut Violations) {
    check_length(field, s, 1, 20, violations);
    let (numeric, suffix) = match s.split_once('-') {
        Some((n, suf)) => (n, Some(suf)),
        None => (s, None),
    };
    let numeric_ok = !numeric.is_empty()
        && numeric.split('.').all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()));
    let suffix_ok = suffix.is_none_or(|suf| !suf.is_empty() && suf.chars().all(|c| c.is_ascii_alphanumeric()));
    if !numeric_ok || !suffix_ok {
        violations.push(Violation::Pattern {
            field: field.to_string(),
            message: "must match ^[0-9]+(\\.[0-9]+)*(-[A-Za-z0-9]+)?$".into(),
        });
    }
}

/// Validate a [`FunctionSpec`] (spec.md §4.1, invariants 1-4).
pub fn validate_function(spec: &FunctionSpec) -> Violations {
    let mut v = Violations::default();

    let populated = spec.source.populated_count();
    if populated != 1 {
        v.push(Violation::MultipleOrNoSourceVariants {
            field: "spec.source".into(),
            found: populated,
        });
    }
    if let Some(s) = &spec.source.object_store {
        check_endpoint("spec.source.objectStore.endpoint", &s.endpoint, &mut v);
        check_bucket("spec.source.objectStore.bucket", &s.bucket, &mut v);
        check_object_key("spec.source.objectStore.key", &s.key, &mut v);
    }
    if let Some(s) = &spec.source.remote_object_store {
        check_bucket("spec.source.remoteObjectStore.bucket", &s.bucket, &mut v);
        check_object_key("spec.source.remoteObjectStore.key", &s.key, &mut v);
        check_region("spec.source.remoteObjectStore.region", &s.region, &mut v);
    }
    if let Some(s) = &spec.source.gcs_object_store {
        check_bucket("spec.source.gcsObjectStore.bucket", &s.bucket, &mut v);
        check_object_key("spec.source.gcsObjectStore.key", &s.key, &mut v);
    }
    if let Some(s) = &spec.source.git {
        check_git_url("spec.source.git.url", &s.url, &mut v);
        check_git_ref_or_path("spec.source.git.ref", &s.git_ref, &mut v);
        if !s.subpath.is_empty() {
            check_git_ref_or_path("spec.source.git.subpath", &s.subpath, &mut v);
        }
    }

    check_runtime_version("spec.runtime.version", &spec.runtime.version, &mut v);
    check_handler("spec.runtime.handler", &spec.runtime.handler, &mut v);

    if spec.scaling.target_concurrency > spec.scaling.container_concurrency {
        v.push(Violation::ConcurrencyOrdering {
            field: "spec.scaling".into(),
            target: spec.scaling.target_concurrency,
            cap: spec.scaling.container_concurrency,
        });
    }
    if spec.scaling.min_replicas > spec.scaling.max_replicas {
        v.push(Violation::ReplicaOrdering {
            field: "spec.scaling".into(),
            min: spec.scaling.min_replicas,
            max: spec.scaling.max_replicas,
        });
    }
    if let Some(region) = &spec.build.region {
        check_region("spec.build.region", region, &mut v);
    }

    v
}

/// Validate an [`AgentSpec`] (spec.md §4.1, invariant 2).
///
/// Invariant 7 (cross-namespace forward allow-listing) is a permission
/// decision, not a structural one — it's evaluated per-forward by the
/// permission gate's `evaluate_cross_ns_forward` at reconcile time, not here
/// (spec.md §4.7, §8 scenario 5), so a denied forward doesn't become a
/// `SpecInvalid` violation that blocks every other owned object.
pub fn validate_agent(spec: &AgentSpec) -> Violations {
    let mut v = Violations::default();

    if spec.scaling.target_concurrency > spec.scaling.container_concurrency {
        v.push(Violation::ConcurrencyOrdering {
            field: "spec.scaling".into(),
            target: spec.scaling.target_concurrency,
            cap: spec.scaling.container_concurrency,
        });
    }
    if spec.scaling.min_replicas > spec.scaling.max_replicas {
        v.push(Violation::ReplicaOrdering {
            field: "spec.scaling".into(),
            min: spec.scaling.min_replicas,
            max: spec.scaling.max_replicas,
        });
    }

    if spec.is_supervised() {
        match &spec.approval {
            None => v.push(Violation::Other {
                field: "spec.approval".into(),
                message: "required when operationMode=supervised".into(),
            }),
            Some(a) if a.providers.is_empty() => v.push(Violation::Other {
                field: "spec.approval.providers".into(),
                message: "must be a non-empty subset of {chatApproval, customWebhook}".into(),
            }),
            Some(_) => {}
        }
    }

    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::*;
    use crate::common::*;
    use crate::function::*;

    fn prebuilt_function() -> FunctionSpec {
        FunctionSpec {
            source: FunctionSource {
                object_store: None,
                remote_object_store: None,
                gcs_object_store: None,
                git: None,
                inline: None,
                prebuilt_image: Some(PrebuiltImageSource {
                    repo: "registry.local:5000/fn/hello".into(),
                    reference: ImageReference {
                        tag: Some("v1".into()),
                        digest: None,
                    },
                    pull_policy: None,
                    pull_secrets: vec![],
                    port: 8080,
                    entrypoint: None,
                    args: vec![],
                }),
            },
            runtime: RuntimeSpec {
                language: Language::Nodejs,
                version: "20".into(),
                handler: "index.handler".into(),
            },
            scaling: Scaling::default(),
            resources: ResourceRequirements::default(),
            env: vec![],
            eventing: EventingConfig {
                enabled: false,
                ..Default::default()
            },
            observability: ObservabilityConfig::default(),
            build: BuildSpec::default(),
            image_pull_policy: None,
        }
    }

    #[test]
    fn scenario_1_prebuilt_function_is_valid() {
        let v = validate_function(&prebuilt_function());
        assert!(v.is_empty(), "{v}");
    }

    #[test]
    fn scenario_3_invalid_handler_rejected() {
        let mut spec = prebuilt_function();
        spec.runtime.handler = "onlyoneword".into();
        let v = validate_function(&spec);
        assert!(!v.is_empty());
        assert!(matches!(v.0[0], Violation::InvalidHandler { .. }));
    }

    #[test]
    fn rejects_zero_or_multiple_source_variants() {
        let mut spec = prebuilt_function();
        spec.source.prebuilt_image = None;
        let v = validate_function(&spec);
        assert!(v.0.iter().any(|x| matches!(x, Violation::MultipleOrNoSourceVariants { found: 0, .. })));

        let mut spec = prebuilt_function();
        spec.source.git = Some(GitSource {
            url: "https://example.com/repo.git".into(),
            git_ref: "main".into(),
            subpath: String::new(),
            cred_ref: None,
        });
        let v = validate_function(&spec);
        assert!(v.0.iter().any(|x| matches!(x, Violation::MultipleOrNoSourceVariants { found: 2, .. })));
    }

    #[test]
    fn rejects_target_concurrency_above_cap() {
        let mut spec = prebuilt_function();
        spec.scaling.container_concurrency = 10;
        spec.scaling.target_concurrency = 20;
        let v = validate_function(&spec);
        assert!(v.0.iter().any(|x| matches!(x, Violation::ConcurrencyOrdering { .. })));
    }

    fn bare_agent() -> AgentSpec {
        AgentSpec {
            image: AgentImage {
                repository: "registry.local/agents/triage".into(),
                tag: Some("v1".into()),
                digest: None,
                port: 8080,
                pull_policy: None,
                pull_secrets: vec![],
                entrypoint: None,
                args: vec![],
            },
            service_account_ref: None,
            permissions: Permissions::default(),
            ai: AiConfig::default(),
            behavior: BehaviorConfig::default(),
            operation_mode: OperationMode::Autonomous,
            approval: None,
            env: vec![],
            scaling: Scaling::default(),
            resources: ResourceRequirements::default(),
            eventing: AgentEventingConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }

    #[test]
    fn supervised_mode_requires_approval_providers() {
        let mut spec = bare_agent();
        spec.operation_mode = OperationMode::Supervised;
        let v = validate_agent(&spec);
        assert!(!v.is_empty());
    }

    // Cross-namespace forward allow-listing (invariant 7, spec.md §8
    // scenario 5) is a permission-gate decision evaluated per-forward at
    // reconcile time, not a structural violation here — see
    // `agent_reconciler`'s `first_denied_capability` for that coverage.
}
