//! Deterministic owned-object naming (spec.md invariant 5).
//!
//! Kubernetes object names (and the labels they often get copied into) are
//! capped at 63 characters (DNS label length). Names here are always
//! `<parent>-<role>`, truncated from the parent segment when the combined
//! length would exceed the limit so the role suffix is never clipped.
const MAX_NAME_LEN: usize = 63;

pub fn owned_name(parent: &str, role: &str) -> String {
    let suffix = format!("-{role}");
    if parent.len() + suffix.len() <= MAX_NAME_LEN {
        return format!("{parent}{suffix}");
    }
    let budget = MAX_NAME_LEN.saturating_sub(suffix.len());
    let truncated: String = parent.chars().take(budget).collect();
    let truncated = truncated.trim_end_matches('-').to_string();
    format!("{truncated}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_names_pass_through() {
        assert_eq!(owned_name("hello", "revision"), "hello-revision");
    }

    #[test]
    fn long_parent_is_truncated_and_suffix_preserved() {
        let parent = "a".repeat(80);
        let name = owned_name(&parent, "broker");
        assert!(name.len() <= MAX_NAME_LEN);
        assert!(name.ends_with("-broker"));
    }
}
