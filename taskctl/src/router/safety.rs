//! Synthesizes the `SafetyContext` a `PrinciplesService` checks a plan
//! against. No LLM-backed classifier is grounded anywhere in this
//! codebase, so this is a deterministic keyword heuristic in the same
//! conservative-stand-in spirit as `InMemoryKnowledgeGraph` and
//! `AlwaysAllowPrinciples`: it never fabricates a risk flag it can't
//! justify from the request text, and it only ever adds `true` entries
//! for categories it actually detected a marker for.

use std::collections::HashMap;

use crate::collab::SafetyContext;

const HUMAN_HARM_MARKERS: &[&str] = &["harm", "hurt", "kill", "attack", "poison", "weapon", "injure"];
const PRIVACY_MARKERS: &[&str] = &["ssn", "social security", "private key", "password", "credit card", "dox"];
const UNETHICAL_ORDER_MARKERS: &[&str] = &["launder", "bribe", "extort", "blackmail", "illegal"];
const ENDANGER_OTHERS_MARKERS: &[&str] = &["endanger", "unsafe for others", "put others at risk", "sabotage"];

/// Build a safety context from a request's task name and description.
/// Every recognized category is present (possibly `false`); this keeps
/// the map shape stable for any `PrinciplesService` that inspects it by
/// key rather than just checking for any `true`.
pub fn synthesize(task_name: &str, description: &str) -> SafetyContext {
    let lower = format!("{task_name} {description}").to_lowercase();

    let mut context: HashMap<String, bool> = HashMap::new();
    context.insert("human_harm".to_string(), any_marker(&lower, HUMAN_HARM_MARKERS));
    context.insert("privacy_violation".to_string(), any_marker(&lower, PRIVACY_MARKERS));
    context.insert("order_unethical".to_string(), any_marker(&lower, UNETHICAL_ORDER_MARKERS));
    context.insert("endanger_others".to_string(), any_marker(&lower, ENDANGER_OTHERS_MARKERS));
    context
}

fn any_marker(haystack: &str, markers: &[&str]) -> bool {
    markers.iter().any(|marker| haystack.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn benign_request_flags_nothing() {
        let context = synthesize("build_parser", "build a CSV parser for the sales export");
        assert!(context.values().all(|flagged| !flagged));
    }

    #[test]
    fn human_harm_marker_is_flagged() {
        let context = synthesize("plan", "write a plan to poison the water supply");
        assert_eq!(context.get("human_harm"), Some(&true));
        assert_eq!(context.get("order_unethical"), Some(&false));
    }

    #[test]
    fn endanger_others_marker_is_flagged() {
        let context = synthesize("task", "a script that could endanger others if misused");
        assert_eq!(context.get("endanger_others"), Some(&true));
    }

    #[test]
    fn privacy_marker_is_flagged() {
        let context = synthesize("lookup", "find someone's social security number");
        assert_eq!(context.get("privacy_violation"), Some(&true));
    }

    #[test]
    fn all_categories_are_always_present() {
        let context = synthesize("task", "anything");
        for key in ["human_harm", "privacy_violation", "order_unethical", "endanger_others"] {
            assert!(context.contains_key(key));
        }
    }
}
