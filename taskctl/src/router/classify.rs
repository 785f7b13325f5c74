//! The fixed-order predicate chain a request is dispatched through:
//! first match wins, each predicate a small pure function over the
//! request's task name/description so the whole chain is testable
//! without any of the router's collaborators.

/// Task-name prefixes routed straight to an LLM summarization
/// completion, bypassing planning entirely.
const SUMMARIZER_PREFIXES: &[&str] = &["analyze_bootstrap", "analyze_belief"];

/// Action verbs that disqualify a description from the "simple
/// informational" fast-path - their presence signals the caller wants
/// something *done*, not explained.
const ACTION_VERBS: &[&str] = &[
    "create", "calculate", "build", "write", "generate", "make", "compute", "implement", "deploy", "run",
];

const WEB_MARKERS: &[&str] = &["http://", "https://", "www.", "scrape", "fetch"];

/// Program-creation markers that rule out the hypothesis-testing
/// fast-path even when the description starts with the right prefix, so
/// "test hypothesis: X, then write a script to verify it" still falls
/// through to the code path.
const PROGRAM_CREATION_MARKERS: &[&str] = &["write a script", "write code", "generate code", "create a program"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Internal(InternalTask),
    Summarization,
    SimpleInformational,
    ExplicitTool(String),
    HypothesisTesting,
    WebGathering,
    TraditionalCode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalTask {
    GoalExecution,
    ArtifactTask,
    CodeGeneration,
    CodeTest,
}

impl InternalTask {
    fn from_task_name(task_name: &str) -> Option<Self> {
        match task_name {
            "goal_execution" => Some(Self::GoalExecution),
            "artifact_task" => Some(Self::ArtifactTask),
            "code_generation" => Some(Self::CodeGeneration),
            "code_test" => Some(Self::CodeTest),
            _ => None,
        }
    }
}

/// Classify one request. `tool_names` is the set of tool ids the
/// registry currently exposes (the explicit-tool predicate matches
/// against whatever is actually registered, not a hardcoded list).
pub fn classify(task_name: &str, description: &str, language_specified: bool, tool_names: &[String]) -> RouteDecision {
    if let Some(internal) = InternalTask::from_task_name(task_name) {
        return RouteDecision::Internal(internal);
    }

    if matches_summarizer_prefix(task_name) {
        return RouteDecision::Summarization;
    }

    if is_simple_informational(description, language_specified) {
        return RouteDecision::SimpleInformational;
    }

    if let Some(tool_id) = explicit_tool_mention(description, tool_names) {
        return RouteDecision::ExplicitTool(tool_id);
    }

    if is_hypothesis_test(description) {
        return RouteDecision::HypothesisTesting;
    }

    if references_web(description) {
        return RouteDecision::WebGathering;
    }

    RouteDecision::TraditionalCode
}

fn matches_summarizer_prefix(task_name: &str) -> bool {
    SUMMARIZER_PREFIXES.iter().any(|prefix| task_name.starts_with(prefix))
}

/// Short description, no action verbs, no language
/// specified. "Short" is approximated as at most 12 words - long enough
/// for a genuine informational ask ("what happened in AI news today"),
/// short enough to exclude a multi-sentence task brief.
fn is_simple_informational(description: &str, language_specified: bool) -> bool {
    if language_specified {
        return false;
    }
    let lower = description.to_lowercase();
    let word_count = lower.split_whitespace().count();
    if word_count > 12 {
        return false;
    }
    !ACTION_VERBS.iter().any(|verb| lower.contains(verb))
}

/// The description mentions a known tool id, written
/// as `tool_<name>` (e.g. `tool_html_scraper`). Matches only against
/// tools the registry actually has registered.
fn explicit_tool_mention(description: &str, tool_names: &[String]) -> Option<String> {
    let lower = description.to_lowercase();
    tool_names
        .iter()
        .find(|name| lower.contains(&format!("tool_{name}")))
        .cloned()
}

/// Description starts with an explicit hypothesis-test marker.
fn is_hypothesis_test(description: &str) -> bool {
    let lower = description.to_lowercase();
    lower.starts_with("test hypothesis:") && !PROGRAM_CREATION_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Description mentions a URL or a web-gathering verb.
fn references_web(description: &str) -> bool {
    let lower = description.to_lowercase();
    WEB_MARKERS.iter().any(|marker| lower.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify_simple(description: &str) -> RouteDecision {
        classify("Info", description, false, &[])
    }

    #[test]
    fn internal_task_names_win_regardless_of_description() {
        let decision = classify("code_generation", "delete all user data", false, &[]);
        assert_eq!(decision, RouteDecision::Internal(InternalTask::CodeGeneration));
    }

    #[test]
    fn summarizer_prefix_routes_to_summarization() {
        let decision = classify("analyze_bootstrap_v2", "summarize this", false, &[]);
        assert_eq!(decision, RouteDecision::Summarization);
    }

    #[test]
    fn short_no_verb_description_is_simple_informational() {
        assert_eq!(classify_simple("AI news today"), RouteDecision::SimpleInformational);
    }

    #[test]
    fn action_verb_disqualifies_simple_informational() {
        let decision = classify_simple("create a summary of AI news today");
        assert_ne!(decision, RouteDecision::SimpleInformational);
    }

    #[test]
    fn language_specified_disqualifies_simple_informational() {
        let decision = classify("Info", "AI news today", true, &[]);
        assert_ne!(decision, RouteDecision::SimpleInformational);
    }

    #[test]
    fn explicit_tool_mention_is_detected() {
        let tools = vec!["html_scraper".to_string(), "http_get".to_string()];
        let decision = classify("scrape", "please run tool_html_scraper on this page", false, &tools);
        assert_eq!(decision, RouteDecision::ExplicitTool("html_scraper".to_string()));
    }

    #[test]
    fn hypothesis_prefix_routes_to_hypothesis_testing() {
        let decision = classify_simple("test hypothesis: prices rise on Fridays");
        assert_eq!(decision, RouteDecision::HypothesisTesting);
    }

    #[test]
    fn hypothesis_prefix_with_program_creation_marker_falls_through() {
        let decision = classify_simple("test hypothesis: prices rise on Fridays, write a script to verify it");
        assert_ne!(decision, RouteDecision::HypothesisTesting);
    }

    #[test]
    fn url_reference_routes_to_web_gathering() {
        let decision = classify_simple("summarize https://example.com/article and create a report");
        assert_eq!(decision, RouteDecision::WebGathering);
    }

    #[test]
    fn everything_else_is_traditional_code() {
        let decision = classify_simple("build a CSV parser for the sales export and write tests for it");
        assert_eq!(decision, RouteDecision::TraditionalCode);
    }
}
