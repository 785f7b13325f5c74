//! The planner. Turns a `Goal` into scored `Plan` candidates by matching
//! it against the capability registry, recursively expanding learned
//! methods, and scoring each candidate with the feedback multiplier and
//! principles-compliance signal pulled from the episodic recorder and
//! the safety collaborator.
//!
//! Grounded in `registry::Registry`'s domain-scoped lookups for
//! capability matching; the recursive subtask walk carries an explicit
//! cycle detector standing in for a depth cap.

mod template;

pub use template::{default_templates, PlanTemplate, TemplateStep};

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::collab::{PrinciplesService, SafetyContext};
use crate::domain::{Capability, Goal, Language, Plan, PlanStep};
use crate::episodic::EpisodicRecorder;
use crate::error::{Error, Result};
use crate::registry::{default_domain, Registry};

/// One scored candidate the planner considered while matching a goal.
/// Named `PlanOption`, not `Option`, to avoid shadowing the standard
/// library type: a `(task name, language, score)` tuple, with
/// `last_used_at` carried alongside for `select_best`'s tie-break.
#[derive(Debug, Clone)]
pub struct PlanOption {
    pub task_name: String,
    pub language: Language,
    pub score: f64,
    pub last_used_at: i64,
}

impl PlanOption {
    pub fn from_capability(cap: &Capability, score: f64) -> Self {
        Self {
            task_name: cap.task_name.clone(),
            language: cap.language,
            score,
            last_used_at: cap.last_used_at,
        }
    }
}

pub struct Planner {
    registry: Arc<Registry>,
    episodic: Arc<EpisodicRecorder>,
    principles: Arc<dyn PrinciplesService>,
    templates: Vec<PlanTemplate>,
    domain: String,
}

impl Planner {
    pub fn new(registry: Arc<Registry>, episodic: Arc<EpisodicRecorder>, principles: Arc<dyn PrinciplesService>) -> Self {
        Self {
            registry,
            episodic,
            principles,
            templates: default_templates(),
            domain: default_domain().to_string(),
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn with_templates(mut self, templates: Vec<PlanTemplate>) -> Self {
        self.templates = templates;
        self
    }

    /// Generates candidate plans: one candidate `Plan` per matching
    /// primitive or learned-method capability, each scored
    /// independently. Hierarchical mode runs first when a workflow
    /// template matches the goal; it falls back to flat capability
    /// matching whenever no template applies, or a matched template
    /// names a subtask with no registered capability.
    pub async fn generate_plans(&self, goal: &Goal) -> Result<Vec<Plan>> {
        if let Some(plan) = self.try_hierarchical(goal).await? {
            return Ok(vec![plan]);
        }
        self.generate_flat_plans(goal).await
    }

    async fn try_hierarchical(&self, goal: &Goal) -> Result<Option<Plan>> {
        let name = goal.template_hint.as_deref().unwrap_or(&goal.description);
        let Some(template) = self.templates.iter().find(|t| t.matches(name)) else {
            return Ok(None);
        };

        let mut steps = Vec::with_capacity(template.steps.len());
        for template_step in &template.steps {
            let resolved = self
                .registry
                .find_by_task_name(&self.domain, &template_step.task_name)?
                .into_iter()
                .next();
            let Some(cap) = resolved else {
                warn!(
                    template = %template.name,
                    task_name = %template_step.task_name,
                    "Planner::try_hierarchical: template step has no registered capability, falling back to flat planning"
                );
                return Ok(None);
            };
            steps.push(PlanStep::new(cap.id).depending_on(template_step.depends_on.clone()));
        }

        let score = self.score_template(&template.name).await?;
        debug!(template = %template.name, step_count = steps.len(), "Planner::try_hierarchical: matched workflow template");
        Ok(Some(Plan::new(goal.description.clone(), steps).with_score(score)))
    }

    async fn score_template(&self, template_name: &str) -> Result<f64> {
        let stats = self.episodic.feedback_stats(template_name, "workflow")?;
        let principles = self.principles_score(template_name).await;
        Ok(stats.feedback_multiplier() * principles)
    }

    async fn generate_flat_plans(&self, goal: &Goal) -> Result<Vec<Plan>> {
        let candidates = self.matching_capabilities(goal)?;
        let mut plans = Vec::with_capacity(candidates.len());
        for cap in candidates {
            let steps = if cap.is_primitive() {
                vec![PlanStep::new(cap.id.clone())]
            } else {
                let mut steps = Vec::new();
                let mut visited = HashSet::new();
                self.expand_learned_method(&cap, &mut visited, &mut steps)?;
                steps
            };
            if steps.is_empty() {
                continue;
            }
            let score = self.score_capability(&cap).await?;
            plans.push(Plan::new(goal.description.clone(), steps).with_score(score));
        }
        Ok(plans)
    }

    fn matching_capabilities(&self, goal: &Goal) -> Result<Vec<Capability>> {
        let exact = self.registry.find_by_task_name(&self.domain, &goal.description)?;
        if !exact.is_empty() {
            return Ok(exact);
        }
        self.registry.search(&self.domain, &goal.description, None, &[])
    }

    /// DFS expansion of a learned method's subtasks into primitive plan
    /// steps, in dependency order. `visited` tracks the names currently
    /// on the expansion stack, not every name ever seen, so two sibling
    /// branches may legitimately share a subtask while a genuine cycle
    /// (A expands through B back to A) still fails fast with
    /// `Error::Internal` instead of recursing forever.
    fn expand_learned_method(&self, cap: &Capability, visited: &mut HashSet<String>, steps: &mut Vec<PlanStep>) -> Result<()> {
        if !visited.insert(cap.task_name.clone()) {
            return Err(Error::Internal(format!(
                "cycle detected while expanding learned method '{}'",
                cap.task_name
            )));
        }

        for subtask in cap.subtasks() {
            let sub_cap = self
                .registry
                .find_by_task_name(&self.domain, subtask)?
                .into_iter()
                .next()
                .ok_or_else(|| Error::not_found("capability", subtask.clone()))?;

            if sub_cap.is_primitive() {
                let depends_on = if steps.is_empty() { Vec::new() } else { vec![steps.len() - 1] };
                steps.push(PlanStep::new(sub_cap.id.clone()).depending_on(depends_on));
            } else {
                self.expand_learned_method(&sub_cap, visited, steps)?;
            }
        }

        visited.remove(&cap.task_name);
        Ok(())
    }

    /// The scoring function: capability confidence x feedback
    /// multiplier x principles-compliance.
    async fn score_capability(&self, cap: &Capability) -> Result<f64> {
        let stats = self.episodic.feedback_stats(&cap.task_name, cap.language.as_str())?;
        let principles = self.principles_score(&cap.task_name).await;
        Ok(cap.confidence * stats.feedback_multiplier() * principles)
    }

    /// The collaborator only reports allow/deny (no graded score), so
    /// compliance collapses to 1.0/0.0 - a denied action should never win
    /// a tie against an allowed one, regardless of confidence. The
    /// planner has no classified risk categories to offer, so it checks
    /// against an empty safety context; the router is the one
    /// that actually populates `SafetyContext` from its own
    /// classification pass before a plan is handed to the orchestrator.
    async fn principles_score(&self, task_name: &str) -> f64 {
        if self.principles.check_action(task_name, &SafetyContext::new()).await.is_allowed() {
            1.0
        } else {
            0.0
        }
    }

    /// Selects the best option: highest score wins, ties broken by
    /// freshness of `last_used_at`.
    pub fn select_best<'a>(&self, options: &'a [PlanOption]) -> Option<&'a PlanOption> {
        options.iter().max_by(|a, b| {
            a.score
                .partial_cmp(&b.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.last_used_at.cmp(&b.last_used_at))
        })
    }

    /// Same ordering as `select_best`, applied to the `Plan`s
    /// `generate_plans` actually returns - the orchestrator's real entry
    /// point. Plans don't carry a `last_used_at` of their own, so
    /// creation recency stands in for the tie-break.
    pub fn select_best_plan(&self, plans: Vec<Plan>) -> Option<Plan> {
        plans.into_iter().max_by(|a, b| {
            a.score
                .partial_cmp(&b.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.created_at.cmp(&b.created_at))
        })
    }

    /// After execution, regardless of outcome, fold the result back into
    /// the `(task_name, language)` moving averages the next `generate_plans`
    /// call scores against.
    pub fn record_feedback(&self, task_name: &str, language: &str, success: bool, elapsed_ms: u64, violations: u32) -> Result<()> {
        self.episodic.record_feedback(task_name, language, success, elapsed_ms, violations)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use taskstore::Store;

    use super::*;
    use crate::collab::AlwaysAllowPrinciples;
    use crate::domain::CapabilityKind;

    fn planner(registry: Arc<Registry>) -> Planner {
        let store = Arc::new(Store::open_in_memory().unwrap());
        Planner::new(registry, Arc::new(EpisodicRecorder::with_in_memory_vectors(store)), Arc::new(AlwaysAllowPrinciples))
    }

    fn registry() -> Arc<Registry> {
        Arc::new(Registry::new(Arc::new(Store::open_in_memory().unwrap())))
    }

    #[tokio::test]
    async fn flat_plan_matches_exact_task_name() {
        let registry = registry();
        registry
            .create_capability(
                "default",
                Capability::new("first_primes", Language::Python, CapabilityKind::Tool { invocation: "tool_python".into() })
                    .with_description("generate the first n primes")
                    .with_confidence(0.9),
            )
            .unwrap();

        let plans = planner(registry).generate_plans(&Goal::new("first_primes")).await.unwrap();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].step_count(), 1);
        assert!(plans[0].score > 0.0);
    }

    #[tokio::test]
    async fn no_matching_capability_yields_no_plans() {
        let plans = planner(registry()).generate_plans(&Goal::new("nonexistent_task")).await.unwrap();
        assert!(plans.is_empty());
    }

    #[tokio::test]
    async fn learned_method_expands_into_ordered_steps() {
        let registry = registry();
        registry
            .create_capability(
                "default",
                Capability::new("build", Language::Builtin, CapabilityKind::Tool { invocation: "tool_build".into() })
                    .with_description("build the project"),
            )
            .unwrap();
        registry
            .create_capability(
                "default",
                Capability::new("push", Language::Builtin, CapabilityKind::Tool { invocation: "tool_push".into() })
                    .with_description("push the artifact"),
            )
            .unwrap();
        registry
            .create_capability(
                "default",
                Capability::new(
                    "deploy",
                    Language::Builtin,
                    CapabilityKind::LearnedMethod {
                        subtasks: vec!["build".to_string(), "push".to_string()],
                    },
                )
                .with_description("deploy the service"),
            )
            .unwrap();

        let plans = planner(registry).generate_plans(&Goal::new("deploy")).await.unwrap();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].step_count(), 2);
        assert_eq!(plans[0].steps[1].depends_on, vec![0]);
    }

    #[tokio::test]
    async fn cyclic_learned_method_fails_with_internal_error() {
        let registry = registry();
        registry
            .create_capability(
                "default",
                Capability::new(
                    "a",
                    Language::Builtin,
                    CapabilityKind::LearnedMethod { subtasks: vec!["b".to_string()] },
                )
                .with_description("task a"),
            )
            .unwrap();
        registry
            .create_capability(
                "default",
                Capability::new(
                    "b",
                    Language::Builtin,
                    CapabilityKind::LearnedMethod { subtasks: vec!["a".to_string()] },
                )
                .with_description("task b"),
            )
            .unwrap();

        let err = planner(registry).generate_plans(&Goal::new("a")).await.unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }

    #[tokio::test]
    async fn hierarchical_template_wins_over_flat_match_when_triggered() {
        let registry = registry();
        for task in ["build", "test", "deploy"] {
            registry
                .create_capability(
                    "default",
                    Capability::new(task, Language::Builtin, CapabilityKind::Tool { invocation: format!("tool_{task}") })
                        .with_description(format!("{task} the service")),
                )
                .unwrap();
        }

        let plans = planner(registry).generate_plans(&Goal::new("please deploy this to staging")).await.unwrap();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].step_count(), 3);
    }

    #[tokio::test]
    async fn hierarchical_falls_back_to_flat_when_template_step_unregistered() {
        let registry = registry();
        registry
            .create_capability(
                "default",
                Capability::new(
                    "please deploy this",
                    Language::Builtin,
                    CapabilityKind::Tool { invocation: "tool_deploy".into() },
                )
                .with_description("a standalone deploy capability"),
            )
            .unwrap();

        let plans = planner(registry).generate_plans(&Goal::new("please deploy this")).await.unwrap();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].step_count(), 1);
    }

    #[test]
    fn select_best_breaks_ties_on_freshness() {
        let registry = registry();
        let options = vec![
            PlanOption { task_name: "a".into(), language: Language::Python, score: 0.5, last_used_at: 100 },
            PlanOption { task_name: "b".into(), language: Language::Python, score: 0.5, last_used_at: 200 },
        ];
        let best = planner(registry).select_best(&options).unwrap();
        assert_eq!(best.task_name, "b");
    }

    #[test]
    fn select_best_plan_picks_highest_score() {
        let registry = registry();
        let low = Plan::new("goal", vec![PlanStep::new("cap-a")]).with_score(0.2);
        let high = Plan::new("goal", vec![PlanStep::new("cap-b")]).with_score(0.9);
        let best = planner(registry).select_best_plan(vec![low, high.clone()]).unwrap();
        assert_eq!(best.id, high.id);
    }
}
