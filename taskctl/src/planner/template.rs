//! Hierarchical workflow templates: a fixed-shape DAG of subtask
//! names matched against a goal before falling back to flat capability
//! matching. Seeded with a small built-in set; callers may supply their
//! own via `Planner::with_templates`.

#[derive(Debug, Clone)]
pub struct TemplateStep {
    pub task_name: String,
    pub depends_on: Vec<usize>,
}

impl TemplateStep {
    pub fn new(task_name: impl Into<String>) -> Self {
        Self {
            task_name: task_name.into(),
            depends_on: Vec::new(),
        }
    }

    pub fn depending_on(mut self, indices: Vec<usize>) -> Self {
        self.depends_on = indices;
        self
    }
}

#[derive(Debug, Clone)]
pub struct PlanTemplate {
    pub name: String,
    /// Keywords that trigger a match against a goal's description or
    /// explicit template hint; matching is substring/case-insensitive,
    /// the same search style `registry::Registry::search` uses.
    pub triggers: Vec<String>,
    pub steps: Vec<TemplateStep>,
}

impl PlanTemplate {
    pub fn new(name: impl Into<String>, triggers: Vec<String>, steps: Vec<TemplateStep>) -> Self {
        Self {
            name: name.into(),
            triggers,
            steps,
        }
    }

    pub fn matches(&self, goal_text: &str) -> bool {
        let needle = goal_text.to_lowercase();
        needle == self.name.to_lowercase() || self.triggers.iter().any(|t| needle.contains(&t.to_lowercase()))
    }
}

/// Built-in templates seeded at startup. The task names a template
/// names (`build`, `test`, `deploy`, `search`, `summarize`) must resolve
/// to registered capabilities for the template to actually apply - when
/// one doesn't, `Planner::try_hierarchical` falls back to flat matching
/// rather than emitting a partial plan.
pub fn default_templates() -> Vec<PlanTemplate> {
    vec![
        PlanTemplate::new(
            "build_test_deploy",
            vec!["deploy".to_string(), "ship".to_string(), "release".to_string()],
            vec![
                TemplateStep::new("build"),
                TemplateStep::new("test").depending_on(vec![0]),
                TemplateStep::new("deploy").depending_on(vec![1]),
            ],
        ),
        PlanTemplate::new(
            "research_and_summarize",
            vec!["research".to_string(), "investigate".to_string()],
            vec![
                TemplateStep::new("search"),
                TemplateStep::new("summarize").depending_on(vec![0]),
            ],
        ),
    ]
}
