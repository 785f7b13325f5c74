//! `PrinciplesService` - the safety-gate collaborator the router calls
//! before dispatching a request: it synthesizes a safety-context map and
//! then asks the principles collaborator for permission via
//! `CheckAction(taskName, safetyContext) -> (allowed, reasons)`. A
//! production service would likely itself be an LLM-backed classifier;
//! out of scope here, so the only implementation provided always allows.

use std::collections::HashMap;

use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrinciplesVerdict {
    Allow,
    Deny { reasons: Vec<String> },
}

impl PrinciplesVerdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, PrinciplesVerdict::Allow)
    }

    pub fn reasons(&self) -> Vec<String> {
        match self {
            PrinciplesVerdict::Allow => Vec::new(),
            PrinciplesVerdict::Deny { reasons } => reasons.clone(),
        }
    }
}

/// `safetyContext`: a flat map of named risk categories
/// (`human_harm`, `privacy_violation`, `order_unethical`, ...) to
/// whether the router's classification flagged the request for it.
pub type SafetyContext = HashMap<String, bool>;

#[async_trait]
pub trait PrinciplesService: Send + Sync {
    async fn check_action(&self, task_name: &str, safety_context: &SafetyContext) -> PrinciplesVerdict;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysAllowPrinciples;

#[async_trait]
impl PrinciplesService for AlwaysAllowPrinciples {
    async fn check_action(&self, _task_name: &str, _safety_context: &SafetyContext) -> PrinciplesVerdict {
        PrinciplesVerdict::Allow
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn always_allow_never_blocks() {
        let service = AlwaysAllowPrinciples;
        let mut ctx = SafetyContext::new();
        ctx.insert("human_harm".to_string(), true);
        assert!(service.check_action("delete_prod_db", &ctx).await.is_allowed());
    }
}
