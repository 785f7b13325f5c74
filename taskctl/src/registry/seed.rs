//! Startup seed policy: register the standard tool set as `Tool`
//! capabilities so the planner can schedule them like any other
//! capability. The registry is the single catalog the planner draws
//! from, including built-in tools.

use taskstore::{Filter, Store};
use tracing::debug;

use crate::domain::{Capability, CapabilityKind, Language};
use crate::error::{Error, Result};
use crate::tools::ToolExecutor;

use super::domain_tag;

/// Register every tool `executor` exposes as a `Language::Builtin` tool
/// capability in `domain`, skipping ones already present. Returns the
/// number of capabilities actually inserted.
pub fn seed_tools(store: &Store, domain: &str, executor: &ToolExecutor) -> Result<usize> {
    let mut inserted = 0;
    for def in executor.definitions() {
        let filters = [
            Filter::eq("task_name", def.name.clone()),
            Filter::has_tag("tags", domain_tag(domain)),
        ];
        let existing: Vec<Capability> = store.list(&filters).map_err(|e| Error::Internal(e.to_string()))?;
        if !existing.is_empty() {
            debug!(tool = %def.name, "seed_tools: already registered");
            continue;
        }

        let mut capability = Capability::new(
            &def.name,
            Language::Builtin,
            CapabilityKind::Tool { invocation: def.name.clone() },
        )
        .with_description(def.description)
        .with_confidence(1.0);
        capability.tags.push(domain_tag(domain));
        store.put(&capability).map_err(|e| Error::Internal(e.to_string()))?;
        inserted += 1;
    }
    Ok(inserted)
}
