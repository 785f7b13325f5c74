//! The capability registry — a searchable catalog of everything the
//! planner may schedule, backed by `taskstore::Store`.
//!
//! Grounded in the plain-`Record`-plus-query idiom `taskstore::Store`
//! exposes: one `Store`, several index views over one collection. The
//! dedup/seed logic layers a write-time word-overlap guard on top.
//!
//! `domain`-scoped `(task name, domain)`/`(type, domain)` lookups have no
//! field of their own on [`crate::domain::Capability`]; they are
//! realized here as a reserved `domain:<name>` tag folded into the
//! existing `tags` index (`IndexValue::Tags`) rather than widening the
//! domain type, since every other index key (task/type/tag) already has
//! a first-class field to filter on.

mod dedup;
mod seed;

pub use dedup::description_overlap;

use std::collections::HashMap;
use std::sync::Arc;

use taskstore::{now_ms, Filter, Store};
use tracing::{debug, info, warn};

use crate::domain::{Capability, CapabilityKind, CachedCode, Language};
use crate::error::{Error, Result};
use crate::tools::ToolExecutor;

const DEFAULT_DOMAIN: &str = "default";
const DEDUP_THRESHOLD: f64 = 0.80;

/// Trivial task names rejected outright regardless of overlap score —
/// names too generic to ever carry a meaningful description ("a task",
/// "test", "foo").
const TRIVIAL_TASK_DENYLIST: &[&str] = &["test", "foo", "bar", "example", "tmp", "untitled"];

fn domain_tag(domain: &str) -> String {
    format!("domain:{domain}")
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct DomainInfo {
    pub capability_count: u64,
    pub cached_code_count: u64,
    pub updated_at: i64,
}

pub struct Registry {
    store: Arc<Store>,
}

impl Registry {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Register all standard tools as tool capabilities in `domain`,
    /// skipping any whose task name is already registered. Idempotent —
    /// safe to call on every startup.
    pub fn seed_tools(&self, domain: &str) -> Result<usize> {
        seed::seed_tools(&self.store, domain, &ToolExecutor::standard())
    }

    /// Create a capability. Idempotent: a
    /// `(task_name, language)` pair whose description overlaps an
    /// existing entry by ≥80% returns the existing capability instead of
    /// inserting a duplicate.
    pub fn create_capability(&self, domain: &str, mut capability: Capability) -> Result<Capability> {
        if TRIVIAL_TASK_DENYLIST.contains(&capability.task_name.to_lowercase().as_str()) {
            return Err(Error::validation(format!(
                "task name '{}' is on the trivial-name denylist",
                capability.task_name
            )));
        }
        capability.tags.push(domain_tag(domain));

        let existing = self.find_duplicate_capability(domain, &capability)?;
        if let Some(existing) = existing {
            debug!(task_name = %capability.task_name, "Registry::create_capability: idempotent hit");
            return Ok(existing);
        }

        self.store.put(&capability).map_err(|e| Error::Internal(e.to_string()))?;
        self.bump_domain_counter(domain, |info| info.capability_count += 1)?;
        info!(id = %capability.id, task_name = %capability.task_name, "Registry::create_capability: stored");
        Ok(capability)
    }

    fn find_duplicate_capability(&self, domain: &str, candidate: &Capability) -> Result<Option<Capability>> {
        let filters = [
            Filter::eq("task_name", candidate.task_name.clone()),
            Filter::eq("language", candidate.language.as_str()),
            Filter::has_tag("tags", domain_tag(domain)),
        ];
        let matches: Vec<Capability> = self.store.list(&filters).map_err(|e| Error::Internal(e.to_string()))?;
        for existing in matches {
            if description_overlap(&existing.description, &candidate.description) >= DEDUP_THRESHOLD {
                return Ok(Some(existing));
            }
        }
        Ok(None)
    }

    pub fn get_capability(&self, domain: &str, id: &str) -> Result<Capability> {
        let capability: Capability = self
            .store
            .get(id)
            .map_err(|e| Error::Internal(e.to_string()))?
            .ok_or_else(|| Error::not_found("capability", id))?;
        if !capability.tags.contains(&domain_tag(domain)) {
            return Err(Error::not_found("capability", id));
        }
        Ok(capability)
    }

    /// Exact task-name lookup, used by the planner to resolve a learned
    /// method's subtask names to capabilities during expansion.
    /// Multiple matches (different languages) are returned in
    /// descending-confidence order so the caller can take the best one.
    pub fn find_by_task_name(&self, domain: &str, task_name: &str) -> Result<Vec<Capability>> {
        let filters = [
            Filter::eq("task_name", task_name),
            Filter::has_tag("tags", domain_tag(domain)),
        ];
        let mut matches: Vec<Capability> = self.store.list(&filters).map_err(|e| Error::Internal(e.to_string()))?;
        matches.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));
        Ok(matches)
    }

    pub fn list_capabilities(&self, domain: &str) -> Result<Vec<Capability>> {
        let filters = [Filter::has_tag("tags", domain_tag(domain))];
        self.store.list(&filters).map_err(|e| Error::Internal(e.to_string()))
    }

    /// Free-text search over task name and description, with optional
    /// type and tag filters.
    pub fn search(
        &self,
        domain: &str,
        query: &str,
        kind: Option<&str>,
        tags: &[String],
    ) -> Result<Vec<Capability>> {
        let mut filters = vec![Filter::has_tag("tags", domain_tag(domain))];
        if let Some(kind) = kind {
            filters.push(Filter::eq("kind", kind));
        }
        for tag in tags {
            filters.push(Filter::has_tag("tags", tag.clone()));
        }
        let candidates: Vec<Capability> = self.store.list(&filters).map_err(|e| Error::Internal(e.to_string()))?;
        let needle = query.to_lowercase();
        Ok(candidates
            .into_iter()
            .filter(|cap| {
                needle.is_empty()
                    || cap.task_name.to_lowercase().contains(&needle)
                    || cap.description.to_lowercase().contains(&needle)
            })
            .collect())
    }

    pub fn delete_capability(&self, domain: &str, id: &str) -> Result<()> {
        let capability = self.get_capability(domain, id)?;
        self.store.delete::<Capability>(&capability.id).map_err(|e| Error::Internal(e.to_string()))?;
        self.bump_domain_counter(domain, |info| {
            info.capability_count = info.capability_count.saturating_sub(1)
        })?;
        Ok(())
    }

    /// Write a cached-code artifact, enforcing the task/language/near-
    /// duplicate-description invariant. Returns the existing entry
    /// unmodified on a dedup hit instead of erroring, same idempotent-
    /// create contract as `create_capability`.
    pub fn create_cached_code(&self, domain: &str, mut code: CachedCode) -> Result<CachedCode> {
        code.tags.push(domain_tag(domain));
        if let Some(existing) = self.find_duplicate_cached_code(domain, &code)? {
            return Ok(existing);
        }
        self.store.put(&code).map_err(|e| Error::Internal(e.to_string()))?;
        self.bump_domain_counter(domain, |info| info.cached_code_count += 1)?;
        Ok(code)
    }

    fn find_duplicate_cached_code(&self, domain: &str, candidate: &CachedCode) -> Result<Option<CachedCode>> {
        let filters = [
            Filter::eq("task_name", candidate.task_name.clone()),
            Filter::eq("language", candidate.language.as_str()),
            Filter::has_tag("tags", domain_tag(domain)),
        ];
        let matches: Vec<CachedCode> = self.store.list(&filters).map_err(|e| Error::Internal(e.to_string()))?;
        for existing in matches {
            if existing.content_hash == candidate.content_hash
                || description_overlap(&existing.description, &candidate.description) >= DEDUP_THRESHOLD
            {
                return Ok(Some(existing));
            }
        }
        Ok(None)
    }

    /// Cache lookup across the full supported-language set for a task
    /// name, used by the code generator before invoking generation.
    pub fn find_cached_code(&self, domain: &str, task_name: &str) -> Result<Option<CachedCode>> {
        for lang in [
            Language::Python,
            Language::Javascript,
            Language::Go,
            Language::Java,
            Language::Cpp,
            Language::C,
            Language::Rust,
        ] {
            let filters = [
                Filter::eq("task_name", task_name),
                Filter::eq("language", lang.as_str()),
                Filter::has_tag("tags", domain_tag(domain)),
            ];
            let mut matches: Vec<CachedCode> = self.store.list(&filters).map_err(|e| Error::Internal(e.to_string()))?;
            matches.retain(|c| c.executable);
            if let Some(found) = matches.into_iter().next() {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    pub fn domain_info(&self, domain: &str) -> Result<DomainInfo> {
        let key = format!("domain:{domain}");
        match self.store.kv_get(&key).map_err(|e| Error::Internal(e.to_string()))? {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| Error::Internal(e.to_string())),
            None => Ok(DomainInfo::default()),
        }
    }

    fn bump_domain_counter(&self, domain: &str, mutate: impl FnOnce(&mut DomainInfo)) -> Result<()> {
        let mut info = self.domain_info(domain)?;
        mutate(&mut info);
        info.updated_at = now_ms();
        let key = format!("domain:{domain}");
        let raw = serde_json::to_string(&info).map_err(|e| Error::Internal(e.to_string()))?;
        self.store.kv_set(&key, &raw, None).map_err(|e| Error::Internal(e.to_string()))?;
        Ok(())
    }
}

impl Default for Registry {
    fn default() -> Self {
        warn!("Registry::default: opening an in-memory store, data will not persist");
        Self::new(Arc::new(Store::open_in_memory().expect("in-memory store always opens")))
    }
}

/// Convenience alias used throughout the codebase when the default
/// domain is all that's needed.
pub fn default_domain() -> &'static str {
    DEFAULT_DOMAIN
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Registry {
        Registry::new(Arc::new(Store::open_in_memory().unwrap()))
    }

    fn capability(task_name: &str, description: &str) -> Capability {
        Capability::new(task_name, Language::Python, CapabilityKind::Tool { invocation: "tool_x".into() })
            .with_description(description)
    }

    #[test]
    fn create_then_get_round_trips() {
        let registry = registry();
        let cap = registry.create_capability("default", capability("first_primes", "generate n primes")).unwrap();
        let fetched = registry.get_capability("default", &cap.id).unwrap();
        assert_eq!(fetched.task_name, "first_primes");
    }

    #[test]
    fn duplicate_create_is_idempotent() {
        let registry = registry();
        let first = registry
            .create_capability("default", capability("first_primes", "generate the first n prime numbers"))
            .unwrap();
        let second = registry
            .create_capability("default", capability("first_primes", "generate the first n prime numbers please"))
            .unwrap();
        assert_eq!(first.id, second.id);

        let all = registry.list_capabilities("default").unwrap();
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn dissimilar_description_is_not_deduped() {
        let registry = registry();
        let first = registry.create_capability("default", capability("sort", "sort a list of integers")).unwrap();
        let second = registry
            .create_capability("default", capability("sort", "connect to a websocket and stream audio"))
            .unwrap();
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn trivial_task_name_is_rejected() {
        let registry = registry();
        let err = registry.create_capability("default", capability("test", "whatever")).unwrap_err();
        assert!(matches!(err, Error::ValidationError { .. }));
    }

    #[test]
    fn domains_are_isolated() {
        let registry = registry();
        registry.create_capability("tenant-a", capability("build", "build the project")).unwrap();
        assert!(registry.list_capabilities("tenant-b").unwrap().is_empty());
        assert_eq!(registry.list_capabilities("tenant-a").unwrap().len(), 1);
    }

    #[test]
    fn domain_counters_track_creates_and_deletes() {
        let registry = registry();
        let cap = registry.create_capability("default", capability("deploy", "deploy the service")).unwrap();
        assert_eq!(registry.domain_info("default").unwrap().capability_count, 1);
        registry.delete_capability("default", &cap.id).unwrap();
        assert_eq!(registry.domain_info("default").unwrap().capability_count, 0);
    }

    #[test]
    fn seed_tools_registers_standard_tool_set() {
        let registry = registry();
        let seeded = registry.seed_tools("default").unwrap();
        assert!(seeded > 0);
        let found = registry.search("default", "read_file", Some("tool"), &[]).unwrap();
        assert!(!found.is_empty());
    }

    #[test]
    fn find_cached_code_checks_every_supported_language() {
        let registry = registry();
        let code = CachedCode::new("first_primes", Language::Go, "package main").with_description("go primes");
        registry.create_cached_code("default", code).unwrap();

        let found = registry.find_cached_code("default", "first_primes").unwrap();
        assert!(found.is_some());
        assert_eq!(found.unwrap().language, Language::Go);
    }
}
