//! Collaborator traits at the edge of the control plane: `VectorStore`,
//! `KnowledgeGraph`, `PrinciplesService`. Production implementations of
//! these are out of scope — only the trait boundary and a conservative
//! in-memory/always-allow test double are provided here, the same shape
//! `llm::LlmClient` uses alongside its `mock::MockLlmClient`.
//! `ContainerEngine` is declared in `runner::` instead, since nothing
//! outside the sandboxed runner calls it.

mod knowledge;
mod principles;
mod vector;

pub use knowledge::{InMemoryKnowledgeGraph, KnowledgeGraph};
pub use principles::{AlwaysAllowPrinciples, PrinciplesService, PrinciplesVerdict, SafetyContext};
pub use vector::{InMemoryVectorStore, VectorMatch, VectorStore};
