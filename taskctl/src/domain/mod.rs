//! Domain types for the control plane.
//!
//! The persisted entity set: [`Capability`], [`Goal`] (transient, never
//! persisted on its own - folded into a [`Plan`] before anything is
//! written), [`Plan`]/[`PlanStep`], [`WorkflowExecution`], [`CachedCode`],
//! [`EpisodicRecord`]. Every type but `Goal` implements `taskstore::Record`.

mod capability;
mod cached_code;
mod episodic;
mod goal;
mod id;
mod language;
mod plan;
mod workflow;

pub use capability::{Capability, CapabilityKind, SafetyLevel};
pub use cached_code::CachedCode;
pub use episodic::{EpisodicRecord, Outcome};
pub use goal::Goal;
pub use id::{generate_id, DomainId, IdResolver};
pub use language::Language;
pub use plan::{Plan, PlanStep};
pub use workflow::{StepResult, WorkflowExecution, WorkflowStatus};

// Re-export taskstore types for convenience
pub use taskstore::{Filter, FilterOp, IndexValue, Record, Store};
