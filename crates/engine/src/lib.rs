//! # incarforge engine
//!
//! The selection/constraint engine and the parameter-merge assembler.
//!
//! - [`ConstraintEngine`] keeps the [`SelectionState`] consistent with a
//!   [`RuleSet`] (single-select categories, exclusivity groups, conflict
//!   pairs)
//! - [`DerivationHooks`] fire calculators for trigger tasks and cache their
//!   results, discarding stale completions
//! - [`ParameterAssembler`] merges reserved section, enabled sections, task
//!   defaults, derived values and custom overrides into one ordered map
//! - [`generation`] builds the renderer request and interprets the response
//! - [`Session`] owns all of the above for one user interaction
//!
//! [`LocalRenderer`] and [`StaticCatalog`] let the whole pipeline run
//! without a backend.

pub mod assembler;
pub mod derivation;
pub mod fetch;
pub mod generation;
pub mod local_render;
pub mod rules;
pub mod sections;
pub mod selection;
pub mod session;
pub mod static_catalog;

pub use assembler::{AssembledParameters, AssemblyInput, LayerStats, ParameterAssembler};
pub use derivation::DerivationHooks;
pub use fetch::{TaskParamsJoin, fetch_task_params};
pub use generation::{GenerationOutcome, build_request, count_lines};
pub use local_render::LocalRenderer;
pub use rules::{ConflictPair, ExclusivityGroup, RuleSet};
pub use sections::{CustomParam, SectionToggleStore};
pub use selection::{ConstraintEngine, SelectionChange, SelectionState};
pub use session::{Session, SessionOptions, TaskPreview};
pub use static_catalog::StaticCatalog;
