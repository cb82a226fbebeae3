//! # incarforge core
//!
//! Domain types, collaborator traits, and error definitions for the
//! incarforge INCAR assembler. This crate does no I/O: it defines the
//! model that the engine, the HTTP client and the CLI implement against.
//!
//! ## Collaborators
//!
//! Everything outside the selection/assembly engine is reached through a
//! trait defined here:
//! - [`Catalog`] supplies categories, tasks and standard sections
//! - [`Calculator`] derives extra parameters for trigger tasks
//! - [`Renderer`] turns a generation request into file text
//! - [`Exporter`] delivers the final text somewhere
//!
//! This keeps the engine testable with scripted in-process implementations.

pub mod calculator;
pub mod catalog;
pub mod error;
pub mod export;
pub mod params;
pub mod render;

// Re-export key types at crate root for ergonomics
pub use calculator::{Calculator, CalculatorKind};
pub use catalog::{Catalog, CatalogSnapshot, CategoryEntry, SelectionMode, StandardSections, Task, TaskEntry};
pub use error::{
    CalculatorError, CatalogError, Error, ExportError, GenerationError, Result, SelectionError,
};
pub use export::{ExportReceipt, Exporter};
pub use params::ParamMap;
pub use render::{GenerationRequest, RenderResponse, Renderer};
