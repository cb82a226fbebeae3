//! # incarforge client
//!
//! reqwest-based implementations of the core collaborator traits against the
//! INCAR backend: [`BackendClient`] is both the [`Catalog`] and the
//! [`Renderer`], [`HttpCalculator`] covers the three derivation endpoints,
//! and the exporters deliver the final text.
//!
//! [`Catalog`]: incarforge_core::Catalog
//! [`Renderer`]: incarforge_core::Renderer

pub mod backend;
pub mod calculator;
pub mod export;

pub use backend::BackendClient;
pub use calculator::HttpCalculator;
pub use export::{DownloadExporter, FileExporter, StdoutExporter};
