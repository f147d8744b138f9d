//! safetrain-core: Training-evaluation eligibility, quiz assembly and scoring.
//!
//! This crate defines the data model, the record-store contract, and the
//! rules that decide which evaluations an employee owes, how a quiz is put
//! together from the question bank, and how an attempt is graded.

pub mod assembler;
pub mod attempts;
pub mod completion;
pub mod eligibility;
pub mod error;
pub mod membership;
pub mod memory;
pub mod model;
pub mod options;
pub mod scoring;
pub mod service;
pub mod traits;

pub use error::{EngineError, EngineResult, StoreError};
pub use service::{EngineConfig, EvaluationService};
pub use traits::Repository;
