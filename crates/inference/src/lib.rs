//! Per-species batch inference orchestration.
//!
//! ## Flow
//!
//! 1. **Lister** reads the species list.
//! 2. **Dispatcher** submits one batch job per species (fan-out).
//! 3. **Waiter** polls every job until all are terminal or the wait budget
//!    runs out (fan-in barrier).
//! 4. **Assembler** downloads and parses each successful job's output and
//!    adds one prediction column per species to the merged input table.
//!
//! Phases run strictly one after another. A failure scoped to one species is
//! recorded as that species' outcome and never aborts the others.

pub mod assembler;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod job;
pub mod lister;
pub mod outcome;
pub mod pipeline;
pub mod raw_output;
pub mod table;
pub mod waiter;

pub use assembler::ResultAssembler;
pub use config::InferenceConfig;
pub use dispatcher::Dispatcher;
pub use error::{EntityError, InferenceError};
pub use job::{BatchJob, BatchJobStatus};
pub use lister::list_entities;
pub use outcome::{EntityOutcome, OutcomeCounts, OutcomeKind, RunSummary};
pub use pipeline::run_inference;
pub use raw_output::{OutputParseError, PredictionRow, PredictionSeries, parse_predictions};
pub use waiter::{CompletionWaiter, WaitConfig, WaitReport};
