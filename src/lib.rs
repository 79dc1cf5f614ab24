pub mod config;
pub mod core;
pub mod detect;
pub mod error;
pub mod insert;
pub mod log;
pub mod pipeline;
pub mod service;
pub mod session;

pub use config::Config;
pub use core::{Cognition, PlanGraph, Task, TaskId};
pub use detect::{detect_gaps, Gap, GapId};
pub use error::{Error, Result};
pub use pipeline::BridgingCandidate;
pub use service::{AnalysisReport, CommitOutcome, GapService};
pub use session::{Decision, DecisionAction, ReviewSession, SessionPhase};
