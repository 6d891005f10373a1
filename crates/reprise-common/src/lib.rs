pub mod error;
pub mod event;
pub mod formatter;
pub mod outcome;
pub mod record;

pub use error::{BackendError, FailureKind};
pub use event::EventKind;
pub use outcome::{
    AbortReason, Artifact, BackendKind, OutcomeError, OutcomeStatus, RecordOutcome, ReplayReport,
    ReplayResult,
};
pub use record::InteractionRecord;
