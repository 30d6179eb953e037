//! The discussion orchestration core: lifecycle state machine, turn
//! scheduling, message pipeline, participation trigger, event
//! distribution, and the storage port boundary. Plays the role
//! `sa-gateway` plays for the teacher's agent runtime, scoped to one
//! domain and stripped of everything that domain doesn't need —
//! transport, LLM providers, and tool execution stay out (see
//! DESIGN.md).

pub mod clock;
pub mod orchestrator;
pub mod runtime;
pub mod storage;

pub use clock::{Clock, MockClock, SystemClock};
pub use orchestrator::{
    CleanupReport, CommandOutcome, CreateDiscussionRequest, Orchestrator, ParticipantOrAgentId, ParticipantSpec,
    StatusSnapshot,
};
pub use storage::{DiscussionFilter, InMemoryStore, StoragePort};
