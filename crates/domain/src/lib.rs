//! Data model, error kinds, structured events, and configuration for the
//! discussion orchestration core. No async runtime dependency — pure
//! types, the way `sa-domain` carries the gateway's types without pulling
//! in `axum` or `tokio`.

pub mod config;
pub mod discussion;
pub mod error;
pub mod event;
pub mod ids;
pub mod message;
pub mod participant;
pub mod turn_strategy;

pub use config::{ConfigIssue, ConfigSeverity, OrchestratorConfig};
pub use discussion::{Discussion, DiscussionSettings, DiscussionStatus, Phase, TurnState};
pub use error::{Error, Result};
pub use event::{Event, EventData};
pub use ids::{AgentId, DiscussionId, EventId, MessageId, ParticipantId};
pub use message::{Message, MessageMetadata, MessageType};
pub use participant::{Participant, ParticipantType};
pub use turn_strategy::TurnStrategyConfig;
