//! Turn strategy configuration.
//!
//! The strategies themselves (the scheduling *policy*) are domain-specific
//! and live in `oc-core::runtime::turn_strategy` as a trait object, the way
//! `LlmProvider` structures provider polymorphism in the teacher. This type
//! is only the serializable, persisted configuration a discussion carries.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ids::ParticipantId;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnStrategyConfig {
    RoundRobin {
        #[serde(default)]
        order_seed: u64,
    },
    ContextAware,
    Moderated {
        moderator_participant_id: ParticipantId,
        #[serde(default)]
        queue: Vec<ParticipantId>,
    },
    FreeForm,
}

impl TurnStrategyConfig {
    /// Stable identifier, matching the closed set in §6
    /// (`round_robin`, `context_aware`, `moderated`, `free_form`).
    pub fn identifier(&self) -> &'static str {
        match self {
            Self::RoundRobin { .. } => "round_robin",
            Self::ContextAware => "context_aware",
            Self::Moderated { .. } => "moderated",
            Self::FreeForm => "free_form",
        }
    }

    pub fn is_free_form(&self) -> bool {
        matches!(self, Self::FreeForm)
    }

    /// Rejects configurations that can never resolve a turn owner, e.g.
    /// `moderated` with no moderator participant id (§4.6).
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Moderated {
                moderator_participant_id,
                ..
            } if moderator_participant_id.as_uuid().is_nil() => Err(Error::InvalidConfig(
                "moderated strategy requires a non-nil moderator_participant_id".into(),
            )),
            _ => Ok(()),
        }
    }
}

impl Default for TurnStrategyConfig {
    fn default() -> Self {
        Self::RoundRobin { order_seed: 0 }
    }
}
