use serde::{Deserialize, Serialize};

use crate::error::{require_non_empty, ValidationError};
use crate::types::ParticipantId;

/// The participant operating this device, as supplied by the identity
/// provider. Phone numbers and tokens never reach the core; only the display
/// name and an opaque id do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    participant_id: ParticipantId,
    name: String,
}

impl Identity {
    /// Wrap an identity issued by the provider.
    pub fn new(
        participant_id: ParticipantId,
        name: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        require_non_empty("participant name", &name)?;
        Ok(Self {
            participant_id,
            name: name.trim().to_string(),
        })
    }

    /// Identity with a freshly minted id, for local-only use and tests.
    pub fn local(name: impl Into<String>) -> Result<Self, ValidationError> {
        Self::new(ParticipantId::new(), name)
    }

    pub fn participant_id(&self) -> ParticipantId {
        self.participant_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Weak "same person" check used by the join protocol.
    pub fn same_name(&self, other: &str) -> bool {
        names_match(&self.name, other)
    }
}

/// Case-insensitive display-name comparison.
pub fn names_match(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}
