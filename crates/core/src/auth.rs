use serde::{Deserialize, Serialize};

use crate::ActorId;

/// Caller identity established by the authentication layer and stored in the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    actor_id: ActorId,
    display_name: String,
    email: Option<String>,
}

impl UserIdentity {
    /// Creates a user identity from authentication data.
    #[must_use]
    pub fn new(actor_id: ActorId, display_name: impl Into<String>, email: Option<String>) -> Self {
        Self {
            actor_id,
            display_name: display_name.into(),
            email,
        }
    }

    /// Returns the actor this identity resolves to.
    #[must_use]
    pub fn actor_id(&self) -> ActorId {
        self.actor_id
    }

    /// Returns the display name for the current user.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_str()
    }

    /// Returns the email, if the provider returned one.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }
}
