use serde::{Deserialize, Serialize};

use userhub_core::UserId;

use crate::Event;
use crate::topology::USER_CREATED_ROUTING_KEY;

/// Emitted once a new user has been persisted.
///
/// Wire form: `{"id": <uint>, "name": <string>, "email": <string>}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCreated {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

impl Event for UserCreated {
    const EVENT_TYPE: &'static str = "user.created";
    const ROUTING_KEY: &'static str = USER_CREATED_ROUTING_KEY;
}
