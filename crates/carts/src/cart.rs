use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tienda_core::{CartId, Entity, UserId};

/// A user's open cart.
///
/// Created lazily on first reservation and never deleted; after checkout it
/// persists empty for reuse. The user reference is nullable: storage
/// tolerates an orphaned cart, though the authenticated services never
/// reach one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub user_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    pub fn new(user_id: Option<UserId>, now: DateTime<Utc>) -> Self {
        Self {
            id: CartId::new(),
            user_id,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

impl Entity for Cart {
    type Id = CartId;

    fn id(&self) -> &CartId {
        &self.id
    }
}
