use serde::{Deserialize, Serialize};

use super::{new_id, UserId};

/// Balance holder for bet stakes and payouts. Authentication and profiles are
/// owned by the web layer; the core only needs an id and a balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: UserId,
    pub name: String,
    /// Balance in knuts. Mutated only through the store's atomic increment,
    /// mirrored 1:1 by ledger rows.
    pub balance: i64,
}

impl UserAccount {
    pub fn new(name: impl Into<String>, balance: i64) -> Self {
        Self { id: new_id(), name: name.into(), balance }
    }
}
