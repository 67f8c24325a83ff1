use serde::{Deserialize, Serialize};

/// Directed edge: `user_id` follows `author_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Follow {
    pub id: u64,
    pub user_id: u64,
    pub author_id: u64,
}
