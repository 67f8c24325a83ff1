use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: u64,
    pub author_id: u64,
    pub group_id: Option<u64>,
    pub text: String,
    /// Storage path of the attached image, e.g. `posts/small.gif`.
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}
