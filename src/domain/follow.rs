/// A follower edge: `user` follows `following`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Follow {
    pub id: i64,
    pub user_id: i64,
    pub user: String,
    pub following_id: i64,
    pub following: String,
}
