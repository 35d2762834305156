use time::OffsetDateTime;

#[derive(Debug, Clone)]
pub struct Comment {
    pub id: i64,
    pub text: String,
    pub created: OffsetDateTime,
    pub author_id: i64,
    pub author: String,
    pub post_id: i64,
}
