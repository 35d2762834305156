use time::OffsetDateTime;

#[derive(Debug, Clone)]
pub struct Post {
    pub id: i64,
    pub text: String,
    pub pub_date: OffsetDateTime,
    pub author_id: i64,
    /// Username of the author.
    pub author: String,
    pub group_id: Option<i64>,
    /// Media storage key of the attached image.
    pub image: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<String>,
}

/// Fields to overwrite on an existing post. `None` leaves the column as is.
#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub text: Option<String>,
    pub group_id: Option<Option<i64>>,
    pub image: Option<Option<String>>,
}

impl PostChanges {
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.group_id.is_none() && self.image.is_none()
    }
}
