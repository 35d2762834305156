#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub id: i64,
    pub title: String,
    pub slug: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewGroup {
    pub title: String,
    pub slug: Option<String>,
    pub description: Option<String>,
}
