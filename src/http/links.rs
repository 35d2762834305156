use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, Uri};
use url::Url;

use crate::AppState;

/// Absolute URL building for the current request.
#[derive(Debug, Clone)]
pub struct Links {
    origin: String,
    uri: Uri,
    media_base: String,
}

impl Links {
    pub fn new(origin: impl Into<String>, uri: Uri, media_public_url: Option<&str>) -> Self {
        let origin = origin.into();
        let media_base = match media_public_url {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => format!("{}/media", origin),
        };
        Self {
            origin,
            uri,
            media_base,
        }
    }

    pub fn media_url(&self, key: &str) -> String {
        format!("{}/{}", self.media_base, key)
    }

    /// The current request URL with `limit` and `offset` replaced. `offset`
    /// is dropped when `None`.
    pub fn page_url(&self, limit: i64, offset: Option<i64>) -> Option<String> {
        let mut url = Url::parse(&format!("{}{}", self.origin, self.uri)).ok()?;
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(name, _)| name != "limit" && name != "offset")
            .map(|(name, value)| (name.into_owned(), value.into_owned()))
            .collect();

        {
            let mut query = url.query_pairs_mut();
            query.clear();
            query.extend_pairs(kept);
            query.append_pair("limit", &limit.to_string());
            if let Some(offset) = offset {
                query.append_pair("offset", &offset.to_string());
            }
        }

        Some(url.into())
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for Links {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let host = parts
            .headers
            .get(header::HOST)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .or_else(|| parts.uri.authority().map(|authority| authority.to_string()))
            .unwrap_or_else(|| "localhost".to_string());

        Ok(Links::new(
            format!("http://{}", host),
            parts.uri.clone(),
            state.media_public_url.as_deref(),
        ))
    }
}
