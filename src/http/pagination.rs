use serde::{Deserialize, Serialize};

use crate::app::posts::Page;
use crate::http::links::Links;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<String>,
    pub offset: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// The page a request asks for, or `None` when no limit applies. Invalid
/// limits fall back to `default_limit`; invalid offsets to zero.
pub fn resolve_page(query: &PageQuery, default_limit: Option<u32>) -> Option<Page> {
    let limit = query
        .limit
        .as_deref()
        .and_then(|value| value.trim().parse::<i64>().ok())
        .filter(|limit| *limit > 0)
        .or(default_limit.map(i64::from))?;
    let offset = query
        .offset
        .as_deref()
        .and_then(|value| value.trim().parse::<i64>().ok())
        .filter(|offset| *offset >= 0)
        .unwrap_or(0);

    Some(Page { limit, offset })
}

impl<T> Paginated<T> {
    pub fn new(page: Page, count: i64, results: Vec<T>, links: &Links) -> Self {
        let next = next_offset(page, count).and_then(|offset| links.page_url(page.limit, Some(offset)));
        let previous = previous_offset(page).and_then(|offset| links.page_url(page.limit, offset));
        Self {
            count,
            next,
            previous,
            results,
        }
    }
}

/// Past the end of the `i64` range there is no next page.
fn next_offset(page: Page, count: i64) -> Option<i64> {
    let next = page.offset.checked_add(page.limit)?;
    (next < count).then_some(next)
}

/// `Some(None)` links to the first page without an explicit offset.
fn previous_offset(page: Page) -> Option<Option<i64>> {
    if page.offset <= 0 {
        return None;
    }
    let previous = page.offset - page.limit;
    Some((previous > 0).then_some(previous))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(limit: Option<&str>, offset: Option<&str>) -> PageQuery {
        PageQuery {
            limit: limit.map(str::to_string),
            offset: offset.map(str::to_string),
        }
    }

    #[test]
    fn no_limit_means_no_pagination() {
        assert_eq!(resolve_page(&query(None, Some("3")), None), None);
        assert_eq!(resolve_page(&query(Some("abc"), None), None), None);
    }

    #[test]
    fn limit_falls_back_to_page_size() {
        assert_eq!(
            resolve_page(&query(Some("-2"), None), Some(10)),
            Some(Page { limit: 10, offset: 0 })
        );
        assert_eq!(
            resolve_page(&query(Some("3"), Some("oops")), Some(10)),
            Some(Page { limit: 3, offset: 0 })
        );
    }

    #[test]
    fn neighbouring_offsets() {
        let page = Page { limit: 2, offset: 2 };
        assert_eq!(next_offset(page, 5), Some(4));
        assert_eq!(next_offset(page, 4), None);
        assert_eq!(previous_offset(page), Some(None));
        assert_eq!(previous_offset(Page { limit: 2, offset: 5 }), Some(Some(3)));
        assert_eq!(previous_offset(Page { limit: 2, offset: 0 }), None);
    }

    #[test]
    fn huge_limits_have_no_next_page() {
        let page = resolve_page(&query(Some("9223372036854775807"), Some("1")), None).unwrap();
        assert_eq!(next_offset(page, 5), None);
        assert_eq!(previous_offset(page), Some(None));
        assert_eq!(next_offset(Page { limit: 1, offset: i64::MAX }, i64::MAX), None);
    }

    #[test]
    fn envelope_links() {
        let links = Links::new("http://localhost", "/v1/posts/?limit=2&offset=2".parse().unwrap(), None);
        let page = Paginated::new(Page { limit: 2, offset: 2 }, 5, vec![1, 2], &links);
        assert_eq!(page.next.as_deref(), Some("http://localhost/v1/posts/?limit=2&offset=4"));
        assert_eq!(page.previous.as_deref(), Some("http://localhost/v1/posts/?limit=2"));
    }
}
