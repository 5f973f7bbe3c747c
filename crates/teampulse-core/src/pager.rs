//! Offset pagination
//!
//! Drives the request client across `offset = 0, page_size, 2*page_size, ...`
//! until the provider-reported total is covered or a page comes back empty.
//! Any request failure aborts the whole fetch; partial lists are never
//! returned.

use reqwest::header::HeaderMap;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::http::{HttpRequest, HttpResponse, RequestClient};

/// One page as reported by the provider
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub items: Vec<Value>,
    /// Provider-reported total, when present
    pub total: Option<usize>,
}

impl Page {
    fn from_json(value: &Value, items_key: &str) -> Result<Self> {
        let items = match value.get(items_key) {
            Some(Value::Array(items)) => items.clone(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                return Err(Error::validation(format!(
                    "Expected `{}` to be an array, got {}",
                    items_key, other
                )))
            }
        };
        let total = value.get("total").and_then(Value::as_u64).map(|t| t as usize);
        Ok(Self { items, total })
    }
}

/// How a paginated endpoint is addressed and how its pages are read
pub trait PageProtocol: Send + Sync {
    fn page_request(&self, offset: usize, page_size: usize) -> HttpRequest;
    fn parse_page(&self, response: &HttpResponse) -> Result<Page>;
}

/// GET with `offset`/`page_size` query params, response `{items, total}`
#[derive(Debug, Clone)]
pub struct OffsetQuery {
    url: String,
    headers: HeaderMap,
    extra: Vec<(String, String)>,
}

impl OffsetQuery {
    pub fn new(url: impl Into<String>, headers: &HeaderMap) -> Self {
        Self {
            url: url.into(),
            headers: headers.clone(),
            extra: Vec::new(),
        }
    }

    /// Additional query parameter sent with every page
    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.extra.push((key.into(), value.to_string()));
        self
    }
}

impl PageProtocol for OffsetQuery {
    fn page_request(&self, offset: usize, page_size: usize) -> HttpRequest {
        let mut request = HttpRequest::get(&self.url)
            .headers(&self.headers)
            .query("offset", offset)
            .query("page_size", page_size);
        for (key, value) in &self.extra {
            request = request.query(key.clone(), value);
        }
        request
    }

    fn parse_page(&self, response: &HttpResponse) -> Result<Page> {
        Page::from_json(&response.json::<Value>()?, "items")
    }
}

/// Jira search: POST `{jql, startAt, maxResults, fields}`, response `{issues, total}`
#[derive(Debug, Clone)]
pub struct JqlSearch {
    url: String,
    headers: HeaderMap,
    jql: String,
    fields: Vec<String>,
}

impl JqlSearch {
    pub fn new(url: impl Into<String>, headers: &HeaderMap, jql: impl Into<String>, fields: &[String]) -> Self {
        Self {
            url: url.into(),
            headers: headers.clone(),
            jql: jql.into(),
            fields: fields.to_vec(),
        }
    }

    /// Body for a count-only search
    pub fn count_request(&self) -> HttpRequest {
        HttpRequest::post(
            &self.url,
            serde_json::json!({
                "jql": self.jql,
                "maxResults": 0,
                "fields": ["key"],
            }),
        )
        .headers(&self.headers)
    }
}

impl PageProtocol for JqlSearch {
    fn page_request(&self, offset: usize, page_size: usize) -> HttpRequest {
        HttpRequest::post(
            &self.url,
            serde_json::json!({
                "jql": self.jql,
                "startAt": offset,
                "maxResults": page_size,
                "fields": self.fields,
            }),
        )
        .headers(&self.headers)
    }

    fn parse_page(&self, response: &HttpResponse) -> Result<Page> {
        Page::from_json(&response.json::<Value>()?, "issues")
    }
}

pub struct Pager<'a> {
    client: &'a RequestClient,
}

impl<'a> Pager<'a> {
    pub fn new(client: &'a RequestClient) -> Self {
        Self { client }
    }

    /// Every item behind a GET `{items, total}` endpoint
    pub async fn fetch_all(&self, endpoint: &str, headers: &HeaderMap, page_size: usize) -> Result<Vec<Value>> {
        self.fetch_with(&OffsetQuery::new(endpoint, headers), page_size, None)
            .await
    }

    /// Page through `protocol`, optionally stopping once `limit` items are held
    pub async fn fetch_with(
        &self,
        protocol: &dyn PageProtocol,
        page_size: usize,
        limit: Option<usize>,
    ) -> Result<Vec<Value>> {
        if page_size == 0 {
            return Err(Error::validation("page_size must be greater than 0"));
        }

        let mut items: Vec<Value> = Vec::new();
        let mut offset = 0usize;

        loop {
            let response = self.client.request(protocol.page_request(offset, page_size)).await?;
            let page = protocol.parse_page(&response)?;
            let received = page.items.len();
            let total = page.total.unwrap_or(offset + received);

            items.extend(page.items);
            log::info!(
                "[pager] Fetched {}/{} items (offset {})",
                items.len(),
                total,
                offset
            );

            if received == 0 || offset + page_size >= total {
                break;
            }
            offset += page_size;

            if let Some(limit) = limit {
                if offset >= limit {
                    log::info!("[pager] Reached item cap of {}", limit);
                    break;
                }
            }
        }

        if let Some(limit) = limit {
            items.truncate(limit);
        }
        Ok(items)
    }
}
