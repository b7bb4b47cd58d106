use std::time::Duration;

use harvest_core::{Page, Query, WinRecord};
use harvest_logging::harvest_trace;
use serde_json::Value;
use url::Url;

use crate::{FailureKind, HarvestError, PageError};

pub const DEFAULT_ENDPOINT: &str = "https://www.masslottery.com/api/v1/winners/query";

/// Largest total a response may report before it is treated as malformed.
/// Bounds the offset plan built from it.
pub const MAX_REPORTED_TOTAL: i64 = 10_000_000;

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub endpoint: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Value of the `sort` parameter; omitted when `None`.
    pub sort: Option<String>,
    pub records_field: String,
    pub total_field: String,
    /// Characters of an error body kept in failure messages.
    pub max_body_excerpt: usize,
    pub max_reported_total: i64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            sort: Some("newestFirst".to_string()),
            records_field: "pageOfWinners".to_string(),
            total_field: "totalNumberOfWinners".to_string(),
            max_body_excerpt: 200,
            max_reported_total: MAX_REPORTED_TOTAL,
        }
    }
}

/// Fetches one page of a query. Implementations must be safe to call from
/// several workers at once.
#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, query: &Query, offset: u64, page_size: u64) -> Result<Page, PageError>;
}

/// HTTP page fetcher over one shared, connection-reusing client.
#[derive(Debug, Clone)]
pub struct ReqwestPageFetcher {
    client: reqwest::Client,
    endpoint: Url,
    settings: FetchSettings,
}

impl ReqwestPageFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self, HarvestError> {
        let endpoint = Url::parse(&settings.endpoint)
            .map_err(|err| HarvestError::Client(format!("endpoint {}: {err}", settings.endpoint)))?;
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| HarvestError::Client(err.to_string()))?;
        Ok(Self {
            client,
            endpoint,
            settings,
        })
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    pub fn page_url(&self, query: &Query, offset: u64, page_size: u64) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("date_from", &query.date_from().format("%Y-%m-%d").to_string());
            pairs.append_pair("date_to", &query.date_to().format("%Y-%m-%d").to_string());
            if let Some(sort) = &self.settings.sort {
                pairs.append_pair("sort", sort);
            }
            if let Some(cities) = query.categories_param() {
                pairs.append_pair("cities", &cities);
            }
            pairs.append_pair("start_index", &offset.to_string());
            pairs.append_pair("count", &page_size.to_string());
        }
        url
    }
}

#[async_trait::async_trait]
impl PageFetcher for ReqwestPageFetcher {
    async fn fetch(&self, query: &Query, offset: u64, page_size: u64) -> Result<Page, PageError> {
        let url = self.page_url(query, offset, page_size);
        harvest_trace!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| map_reqwest_error(err, offset))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PageError::new(
                FailureKind::HttpStatus(status.as_u16()),
                offset,
                format!(
                    "HTTP {} | {}",
                    status.as_u16(),
                    excerpt(&body, self.settings.max_body_excerpt)
                ),
            ));
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| map_reqwest_error(err, offset))?;
        parse_page(&body, offset, page_size, &self.settings)
    }
}

/// Validate a response body and turn it into a [`Page`].
fn parse_page(
    body: &[u8],
    offset: u64,
    page_size: u64,
    settings: &FetchSettings,
) -> Result<Page, PageError> {
    let malformed = |message: String| PageError::new(FailureKind::MalformedResponse, offset, message);

    let value: Value = serde_json::from_slice(body).map_err(|err| {
        let text = String::from_utf8_lossy(body);
        malformed(format!(
            "invalid json ({err}) | {}",
            excerpt(&text, settings.max_body_excerpt)
        ))
    })?;

    let Value::Object(mut object) = value else {
        return Err(malformed("response is not a json object".into()));
    };

    let reported_total = object
        .get(&settings.total_field)
        .and_then(parse_total)
        .ok_or_else(|| malformed(format!("missing or non-integer `{}`", settings.total_field)))?;

    if reported_total > settings.max_reported_total {
        return Err(malformed(format!(
            "reported total {reported_total} exceeds the limit of {}",
            settings.max_reported_total
        )));
    }

    let Some(Value::Array(items)) = object.remove(&settings.records_field) else {
        return Err(malformed(format!("missing or non-array `{}`", settings.records_field)));
    };

    if items.len() as u64 > page_size {
        return Err(malformed(format!(
            "page holds {} records, more than the requested {page_size}",
            items.len()
        )));
    }

    let records = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            WinRecord::from_value(item)
                .ok_or_else(|| malformed(format!("record {index} is not an object")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Page {
        offset,
        reported_total,
        records,
    })
}

/// Integer totals, also accepted as integer strings.
fn parse_total(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

fn map_reqwest_error(err: reqwest::Error, offset: u64) -> PageError {
    if err.is_timeout() {
        return PageError::new(FailureKind::Timeout, offset, err.to_string());
    }
    PageError::new(FailureKind::Transport, offset, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    #[test]
    fn parses_records_and_total() {
        let raw = body(json!({
            "totalNumberOfWinners": 3,
            "pageOfWinners": [{ "name": "a" }, { "name": "b" }],
        }));
        let page = parse_page(&raw, 200, 200, &FetchSettings::default()).unwrap();
        assert_eq!(page.offset, 200);
        assert_eq!(page.reported_total, 3);
        assert_eq!(page.records.len(), 2);
    }

    #[test]
    fn accepts_string_total() {
        let raw = body(json!({ "totalNumberOfWinners": "12", "pageOfWinners": [] }));
        let page = parse_page(&raw, 0, 200, &FetchSettings::default()).unwrap();
        assert_eq!(page.reported_total, 12);
    }

    #[test]
    fn missing_fields_are_malformed() {
        let settings = FetchSettings::default();
        for value in [
            json!({ "pageOfWinners": [] }),
            json!({ "totalNumberOfWinners": 1 }),
            json!({ "totalNumberOfWinners": 1, "pageOfWinners": {} }),
            json!({ "totalNumberOfWinners": 1, "pageOfWinners": [1] }),
            json!([]),
        ] {
            let err = parse_page(&body(value.clone()), 0, 200, &settings).unwrap_err();
            assert_eq!(err.kind, FailureKind::MalformedResponse, "{value}");
        }
    }

    #[test]
    fn oversized_page_is_malformed() {
        let raw = body(json!({
            "totalNumberOfWinners": 10,
            "pageOfWinners": [{}, {}, {}],
        }));
        let err = parse_page(&raw, 0, 2, &FetchSettings::default()).unwrap_err();
        assert_eq!(err.kind, FailureKind::MalformedResponse);
    }

    #[test]
    fn absurd_total_is_malformed() {
        let raw = body(json!({
            "totalNumberOfWinners": MAX_REPORTED_TOTAL + 1,
            "pageOfWinners": [],
        }));
        let err = parse_page(&raw, 0, 200, &FetchSettings::default()).unwrap_err();
        assert_eq!(err.kind, FailureKind::MalformedResponse);
        assert!(err.message.contains("exceeds the limit"));

        let at_limit = body(json!({
            "totalNumberOfWinners": MAX_REPORTED_TOTAL,
            "pageOfWinners": [],
        }));
        let page = parse_page(&at_limit, 0, 200, &FetchSettings::default()).unwrap();
        assert_eq!(page.reported_total, MAX_REPORTED_TOTAL);
    }

    #[test]
    fn excerpt_respects_char_boundaries() {
        assert_eq!(excerpt("ééé", 2), "éé");
        assert_eq!(excerpt("ab", 10), "ab");
    }
}
