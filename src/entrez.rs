use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::EntrezSettings;
use crate::domain::{SequenceRecordId, TaxonomyId};
use crate::error::KiraError;
use crate::taxonomy::{Classification, parse_lineage_xml};

/// Outcome of an `esearch` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchHits {
    pub count: u64,
    pub ids: Vec<SequenceRecordId>,
}

/// Position of a summary chunk inside the full identifier list.
/// `retstart` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryPage {
    pub retstart: usize,
    pub retmax: usize,
}

/// Search and summary endpoints of the sequence database.
pub trait SequenceService: Send + Sync {
    fn search(&self, term: &str, retmax: usize) -> Result<SearchHits, KiraError>;
    fn summary(
        &self,
        ids: &[SequenceRecordId],
        page: Option<SummaryPage>,
    ) -> Result<Value, KiraError>;
}

/// Taxonomy name resolution and ancestry lookup.
pub trait TaxonomyService: Send + Sync {
    fn resolve_name(&self, name: &str) -> Result<Option<TaxonomyId>, KiraError>;
    fn lineage(&self, id: TaxonomyId) -> Result<Vec<Classification>, KiraError>;
}

#[derive(Clone)]
pub struct EntrezHttpClient {
    client: Client,
    settings: EntrezSettings,
}

impl EntrezHttpClient {
    pub fn new(settings: EntrezSettings) -> Result<Self, KiraError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kira-taxseq/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| KiraError::EntrezHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|err| KiraError::EntrezHttp(err.to_string()))?;
        Ok(Self { client, settings })
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{name}.fcgi", self.settings.base_url.trim_end_matches('/'))
    }

    fn identity_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("tool", self.settings.tool.clone())];
        if let Some(email) = &self.settings.email {
            params.push(("email", email.clone()));
        }
        if let Some(api_key) = &self.settings.api_key {
            params.push(("api_key", api_key.clone()));
        }
        params
    }

    fn esearch(&self, db: &str, term: &str, retmax: usize) -> Result<SearchHits, KiraError> {
        let mut params = vec![
            ("db", db.to_string()),
            ("term", term.to_string()),
            ("retmax", retmax.to_string()),
            ("retmode", "json".to_string()),
        ];
        params.extend(self.identity_params());
        let url = build_query_url(&self.endpoint("esearch"), &params);
        debug!(db, term, retmax, "esearch");

        let response = self.send_with_retries(|| self.client.get(&url))?;
        let payload: Value = handle_status(response)?
            .json()
            .map_err(|err| KiraError::MalformedResponse(err.to_string()))?;
        parse_search_hits(&payload)
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
    ) -> Result<reqwest::blocking::Response, KiraError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const BASE_DELAY_MS: u64 = 200;
        let max_retries = self.settings.max_retries;
        let mut attempt = 0usize;
        loop {
            let response = make_req().send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < max_retries && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        warn!(status, attempt, "Entrez request throttled or failed; retrying");
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < max_retries && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        warn!(error = %err, attempt, "Entrez request failed; retrying");
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(KiraError::EntrezHttp(err.to_string()));
                }
            }
        }
    }
}

impl SequenceService for EntrezHttpClient {
    fn search(&self, term: &str, retmax: usize) -> Result<SearchHits, KiraError> {
        self.esearch(&self.settings.database, term, retmax)
    }

    fn summary(
        &self,
        ids: &[SequenceRecordId],
        page: Option<SummaryPage>,
    ) -> Result<Value, KiraError> {
        let id_list = ids
            .iter()
            .map(SequenceRecordId::as_str)
            .collect::<Vec<_>>()
            .join(",");
        let mut params = vec![
            ("db", self.settings.database.clone()),
            ("id", id_list),
            ("retmode", "json".to_string()),
        ];
        // The id list already is the chunk, so E-utilities count retstart
        // from its first element; only the size is forwarded.
        if let Some(page) = page {
            params.push(("retmax", page.retmax.to_string()));
            debug!(
                retstart = page.retstart,
                retmax = page.retmax,
                "esummary chunk"
            );
        } else {
            debug!(ids = ids.len(), "esummary");
        }
        params.extend(self.identity_params());

        let url = self.endpoint("esummary");
        let response = self.send_with_retries(|| self.client.post(&url).form(&params))?;
        handle_status(response)?
            .json()
            .map_err(|err| KiraError::MalformedResponse(err.to_string()))
    }
}

impl TaxonomyService for EntrezHttpClient {
    fn resolve_name(&self, name: &str) -> Result<Option<TaxonomyId>, KiraError> {
        let hits = self.esearch("taxonomy", name, 20)?;
        if hits.ids.len() > 1 {
            let candidates = hits
                .ids
                .iter()
                .map(SequenceRecordId::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            warn!(name, candidates = %candidates, "ambiguous taxon name; using the first match");
        }
        hits.ids
            .first()
            .map(|id| {
                id.as_str()
                    .parse::<TaxonomyId>()
                    .map_err(|_| KiraError::MalformedResponse(format!("taxonomy id {id}")))
            })
            .transpose()
    }

    fn lineage(&self, id: TaxonomyId) -> Result<Vec<Classification>, KiraError> {
        let mut params = vec![
            ("db", "taxonomy".to_string()),
            ("id", id.to_string()),
            ("retmode", "xml".to_string()),
        ];
        params.extend(self.identity_params());
        let url = build_query_url(&self.endpoint("efetch"), &params);
        debug!(%id, "efetch taxonomy");

        let response = self.send_with_retries(|| self.client.get(&url))?;
        let text = handle_status(response)?
            .text()
            .map_err(|err| KiraError::EntrezHttp(err.to_string()))?;
        parse_lineage_xml(&text)
    }
}

/// Reads `count` and `idlist` out of an `esearch` JSON payload. A zero count
/// is a valid, empty answer.
pub fn parse_search_hits(payload: &Value) -> Result<SearchHits, KiraError> {
    if let Some(message) = payload["error"].as_str() {
        return Err(KiraError::EntrezQuery(message.to_string()));
    }
    let result = payload
        .get("esearchresult")
        .ok_or_else(|| KiraError::MalformedResponse("missing esearchresult".to_string()))?;
    if let Some(message) = result["ERROR"].as_str() {
        return Err(KiraError::EntrezQuery(message.to_string()));
    }

    let count = match &result["count"] {
        Value::String(text) => text
            .parse::<u64>()
            .map_err(|_| KiraError::MalformedResponse(format!("esearch count {text:?}")))?,
        Value::Number(num) => num
            .as_u64()
            .ok_or_else(|| KiraError::MalformedResponse(format!("esearch count {num}")))?,
        _ => {
            return Err(KiraError::MalformedResponse(
                "missing esearch count".to_string(),
            ));
        }
    };

    let ids = result["idlist"]
        .as_array()
        .map(|list| {
            list.iter()
                .filter_map(|value| match value {
                    Value::String(text) => Some(SequenceRecordId::from(text.as_str())),
                    Value::Number(num) => Some(SequenceRecordId::from(num.to_string())),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(SearchHits { count, ids })
}

fn handle_status(
    response: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, KiraError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let message = response
        .text()
        .unwrap_or_else(|_| "Entrez request failed".to_string());
    Err(KiraError::EntrezStatus { status, message })
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

fn encode_url_component(value: &str) -> String {
    let mut out = String::new();
    for byte in value.as_bytes() {
        let ch = *byte as char;
        if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == '.' || ch == '~' {
            out.push(ch);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

pub fn build_query_url(base: &str, params: &[(&str, String)]) -> String {
    if params.is_empty() {
        return base.to_string();
    }
    let mut out = String::from(base);
    out.push('?');
    for (idx, (key, value)) in params.iter().enumerate() {
        if idx > 0 {
            out.push('&');
        }
        out.push_str(&encode_url_component(key));
        out.push('=');
        out.push_str(&encode_url_component(value));
    }
    out
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn encodes_search_term() {
        let url = build_query_url(
            "https://example.org/esearch.fcgi",
            &[
                ("db", "nuccore".to_string()),
                ("term", "txid4797[Organism:exp] AND 1:3000[SLEN]".to_string()),
            ],
        );
        assert_eq!(
            url,
            "https://example.org/esearch.fcgi?db=nuccore&term=txid4797%5BOrganism%3Aexp%5D%20AND%201%3A3000%5BSLEN%5D"
        );
    }

    #[test]
    fn search_hits_from_payload() {
        let payload = json!({
            "esearchresult": {"count": "2", "retmax": "2", "idlist": ["672238847", "672238846"]}
        });
        let hits = parse_search_hits(&payload).unwrap();
        assert_eq!(hits.count, 2);
        assert_eq!(hits.ids[1].as_str(), "672238846");
    }

    #[test]
    fn zero_count_is_not_an_error() {
        let payload = json!({"esearchresult": {"count": "0", "idlist": []}});
        let hits = parse_search_hits(&payload).unwrap();
        assert_eq!(hits, SearchHits::default());
    }

    #[test]
    fn query_errors_surface() {
        let payload = json!({"esearchresult": {"ERROR": "Invalid query"}});
        assert_matches!(parse_search_hits(&payload), Err(KiraError::EntrezQuery(_)));
        assert_matches!(
            parse_search_hits(&json!({"header": {}})),
            Err(KiraError::MalformedResponse(_))
        );
    }
}
