use serde_json::Value;
use tracing::debug;

use crate::domain::{MAX_RECORDS_CEILING, SequenceRecord, SequenceRecordId};
use crate::entrez::{SequenceService, SummaryPage};
use crate::error::KiraError;

/// RefSeq prefixes of model (predicted) transcripts.
pub const PREDICTED_PREFIXES: [&str; 2] = ["XM", "XR"];

/// An accession split at its first underscore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accession {
    pub prefix: Option<String>,
    pub number: String,
}

impl Accession {
    pub fn parse(raw: &str) -> Self {
        match raw.split_once('_') {
            Some((prefix, rest)) => Self {
                prefix: Some(prefix.to_string()),
                number: rest.to_string(),
            },
            None => Self {
                prefix: None,
                number: raw.to_string(),
            },
        }
    }

    pub fn is_predicted(&self) -> bool {
        self.prefix
            .as_deref()
            .map(|prefix| PREDICTED_PREFIXES.contains(&prefix))
            .unwrap_or(false)
    }
}

/// Splits a record title into the species label (first two words) and the
/// gene description (the rest, single-spaced).
pub fn split_title(title: &str) -> (String, String) {
    let words = title.split_whitespace().collect::<Vec<_>>();
    let cut = words.len().min(2);
    (words[..cut].join(" "), words[cut..].join(" "))
}

/// Turns one `esummary` JSON response into records, in `result.uids` order.
pub fn parse_summary(
    payload: &Value,
    keep_hypothetical: bool,
) -> Result<Vec<SequenceRecord>, KiraError> {
    let Some(result) = payload.get("result") else {
        if let Some(messages) = payload["esummaryresult"].as_array() {
            let message = messages
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(KiraError::EntrezQuery(message));
        }
        if let Some(message) = payload["error"].as_str() {
            return Err(KiraError::EntrezQuery(message.to_string()));
        }
        return Err(KiraError::MalformedResponse(
            "esummary response has no result".to_string(),
        ));
    };
    let uids = result["uids"]
        .as_array()
        .ok_or_else(|| KiraError::MalformedResponse("esummary result has no uids".to_string()))?;

    let mut records = Vec::with_capacity(uids.len());
    for uid in uids {
        let uid = uid
            .as_str()
            .ok_or_else(|| KiraError::MalformedResponse(format!("esummary uid {uid}")))?;
        let item = result
            .get(uid)
            .ok_or_else(|| KiraError::MalformedResponse(format!("no document for uid {uid}")))?;
        if let Some(message) = item["error"].as_str() {
            return Err(KiraError::EntrezQuery(format!("uid {uid}: {message}")));
        }

        let accession = Accession::parse(&string_field(item, "caption", uid)?);
        if !keep_hypothetical && accession.is_predicted() {
            continue;
        }
        let length = u64_field(item, "slen", uid)?;
        let numeric_record_id = match u64_field(item, "gi", uid) {
            Ok(gi) => gi,
            Err(_) => uid
                .parse::<u64>()
                .map_err(|_| KiraError::MalformedResponse(format!("uid {uid} is not numeric")))?,
        };
        let (species_label, gene_description) = split_title(&string_field(item, "title", uid)?);

        records.push(SequenceRecord {
            species_label,
            length,
            gene_description,
            accession_number: accession.number,
            numeric_record_id,
        });
    }
    Ok(records)
}

/// Consecutive pages of at most `chunk_size` covering `total` ids.
pub fn plan_chunks(total: usize, chunk_size: usize) -> Vec<SummaryPage> {
    let chunk_size = chunk_size.max(1);
    (0..total)
        .step_by(chunk_size)
        .map(|start| SummaryPage {
            retstart: start + 1,
            retmax: chunk_size.min(total - start),
        })
        .collect()
}

/// Fetches and parses summaries for `ids`, one request per chunk of
/// [`MAX_RECORDS_CEILING`] ids. Any failing chunk fails the whole call.
pub fn fetch_summaries<S>(
    service: &S,
    ids: &[SequenceRecordId],
    keep_hypothetical: bool,
) -> Result<Vec<SequenceRecord>, KiraError>
where
    S: SequenceService + ?Sized,
{
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    if ids.len() <= MAX_RECORDS_CEILING {
        let payload = service.summary(ids, None)?;
        return parse_summary(&payload, keep_hypothetical);
    }

    let pages = plan_chunks(ids.len(), MAX_RECORDS_CEILING);
    debug!(ids = ids.len(), chunks = pages.len(), "chunked esummary");
    let mut records = Vec::new();
    for page in pages {
        let start = page.retstart - 1;
        let chunk = &ids[start..start + page.retmax];
        let payload = service.summary(chunk, Some(page))?;
        records.extend(parse_summary(&payload, keep_hypothetical)?);
    }
    Ok(records)
}

fn string_field(item: &Value, field: &str, uid: &str) -> Result<String, KiraError> {
    item[field]
        .as_str()
        .map(|value| value.to_string())
        .ok_or_else(|| KiraError::MalformedResponse(format!("uid {uid}: missing {field}")))
}

fn u64_field(item: &Value, field: &str, uid: &str) -> Result<u64, KiraError> {
    let value = match &item[field] {
        Value::Number(num) => num.as_u64(),
        Value::String(text) => text.trim().parse::<u64>().ok(),
        _ => None,
    };
    value.ok_or_else(|| KiraError::MalformedResponse(format!("uid {uid}: missing {field}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accession_prefix_split() {
        let predicted = Accession::parse("XM_123456");
        assert_eq!(predicted.number, "123456");
        assert!(predicted.is_predicted());

        let other = Accession::parse("AB_654321");
        assert_eq!(other.number, "654321");
        assert!(!other.is_predicted());

        let plain = Accession::parse("AY123456");
        assert_eq!(plain.prefix, None);
        assert_eq!(plain.number, "AY123456");
    }

    #[test]
    fn title_split() {
        let (species, gene) = split_title("Pythium oopapillum 18S ribosomal RNA gene");
        assert_eq!(species, "Pythium oopapillum");
        assert_eq!(gene, "18S ribosomal RNA gene");

        let (species, gene) = split_title("Pythium");
        assert_eq!(species, "Pythium");
        assert_eq!(gene, "");
    }

    #[test]
    fn chunk_plan() {
        let pages = plan_chunks(25_000, 10_000);
        let offsets = pages.iter().map(|page| page.retstart).collect::<Vec<_>>();
        let sizes = pages.iter().map(|page| page.retmax).collect::<Vec<_>>();
        assert_eq!(offsets, vec![1, 10_001, 20_001]);
        assert_eq!(sizes, vec![10_000, 10_000, 5_000]);
        assert!(plan_chunks(0, 10_000).is_empty());
        assert_eq!(plan_chunks(10_000, 10_000).len(), 1);
    }
}
