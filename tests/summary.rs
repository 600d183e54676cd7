use assert_matches::assert_matches;
use serde_json::json;

use kira_taxseq::error::KiraError;
use kira_taxseq::summary::parse_summary;

fn payload() -> serde_json::Value {
    json!({
        "header": {"type": "esummary", "version": "0.3"},
        "result": {
            "uids": ["672238847", "1034074741", "530788331", "33150547"],
            "672238847": {
                "uid": "672238847",
                "caption": "AB_654321",
                "title": "Pythium oopapillum isolate PO-1 18S ribosomal RNA gene, partial sequence",
                "slen": 1024,
                "gi": 672238847
            },
            "1034074741": {
                "uid": "1034074741",
                "caption": "XM_123456",
                "title": "PREDICTED: Pythium insidiosum hypothetical protein mRNA",
                "slen": 2011,
                "gi": 1034074741
            },
            "530788331": {
                "uid": "530788331",
                "caption": "XR_000111",
                "title": "PREDICTED: Pythium ultimum uncharacterized ncRNA",
                "slen": 640
            },
            "33150547": {
                "uid": "33150547",
                "caption": "AY123456",
                "title": "Pythium   oopapillum  internal transcribed  spacer 1",
                "slen": "812"
            }
        }
    })
}

#[test]
fn predicted_records_dropped_by_default() {
    let records = parse_summary(&payload(), false).unwrap();
    assert_eq!(records.len(), 2);

    assert_eq!(records[0].accession_number, "654321");
    assert_eq!(records[0].species_label, "Pythium oopapillum");
    assert_eq!(
        records[0].gene_description,
        "isolate PO-1 18S ribosomal RNA gene, partial sequence"
    );
    assert_eq!(records[0].length, 1024);
    assert_eq!(records[0].numeric_record_id, 672238847);

    assert_eq!(records[1].accession_number, "AY123456");
    assert_eq!(records[1].gene_description, "internal transcribed spacer 1");
    assert_eq!(records[1].length, 812);
    assert_eq!(records[1].numeric_record_id, 33150547);
}

#[test]
fn predicted_records_kept_on_request() {
    let records = parse_summary(&payload(), true).unwrap();
    let accessions = records
        .iter()
        .map(|record| record.accession_number.as_str())
        .collect::<Vec<_>>();
    assert_eq!(accessions, vec!["654321", "123456", "000111", "AY123456"]);
    assert_eq!(records[1].species_label, "PREDICTED: Pythium");
    assert_eq!(records[2].numeric_record_id, 530788331);
}

#[test]
fn missing_fields_are_malformed() {
    let payload = json!({
        "result": {
            "uids": ["1"],
            "1": {"uid": "1", "title": "Pythium oopapillum 18S", "slen": 10}
        }
    });
    assert_matches!(
        parse_summary(&payload, false),
        Err(KiraError::MalformedResponse(_))
    );
    assert_matches!(
        parse_summary(&json!({"header": {}}), false),
        Err(KiraError::MalformedResponse(_))
    );
}

#[test]
fn service_errors_are_reported() {
    let payload = json!({"esummaryresult": ["Empty id list - nothing todo"]});
    assert_matches!(
        parse_summary(&payload, false),
        Err(KiraError::EntrezQuery(message)) if message.contains("Empty id list")
    );

    let payload = json!({
        "result": {"uids": ["9"], "9": {"uid": "9", "error": "cannot get document summary"}}
    });
    assert_matches!(
        parse_summary(&payload, false),
        Err(KiraError::EntrezQuery(_))
    );
}
