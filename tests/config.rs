use std::fs;

use assert_matches::assert_matches;

use kira_taxseq::config::{ConfigLoader, EUTILS_BASE};
use kira_taxseq::error::KiraError;

#[test]
fn resolve_explicit_config_file() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("kira-taxseq.json");
    fs::write(
        &path,
        r#"{
            "schema_version": 1,
            "entrez": {"email": "lab@example.org", "max_retries": 5},
            "defaults": {"seq_range": "100:2000", "limit": 40, "get_related": true, "workers": 4}
        }"#,
    )
    .unwrap();

    let config = ConfigLoader::resolve(path.to_str()).unwrap();
    assert_eq!(config.schema_version, Some(1));
    assert_eq!(config.entrez.base_url, EUTILS_BASE);
    assert_eq!(config.entrez.max_retries, 5);
    assert!(config.defaults.get_related);
    assert_eq!(config.defaults.workers, 4);

    let constraints = config.defaults.constraints();
    assert_eq!(constraints.seq_range.to_string(), "100:2000");
    assert_eq!(constraints.max_records, 40);
    assert!(!constraints.keep_hypothetical);
}

#[test]
fn explicit_missing_file_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("absent.json");
    assert_matches!(
        ConfigLoader::resolve(path.to_str()),
        Err(KiraError::ConfigRead(_))
    );
}

#[test]
fn invalid_range_in_config_is_rejected() {
    assert_matches!(
        ConfigLoader::parse(r#"{"defaults": {"seq_range": "3000:1"}}"#),
        Err(KiraError::ConfigParse(_))
    );
}
