//! Common test helpers shared across the integration suite.

use oclc_resolver::{Field, Leader, MarcReader, MarcWriter, Record, ServiceConfig};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Access token handed out by the mock token endpoint.
#[allow(dead_code)]
pub const TOKEN: &str = "tk-test";
/// Client id used in every test configuration.
#[allow(dead_code)]
pub const CLIENT_KEY: &str = "client-id";
/// Client secret used in every test configuration.
#[allow(dead_code)]
pub const CLIENT_SECRET: &str = "client-secret";
/// Delay longer than the configured request timeout.
#[allow(dead_code)]
pub const SLOW_RESPONSE: Duration = Duration::from_secs(3);

/// Configuration pointing at the mock server, with a one-second timeout.
pub fn config_for(server: &MockServer) -> ServiceConfig {
    ServiceConfig::new(
        &format!("{}/search", server.uri()),
        &format!("{}/token", server.uri()),
        CLIENT_KEY,
        CLIENT_SECRET,
    )
    .with_timeout(Duration::from_secs(1))
}

/// Start a mock server whose token endpoint grants [`TOKEN`].
pub async fn start_service() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": TOKEN,
            "token_type": "bearer",
            "expires_in": 1199,
            "scope": "wcapi:view_bib"
        })))
        .mount(&server)
        .await;
    server
}

/// Answer the search for `q` with `response`.
pub async fn mount_search(server: &MockServer, q: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", q))
        .respond_with(response)
        .mount(server)
        .await;
}

/// A matching search response carrying an OCLC number.
#[allow(dead_code)]
pub fn oclc_match(oclc_number: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "numberOfRecords": 1,
        "bibRecords": [{
            "identifier": { "oclcNumber": oclc_number },
            "work": { "id": "unused" }
        }]
    }))
}

/// A matching search response carrying a Work ID.
#[allow(dead_code)]
pub fn work_match(work_id: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "numberOfRecords": 1,
        "bibRecords": [{
            "identifier": { "oclcNumber": "1" },
            "work": { "id": work_id }
        }]
    }))
}

/// A search response with no hits.
#[allow(dead_code)]
pub fn no_match() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "numberOfRecords": 0 }))
}

/// A book record with an optional ISBN in `020 $a`.
#[allow(dead_code)]
pub fn book(control_number: &str, isbn: Option<&str>) -> Record {
    let mut record = Record::new(Leader::default());
    record.add_control_field_str("001", control_number);
    if let Some(isbn) = isbn {
        let mut field = Field::new("020".to_string(), ' ', ' ');
        field.add_subfield_str('a', isbn);
        record.add_field(field);
    }
    let mut title = Field::new("245".to_string(), '1', '0');
    title.add_subfield_str('a', "Test title");
    record.add_field(title);
    record
}

/// Encode records as one ISO 2709 stream.
#[allow(dead_code)]
pub fn encode(records: &[Record]) -> Vec<u8> {
    let mut buffer = Vec::new();
    let mut writer = MarcWriter::new(&mut buffer);
    for record in records {
        writer.write_record(record).unwrap();
    }
    buffer
}

/// Split an ISO 2709 stream into raw record chunks.
#[allow(dead_code)]
pub fn raw_chunks(bytes: &[u8]) -> Vec<Vec<u8>> {
    let mut reader = MarcReader::new(bytes);
    std::iter::from_fn(|| reader.read_raw().unwrap())
        .map(|raw| raw.bytes)
        .collect()
}

/// Decode every record of an ISO 2709 stream.
#[allow(dead_code)]
pub fn decode(bytes: &[u8]) -> Vec<Record> {
    let mut reader = MarcReader::new(bytes);
    std::iter::from_fn(|| reader.read_record().unwrap()).collect()
}
