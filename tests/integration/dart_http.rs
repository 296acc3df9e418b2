//! DART clients against a local wiremock server.

use chrono::{Duration, NaiveDate};
use secrecy::SecretString;
use std::io::{Cursor, Write};
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockBuilder, MockServer, ResponseTemplate};

use lp_scout::dart::registry::RegistryLoader;
use lp_scout::dart::search::DisclosureSearch;
use lp_scout::dart::statement::StatementClient;
use lp_scout::dart::{NoData, StatementSource};
use lp_scout::engine::extractor::MetricExtractor;
use lp_scout::types::{Consolidation, ReportKind, ScanError};

const TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

const CORP_CODE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<result>
    <list>
        <corp_code>00126380</corp_code>
        <corp_name>삼성전자</corp_name>
        <stock_code>005930</stock_code>
        <modify_date>20240101</modify_date>
    </list>
    <list>
        <corp_code>00434003</corp_code>
        <corp_name>비상장회사</corp_name>
        <stock_code> </stock_code>
        <modify_date>20240101</modify_date>
    </list>
    <list>
        <corp_code>00164779</corp_code>
        <corp_name>에스케이하이닉스</corp_name>
        <stock_code>000660</stock_code>
        <modify_date>20240101</modify_date>
    </list>
</result>"#;

fn key() -> SecretString {
    SecretString::new("test-key".to_string())
}

fn zip_of(member: &str, body: &[u8]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file(member, zip::write::SimpleFileOptions::default())
        .unwrap();
    writer.write_all(body).unwrap();
    writer.finish().unwrap().into_inner()
}

fn registry(server: &MockServer) -> RegistryLoader {
    RegistryLoader::new(&server.uri(), key(), TIMEOUT, Duration::hours(24)).unwrap()
}

fn statements(server: &MockServer) -> StatementClient {
    StatementClient::new(
        &server.uri(),
        key(),
        Consolidation::Consolidated,
        TIMEOUT,
        Duration::minutes(30),
    )
    .unwrap()
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_registry_loads_listed_entities() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/corpCode.xml"))
        .and(query_param("crtfc_key", "test-key"))
        .respond_with(
            ResponseTemplate::new(200).set_body_bytes(zip_of("CORPCODE.xml", CORP_CODE_XML.as_bytes())),
        )
        .mount(&server)
        .await;

    let entities = registry(&server).load().await.unwrap();
    let codes: Vec<&str> = entities.iter().map(|e| e.corp_code.as_str()).collect();
    assert_eq!(codes, vec!["00126380", "00164779"]);
    assert_eq!(entities[1].stock_code, "000660");
}

#[tokio::test]
async fn test_registry_is_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/corpCode.xml"))
        .respond_with(
            ResponseTemplate::new(200).set_body_bytes(zip_of("CORPCODE.xml", CORP_CODE_XML.as_bytes())),
        )
        .expect(1)
        .mount(&server)
        .await;

    let loader = registry(&server);
    let first = loader.load().await.unwrap();
    let second = loader.load().await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_registry_invalidate_refetches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/corpCode.xml"))
        .respond_with(
            ResponseTemplate::new(200).set_body_bytes(zip_of("CORPCODE.xml", CORP_CODE_XML.as_bytes())),
        )
        .expect(2)
        .mount(&server)
        .await;

    let loader = registry(&server);
    loader.load().await.unwrap();
    loader.invalidate();
    loader.load().await.unwrap();
}

#[tokio::test]
async fn test_registry_http_error_is_source_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/corpCode.xml"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = registry(&server).load().await.unwrap_err();
    assert!(matches!(err, ScanError::SourceUnavailable(_)));
}

#[tokio::test]
async fn test_registry_non_zip_is_source_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/corpCode.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"status":"010","message":"등록되지 않은 키입니다."}"#,
        ))
        .mount(&server)
        .await;

    let err = registry(&server).load().await.unwrap_err();
    assert!(matches!(err, ScanError::SourceUnavailable(_)));
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

const STATEMENT_OK: &str = r#"{
    "status": "000",
    "message": "정상",
    "list": [
        {"account_nm": "자산총계", "thstrm_amount": "455,905,980,000,000"},
        {"account_nm": "이익잉여금(결손금)", "thstrm_amount": "346,652,238,000,000"},
        {"account_nm": "자본총계", "thstrm_amount": "363,677,865,000,000"},
        {"account_nm": "매출액", "thstrm_amount": "300,870,903,000,000"}
    ]
}"#;

fn statement_mock(corp_code: &str) -> MockBuilder {
    Mock::given(method("GET"))
        .and(path("/fnlttSinglAcntAll.json"))
        .and(query_param("crtfc_key", "test-key"))
        .and(query_param("corp_code", corp_code))
        .and(query_param("bsns_year", "2024"))
        .and(query_param("reprt_code", "11011"))
        .and(query_param("fs_div", "CFS"))
}

#[tokio::test]
async fn test_statement_fetch_and_extract() {
    let server = MockServer::start().await;
    statement_mock("00126380")
        .respond_with(ResponseTemplate::new(200).set_body_string(STATEMENT_OK))
        .mount(&server)
        .await;

    let client = statements(&server);
    let stmt = client.fetch("00126380", 2024, ReportKind::Annual).await.unwrap();
    assert_eq!(stmt.items.len(), 4);

    let metrics = MetricExtractor::default().extract(&stmt);
    assert_eq!(metrics.retained_earnings, Some(3_466_522.38));
    assert_eq!(metrics.total_equity, Some(3_636_778.65));
    assert_eq!(metrics.revenue, Some(3_008_709.03));
}

#[tokio::test]
async fn test_statement_no_data_status_is_cached() {
    let server = MockServer::start().await;
    statement_mock("00434003")
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"status":"013","message":"조회된 데이타가 없습니다."}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = statements(&server);
    for _ in 0..3 {
        let err = client.fetch("00434003", 2024, ReportKind::Annual).await.unwrap_err();
        assert!(matches!(err, NoData::Status { ref code, .. } if code == "013"));
    }
    assert_eq!(client.request_count(), 1);
}

#[tokio::test]
async fn test_statement_http_error_is_no_data_and_not_cached() {
    let server = MockServer::start().await;
    statement_mock("00126380")
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let client = statements(&server);
    for _ in 0..2 {
        let err = client.fetch("00126380", 2024, ReportKind::Annual).await.unwrap_err();
        assert_eq!(err, NoData::HttpStatus(500));
    }
}

#[tokio::test]
async fn test_statement_malformed_body_is_no_data() {
    let server = MockServer::start().await;
    statement_mock("00126380")
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let err = statements(&server)
        .fetch("00126380", 2024, ReportKind::Annual)
        .await
        .unwrap_err();
    assert!(matches!(err, NoData::Malformed(_)));
}

#[tokio::test]
async fn test_statement_success_is_cached() {
    let server = MockServer::start().await;
    statement_mock("00126380")
        .respond_with(ResponseTemplate::new(200).set_body_string(STATEMENT_OK))
        .expect(1)
        .mount(&server)
        .await;

    let client = statements(&server);
    let a = client.fetch("00126380", 2024, ReportKind::Annual).await.unwrap();
    let b = client.fetch("00126380", 2024, ReportKind::Annual).await.unwrap();
    assert_eq!(a, b);
    assert_eq!(client.request_count(), 1);
}

#[tokio::test]
async fn test_statement_unreachable_is_no_data() {
    // Nothing listens on port 9 (discard) in the test environment.
    let client = StatementClient::new(
        "http://127.0.0.1:9",
        key(),
        Consolidation::Standalone,
        std::time::Duration::from_secs(2),
        Duration::minutes(30),
    )
    .unwrap();
    let err = client.fetch("00126380", 2024, ReportKind::Annual).await.unwrap_err();
    assert!(matches!(err, NoData::Transport(_)));
}

// ---------------------------------------------------------------------------
// Keyword search
// ---------------------------------------------------------------------------

const SEARCH_PAGE: &str = r#"<table><tbody>
<tr><td><a class="company">에코프로비엠</a></td><td><a class="second">지속가능경영보고서</a></td><td class="date">2025.02.10</td></tr>
<tr><td><a class="company">SK이노베이션</a></td><td><a class="second">RE100 이행 현황</a></td><td class="date">2025.01.22</td></tr>
<tr><td><a class="company">LG화학</a></td><td><a class="second">탄소중립 로드맵</a></td><td class="date">2025.01.03</td></tr>
</tbody></table>"#;

#[tokio::test]
async fn test_search_posts_form_and_caches() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/dsab007/search.ax"))
        .and(body_string_contains("startDate=20250101"))
        .and(body_string_contains("endDate=20250331"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SEARCH_PAGE))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/dsab007/search.ax", server.uri());
    let search = DisclosureSearch::new(&url, TIMEOUT, Duration::minutes(30)).unwrap();
    let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2025, 3, 31).unwrap();

    let hits = search.search("ESG", start, end, 30).await.unwrap();
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].company, "에코프로비엠");
    assert_eq!(hits[2].date, "2025.01.03");

    let truncated = search.search("ESG", start, end, 2).await.unwrap();
    assert_eq!(truncated.len(), 2);
}

#[tokio::test]
async fn test_search_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/dsab007/search.ax"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let url = format!("{}/dsab007/search.ax", server.uri());
    let search = DisclosureSearch::new(&url, TIMEOUT, Duration::minutes(30)).unwrap();
    let day = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    assert!(search.search("친환경", day, day, 30).await.is_err());
}
