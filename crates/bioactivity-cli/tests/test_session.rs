//! Interactive session behaviour against the in-memory gateway.

use bioactivity_cli::{Outcome, Session};
use bioactivity_common::{HttpSettings, SandboxClient};
use bioactivity_ingestion::sources::pubchem::PubChemClient;
use bioactivity_ingestion::{BioactivityPipeline, Column};
use bioactivity_report::{CsvSeparator, Presenter, RenderMode};
use bioactivity_test_utils::{aspirin_gateway, FakeGateway, FixtureRoutes, FixtureServer};
use pretty_assertions::assert_eq;

fn session() -> Session<FakeGateway> {
    Session::new(
        BioactivityPipeline::new(aspirin_gateway()),
        Presenter::new(RenderMode::Plain),
    )
}

async fn run(session: &mut Session<FakeGateway>, line: &str) -> (Outcome, String) {
    let mut buf = Vec::new();
    let outcome = session.handle(line, &mut buf).await.unwrap();
    (outcome, String::from_utf8(buf).unwrap())
}

fn targets(session: &Session<FakeGateway>) -> Vec<String> {
    session
        .current_table()
        .unwrap()
        .rows()
        .iter()
        .map(|r| r.target.clone())
        .collect()
}

#[tokio::test]
async fn test_search_renders_table_and_links() {
    let mut s = session();
    let (outcome, text) = run(&mut s, "aspirin").await;

    assert_eq!(outcome, Outcome::Continue);
    assert!(text.contains("## Results for **aspirin**"));
    assert!(text.contains("✅ Found ChEMBL ID: CHEMBL25"));
    assert!(text.contains("📊 Retrieved 5 activity records"));
    assert!(text.contains("### Pharmacodynamic Bioactivities (Homo sapiens)"));
    assert!(text.contains("| Cyclooxygenase-2 | KA"));
    assert!(text.contains("500.0"));
    assert!(text.contains("download=\"bioactivity.csv\" href=\"data:text/csv;base64,"));
    assert!(text.contains("download=\"bioactivity.xlsx\""));
    assert_eq!(s.last_report().unwrap().table.len(), 4);
}

#[tokio::test]
async fn test_activity_filter_applies_to_search() {
    let mut s = session().with_filter(vec!["IC50".to_string(), "Ki".to_string()]);
    run(&mut s, "search Aspirin").await;
    assert_eq!(targets(&s), vec!["CHEMBL9999", "Cyclooxygenase-1"]);
}

#[tokio::test]
async fn test_search_sorts_by_target_by_default() {
    let mut s = session();
    run(&mut s, "aspirin").await;
    assert_eq!(
        targets(&s),
        vec!["CHEMBL9999", "Cyclooxygenase-1", "Cyclooxygenase-1", "Cyclooxygenase-2"]
    );
    // Ties keep ChEMBL order.
    let activities: Vec<String> = s
        .current_table()
        .unwrap()
        .rows()
        .iter()
        .map(|r| r.activity.clone())
        .collect();
    assert_eq!(activities, vec!["Ki", "IC50", "Inhibition", "KA"]);
}

#[tokio::test]
async fn test_configured_sort_replaces_default() {
    let mut s = session().with_sort(Some((Column::KdNm, false)));
    run(&mut s, "aspirin").await;
    assert_eq!(targets(&s)[0], "Cyclooxygenase-2");

    let mut s = session().with_sort(None);
    run(&mut s, "aspirin").await;
    assert_eq!(
        targets(&s),
        vec!["Cyclooxygenase-1", "Cyclooxygenase-2", "CHEMBL9999", "Cyclooxygenase-1"]
    );
}

#[tokio::test]
async fn test_sort_rerenders_without_refetching() {
    let mut s = session();
    run(&mut s, "aspirin").await;
    let (_, text) = run(&mut s, ":sort value desc").await;

    assert!(text.starts_with("Sorting by Value (desc)"));
    assert_eq!(
        targets(&s),
        vec!["Cyclooxygenase-2", "Cyclooxygenase-1", "Cyclooxygenase-1", "CHEMBL9999"]
    );
    assert_eq!(s.pipeline().gateway().calls().molecule_searches.len(), 1);
    assert_eq!(s.pipeline().gateway().calls().activity_fetches.len(), 1);
}

#[tokio::test]
async fn test_sort_off_restores_chembl_order() {
    let mut s = session();
    run(&mut s, "aspirin").await;
    run(&mut s, ":sort target desc").await;
    run(&mut s, ":sort off").await;
    assert_eq!(
        targets(&s),
        vec!["Cyclooxygenase-1", "Cyclooxygenase-2", "CHEMBL9999", "Cyclooxygenase-1"]
    );
}

#[tokio::test]
async fn test_filter_with_no_matches_reports_empty() {
    let mut s = session();
    run(&mut s, "aspirin").await;
    let (_, text) = run(&mut s, ":filter Kd").await;
    assert!(text.contains("Activity filter: Kd"));
    assert!(text.contains("> No Homo sapiens bioactivity rows returned by ChEMBL."));
    assert!(!text.contains("<a download"));
}

#[tokio::test]
async fn test_unknown_compound_reports_error_and_stops() {
    let mut s = session();
    let (outcome, text) = run(&mut s, "unobtainium").await;

    assert_eq!(outcome, Outcome::Continue);
    assert!(text.contains("**ChEMBL error:** No ChEMBL entry for 'unobtainium'"));
    assert!(s.last_report().is_none());
    assert!(s.pipeline().gateway().calls().activity_fetches.is_empty());
}

#[tokio::test]
async fn test_failed_search_clears_previous_report() {
    let mut s = session();
    run(&mut s, "aspirin").await;
    run(&mut s, "unobtainium").await;
    assert!(s.current_table().is_none());
}

#[tokio::test]
async fn test_blank_search_makes_no_calls() {
    let mut s = session();
    let (_, text) = run(&mut s, "search \u{00A0} ").await;
    assert_eq!(text, "❌ Please enter a compound name.\n");
    assert!(s.pipeline().gateway().calls().molecule_searches.is_empty());
}

#[tokio::test]
async fn test_bad_command_keeps_session_alive() {
    let mut s = session();
    let (outcome, text) = run(&mut s, ":export parquet /tmp").await;
    assert_eq!(outcome, Outcome::Continue);
    assert_eq!(text, "❌ Unsupported export format: parquet\n");
}

#[tokio::test]
async fn test_export_csv_writes_file_with_separator() {
    let dir = tempfile::tempdir().unwrap();
    let mut s = session().with_separator(CsvSeparator::Semicolon);
    run(&mut s, "aspirin").await;

    let line = format!(":export csv {}", dir.path().display());
    let (_, text) = run(&mut s, &line).await;
    assert!(text.starts_with("💾 Saved 4 rows to"));

    let csv = std::fs::read_to_string(dir.path().join("bioactivity.csv")).unwrap();
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("Target;Activity;Value;Units;Kd (nM) (from KA)"));
    assert_eq!(lines.next(), Some("CHEMBL9999;Ki;35;nM;"));
    assert_eq!(csv.lines().count(), 5);
}

#[tokio::test]
async fn test_export_xlsx_writes_zip_package() {
    let dir = tempfile::tempdir().unwrap();
    let mut s = session();
    run(&mut s, "aspirin").await;
    run(&mut s, &format!(":export xlsx {}", dir.path().display())).await;

    let bytes = std::fs::read(dir.path().join("bioactivity.xlsx")).unwrap();
    assert_eq!(&bytes[..2], b"PK");
}

#[tokio::test]
async fn test_export_before_search() {
    let dir = tempfile::tempdir().unwrap();
    let mut s = session();
    let (_, text) = run(&mut s, &format!(":export csv {}", dir.path().display())).await;
    assert!(text.starts_with("Nothing to export yet"));
    assert!(!dir.path().join("bioactivity.csv").exists());
}

#[tokio::test]
async fn test_events_are_handled_in_order() {
    let gateway = aspirin_gateway().with_molecule("CAFFEINE", "CHEMBL113");
    let mut s = Session::new(BioactivityPipeline::new(gateway), Presenter::new(RenderMode::Plain));

    run(&mut s, "aspirin").await;
    let (_, text) = run(&mut s, "caffeine").await;

    assert!(text.contains("> No Homo sapiens bioactivity rows returned by ChEMBL."));
    let calls = s.pipeline().gateway().calls();
    assert_eq!(calls.molecule_searches, vec!["aspirin", "caffeine"]);
    assert_eq!(calls.activity_fetches.len(), 2);
    assert_eq!(calls.activity_fetches[1].0, "CHEMBL113");
}

#[tokio::test]
async fn test_help_and_quit() {
    let mut s = session();
    let (_, text) = run(&mut s, ":help").await;
    assert!(text.contains(":export csv|xlsx"));
    let (outcome, _) = run(&mut s, ":quit").await;
    assert_eq!(outcome, Outcome::Quit);
}

const VIEW_RECORD: &str = r#"{"Record": {"Section": [
    {"TOCHeading": "Chemical and Physical Properties", "Section": [
        {"TOCHeading": "Experimental Properties", "Section": [
            {"TOCHeading": "Melting Point", "Information": [
                {"Value": {"StringWithMarkup": [{"String": "135 C"}]}}
            ]}
        ]}
    ]}
]}}"#;

async fn pubchem_fixture(view_record: Option<&str>) -> FixtureServer {
    let mut routes = FixtureRoutes::new()
        .json("/rest/pug/compound/name/aspirin/cids/JSON", r#"{"IdentifierList": {"CID": [2244]}}"#)
        .json(
            "/rest/pug/compound/cid/2244/property/",
            r#"{"PropertyTable": {"Properties": [{"CID": 2244, "MolecularFormula": "C9H8O4"}]}}"#,
        );
    if let Some(record) = view_record {
        routes = routes.json("/rest/pug_view/data/compound/2244/JSON", record);
    }
    routes.start().await.unwrap()
}

fn session_with_pubchem(server: &FixtureServer) -> Session<FakeGateway> {
    let client = SandboxClient::with_settings(&HttpSettings {
        timeout_secs: 5,
        max_retries: 0,
        ..HttpSettings::default()
    })
    .unwrap();
    session().with_pubchem(Some(PubChemClient::with_client(client, &server.url("/rest/pug"))))
}

#[tokio::test]
async fn test_pubchem_sections_follow_chembl_table() {
    let server = pubchem_fixture(Some(VIEW_RECORD)).await;
    let mut s = session_with_pubchem(&server);
    let (_, text) = run(&mut s, "aspirin").await;

    let chembl = text.find("### Pharmacodynamic Bioactivities").unwrap();
    let basic = text.find("CID: **2244**").unwrap();
    let experimental = text.find("#### Experimental / Computed Properties (PubChem)").unwrap();
    assert!(chembl < basic && basic < experimental);

    assert!(text.contains("| MolecularFormula | C9H8O4"));
    assert!(text.contains("| Melting Point | 135 C |"));
    assert!(text.contains("Chemical and Physical Properties > Experimental Properties > Melting Point"));
    assert!(text.contains("download=\"pubchem_basic.csv\""));
    assert!(text.contains("download=\"pubchem_properties.csv\""));
    assert!(text.contains("download=\"pubchem_properties.xlsx\""));
}

#[tokio::test]
async fn test_missing_view_record_reports_no_properties() {
    let server = pubchem_fixture(None).await;
    let mut s = session_with_pubchem(&server);
    let (_, text) = run(&mut s, "aspirin").await;

    assert!(text.contains("CID: **2244**"));
    assert!(text.contains("> No experimental/computed properties found."));
    assert!(!text.contains("pubchem_properties"));
    assert_eq!(s.last_report().unwrap().table.len(), 4);
}

#[tokio::test]
async fn test_pubchem_miss_keeps_chembl_report() {
    let server = FixtureRoutes::new().start().await.unwrap();
    let mut s = session_with_pubchem(&server);
    let (_, text) = run(&mut s, "aspirin").await;

    assert!(text.contains("### Pharmacodynamic Bioactivities (Homo sapiens)"));
    assert!(text.contains("> PubChem lookup failed; properties unavailable."));
    assert!(!text.contains("#### Experimental"));
}
