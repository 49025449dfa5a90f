//! Intake review flows against a mocked spreadsheet and backend: the
//! pending queue, the claim on accept and reject, and in-place row
//! corrections.

use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use beacon_portal::config::PortalOptions;
use beacon_portal::error::Error;
use beacon_portal::intake::{MemoryCursorStore, PendingEntry, SheetRow};
use beacon_portal::Portal;

fn intake_portal(server: &MockServer) -> Portal {
    let options = PortalOptions::default()
        .with_sheet("sheet-1", "sheet-key")
        .with_sheet_endpoint(&server.uri());
    Portal::new_with_options(&server.uri(), "test-key", options)
}

async fn mount_cursor_at(server: &MockServer, position: u32) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/intake_cursor"))
        .and(query_param("select", "position"))
        .and(query_param("name", "eq.student_applications"))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"name": "student_applications", "position": position}
        ])))
        .mount(server)
        .await;
}

fn anju_cells() -> Vec<String> {
    [
        "21/03/2024 10:12:00",
        "Anju P",
        "2017-06-02",
        "Female",
        "autism spectrum",
        "Priya P",
        "98450 12345",
        "priya@example.com",
        "Jayanagar",
        "needs transport",
    ]
    .iter()
    .map(|cell| cell.to_string())
    .collect()
}

fn dev_cells() -> Vec<String> {
    [
        "22/03/2024 09:01:00",
        "Dev M",
        "02/11/2016",
        "Male",
        "cerebral palsy",
        "Harish M",
        "98860 22334",
        "",
        "",
        "",
    ]
    .iter()
    .map(|cell| cell.to_string())
    .collect()
}

#[tokio::test]
async fn pending_lists_entries_from_the_cursor_down() {
    let server = MockServer::start().await;
    mount_cursor_at(&server, 4).await;

    // row 6 came in with no child name and is not reviewable
    Mock::given(method("GET"))
        .and(path("/v4/spreadsheets/sheet-1/values/Responses!A4:J"))
        .and(query_param("key", "sheet-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "range": "Responses!A4:J",
            "majorDimension": "ROWS",
            "values": [anju_cells(), dev_cells(), ["23/03/2024 08:00:00", ""]]
        })))
        .mount(&server)
        .await;

    let portal = intake_portal(&server);
    let intake = portal.intake().unwrap();

    assert_eq!(intake.position().await.unwrap(), 4);

    let entries = intake.pending().await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].row, 4);
    assert_eq!(entries[0].child_name, "Anju P");
    assert_eq!(entries[0].center, "Jayanagar");
    assert_eq!(entries[1].row, 5);
    assert_eq!(entries[1].child_name, "Dev M");
}

#[tokio::test]
async fn accept_claims_the_row_before_writing_the_student() {
    let server = MockServer::start().await;
    mount_cursor_at(&server, 4).await;

    Mock::given(method("GET"))
        .and(path("/v4/spreadsheets/sheet-1/values/Responses!A4:J"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "values": [anju_cells()]
        })))
        .mount(&server)
        .await;

    // the claim only succeeds while the cursor still sits on row 4
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/intake_cursor"))
        .and(query_param("name", "eq.student_applications"))
        .and(query_param("position", "eq.4"))
        .and(header("Prefer", "return=representation"))
        .and(body_partial_json(json!({"position": 5})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"name": "student_applications", "position": 5}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/students"))
        .and(body_partial_json(json!({
            "name": "Anju P",
            "dob": "2017-06-02",
            "center_id": 4
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            {"id": 88, "name": "Anju P", "center_id": 4}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let portal = intake_portal(&server);
    let intake = portal.intake().unwrap();
    let entries = intake.pending().await.unwrap();

    let mut form = entries[0].prefill();
    assert_eq!(form.name, "Anju P");
    assert!(form.notes.contains("Requested center: Jayanagar"));
    form.center_id = Some(4);

    let created = intake.accept(&entries[0], form).await.unwrap();
    assert_eq!(created["id"], 88);
}

#[tokio::test]
async fn losing_the_claim_race_leaves_the_row_unwritten() {
    let server = MockServer::start().await;
    mount_cursor_at(&server, 4).await;

    Mock::given(method("GET"))
        .and(path("/v4/spreadsheets/sheet-1/values/Responses!A4:J"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "values": [anju_cells()]
        })))
        .mount(&server)
        .await;

    // another reviewer already moved the cursor past row 4
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/intake_cursor"))
        .and(query_param("position", "eq.4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/students"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let portal = intake_portal(&server);
    let intake = portal.intake().unwrap();
    let entries = intake.pending().await.unwrap();

    let mut form = entries[0].prefill();
    form.center_id = Some(4);

    let err = intake.accept(&entries[0], form).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
}

#[tokio::test]
async fn reject_advances_past_the_row_without_a_student() {
    let server = MockServer::start().await;
    mount_cursor_at(&server, 4).await;

    Mock::given(method("GET"))
        .and(path("/v4/spreadsheets/sheet-1/values/Responses!A4:J"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "values": [anju_cells(), dev_cells()]
        })))
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/intake_cursor"))
        .and(query_param("position", "eq.4"))
        .and(body_partial_json(json!({"position": 5})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"name": "student_applications", "position": 5}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/students"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let portal = intake_portal(&server);
    let intake = portal.intake().unwrap();
    let entries = intake.pending().await.unwrap();

    intake.reject(&entries[0]).await.unwrap();
}

#[tokio::test]
async fn blank_row_at_the_cursor_is_claimed_during_listing() {
    let server = MockServer::start().await;
    mount_cursor_at(&server, 2).await;

    // row 2 came in with no child name; row 3 is the first reviewable one
    Mock::given(method("GET"))
        .and(path("/v4/spreadsheets/sheet-1/values/Responses!A2:J"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "values": [["23/03/2024 08:00:00", ""], anju_cells()]
        })))
        .mount(&server)
        .await;

    // listing claims the blank row the way a reject would
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/intake_cursor"))
        .and(query_param("position", "eq.2"))
        .and(body_partial_json(json!({"position": 3})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"name": "student_applications", "position": 3}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    // the listed entry then claims its own row as usual
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/intake_cursor"))
        .and(query_param("position", "eq.3"))
        .and(body_partial_json(json!({"position": 4})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"name": "student_applications", "position": 4}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/students"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let portal = intake_portal(&server);
    let intake = portal.intake().unwrap();

    let entries = intake.pending().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].row, 3);

    intake.reject(&entries[0]).await.unwrap();
}

#[tokio::test]
async fn corrections_rewrite_the_sheet_row_in_place() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/v4/spreadsheets/sheet-1/values/Responses!A4:J4"))
        .and(query_param("key", "sheet-key"))
        .and(query_param("valueInputOption", "RAW"))
        .and(body_partial_json(json!({
            "range": "Responses!A4:J4",
            "majorDimension": "ROWS",
            "values": [[
                "21/03/2024 10:12:00",
                "Anju P",
                "2017-06-02",
                "Female",
                "autism spectrum",
                "Priya P",
                "98450 99999",
                "priya@example.com",
                "Jayanagar",
                "needs transport"
            ]]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "updatedRange": "Responses!A4:J4"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut entry = PendingEntry::parse(&SheetRow {
        index: 4,
        values: anju_cells(),
    })
    .unwrap();
    entry.guardian_phone = "98450 99999".to_string();

    let portal = intake_portal(&server);
    let intake = portal.intake().unwrap();
    intake.update_entry(&entry).await.unwrap();
}

#[tokio::test]
async fn processed_rows_stay_behind_the_cursor() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v4/spreadsheets/sheet-1/values/Responses!A2:J"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "values": [anju_cells(), dev_cells()]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v4/spreadsheets/sheet-1/values/Responses!A3:J"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "values": [dev_cells()]
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/students"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            {"id": 91, "name": "Anju P", "center_id": 4}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let portal = intake_portal(&server);
    let intake = portal
        .intake_with_cursor(Arc::new(MemoryCursorStore::new()))
        .unwrap();

    let first = intake.pending().await.unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].row, 2);

    let mut form = first[0].prefill();
    form.center_id = Some(4);
    intake.accept(&first[0], form).await.unwrap();

    // the accepted row is gone; review picks up at the next one
    assert_eq!(intake.position().await.unwrap(), 3);
    let second = intake.pending().await.unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].row, 3);
    assert!(second.iter().all(|entry| entry.row != 2));
}
