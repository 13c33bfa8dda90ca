// Test module - relaxed lint rules
#![allow(clippy::indexing_slicing)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(missing_docs)]

use std::io::Cursor;

use base64::Engine as _;
use linkhub::driver::{handle_line, run_driver_with_io};
use linkhub::model::driver::{DriverResponse, DriverResponseStatus};
use linkhub::{Bridge, ErrorCode, PROTOCOL_VERSION};
use linkhub_fixtures::{memory_bridge, software_root, temp_dir, test_soft_archive, write_file};
use serde_json::{json, Value};

fn run(bridge: &Bridge, lines: &[String]) -> Vec<DriverResponse> {
    let input = lines.join("\n");
    let mut output = Vec::new();
    run_driver_with_io(bridge, Cursor::new(input), &mut output).unwrap();
    String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn request(id: &str, op_type: &str, payload: Option<Value>) -> String {
    let mut op = json!({ "type": op_type });
    if let Some(payload) = payload {
        op["payload"] = payload;
    }
    json!({ "protocol_version": PROTOCOL_VERSION, "request_id": id, "op": op }).to_string()
}

fn error_code(response: &DriverResponse) -> ErrorCode {
    response.error.as_ref().unwrap().code
}

#[test]
fn malformed_lines_answer_unknown_and_the_loop_continues() {
    let base = temp_dir("driver-malformed");
    let (bridge, _) = memory_bridge(&base);
    let lines = vec![
        "{not json".to_string(),
        String::new(),
        request("r1", "setup_status", None),
    ];

    let responses = run(&bridge, &lines);
    assert_eq!(responses.len(), 2, "blank lines produce no response");
    assert_eq!(responses[0].request_id, "unknown");
    assert_eq!(responses[0].status, DriverResponseStatus::Error);
    assert_eq!(error_code(&responses[0]), ErrorCode::Protocol);
    assert_eq!(responses[1].request_id, "r1");
    assert_eq!(responses[1].status, DriverResponseStatus::Ok);
}

#[test]
fn unknown_operations_keep_their_request_id() {
    let base = temp_dir("driver-unknown-op");
    let (bridge, _) = memory_bridge(&base);
    let response = handle_line(&bridge, &request("r9", "format_disk", None));
    assert_eq!(response.request_id, "r9");
    assert_eq!(error_code(&response), ErrorCode::Protocol);
}

#[test]
fn version_mismatch_is_reported_and_the_loop_continues() {
    let base = temp_dir("driver-version");
    let (bridge, _) = memory_bridge(&base);
    let stale = json!({
        "protocol_version": PROTOCOL_VERSION + 1,
        "request_id": "old",
        "op": { "type": "list_records" }
    })
    .to_string();

    let responses = run(&bridge, &[stale, request("new", "list_records", None)]);
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0].request_id, "old");
    assert_eq!(error_code(&responses[0]), ErrorCode::ProtocolVersionMismatch);
    let context = responses[0].error.as_ref().unwrap().context.clone().unwrap();
    assert_eq!(context["supported_version"], PROTOCOL_VERSION);
    assert_eq!(responses[1].status, DriverResponseStatus::Ok);
}

#[test]
fn base64_install_then_launch_over_the_driver() {
    let base = temp_dir("driver-install");
    let (bridge, platform) = memory_bridge(&base);
    let encoded = base64::engine::general_purpose::STANDARD.encode(test_soft_archive());

    let install = handle_line(
        &bridge,
        &request(
            "i1",
            "install",
            Some(json!({ "filename": "TestSoft.zip", "archive_base64": encoded })),
        ),
    );
    assert_eq!(install.status, DriverResponseStatus::Ok);
    let result = install.result.unwrap();
    assert_eq!(result["name"], "TestSoft");
    let exe = result["executable_path"].as_str().unwrap().to_string();
    assert!(exe.ends_with("TestSoft.exe"));

    let launch = handle_line(
        &bridge,
        &request("l1", "launch", Some(json!({ "target_path": exe }))),
    );
    assert_eq!(launch.status, DriverResponseStatus::Ok);
    assert_eq!(launch.result.unwrap()["resolved_path"], exe.as_str());
    assert_eq!(platform.calls().len(), 1);

    let records = handle_line(&bridge, &request("q1", "list_records", None));
    let listing = records.result.unwrap();
    assert_eq!(listing["software"].as_array().unwrap().len(), 1);
    assert!(listing["software"][0]["last_used_at_ms"].is_u64());
}

#[test]
fn install_needs_exactly_one_archive_source() {
    let base = temp_dir("driver-install-source");
    let (bridge, _) = memory_bridge(&base);

    let neither = handle_line(
        &bridge,
        &request("a", "install", Some(json!({ "filename": "X.zip" }))),
    );
    assert_eq!(error_code(&neither), ErrorCode::BadInput);

    let both = handle_line(
        &bridge,
        &request(
            "b",
            "install",
            Some(json!({ "filename": "X.zip", "archive_path": "/tmp/x.zip", "archive_base64": "" })),
        ),
    );
    assert_eq!(error_code(&both), ErrorCode::BadInput);

    let garbage = handle_line(
        &bridge,
        &request(
            "c",
            "install",
            Some(json!({ "filename": "X.zip", "archive_base64": "***" })),
        ),
    );
    assert_eq!(error_code(&garbage), ErrorCode::BadInput);
}

#[test]
fn archive_paths_must_be_absolute_and_traversal_free() {
    let base = temp_dir("driver-archive-path");
    let (bridge, _) = memory_bridge(&base);
    let install = |id: &str, path: &str| {
        handle_line(
            &bridge,
            &request(
                id,
                "install",
                Some(json!({ "filename": "TestSoft.zip", "archive_path": path })),
            ),
        )
    };

    for (id, path) in [
        ("rel", "relative/../x.zip".to_string()),
        ("up", "../../etc/hostname".to_string()),
        ("plain", "TestSoft.zip".to_string()),
        ("abs-up", format!("{}/../TestSoft.zip", base.display())),
    ] {
        let response = install(id, &path);
        assert_eq!(error_code(&response), ErrorCode::BadInput, "{path}");
    }
    assert!(bridge.software().unwrap().is_empty());

    let archive = base.join("TestSoft.zip");
    std::fs::write(&archive, test_soft_archive()).unwrap();
    let response = install("ok", &archive.display().to_string());
    assert_eq!(response.status, DriverResponseStatus::Ok);
}

#[test]
fn every_request_rereads_the_whitelist() {
    let base = temp_dir("driver-refresh");
    let (bridge, _) = memory_bridge(&base);
    let exe = software_root(&base).join("Tool").join("tool.exe");
    write_file(&exe, "x");
    let launch = request(
        "l",
        "launch",
        Some(json!({ "target_path": exe.display().to_string() })),
    );

    let responses = run(
        &bridge,
        &[
            launch.clone(),
            request("clear", "set_allowed_dirs", Some(json!({ "allowed_dirs": [] }))),
            launch,
        ],
    );
    assert_eq!(responses[0].status, DriverResponseStatus::Ok);
    assert_eq!(responses[1].status, DriverResponseStatus::Ok);
    assert_eq!(error_code(&responses[2]), ErrorCode::Forbidden);
}

#[test]
fn scan_browse_and_whitelist_operations_round_trip() {
    let base = temp_dir("driver-ops");
    let (bridge, _) = memory_bridge(&base);
    write_file(&software_root(&base).join("App").join("App.exe"), "x");

    let scan = handle_line(
        &bridge,
        &request("s", "scan_directories", Some(json!({ "kind": "software" }))),
    );
    assert_eq!(scan.result.unwrap()["imported"], 1);

    let browse = handle_line(
        &bridge,
        &request(
            "b",
            "browse_directory",
            Some(json!({ "path": base.display().to_string() })),
        ),
    );
    let listing = browse.result.unwrap();
    let names: Vec<&str> = listing["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["software", "workspaces"]);

    let dirs = handle_line(&bridge, &request("w", "list_allowed_dirs", None));
    assert_eq!(dirs.result.unwrap().as_array().unwrap().len(), 2);

    let records = handle_line(&bridge, &request("r", "list_records", None));
    let id = records.result.unwrap()["software"][0]["id"].clone();
    let removed = handle_line(
        &bridge,
        &request("x", "remove_record", Some(json!({ "id": id }))),
    );
    assert_eq!(removed.result.unwrap()["removed"], true);
    assert!(bridge.software().unwrap().is_empty());
    assert!(software_root(&base).join("App").join("App.exe").is_file());
}
