use crate::commands::status::{AppState, StatusOutput, status_entries};
use lns::error::DirRole;
use lns::reconciler::{AppReport, AppRun};
use lns::{ReconcileError, RunReport, Warning};
use std::path::PathBuf;

fn report_with(result: Result<AppReport, ReconcileError>) -> RunReport {
    RunReport {
        warnings: Vec::new(),
        apps: vec![AppRun {
            name: "vim".to_string(),
            result,
        }],
    }
}

#[test]
fn test_unchanged_app_is_ok() {
    let report = report_with(Ok(AppReport {
        name: "vim".to_string(),
        unchanged: 3,
        ..Default::default()
    }));

    let entries = status_entries(&report);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].state, AppState::Ok);
    assert!(entries[0].error.is_none());
}

#[test]
fn test_planned_changes_are_drift() {
    let report = report_with(Ok(AppReport {
        name: "vim".to_string(),
        created: vec![PathBuf::from("/home/jeff/.vim/bundle/nerdtree")],
        removed: vec![PathBuf::from("/home/jeff/.vim/bundle/tagbar")],
        ..Default::default()
    }));

    let entries = status_entries(&report);
    assert_eq!(entries[0].state, AppState::Drift);
    assert_eq!(
        entries[0].would_create,
        vec!["/home/jeff/.vim/bundle/nerdtree"]
    );
    assert_eq!(entries[0].would_remove, vec!["/home/jeff/.vim/bundle/tagbar"]);
}

#[test]
fn test_failed_app_carries_error() {
    let report = report_with(Err(ReconcileError::DirectoryUnavailable {
        app: "vim".to_string(),
        role: DirRole::Destination,
        path: PathBuf::from("/missing"),
    }));

    let entries = status_entries(&report);
    assert_eq!(entries[0].state, AppState::Failed);
    assert!(entries[0].error.as_deref().unwrap().contains("/missing"));
}

#[test]
fn test_json_shape() {
    let report = report_with(Ok(AppReport {
        name: "vim".to_string(),
        ..Default::default()
    }));

    let json = serde_json::to_value(status_entries(&report)).unwrap();
    assert_eq!(json[0]["app"], "vim");
    assert_eq!(json[0]["state"], "ok");
    assert!(json[0]["error"].is_null());
}

#[test]
fn test_json_includes_dropped_app_warnings() {
    let mut report = report_with(Ok(AppReport {
        name: "vim".to_string(),
        ..Default::default()
    }));
    report.warnings.push(Warning::MalformedAppEntryList {
        app: "emacs".to_string(),
        reason: "`entries` is empty".to_string(),
    });

    let entries = status_entries(&report);
    let json = serde_json::to_value(StatusOutput {
        warnings: &report.warnings,
        apps: &entries,
    })
    .unwrap();

    assert_eq!(json["warnings"][0]["warning"], "malformed_app_entry_list");
    assert_eq!(json["warnings"][0]["app"], "emacs");
    assert_eq!(json["apps"][0]["app"], "vim");
}
