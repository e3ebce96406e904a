//! Tests for status, cancel, retry, clear and files.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;
use tgdl_core::registry::TaskId;

#[test]
fn cli_parse_status() {
    match parse(&["tgdl", "status"]) {
        CliCommand::Status { json } => assert!(!json),
        _ => panic!("expected Status"),
    }
}

#[test]
fn cli_parse_cancel_negative_source() {
    match parse(&["tgdl", "cancel", "-1001:42"]) {
        CliCommand::Cancel { task } => assert_eq!(task, TaskId::new(-1001, 42)),
        _ => panic!("expected Cancel"),
    }
}

#[test]
fn cli_parse_retry() {
    match parse(&["tgdl", "retry", "5:6"]) {
        CliCommand::Retry { task } => assert_eq!(task, TaskId::new(5, 6)),
        _ => panic!("expected Retry"),
    }
}

#[test]
fn cli_parse_clear() {
    match parse(&["tgdl", "clear"]) {
        CliCommand::Clear { tasks } => assert!(tasks.is_empty()),
        _ => panic!("expected Clear"),
    }
    match parse(&["tgdl", "clear", "1:2", "-3:4"]) {
        CliCommand::Clear { tasks } => {
            assert_eq!(tasks, vec![TaskId::new(1, 2), TaskId::new(-3, 4)])
        }
        _ => panic!("expected Clear"),
    }
}

#[test]
fn cli_rejects_bad_task_id() {
    assert!(Cli::try_parse_from(["tgdl", "cancel", "42"]).is_err());
}

#[test]
fn cli_parse_files() {
    assert!(matches!(parse(&["tgdl", "files"]), CliCommand::Files));
}
