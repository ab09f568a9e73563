//! History persistence across instances, against a real data directory.

use blockshell::services::history::History;
use tempfile::TempDir;

#[test]
fn a_fresh_instance_reads_what_another_wrote() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("history.txt");

    let mut writer = History::new(path.clone(), 100);
    writer.push("cargo test");
    writer.push("git log");

    let mut reader = History::new(path, 100);
    reader.set_filter("");
    assert_eq!(reader.peek(), "git log");
    assert_eq!(reader.peek(), "cargo test");
}

#[test]
fn capacity_is_enforced_in_the_persisted_file() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("history.txt");

    let mut history = History::new(path.clone(), 3);
    for line in ["one", "two", "three", "four"] {
        history.push(line);
    }

    let stored = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = stored.lines().collect();
    assert_eq!(lines, vec!["two", "three", "four"]);
}

#[test]
fn the_file_survives_a_disabled_instance() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("history.txt");

    let mut writer = History::new(path.clone(), 10);
    writer.push("keep me");

    // max_history_length = 0 disables the feature entirely; it must not
    // clobber an existing file.
    let mut disabled = History::new(path.clone(), 0);
    disabled.push("dropped");
    assert_eq!(disabled.peek(), "");

    let stored = std::fs::read_to_string(&path).unwrap();
    assert_eq!(stored, "keep me\n");
}
