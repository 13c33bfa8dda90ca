// Test module - relaxed lint rules
#![allow(clippy::indexing_slicing)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(missing_docs)]

use std::fs;
use std::io::Cursor;
use std::path::Path;

use linkhub::archive::{extract, extract_file, hoist_single_directory};
use linkhub::config::Limits;
use linkhub::ErrorCode;
use linkhub_fixtures::{temp_dir, understate_uncompressed_sizes, ZipBuilder};

fn listing(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn single_top_level_directory_is_hoisted() {
    let base = temp_dir("archive-hoist");
    let dest = base.join("out");
    let bytes = ZipBuilder::new()
        .dir("X/")
        .file("X/a", "alpha")
        .file("X/b", "beta")
        .build();

    let summary = extract(Cursor::new(bytes), &dest, &Limits::default()).unwrap();
    assert_eq!(summary.hoisted.as_deref(), Some("X"));
    assert_eq!(summary.files, 2);
    assert_eq!(listing(&dest), vec!["a", "b"]);
    assert_eq!(fs::read_to_string(dest.join("a")).unwrap(), "alpha");

    // A second pass finds two entries and leaves them alone.
    assert_eq!(hoist_single_directory(&dest).unwrap(), None);
    assert_eq!(listing(&dest), vec!["a", "b"]);
}

#[test]
fn wrapper_without_directory_entry_is_still_hoisted() {
    let base = temp_dir("archive-implicit-dir");
    let dest = base.join("out");
    let bytes = ZipBuilder::new()
        .file("Tool/tool.exe", "x")
        .file("Tool/lib/dep.dll", "y")
        .build();

    extract(Cursor::new(bytes), &dest, &Limits::default()).unwrap();
    assert_eq!(listing(&dest), vec!["lib", "tool.exe"]);
    assert!(dest.join("lib").join("dep.dll").is_file());
}

#[test]
fn multiple_top_level_entries_are_kept() {
    let base = temp_dir("archive-flat");
    let dest = base.join("out");
    let bytes = ZipBuilder::new().file("a", "1").file("b", "2").build();

    let summary = extract(Cursor::new(bytes), &dest, &Limits::default()).unwrap();
    assert_eq!(summary.hoisted, None);
    assert_eq!(listing(&dest), vec!["a", "b"]);
}

#[test]
fn single_top_level_file_is_not_hoisted() {
    let base = temp_dir("archive-single-file");
    let dest = base.join("out");
    let bytes = ZipBuilder::new().file("only.exe", "1").build();

    let summary = extract(Cursor::new(bytes), &dest, &Limits::default()).unwrap();
    assert_eq!(summary.hoisted, None);
    assert_eq!(listing(&dest), vec!["only.exe"]);
}

#[test]
fn empty_archive_extracts_to_empty_directory() {
    let base = temp_dir("archive-empty");
    let dest = base.join("out");
    let summary = extract(Cursor::new(ZipBuilder::new().build()), &dest, &Limits::default()).unwrap();
    assert_eq!(summary.files, 0);
    assert!(listing(&dest).is_empty());
}

#[test]
fn corrupt_archive_is_invalid_and_writes_nothing() {
    let base = temp_dir("archive-corrupt");
    let dest = base.join("out");
    let err = extract(
        Cursor::new(b"this is not a zip archive".to_vec()),
        &dest,
        &Limits::default(),
    )
    .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidArchive);
    assert!(!dest.exists());
}

#[test]
fn escaping_entry_names_are_refused_before_writing() {
    let hostile = ["../evil.txt", "/abs/evil.txt", "ok/../../evil.txt", "C:evil.txt"];
    for name in hostile {
        let base = temp_dir("archive-slip");
        let dest = base.join("out");
        let bytes = ZipBuilder::new()
            .file("first.txt", "written before the hostile entry?")
            .file(name, "boom")
            .build();

        let err = extract(Cursor::new(bytes), &dest, &Limits::default()).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidArchive, "{name}");
        assert!(!dest.exists(), "{name}: nothing may be written");
        assert!(!base.join("evil.txt").exists(), "{name}");
    }
}

#[test]
fn symlink_entries_are_refused() {
    let base = temp_dir("archive-symlink");
    let dest = base.join("out");
    let bytes = ZipBuilder::new()
        .file("app.exe", "x")
        .symlink("escape", "/etc")
        .build();

    let err = extract(Cursor::new(bytes), &dest, &Limits::default()).unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidArchive);
    assert!(!dest.exists());
}

#[test]
fn entry_count_limit_is_enforced() {
    let base = temp_dir("archive-count");
    let dest = base.join("out");
    let limits = Limits {
        max_archive_entries: 2,
        ..Limits::default()
    };
    let bytes = ZipBuilder::new()
        .file("a", "1")
        .file("b", "2")
        .file("c", "3")
        .build();

    let err = extract(Cursor::new(bytes), &dest, &limits).unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidArchive);
    assert!(!dest.exists());
}

#[test]
fn declared_size_limit_is_enforced() {
    let base = temp_dir("archive-size");
    let dest = base.join("out");
    let limits = Limits {
        max_unpacked_bytes: 100,
        ..Limits::default()
    };
    let bytes = ZipBuilder::new()
        .sized_file("small", 60)
        .sized_file("large", 60)
        .build();

    let err = extract(Cursor::new(bytes), &dest, &limits).unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidArchive);
    assert!(!dest.exists());
}

#[test]
fn entries_larger_than_their_headers_claim_are_cut_off() {
    let base = temp_dir("archive-understated");
    let dest = base.join("out");
    let limits = Limits {
        max_unpacked_bytes: 1024,
        ..Limits::default()
    };
    let bytes = understate_uncompressed_sizes(
        ZipBuilder::new().file("bomb.bin", vec![0u8; 4 << 20]).build(),
        10,
    );

    let err = extract(Cursor::new(bytes), &dest, &limits).unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidArchive);
    let written = fs::metadata(dest.join("bomb.bin")).unwrap().len();
    assert!(written <= 11, "wrote {written} bytes");
}

#[test]
fn archives_on_disk_extract_the_same_way() {
    let base = temp_dir("archive-file");
    let archive = base.join("pack.zip");
    fs::write(
        &archive,
        ZipBuilder::new().dir("Pack/").file("Pack/run.exe", "x").build(),
    )
    .unwrap();

    let dest = base.join("out");
    extract_file(&archive, &dest, &Limits::default()).unwrap();
    assert_eq!(listing(&dest), vec!["run.exe"]);
}

#[cfg(unix)]
#[test]
fn unix_permissions_are_applied() {
    use std::os::unix::fs::PermissionsExt;

    let base = temp_dir("archive-mode");
    let dest = base.join("out");
    let bytes = ZipBuilder::new().file("a.sh", "#!/bin/sh").file("b", "x").build();
    extract(Cursor::new(bytes), &dest, &Limits::default()).unwrap();
    let mode = fs::metadata(dest.join("a.sh")).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o755);
}
