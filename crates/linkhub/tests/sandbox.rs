// Test module - relaxed lint rules
#![allow(clippy::indexing_slicing)]
#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(missing_docs)]

use std::fs;
use std::path::Path;

use linkhub::policy::{resolve, sandbox, Rejection};
use linkhub::{DirKind, ErrorCode, Whitelist, WhitelistEntry};
use linkhub_fixtures::temp_dir;
use serde_json::json;

fn whitelist_of(roots: &[&Path]) -> Whitelist {
    Whitelist::new(
        roots
            .iter()
            .map(|root| WhitelistEntry::new(*root, DirKind::Software))
            .collect(),
    )
}

fn raw(path: &Path) -> String {
    path.display().to_string()
}

#[test]
fn root_and_descendants_are_contained() {
    let base = temp_dir("sandbox-contained");
    let root = base.join("app");
    fs::create_dir_all(root.join("bin")).unwrap();
    fs::write(root.join("bin").join("tool.exe"), b"x").unwrap();
    let whitelist = whitelist_of(&[&root]);

    let resolved = resolve(&raw(&root), &whitelist).unwrap();
    assert_eq!(resolved.as_path(), root);

    let tool = root.join("bin").join("tool.exe");
    assert_eq!(resolve(&raw(&tool), &whitelist).unwrap().as_path(), tool);

    // Targets that do not exist yet still resolve; existence is checked later.
    let pending = root.join("bin").join("later.exe");
    assert_eq!(resolve(&raw(&pending), &whitelist).unwrap().as_path(), pending);
}

#[test]
fn shared_string_prefix_is_not_containment() {
    let base = temp_dir("sandbox-prefix");
    let root = base.join("app");
    let sibling = base.join("app2");
    fs::create_dir_all(&root).unwrap();
    fs::create_dir_all(&sibling).unwrap();
    fs::write(sibling.join("x.exe"), b"x").unwrap();

    let whitelist = whitelist_of(&[&root]);
    let err = resolve(&raw(&sibling.join("x.exe")), &whitelist).unwrap_err();
    assert!(matches!(err, Rejection::OutsideWhitelist));
    let err = resolve(&raw(&sibling), &whitelist).unwrap_err();
    assert!(matches!(err, Rejection::OutsideWhitelist));
}

#[test]
fn parent_directory_of_root_is_outside() {
    let base = temp_dir("sandbox-parent");
    let root = base.join("app");
    fs::create_dir_all(&root).unwrap();
    let err = resolve(&raw(&base), &whitelist_of(&[&root])).unwrap_err();
    assert!(matches!(err, Rejection::OutsideWhitelist));
}

#[test]
fn traversal_tokens_are_rejected_for_every_whitelist() {
    let base = temp_dir("sandbox-traversal");
    let root = base.join("app");
    fs::create_dir_all(root.join("bin")).unwrap();

    // The last input would canonicalize back inside the root; it is still refused.
    let inputs = [
        format!("{}/../app/bin", raw(&root)),
        format!("{}/bin/../bin", raw(&root)),
        "../etc/passwd".to_string(),
        "..\\windows\\system32".to_string(),
        "/..".to_string(),
    ];
    let whitelists = [Whitelist::default(), whitelist_of(&[&root]), whitelist_of(&[&base])];
    for whitelist in &whitelists {
        for input in &inputs {
            let err = resolve(input, whitelist).unwrap_err();
            assert!(
                matches!(err, Rejection::Traversal),
                "{input} was not rejected as traversal: {err:?}"
            );
        }
    }
}

#[test]
fn relative_paths_are_rejected() {
    let base = temp_dir("sandbox-relative");
    let whitelist = whitelist_of(&[&base]);
    for input in ["app/bin/tool.exe", "tool.exe", "./tool.exe", ""] {
        let err = resolve(input, &whitelist).unwrap_err();
        assert!(matches!(err, Rejection::NotAbsolute), "{input:?}: {err:?}");
    }
}

#[test]
fn empty_whitelist_denies_everything() {
    let base = temp_dir("sandbox-empty");
    let err = resolve(&raw(&base), &Whitelist::default()).unwrap_err();
    assert!(matches!(err, Rejection::OutsideWhitelist));
}

#[test]
fn any_matching_entry_is_enough() {
    let base = temp_dir("sandbox-multi");
    let first = base.join("first");
    let second = base.join("second");
    fs::create_dir_all(&first).unwrap();
    fs::create_dir_all(&second).unwrap();
    let whitelist = whitelist_of(&[&first, &second]);
    assert!(resolve(&raw(&second.join("x.exe")), &whitelist).is_ok());
}

#[test]
fn rejections_map_to_error_codes_without_leaking_the_whitelist() {
    let base = temp_dir("sandbox-codes");
    let root = base.join("app");
    let outside = base.join("outside");
    fs::create_dir_all(&root).unwrap();
    fs::create_dir_all(&outside).unwrap();
    let whitelist = whitelist_of(&[&root]);

    let traversal = sandbox("/tmp/../etc", &whitelist).unwrap_err();
    assert_eq!(traversal.code, ErrorCode::BadInput);

    let relative = sandbox("relative.exe", &whitelist).unwrap_err();
    assert_eq!(relative.code, ErrorCode::BadInput);

    let outside_raw = raw(&outside);
    let forbidden = sandbox(&outside_raw, &whitelist).unwrap_err();
    assert_eq!(forbidden.code, ErrorCode::Forbidden);
    assert_eq!(forbidden.context, Some(json!({ "path": outside_raw })));
    assert!(!forbidden.message.contains(&raw(&root)));
}

#[cfg(unix)]
#[test]
fn symlink_escaping_the_root_is_rejected() {
    let base = temp_dir("sandbox-symlink-escape");
    let root = base.join("app");
    let outside = base.join("outside");
    fs::create_dir_all(&root).unwrap();
    fs::create_dir_all(&outside).unwrap();
    fs::write(outside.join("secret.exe"), b"x").unwrap();
    std::os::unix::fs::symlink(&outside, root.join("link")).unwrap();

    let err = resolve(
        &raw(&root.join("link").join("secret.exe")),
        &whitelist_of(&[&root]),
    )
    .unwrap_err();
    assert!(matches!(err, Rejection::OutsideWhitelist));
}

#[cfg(unix)]
#[test]
fn symlinked_whitelist_entries_are_canonicalized() {
    let base = temp_dir("sandbox-symlink-root");
    let real = base.join("real");
    fs::create_dir_all(&real).unwrap();
    fs::write(real.join("tool.exe"), b"x").unwrap();
    let alias = base.join("alias");
    std::os::unix::fs::symlink(&real, &alias).unwrap();
    let whitelist = whitelist_of(&[&alias]);

    let via_real = resolve(&raw(&real.join("tool.exe")), &whitelist).unwrap();
    assert_eq!(via_real.as_path(), real.join("tool.exe"));

    let via_alias = resolve(&raw(&alias.join("tool.exe")), &whitelist).unwrap();
    assert_eq!(via_alias.as_path(), real.join("tool.exe"));
}
