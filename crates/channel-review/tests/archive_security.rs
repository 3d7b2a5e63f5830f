use channel_review::config::ExtractConfig;
use channel_review::extract::unpack_archive;
use std::io::{Cursor, Write};
use std::path::Path;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

fn zip_with(entries: &[(&str, &str)], symlink: Option<(&str, &str)>) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    // Malicious entries go last so a fail-late extractor would already have
    // written the benign ones.
    for (name, body) in entries {
        zip.start_file(*name, options).expect("start file");
        zip.write_all(body.as_bytes()).expect("write entry");
    }
    if let Some((name, target)) = symlink {
        zip.add_symlink(name, target, options).expect("add symlink");
    }
    zip.finish().expect("finish zip").into_inner()
}

fn listing(dir: &Path) -> Vec<String> {
    let mut out: Vec<String> = walkdir::WalkDir::new(dir)
        .min_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .map(|e| {
            e.path()
                .strip_prefix(dir)
                .expect("under dir")
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    out.sort();
    out
}

fn attempt(bytes: Vec<u8>) -> (tempfile::TempDir, Result<usize, String>) {
    let outer = tempfile::tempdir().expect("outer temp dir");
    let dest = outer.path().join("Pkg");
    std::fs::create_dir(&dest).expect("create dest");
    let res = unpack_archive(Cursor::new(bytes), &dest, &ExtractConfig::default())
        .map_err(|f| f.message);
    (outer, res)
}

#[test]
fn traversal_variants_never_escape_the_destination() {
    let cases: &[&[(&str, &str)]] = &[
        &[("Pkg-main/plugin.py", ""), ("../evil.txt", "x")],
        &[("Pkg-main/plugin.py", ""), ("Pkg-main/../../evil.txt", "x")],
        &[("plugin.py", ""), ("a/b/c/../../../../evil.txt", "x")],
        &[("plugin.py", ""), ("/tmp/evil.txt", "x")],
        &[("plugin.py", ""), ("..\\evil.txt", "x")],
    ];
    for entries in cases {
        let (outer, res) = attempt(zip_with(entries, None));
        let err = res.expect_err("traversal must be rejected");
        assert!(
            err.ends_with("appears to be attempting to access other parts of the filesystem"),
            "{err}"
        );
        assert_eq!(listing(outer.path()), vec!["Pkg".to_string()], "{entries:?}");
    }
}

#[test]
fn symlink_entries_are_rejected_and_never_created() {
    let (outer, res) = attempt(zip_with(
        &[("Pkg-main/plugin.py", "")],
        Some(("Pkg-main/escape", "../../..")),
    ));
    let err = res.expect_err("symlink must be rejected");
    assert!(err.contains("symbolic link"), "{err}");
    for rel in listing(outer.path()) {
        let meta = std::fs::symlink_metadata(outer.path().join(&rel)).expect("stat");
        assert!(!meta.file_type().is_symlink(), "{rel} is a symlink");
    }
}

#[test]
fn benign_archive_is_flattened_under_destination() {
    let (outer, res) = attempt(zip_with(
        &[
            ("Pkg-1.2.0/plugin.py", "print('hi')"),
            ("Pkg-1.2.0/syntax/Pkg.sublime-syntax", "%YAML 1.2"),
        ],
        None,
    ));
    assert_eq!(res.expect("extract"), 2);
    assert_eq!(
        listing(outer.path()),
        vec![
            "Pkg",
            "Pkg/plugin.py",
            "Pkg/syntax",
            "Pkg/syntax/Pkg.sublime-syntax"
        ]
    );
    let body = std::fs::read_to_string(outer.path().join("Pkg/plugin.py")).expect("read");
    assert_eq!(body, "print('hi')");
}
