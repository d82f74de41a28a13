//! End-to-end manifest runs against temporary directories.
//!
//! Manifests are written as JSON files and loaded the way the CLI loads them,
//! so decoding, stage selection and the filesystem effects are exercised
//! together.

use marksite::apply::{ApplyEvent, StageError, apply_manifest};
use marksite::manifest::Manifest;
use marksite::stage::Stage;
use std::fs;
use std::path::Path;
use std::sync::mpsc;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Load a manifest whose paths are relative to `root`.
fn load(root: &Path, json: serde_json::Value) -> Manifest {
    let text = serde_json::to_string_pretty(&json)
        .unwrap()
        .replace("@ROOT@", &root.display().to_string());
    let path = root.join("manifest.json");
    fs::write(&path, text).unwrap();
    Manifest::load(&path).unwrap()
}

#[test]
fn duplicate_target_across_sites_touches_nothing() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write(root, "a.txt", "from a");
    write(root, "b.txt", "from b");
    write(root, "out/existing.txt", "keep me");

    let manifest = load(
        root,
        serde_json::json!({
            "alpha": {
                "cleanup": true,
                "copies": { "@ROOT@/a.txt": "@ROOT@/out/existing.txt" }
            },
            "beta": {
                "copies": { "@ROOT@/b.txt": ["@ROOT@/out/new.txt", "@ROOT@/out/./existing.txt"] }
            }
        }),
    );

    let err = apply_manifest(&manifest, Stage::ALL, None).unwrap_err();
    assert_eq!(err.site, "beta");
    assert_eq!(err.stage, Stage::COLLECT);
    assert!(matches!(err.source, StageError::DuplicateTarget { .. }));

    // No cleanup, no partial copy.
    assert_eq!(fs::read_to_string(root.join("out/existing.txt")).unwrap(), "keep me");
    assert!(!root.join("out/new.txt").exists());
}

#[test]
fn copy_into_existing_directory_preserves_content() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write(root, "a.txt", "alpha bytes");
    fs::create_dir_all(root.join("dir")).unwrap();

    let manifest = load(
        root,
        serde_json::json!({ "s": { "copies": { "@ROOT@/a.txt": "@ROOT@/dir" } } }),
    );
    apply_manifest(&manifest, Stage::COPY, None).unwrap();

    assert_eq!(fs::read(root.join("dir/a.txt")).unwrap(), fs::read(root.join("a.txt")).unwrap());
}

#[test]
fn full_run_cleans_copies_and_builds() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write(root, "site/_header.html", "<html><title>{{from-tag}}</title><body>\n");
    write(root, "site/_footer.html", "</body></html>\n");
    write(root, "site/index.md", ":title Home\n\nVersion ${{ version }}, ${{ version }}.\n");
    write(root, "site/about.md", "# About");
    write(root, "site/about.html", "<p>custom about</p>");
    write(root, "shared/logo.svg", "<svg/>");
    write(root, "public/stale/old.css", "old");

    let manifest = load(
        root,
        serde_json::json!({
            "main": {
                "name": "Example",
                "url": "https://example.org",
                "src": "@ROOT@/site",
                "dst": "@ROOT@/public",
                "cleanup": true,
                "copies": {
                    "@ROOT@/shared": { "target": "@ROOT@/public/stale", "force": true }
                },
                "replaces": { "version": { "text": "2.1", "count": 1 } }
            }
        }),
    );

    let (tx, rx) = mpsc::channel();
    apply_manifest(&manifest, Stage::ALL, Some(tx)).unwrap();
    let events: Vec<ApplyEvent> = rx.iter().collect();

    let public = root.join("public");
    assert!(!public.join("stale/old.css").exists());
    assert_eq!(fs::read_to_string(public.join("stale/logo.svg")).unwrap(), "<svg/>");

    let index = fs::read_to_string(public.join("index.html")).unwrap();
    assert!(index.contains("<title>Home</title>"));
    assert!(index.contains("Version 2.1, ${{ version }}."));
    assert!(!index.contains(":title"));
    assert_eq!(fs::read_to_string(public.join("about.html")).unwrap(), "<p>custom about</p>");
    assert!(!public.join("_header.html").exists());

    let sitemap = fs::read_to_string(public.join("sitemap.xml")).unwrap();
    assert!(sitemap.contains("<loc>https://example.org/about.html</loc>"));
    assert!(sitemap.contains("<loc>https://example.org/index.html</loc>"));

    let stages: Vec<Stage> = events
        .iter()
        .filter_map(|e| match e {
            ApplyEvent::StageStarted { stage, .. } => Some(*stage),
            _ => None,
        })
        .collect();
    assert_eq!(stages, vec![Stage::CLEANUP, Stage::COPY, Stage::BUILD]);
    assert!(events.contains(&ApplyEvent::Built {
        site: "main".into(),
        dest: public.clone(),
        written: 2,
    }));
}

#[test]
fn each_stage_finishes_for_every_site_before_the_next() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write(root, "a/index.md", "# A");
    write(root, "a/assets/site.css", "body {}");
    write(root, "b/index.md", "# B");
    write(root, "logo.svg", "<svg/>");
    write(root, "shared.css", "p {}");

    // Site "b" cleans and copies into site "a"'s source and destination.
    let manifest = load(
        root,
        serde_json::json!({
            "a": { "src": "@ROOT@/a", "dst": "@ROOT@/public" },
            "b": {
                "src": "@ROOT@/b",
                "dst": "@ROOT@/public-b",
                "cleanup": true,
                "copies": {
                    "@ROOT@/logo.svg": "@ROOT@/public/assets/",
                    "@ROOT@/shared.css": "@ROOT@/a/shared.css"
                }
            }
        }),
    );

    let (tx, rx) = mpsc::channel();
    apply_manifest(&manifest, Stage::ALL, Some(tx)).unwrap();

    let public = root.join("public");
    assert_eq!(fs::read_to_string(public.join("assets/site.css")).unwrap(), "body {}");
    assert_eq!(fs::read_to_string(public.join("assets/logo.svg")).unwrap(), "<svg/>");
    assert_eq!(fs::read_to_string(public.join("shared.css")).unwrap(), "p {}");

    let order: Vec<(String, Stage)> = rx
        .iter()
        .filter_map(|e| match e {
            ApplyEvent::StageStarted { site, stage } => Some((site, stage)),
            _ => None,
        })
        .collect();
    assert_eq!(
        order,
        vec![
            ("b".to_string(), Stage::CLEANUP),
            ("b".to_string(), Stage::COPY),
            ("a".to_string(), Stage::BUILD),
            ("b".to_string(), Stage::BUILD),
        ]
    );
}

#[test]
fn sites_run_in_key_order_and_stop_at_first_failure() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write(root, "a/index.md", "# A");

    let manifest = load(
        root,
        serde_json::json!({
            "2-broken": { "src": "@ROOT@/missing", "dst": "@ROOT@/out-broken" },
            "1-ok": { "src": "@ROOT@/a", "dst": "@ROOT@/out-a" },
            "3-never": { "src": "@ROOT@/a", "dst": "@ROOT@/out-never" }
        }),
    );

    let err = apply_manifest(&manifest, Stage::BUILD, None).unwrap_err();
    assert_eq!(err.site, "2-broken");
    assert_eq!(err.stage, Stage::BUILD);
    assert!(root.join("out-a/index.html").exists());
    assert!(!root.join("out-never").exists());
}

#[test]
fn skipped_stages_do_nothing() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write(root, "src/index.md", "# Hi");
    write(root, "a.txt", "a");

    let manifest = load(
        root,
        serde_json::json!({
            "s": {
                "src": "@ROOT@/src",
                "dst": "@ROOT@/dst",
                "copies": { "@ROOT@/a.txt": "@ROOT@/dst/a.txt" }
            }
        }),
    );
    apply_manifest(&manifest, Stage::ALL.skip(Stage::COPY).skip(Stage::BUILD), None).unwrap();
    assert!(!root.join("dst").exists());
}
