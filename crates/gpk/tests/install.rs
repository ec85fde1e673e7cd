//! End-to-end installs against local fixture repositories.
//!
//! Signature verification cannot succeed against throwaway fixtures, so the
//! verified cache is seeded by cloning the selected revision into the entry
//! a verified fetch would have produced; everything downstream of
//! verification (placement, copying, metadata, recursion, linking) runs for
//! real through the binary.

use assert_cmd::Command;
use camino::Utf8PathBuf;
use gpk_git::fixture::TestRepo;
use tempfile::TempDir;

fn gpk(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("gpk").unwrap();
    cmd.current_dir(dir.path());
    cmd.env("HOME", dir.path());
    cmd
}

fn package_fixture(name: &str, version: &str, deps: &[(&str, String)]) -> TestRepo {
    let repo = TestRepo::init();
    let deps_json: Vec<String> = deps
        .iter()
        .map(|(dep, src)| format!(r#""{dep}": "{src}""#))
        .collect();
    let manifest = format!(
        r#"{{"name": "{name}", "version": "{version}", "dependencies": {{{}}}}}"#,
        deps_json.join(", ")
    );
    repo.commit_file("package.json", &manifest);
    repo.commit_file("index.js", "module.exports = {};\n");
    repo.tag_lightweight(&format!("v{version}"));
    repo
}

fn source_of(repo: &TestRepo, range: &str) -> String {
    format!("git+file://{}#semver:{range}", repo.path())
}

/// Clones `tag` into the cache entry its OID addresses, standing in for a
/// previous verified fetch. Returns the tag's commit.
fn seed_cache(home: &TempDir, repo: &TestRepo, tag: &str) -> String {
    let tags = gpk_git::list_tags(&repo.url()).unwrap();
    let tag_ref = &tags[tag];
    let oid = tag_ref.annotated.clone().unwrap_or_else(|| tag_ref.commit.clone());

    let cache = Utf8PathBuf::from_path_buf(home.path().join(".gpk/cache")).unwrap();
    std::fs::create_dir_all(&cache).unwrap();
    let entry = cache.join(&oid);
    if !entry.exists() {
        gpk_git::clone_ref(tag, &repo.url(), &entry).unwrap();
    }
    tag_ref.commit.clone()
}

fn manifest_at(dir: &std::path::Path) -> serde_json::Value {
    let contents = std::fs::read_to_string(dir.join("package.json")).unwrap();
    serde_json::from_str(&contents).unwrap()
}

#[test]
fn install_builds_the_unflat_shared_tree() {
    let dir = TempDir::new().unwrap();

    let f = package_fixture("f", "1.3.0", &[]);
    let d = package_fixture("d", "1.0.0", &[("f", source_of(&f, "^1.0.0"))]);
    let e = package_fixture("e", "1.0.0", &[("f", source_of(&f, "^1.2.0"))]);
    let c = package_fixture(
        "c",
        "1.0.0",
        &[
            ("d", source_of(&d, "^1.0.0")),
            ("e", source_of(&e, "^1.0.0")),
        ],
    );

    let f_commit = seed_cache(&dir, &f, "v1.3.0");
    seed_cache(&dir, &d, "v1.0.0");
    seed_cache(&dir, &e, "v1.0.0");
    let c_commit = seed_cache(&dir, &c, "v1.0.0");

    std::fs::write(
        dir.path().join("package.json"),
        format!(
            r#"{{"name": "a", "version": "1.0.0", "dependencies": {{"c": "{}"}}}}"#,
            source_of(&c, "^1.0.0")
        ),
    )
    .unwrap();

    gpk(&dir).arg("install").assert().success();

    let modules = dir.path().join("node_modules");
    assert!(modules.join("c").exists());
    assert!(modules.join("d").exists());
    assert!(modules.join("e").exists());

    // f is shared under c, not duplicated into d or e, and not at the root.
    assert!(modules.join("c/node_modules/f").exists());
    assert!(!modules.join("d/node_modules/f").exists());
    assert!(!modules.join("e/node_modules/f").exists());
    assert!(!modules.join("f").exists());

    // Injected metadata round-trips the cache entry's commit.
    let c_manifest = manifest_at(&modules.join("c"));
    assert_eq!(c_commit, c_manifest["_commit"].as_str().unwrap());
    assert_eq!(
        format!("git+file://{}#{c_commit}", c.path()),
        c_manifest["_resolved"].as_str().unwrap()
    );
    let f_manifest = manifest_at(&modules.join("c/node_modules/f"));
    assert_eq!(f_commit, f_manifest["_commit"].as_str().unwrap());
    assert_eq!(
        source_of(&f, "^1.0.0"),
        f_manifest["_from"].as_str().unwrap()
    );
}

#[test]
fn second_install_is_a_no_op() {
    let dir = TempDir::new().unwrap();

    let dep = package_fixture("dep", "1.1.0", &[]);
    seed_cache(&dir, &dep, "v1.1.0");

    std::fs::write(
        dir.path().join("package.json"),
        format!(
            r#"{{"name": "a", "version": "1.0.0", "dependencies": {{"dep": "{}"}}}}"#,
            source_of(&dep, "^1.0.0")
        ),
    )
    .unwrap();

    gpk(&dir).arg("install").assert().success();
    let site = dir.path().join("node_modules/dep");
    let before = std::fs::metadata(site.join("package.json"))
        .unwrap()
        .modified()
        .unwrap();

    gpk(&dir).arg("install").assert().success();
    let after = std::fs::metadata(site.join("package.json"))
        .unwrap()
        .modified()
        .unwrap();
    // The site was not rewritten.
    assert_eq!(before, after);
}

#[test]
fn branch_installs_record_the_branch() {
    let dir = TempDir::new().unwrap();

    let dep = TestRepo::init();
    dep.commit_file(
        "package.json",
        r#"{"name": "dep", "version": "0.5.0"}"#,
    );
    let tip = dep.head_commit();

    // Seed the cache entry keyed by the branch tip.
    let cache = dir.path().join(".gpk/cache");
    std::fs::create_dir_all(&cache).unwrap();
    let entry = Utf8PathBuf::from_path_buf(cache.join(&tip)).unwrap();
    gpk_git::clone_ref("master", &dep.url(), &entry).unwrap();

    std::fs::write(
        dir.path().join("package.json"),
        format!(
            r#"{{"name": "a", "version": "1.0.0", "dependencies": {{"dep": "git+file://{}#master"}}}}"#,
            dep.path()
        ),
    )
    .unwrap();

    gpk(&dir).arg("install").assert().success();

    let manifest = manifest_at(&dir.path().join("node_modules/dep"));
    assert_eq!("master", manifest["_branch"].as_str().unwrap());
    assert_eq!(tip, manifest["_commit"].as_str().unwrap());
}

#[test]
fn installed_executables_are_linked() {
    let dir = TempDir::new().unwrap();

    let tool = TestRepo::init();
    tool.commit_file(
        "package.json",
        r#"{"name": "tool", "version": "2.0.0", "bin": {"tool-cli": "cli.js"}}"#,
    );
    tool.commit_file("cli.js", "#!/usr/bin/env node\n");
    tool.tag_lightweight("v2.0.0");
    seed_cache(&dir, &tool, "v2.0.0");

    std::fs::write(
        dir.path().join("package.json"),
        format!(
            r#"{{"name": "a", "version": "1.0.0", "dependencies": {{"tool": "{}"}}}}"#,
            source_of(&tool, "^2.0.0")
        ),
    )
    .unwrap();

    gpk(&dir).arg("install").assert().success();

    let link = dir.path().join("node_modules/.bin/tool-cli");
    let meta = std::fs::symlink_metadata(&link).unwrap();
    assert!(meta.file_type().is_symlink());
    assert!(link.canonicalize().is_ok());
}
