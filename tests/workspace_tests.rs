//! End-to-end scenarios driving the `git-ws` binary against offline
//! `file://` remotes.

mod common;

use assert_cmd::Command;
use common::fixtures::WorkspaceBuilder;
use common::git_helpers;
use std::fs;

fn git_ws(workspace_root: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("git-ws").unwrap();
    cmd.current_dir(workspace_root);
    cmd
}

#[test]
fn init_without_main_reports_no_main() {
    let temp = tempfile::TempDir::new().unwrap();
    let root = temp.path();
    fs::write(root.join("git-ws.toml"), "version = \"1.0\"\n").unwrap();

    git_ws(root).arg("init").assert().success();

    assert!(root.join(".git-ws/info.toml").is_file());
    assert!(root.join(".git-ws/config.toml").is_file());

    git_ws(root).args(["manifest", "path"]).assert().failure();
}

#[test]
fn update_materializes_group_filtered_dependencies() {
    let fixture = WorkspaceBuilder::new("main")
        .add_dependency("dep1")
        .add_dependency_with_groups("dep2", vec!["test"])
        .build();

    git_ws(&fixture.workspace_root)
        .args(["init", "--main-path", &fixture.main_path])
        .assert()
        .success();

    git_ws(&fixture.workspace_root)
        .args(["update", "-G", "+test"])
        .assert()
        .success();

    assert!(fixture.project_path("dep1").join(".git").is_dir());
    assert!(fixture.project_path("dep2").join(".git").is_dir());
}

#[test]
fn update_excludes_filtered_out_dependency_by_default() {
    let fixture = WorkspaceBuilder::new("main")
        .add_dependency("dep1")
        .add_dependency_with_groups("dep2", vec!["test"])
        .build();

    // Main's own manifest excludes the "test" group.
    let manifest_path = fixture.main_abs_path().join("git-ws.toml");
    let mut manifest = fs::read_to_string(&manifest_path).unwrap();
    manifest = format!("group-filters = [\"-test\"]\n{manifest}");
    fs::write(&manifest_path, &manifest).unwrap();
    git_helpers::commit_file(&fixture.main_abs_path(), "git-ws.toml", &manifest, "exclude test group");

    git_ws(&fixture.workspace_root)
        .args(["init", "--main-path", &fixture.main_path])
        .assert()
        .success();
    git_ws(&fixture.workspace_root).arg("update").assert().success();

    assert!(fixture.project_path("dep1").join(".git").is_dir());
    assert!(!fixture.project_path("dep2").join(".git").is_dir());
}

#[test]
fn recursive_false_excludes_transitive_dependency() {
    let fixture = WorkspaceBuilder::new("main")
        .add_dependency_non_recursive("dep2")
        .build();

    // dep2's own manifest declares a further dependency on dep5; since
    // main's declaration of dep2 sets recursive = false, dep5 must not
    // be cloned.
    let dep2_bare = fixture.remote_path("dep2");
    let staging = tempfile::TempDir::new().unwrap();
    let staging_dep2 = staging.path().join("dep2");
    git_helpers::clone_repo(&format!("file://{}", dep2_bare.display()), &staging_dep2);

    fs::create_dir_all(staging.path().join("dep5_remote")).unwrap();
    let dep5_bare = staging.path().join("dep5_remote").join("dep5.git");
    git_helpers::init_bare_repo(&dep5_bare);
    let dep5_staging = staging.path().join("dep5-staging");
    git_helpers::init_repo(&dep5_staging);
    git_helpers::commit_file(&dep5_staging, "README.md", "# dep5\n", "initial commit");
    git_helpers::add_remote(&dep5_staging, "origin", &format!("file://{}", dep5_bare.display()));
    git_helpers::push_upstream(&dep5_staging, "origin", "main");

    let dep2_manifest = format!(
        "version = \"1.0\"\n\n[[dependencies]]\nname = \"dep5\"\nurl = \"file://{}\"\n",
        dep5_bare.display()
    );
    git_helpers::commit_file(&staging_dep2, "git-ws.toml", &dep2_manifest, "declare dep5");
    git_helpers::push_branch(&staging_dep2, "origin", "main");

    git_ws(&fixture.workspace_root)
        .args(["init", "--main-path", &fixture.main_path])
        .assert()
        .success();
    git_ws(&fixture.workspace_root).arg("update").assert().success();

    assert!(fixture.project_path("dep2").join(".git").is_dir());
    assert!(!fixture.project_path("dep5").join(".git").is_dir());
}

#[test]
fn tag_freezes_manifest_and_reproduces_on_fresh_clone() {
    let fixture = WorkspaceBuilder::new("main")
        .add_dependency("dep1")
        .add_dependency("dep2")
        .build();

    // The main project itself needs a bare remote to push the tag to and
    // clone from, separate from the fixture's dependency remotes.
    let main_bare = fixture.remotes_dir.join("main.git");
    git_helpers::init_bare_repo(&main_bare);
    let main_remote_url = format!("file://{}", main_bare.display());
    git_helpers::add_remote(&fixture.main_abs_path(), "origin", &main_remote_url);
    git_helpers::push_upstream(&fixture.main_abs_path(), "origin", "main");

    git_ws(&fixture.workspace_root)
        .args(["init", "--main-path", &fixture.main_path])
        .assert()
        .success();
    git_ws(&fixture.workspace_root).arg("update").assert().success();

    let dep1_sha = git_helpers::get_head_sha(&fixture.project_path("dep1"));

    git_ws(&fixture.workspace_root)
        .args(["tag", "MYTAG", "-m", "freeze"])
        .assert()
        .success();

    let frozen_path = fixture.main_abs_path().join(".git-ws/manifests/MYTAG.toml");
    assert!(frozen_path.is_file());

    // Push main's commits and the new tag so a fresh clone can see them.
    git_helpers::push_branch(&fixture.main_abs_path(), "origin", "main");
    git_helpers::push_branch(&fixture.main_abs_path(), "origin", "MYTAG");

    let fresh_root = tempfile::TempDir::new().unwrap();
    git_ws(fresh_root.path())
        .args(["clone", &main_remote_url, "--revision", "MYTAG"])
        .assert()
        .success();
    git_ws(fresh_root.path()).arg("update").assert().success();

    let fresh_dep1_sha = git_helpers::get_head_sha(&fresh_root.path().join("dep1"));
    assert_eq!(fresh_dep1_sha, dep1_sha);
}

#[test]
fn linkfile_survives_redeclare_and_respects_user_modification() {
    let fixture = WorkspaceBuilder::new("main").add_dependency("dep1").build();

    // dep1's initial commit only has README.md; declare a linkfile for it
    // from main's own manifest.
    let manifest_path = fixture.main_abs_path().join("git-ws.toml");
    let base_manifest = fs::read_to_string(&manifest_path).unwrap();
    let with_linkfile = base_manifest.replacen(
        "[[dependencies]]\nname = \"dep1\"",
        "[[dependencies]]\nname = \"dep1\"\nlinkfiles = [{ src = \"README.md\", dest = \"dep1-readme.md\" }]",
        1,
    );
    fs::write(&manifest_path, &with_linkfile).unwrap();
    git_helpers::commit_file(&fixture.main_abs_path(), "git-ws.toml", &with_linkfile, "declare linkfile");

    git_ws(&fixture.workspace_root)
        .args(["init", "--main-path", &fixture.main_path])
        .assert()
        .success();
    git_ws(&fixture.workspace_root).arg("update").assert().success();

    let link_dest = fixture.workspace_root.join("dep1-readme.md");
    assert!(link_dest.is_symlink());

    // Replace the symlink with a plain file (a user edit); update without
    // --force must leave it alone.
    fs::remove_file(&link_dest).unwrap();
    fs::write(&link_dest, "user-edited\n").unwrap();
    git_ws(&fixture.workspace_root).arg("update").assert().success();
    assert!(!link_dest.is_symlink());
    assert_eq!(fs::read_to_string(&link_dest).unwrap(), "user-edited\n");

    // --force restores the declared link.
    git_ws(&fixture.workspace_root)
        .args(["update", "--force"])
        .assert()
        .success();
    assert!(link_dest.is_symlink());
}
