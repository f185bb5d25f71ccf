//! End-to-end bulk replace: code search and pull requests served by a mock API, git
//! remotes served from local bare repositories.

use bitbucket_ops::bitbucket::BitbucketClient;
use bitbucket_ops::codemod::{CleanupOutcome, CodeReplace, MutationStep, RepoStatus};
use bitbucket_ops::credentials::Credentials;
use git2::{BranchType, Repository, Signature};
use mockito::{Matcher, Mock, Server};
use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const BRANCH: &str = "feature/update-module-reference";
const OLD: &str = "ssh://git@bitbucket.example.com:1882/tf";
const NEW: &str = "git@bitbucket.org:acme";

/// Create `{name}.git` with one commit containing `files`.
fn bare_remote(dir: &Path, name: &str, files: &[(&str, &[u8])]) -> Repository {
    let repo = Repository::init_bare(dir.join(format!("{name}.git"))).unwrap();
    {
        let mut tree = repo.treebuilder(None).unwrap();
        for &(path, content) in files {
            let blob = repo.blob(content).unwrap();
            tree.insert(path, blob, 0o100644).unwrap();
        }
        let tree = repo.find_tree(tree.write().unwrap()).unwrap();
        let sig = Signature::now("Test", "test@example.com").unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
            .unwrap();
    }
    repo
}

fn file_on_branch(repo: &Repository, branch: &str, path: &str) -> Vec<u8> {
    let commit = repo
        .find_branch(branch, BranchType::Local)
        .unwrap()
        .get()
        .peel_to_commit()
        .unwrap();
    let id = commit.tree().unwrap().get_name(path).unwrap().id();
    repo.find_blob(id).unwrap().content().to_vec()
}

fn search_hit(repository: &str, path: &str) -> serde_json::Value {
    json!({"file": {"path": path, "links": {"self": {
        "href": format!("https://api.bitbucket.org/2.0/repositories/acme/{repository}/src/0a1b2c/{path}")
    }}}})
}

fn mock_search(server: &mut Server, repositories: &[&str]) -> Mock {
    let values: Vec<_> = repositories
        .iter()
        .map(|repo| search_hit(repo, "main.tf"))
        .collect();
    server
        .mock("GET", "/2.0/workspaces/acme/search/code")
        .match_query(Matcher::UrlEncoded("search_query".into(), "\"1882 tf\"".into()))
        .with_status(200)
        .with_body(json!({ "values": values }).to_string())
        .expect(1)
        .create()
}

fn config(remotes: &TempDir, work: &TempDir) -> CodeReplace {
    CodeReplace::new("acme", "\"1882 tf\"", OLD, NEW)
        .unwrap()
        .clone_url(format!("{}/{{repository}}.git", remotes.path().display()))
        .work_dir(work.path())
        .create_pr(
            "Updating module references",
            "Points module sources at Bitbucket Cloud.",
        )
}

#[test]
fn test_bulk_replace_end_to_end() {
    let remotes = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let report_dir = TempDir::new().unwrap();

    let network = bare_remote(
        remotes.path(),
        "network",
        &[
            (
                "main.tf",
                format!("module \"vpc\" {{\n  source = \"{OLD}/vpc.git\"\n}}\n").as_bytes(),
            ),
            ("README.md", b"No module references here.\n".as_slice()),
        ],
    );
    let dns = bare_remote(remotes.path(), "dns", &[("main.tf", b"resource \"x\" {}\n".as_slice())]);

    let mut server = Server::new();
    let search = mock_search(&mut server, &["network", "dns", "network"]);
    let pr = server
        .mock("POST", "/2.0/repositories/acme/network/pullrequests")
        .match_body(Matcher::PartialJson(json!({
            "title": "Updating module references",
            "source": {"branch": {"name": BRANCH}}
        })))
        .with_status(201)
        .with_body(
            json!({
                "id": 3,
                "links": {"html": {"href": "https://bitbucket.org/acme/network/pull-requests/3"}}
            })
            .to_string(),
        )
        .expect(1)
        .create();

    let client =
        BitbucketClient::new(server.url(), Credentials::new("alice", "app-password")).unwrap();

    let mut seen = Vec::new();
    let result = config(&remotes, &work)
        .execute_with(&client, |r| seen.push(r.repository.clone()))
        .unwrap();

    search.assert();
    pr.assert();
    assert_eq!(seen, vec!["network", "dns"]);

    let network_result = &result.repo_results[0];
    assert_eq!(network_result.status, RepoStatus::Success);
    assert_eq!(network_result.files_changed, 1);
    assert_eq!(network_result.occurrences, 1);
    assert_eq!(
        network_result.pr_url.as_deref(),
        Some("https://bitbucket.org/acme/network/pull-requests/3")
    );
    assert_eq!(network_result.cleanup, CleanupOutcome::Removed);

    assert_eq!(result.repo_results[1].status, RepoStatus::NoChanges);
    assert!(dns.find_branch(BRANCH, BranchType::Local).is_err());

    let updated = String::from_utf8(file_on_branch(&network, BRANCH, "main.tf")).unwrap();
    assert!(updated.contains(&format!("source = \"{NEW}/vpc.git\"")));
    assert!(!updated.contains(OLD));

    assert!(!work.path().join("tmp_network").exists());
    assert!(!work.path().join("tmp_dns").exists());

    let report_path = report_dir.path().join("report.yaml");
    result.write_report(&report_path).unwrap();
    let report = fs::read_to_string(&report_path).unwrap();
    assert!(report.contains("repository: network"));
    assert!(report.contains("status: success"));
    assert!(report.contains("status: no_changes"));
    assert!(report.contains("pull_request_url: https://bitbucket.org/acme/network/pull-requests/3"));
    assert!(!result.has_failures());
}

#[test]
fn test_binary_files_are_edited_byte_for_byte() {
    let remotes = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();

    let mut blob = vec![0x89, b'P', b'N', b'G', 0x00, 0xff];
    blob.extend_from_slice(OLD.as_bytes());
    blob.extend_from_slice(&[0x00, 0xfe, 0x80]);
    let remote = bare_remote(remotes.path(), "assets", &[("archive.bin", blob.as_slice())]);

    let mut server = Server::new();
    let _search = mock_search(&mut server, &["assets"]);
    let _pr = server
        .mock("POST", "/2.0/repositories/acme/assets/pullrequests")
        .with_status(201)
        .with_body(json!({"id": 1}).to_string())
        .create();

    let client =
        BitbucketClient::new(server.url(), Credentials::new("alice", "app-password")).unwrap();
    let result = config(&remotes, &work).execute(&client).unwrap();

    assert_eq!(result.repo_results[0].status, RepoStatus::Success);
    assert_eq!(result.repo_results[0].pr_url, None);

    let mut expected = vec![0x89, b'P', b'N', b'G', 0x00, 0xff];
    expected.extend_from_slice(NEW.as_bytes());
    expected.extend_from_slice(&[0x00, 0xfe, 0x80]);
    assert_eq!(file_on_branch(&remote, BRANCH, "archive.bin"), expected);
}

#[test]
fn test_failed_pull_request_does_not_fail_repository() {
    let remotes = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    bare_remote(remotes.path(), "network", &[("main.tf", OLD.as_bytes())]);

    let mut server = Server::new();
    let _search = mock_search(&mut server, &["network"]);
    let _pr = server
        .mock("POST", "/2.0/repositories/acme/network/pullrequests")
        .with_status(400)
        .with_body(json!({"error": {"message": "There are no changes to be pulled"}}).to_string())
        .create();

    let client =
        BitbucketClient::new(server.url(), Credentials::new("alice", "app-password")).unwrap();
    let result = config(&remotes, &work).execute(&client).unwrap();

    let repo = &result.repo_results[0];
    assert_eq!(repo.status, RepoStatus::Success);
    assert!(repo.pr_error.as_deref().unwrap().contains("no changes"));
    assert_eq!(result.summary.prs_created, 0);
}

#[test]
fn test_missing_remote_fails_only_that_repository() {
    let remotes = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    bare_remote(remotes.path(), "network", &[("main.tf", OLD.as_bytes())]);

    let mut server = Server::new();
    let _search = mock_search(&mut server, &["ghost", "network"]);
    let _pr = server
        .mock("POST", "/2.0/repositories/acme/network/pullrequests")
        .with_status(201)
        .with_body(json!({"id": 1}).to_string())
        .create();

    let client =
        BitbucketClient::new(server.url(), Credentials::new("alice", "app-password")).unwrap();
    let result = config(&remotes, &work).execute(&client).unwrap();

    assert!(matches!(
        result.repo_results[0].status,
        RepoStatus::Failed {
            step: MutationStep::Clone,
            ..
        }
    ));
    assert_eq!(result.repo_results[1].status, RepoStatus::Success);
    assert!(result.has_failures());
    assert_eq!(result.summary.failed_repos, 1);
    assert_eq!(result.summary.changed_repos, 1);
}

#[test]
fn test_search_failure_aborts_before_cloning() {
    let remotes = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();

    let mut server = Server::new();
    let _search = server
        .mock("GET", "/2.0/workspaces/acme/search/code")
        .match_query(Matcher::Any)
        .with_status(401)
        .create();

    let client =
        BitbucketClient::new(server.url(), Credentials::new("alice", "wrong")).unwrap();
    let err = config(&remotes, &work).execute(&client).unwrap_err();

    assert!(err.is_auth_failure());
    assert_eq!(fs::read_dir(work.path()).unwrap().count(), 0);
}
