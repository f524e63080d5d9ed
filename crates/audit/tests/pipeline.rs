//! End-to-end audit tests: mocked GitHub API, real zipballs, real filesystem.

use std::io::{Cursor, Write};

use audit::config::Config;
use audit::server::{build_router, AppState};
use audit::{run_audit, GitHubClient};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zip::write::SimpleFileOptions;

fn test_config(api_url: &str, work_root: std::path::PathBuf) -> Config {
    Config {
        port: 0,
        github_api_url: api_url.to_string(),
        work_root,
        branch_concurrency: 2,
        yaml_max_bytes: 1_048_576,
        query_timeout_secs: 30,
        github_token: None,
    }
}

/// Build a zipball the way GitHub does: one top-level directory wrapping
/// the branch contents.
fn fixture_zipball(prefix: &str) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    writer.add_directory(format!("{prefix}/"), options).unwrap();
    writer
        .start_file(format!("{prefix}/pipeline.yml"), options)
        .unwrap();
    writer.write_all(b"jobs: build").unwrap();
    writer
        .start_file(format!("{prefix}/readme.txt"), options)
        .unwrap();
    writer.write_all(b"hello").unwrap();

    writer.finish().unwrap().into_inner()
}

fn repo_json(id: u64, name: &str) -> serde_json::Value {
    json!({
        "id": id,
        "name": name,
        "full_name": format!("octocat/{name}"),
        "owner": { "login": "octocat" },
        "private": false
    })
}

async fn mount_widgets(server: &MockServer) -> usize {
    let zipball = fixture_zipball("octocat-widgets-abc123");
    let zipball_len = zipball.len();

    Mock::given(method("GET"))
        .and(path("/repos/octocat/widgets/branches"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{ "name": "main" }])),
        )
        .mount(server)
        .await;

    // GitHub answers zipball requests with a redirect to the archive host.
    Mock::given(method("GET"))
        .and(path("/repos/octocat/widgets/zipball/main"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", format!("{}/cdn/widgets.zip", server.uri()).as_str()),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/cdn/widgets.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(zipball))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/repos/octocat/widgets/hooks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": 9,
                "name": "web",
                "active": true,
                "config": { "url": "https://ci.example.com/hook" }
            }
        ])))
        .mount(server)
        .await;

    zipball_len
}

#[tokio::test]
async fn test_full_audit_aggregates_repository() {
    let server = MockServer::start().await;
    let work = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/user/repos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([repo_json(1, "widgets")])))
        .mount(&server)
        .await;
    let zipball_len = mount_widgets(&server).await;

    let config = test_config(&server.uri(), work.path().to_path_buf());
    let client = GitHubClient::with_base_url("test-token", &config.github_api_url).unwrap();
    let repos = run_audit(&client, &config).await.unwrap();

    assert_eq!(repos.len(), 1);
    let repo = &repos[0];
    assert_eq!(repo.name, "widgets");
    assert_eq!(repo.owner, "octocat");
    assert_eq!(repo.branches.len(), 1);

    // The branch directory holds the archive next to its expansion, so the
    // snapshot file itself counts toward the totals.
    let branch = &repo.branches[0];
    assert_eq!(branch.name, "main");
    assert_eq!(branch.stats.total_files, 3);
    assert_eq!(branch.stats.total_size, zipball_len as u64 + 11 + 5);

    assert_eq!(branch.stats.yaml_file_count, 1);
    assert_eq!(
        branch.stats.yaml_file_count,
        branch.stats.yaml_files.len() as u64
    );
    let yaml = &branch.stats.yaml_files[0];
    assert_eq!(yaml.name, "pipeline.yml");
    assert_eq!(yaml.relative_path, "main/octocat-widgets-abc123/pipeline.yml");
    assert_eq!(yaml.content, "jobs: build");

    // Aggregate totals are the sums across branches.
    assert_eq!(repo.total_files, branch.stats.total_files);
    assert_eq!(repo.total_size, branch.stats.total_size);

    assert_eq!(repo.webhooks.len(), 1);
    assert_eq!(repo.webhooks[0].config.url, "https://ci.example.com/hook");
}

#[tokio::test]
async fn test_query_workspace_is_removed_after_audit() {
    let server = MockServer::start().await;
    let work = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/user/repos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([repo_json(1, "widgets")])))
        .mount(&server)
        .await;
    mount_widgets(&server).await;

    let config = test_config(&server.uri(), work.path().to_path_buf());
    let client = GitHubClient::with_base_url("test-token", &config.github_api_url).unwrap();
    run_audit(&client, &config).await.unwrap();

    let leftovers: Vec<_> = std::fs::read_dir(work.path()).unwrap().collect();
    assert!(leftovers.is_empty(), "workspace not cleaned: {leftovers:?}");
}

#[tokio::test]
async fn test_failures_are_scoped_to_their_unit() {
    let server = MockServer::start().await;
    let work = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/user/repos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            repo_json(1, "widgets"),
            repo_json(2, "broken"),
            repo_json(3, "hollow")
        ])))
        .mount(&server)
        .await;
    mount_widgets(&server).await;

    // "broken": branch listing fails, the repository is skipped outright.
    Mock::given(method("GET"))
        .and(path("/repos/octocat/broken/branches"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    // "hollow": lists one branch but its snapshot is gone; the branch is
    // skipped and the repository stays with empty stats. Its hooks endpoint
    // answers with a non-array body, normalized to no webhooks.
    Mock::given(method("GET"))
        .and(path("/repos/octocat/hollow/branches"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{ "name": "main" }])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octocat/hollow/zipball/main"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octocat/hollow/hooks"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "message": "Not Found" })),
        )
        .mount(&server)
        .await;

    let config = test_config(&server.uri(), work.path().to_path_buf());
    let client = GitHubClient::with_base_url("test-token", &config.github_api_url).unwrap();
    let repos = run_audit(&client, &config).await.unwrap();

    let names: Vec<_> = repos.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["widgets", "hollow"]);

    let hollow = &repos[1];
    assert!(hollow.branches.is_empty());
    assert_eq!(hollow.total_files, 0);
    assert_eq!(hollow.total_size, 0);
    assert!(hollow.webhooks.is_empty());
}

#[tokio::test]
async fn test_query_endpoint_requires_token() {
    let work = tempfile::tempdir().unwrap();
    let config = test_config("http://127.0.0.1:9", work.path().to_path_buf());

    let app = build_router(AppState { config });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/query"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "apiToken is required");
}

#[tokio::test]
async fn test_query_endpoint_serves_aggregated_repositories() {
    let server = MockServer::start().await;
    let work = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/user/repos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([repo_json(1, "widgets")])))
        .mount(&server)
        .await;
    mount_widgets(&server).await;

    let config = test_config(&server.uri(), work.path().to_path_buf());
    let app = build_router(AppState { config });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/query"))
        .json(&json!({ "apiToken": "test-token" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    let repo = &body["repositories"][0];
    assert_eq!(repo["name"], "widgets");
    assert_eq!(repo["isPrivate"], false);
    assert_eq!(repo["branches"][0]["yamlFileCount"], 1);
    assert_eq!(repo["webhooks"][0]["config"]["url"], "https://ci.example.com/hook");
}
