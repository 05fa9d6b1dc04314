mod common;

use packnow::common::FetchError;
use packnow::fetch::{CredentialSource, StaticCredential, TransferClient};
use packnow::pack::{pack, RuleTemplate, TraceObserver};
use packnow::server::{start_host, HostOptions, RunningHost};
use std::cell::Cell;
use std::path::Path;

use common::{child_dirs, list_files, setup_temp_dir, write_tree};

//===============
// Test Helpers
//===============
fn host(archive: &Path, secret: Option<&str>) -> (RunningHost, String) {
    let host = start_host(&HostOptions {
        address: "127.0.0.1".to_string(),
        port: 0,
        file: archive.to_path_buf(),
        secret: secret.map(str::to_string),
        public_url: None,
    })
    .expect("Failed to start host");
    let url = format!("http://{}", host.local_addr());
    (host, url)
}

fn pack_tree(tree: &Path, out: &Path) -> std::path::PathBuf {
    let destination = out.join("packnow-test.zip");
    pack(
        tree,
        &RuleTemplate::DefaultExclusions.rules(),
        &destination,
        &TraceObserver,
        &(),
    )
    .expect("pack");
    destination
}

/// Counts how often it was asked.
struct CountingCredential {
    secret: Option<String>,
    asked: Cell<usize>,
}

impl CredentialSource for CountingCredential {
    fn secret(&self) -> Option<String> {
        self.asked.set(self.asked.get() + 1);
        self.secret.clone()
    }
}

//===============
// Round trips
//===============
#[tokio::test]
async fn pack_host_fetch_round_trip() {
    let tree = setup_temp_dir();
    let payload: Vec<u8> = (0..300_000u32).map(|i| (i * 7 % 256) as u8).collect();
    write_tree(
        tree.path(),
        &[
            ("app.py", b"print('hi')"),
            ("static/logo.bin", &payload),
            ("venv/lib/site.py", b"skip"),
            ("pkg/__pycache__/m.pyc", b"skip"),
        ],
    );
    let out = setup_temp_dir();
    let archive = pack_tree(tree.path(), out.path());

    let (host, url) = host(&archive, None);
    let dest = setup_temp_dir();
    let report = TransferClient::new(dest.path())
        .fetch(&url, &StaticCredential(None))
        .await
        .expect("fetch");

    assert_eq!(report.files, 2);
    assert_eq!(
        report.downloaded,
        std::fs::metadata(&archive).unwrap().len()
    );
    assert_eq!(
        list_files(&report.directory),
        vec!["app.py", "static/logo.bin"]
    );
    assert_eq!(
        std::fs::read(report.directory.join("static/logo.bin")).unwrap(),
        payload
    );
    assert!(report
        .directory
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("packnow-"));

    host.shutdown_with(std::future::pending())
        .await
        .expect("shutdown");
}

#[tokio::test]
async fn open_host_never_asks_for_a_secret() {
    let tree = setup_temp_dir();
    write_tree(tree.path(), &[("a.txt", b"a")]);
    let out = setup_temp_dir();
    let archive = pack_tree(tree.path(), out.path());

    let (host, url) = host(&archive, None);
    let dest = setup_temp_dir();
    let credentials = CountingCredential {
        secret: Some("unused".to_string()),
        asked: Cell::new(0),
    };

    TransferClient::new(dest.path())
        .fetch(&url, &credentials)
        .await
        .expect("fetch");
    assert_eq!(credentials.asked.get(), 0);

    host.shutdown_with(std::future::pending())
        .await
        .expect("shutdown");
}

#[tokio::test]
async fn wrong_secret_then_right_secret() {
    let tree = setup_temp_dir();
    write_tree(tree.path(), &[("secret.txt", b"classified")]);
    let out = setup_temp_dir();
    let archive = pack_tree(tree.path(), out.path());

    let (host, url) = host(&archive, Some("hunter2"));
    let dest = setup_temp_dir();
    let client = TransferClient::new(dest.path());

    let requires_secret = client.probe(&url).await.expect("probe");
    assert!(requires_secret);

    let err = client
        .fetch(&url, &StaticCredential(Some("wrong".to_string())))
        .await
        .expect_err("wrong secret should fail");
    assert!(matches!(err, FetchError::InvalidCredential));
    // nothing written for the failed attempt
    assert!(std::fs::read_dir(dest.path()).unwrap().next().is_none());

    let report = client
        .fetch(&url, &StaticCredential(Some("hunter2".to_string())))
        .await
        .expect("right secret");
    assert_eq!(
        std::fs::read(report.directory.join("secret.txt")).unwrap(),
        b"classified"
    );

    host.shutdown_with(std::future::pending())
        .await
        .expect("shutdown");
}

#[tokio::test]
async fn non_ascii_secret_round_trip() {
    let tree = setup_temp_dir();
    write_tree(tree.path(), &[("umlaut.txt", b"gr\xc3\xbc\xc3\x9fe")]);
    let out = setup_temp_dir();
    let archive = pack_tree(tree.path(), out.path());

    let (host, url) = host(&archive, Some("pässwort"));
    let dest = setup_temp_dir();
    let client = TransferClient::new(dest.path());

    let err = client
        .fetch(&url, &StaticCredential(Some("passwort".to_string())))
        .await
        .expect_err("ascii lookalike should fail");
    assert!(matches!(err, FetchError::InvalidCredential));

    let report = client
        .fetch(&url, &StaticCredential(Some("pässwort".to_string())))
        .await
        .expect("exact secret");
    assert_eq!(list_files(&report.directory), vec!["umlaut.txt"]);

    host.shutdown_with(std::future::pending())
        .await
        .expect("shutdown");
}

#[tokio::test]
async fn protected_host_without_credential_fails_early() {
    let tree = setup_temp_dir();
    write_tree(tree.path(), &[("a.txt", b"a")]);
    let out = setup_temp_dir();
    let archive = pack_tree(tree.path(), out.path());

    let (host, url) = host(&archive, Some("hunter2"));
    let dest = setup_temp_dir();

    let err = TransferClient::new(dest.path())
        .fetch(&url, &StaticCredential(Some(String::new())))
        .await
        .expect_err("no credential");
    assert!(matches!(err, FetchError::AuthRequired));

    host.shutdown_with(std::future::pending())
        .await
        .expect("shutdown");
}

#[tokio::test]
async fn download_temp_file_is_removed() {
    let tree = setup_temp_dir();
    write_tree(tree.path(), &[("a.txt", b"a"), ("b/c.txt", b"c")]);
    let out = setup_temp_dir();
    let archive = pack_tree(tree.path(), out.path());

    let (host, url) = host(&archive, None);
    let dest = setup_temp_dir();
    let report = TransferClient::new(dest.path())
        .fetch(&url, &StaticCredential(None))
        .await
        .expect("fetch");

    // only the extraction directory is left
    let leftovers: Vec<_> = std::fs::read_dir(dest.path())
        .unwrap()
        .filter_map(Result::ok)
        .map(|e| e.path())
        .collect();
    assert_eq!(leftovers, vec![report.directory.clone()]);

    host.shutdown_with(std::future::pending())
        .await
        .expect("shutdown");
}

#[tokio::test]
async fn repeated_fetches_get_separate_directories() {
    let tree = setup_temp_dir();
    write_tree(tree.path(), &[("a.txt", b"a")]);
    let out = setup_temp_dir();
    let archive = pack_tree(tree.path(), out.path());

    let (host, url) = host(&archive, None);
    let dest = setup_temp_dir();
    let client = TransferClient::new(dest.path());

    let first = client.fetch(&url, &StaticCredential(None)).await.expect("first");
    let second = client.fetch(&url, &StaticCredential(None)).await.expect("second");

    assert_ne!(first.directory, second.directory);
    assert_eq!(child_dirs(dest.path()).len(), 2);

    host.shutdown_with(std::future::pending())
        .await
        .expect("shutdown");
}

#[tokio::test]
async fn shutdown_is_not_held_by_idle_client_connection() {
    let tree = setup_temp_dir();
    write_tree(tree.path(), &[("a.txt", b"a")]);
    let out = setup_temp_dir();
    let archive = pack_tree(tree.path(), out.path());

    let (host, url) = host(&archive, None);
    let addr = host.local_addr();
    let dest = setup_temp_dir();
    // kept alive past shutdown so its pooled connection stays open
    let client = TransferClient::new(dest.path());
    client.fetch(&url, &StaticCredential(None)).await.expect("fetch");

    tokio::time::timeout(
        std::time::Duration::from_secs(10),
        host.shutdown_with(std::future::pending()),
    )
    .await
    .expect("shutdown should not wait on idle connections")
    .expect("shutdown");

    std::net::TcpListener::bind(addr).expect("socket released");
    drop(client);
}

#[tokio::test]
async fn unreachable_host_is_network_error() {
    let dest = setup_temp_dir();
    // nothing listens on a freshly released port
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();

    let err = TransferClient::new(dest.path())
        .fetch(&format!("http://127.0.0.1:{port}"), &StaticCredential(None))
        .await
        .expect_err("no host");
    assert!(matches!(err, FetchError::Network { .. }));
}
