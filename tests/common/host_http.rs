use std::path::{Path, PathBuf};

use axum::{
    body::Body,
    http::{Method, Request},
    Router,
};
use http_body_util::BodyExt;

use packnow::config::SECRET_HEADER;
use packnow::server::{routes, HostState, TransferSession};

//===========
// App Factory
//===========
pub fn create_host_test_app(archive: &Path, secret: Option<&str>) -> (Router, HostState) {
    let session = TransferSession::new(archive, secret.map(str::to_string))
        .expect("Failed to create session");
    let state = HostState::new(session);
    let app = routes::create_host_router(&state);
    (app, state)
}

/// Write a small archive named `name` into `dir` and return its path.
pub fn write_archive(dir: &Path, name: &str, entries: &[(&str, &[u8])]) -> PathBuf {
    use std::io::Write;

    let path = dir.join(name);
    let file = std::fs::File::create(&path).expect("Failed to create archive");
    let mut writer = zip::ZipWriter::new(file);
    for (entry, data) in entries {
        writer
            .start_file(*entry, zip::write::FileOptions::default())
            .expect("Failed to start entry");
        writer.write_all(data).expect("Failed to write entry");
    }
    writer.finish().expect("Failed to finish archive");
    path
}

//=================
// Request Builders
//=================
pub fn build_request(uri: &str, secret: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(secret) = secret {
        builder = builder.header(SECRET_HEADER, secret);
    }
    builder
        .body(Body::empty())
        .expect("Failed to build request")
}

//================
// Response Helpers
//================
pub async fn extract_json(response: axum::response::Response) -> serde_json::Value {
    let body = extract_bytes(response).await;
    serde_json::from_slice(&body).expect("Failed to parse JSON")
}

pub async fn extract_bytes(response: axum::response::Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes()
        .to_vec()
}
