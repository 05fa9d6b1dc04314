pub mod common;
pub mod fetch;
pub mod output;
pub mod pack;
pub mod server;
pub mod transport;

// Shared by the host and the fetcher
pub mod config {
    /// Filename the host advertises in `Content-Disposition`.
    pub const SERVED_FILENAME: &str = "packnow.zip";
    /// Header carrying the shared secret on `GET /get`.
    pub const SECRET_HEADER: &str = "authorization";
}
