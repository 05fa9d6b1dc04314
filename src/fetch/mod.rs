mod client;
pub mod credentials;
mod extract;

pub use client::{fetch_url, FetchReport, TransferClient};
pub use credentials::{CredentialSource, FirstOf, StaticCredential, TerminalPrompt};
pub use extract::{create_extract_dir, extract_archive, ExtractReport};
