pub mod announce;
pub mod local;

pub use announce::announce_url;
pub use local::{get_local_ip, start_local_server, LocalServer};
