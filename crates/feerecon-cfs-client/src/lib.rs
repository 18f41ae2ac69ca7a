mod auth;
mod http;
mod mock;
mod retry;

pub use http::{CfsHttpConfig, HttpCfsClient};
pub use mock::MockCfsClient;
