pub mod api;
pub mod http;

pub use api::TaskApi;
pub use http::TaskClient;
