pub mod fetcher;
pub mod transport;

pub use fetcher::ResilientFetcher;
pub use transport::{HttpResponse, HttpTransport, ReqwestTransport};
