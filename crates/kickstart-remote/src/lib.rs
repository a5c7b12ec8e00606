mod fetcher;
mod transport;
mod versions;

pub use fetcher::Fetcher;
pub use transport::{CurlTransport, ProgressFn, RequestProfile, ReqwestTransport, Transport};
pub use versions::resolve_versions;
