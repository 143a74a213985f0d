pub mod fetcher;
pub mod remote;
pub mod store;

pub use fetcher::*;
pub use remote::*;
pub use store::*;
