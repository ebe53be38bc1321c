//! Common test utilities.

pub mod http;
pub mod server;

#[allow(unused_imports)]
pub use http::*;
#[allow(unused_imports)]
pub use server::*;
