//! 传输层：两个适配器共享的 HTTP 客户端。
//!
//! HTTP transport shared by the provider adapters.

pub mod http;

pub use http::{parse_retry_after, Auth, HttpReply, HttpTransport, TransportError};
