#[cfg(feature = "default-http-client")]
pub mod service_http;
