//! Load test of the dashboard new user zone vouchers endpoint.
//!
//! Every virtual user repeats one iteration: GET the vouchers endpoint, check that the status is 200,
//! then sleep for a second. The execution options (`vus`, `duration`, `iterations`, `thresholds`, ...)
//! come from `config/dashboard/options.json` and are exported unchanged.
//!
//! # Usage
//! ```sh
//! dashboard-load --options config/dashboard/options.json --report-format console
//! ```
//!
//! # Library
//! ```
//! use dashboard_load::interface::options::Options;
//!
//! let options: Options = r#"{"vus": 5, "duration": "10s"}"#.parse().unwrap();
//! assert_eq!(options.exported(), &serde_json::json!({"vus": 5, "duration": "10s"}));
//! assert_eq!(options.execution().vus(), 5);
//! ```
pub mod assault;
pub mod error;
pub mod implement;
pub mod interface;

pub use error::{LoadError, LoadResult};

/// Default `User-Agent` of the http client.
pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
