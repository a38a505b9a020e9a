#[cfg(feature = "console-report")]
pub mod console;
pub mod json;
