pub mod measure;
pub mod metrics;
pub mod outcome;
pub mod reportable;
pub mod script;
pub mod service;
pub mod shutdown;
pub mod threshold;
pub mod worker;
