pub mod command;
pub mod duration;
pub mod helper;
pub mod options;
pub mod report;
