pub mod human;
pub mod logger;
pub mod preflight;
pub mod report;
