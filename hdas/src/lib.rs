pub mod config;
pub mod event;
pub mod report;
pub mod setup;
pub mod track;
