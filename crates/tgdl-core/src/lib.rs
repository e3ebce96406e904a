pub mod config;
pub mod logging;

pub mod cache;
pub mod catalog;
pub mod control;
pub mod error;
pub mod link;
pub mod media;
pub mod registry;
pub mod scheduler;
pub mod session;
pub mod storage;
