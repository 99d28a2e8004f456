pub mod api;
pub mod config;
pub mod error;
pub mod service;
pub mod storage;
pub mod tus;
pub mod utils;
