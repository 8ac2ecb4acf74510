pub mod auth;
pub mod catalog;
pub mod chat;
pub mod common;
pub mod config;
pub mod error;
pub mod network;
pub mod storage;
pub mod store;
pub mod ui;

pub use error::{ClientError, Result};
