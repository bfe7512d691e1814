//! filedrop: a small HTTP service that accepts multipart uploads, stores them
//! on local disk under generated names, lists them, and serves them back.

pub mod config;
pub mod handler;
pub mod http;
pub mod logger;
pub mod server;
pub mod storage;
