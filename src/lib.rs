pub mod common;
pub mod config;
pub mod conversation;
pub mod network;
pub mod session;
pub mod storage;
