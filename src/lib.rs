pub mod cli;
pub mod download;
pub mod error;
pub mod logging;
pub mod resolve;
pub mod search;
pub mod server;
pub mod storage;
pub mod text;
pub mod trace;
