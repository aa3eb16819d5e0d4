pub mod config;
pub mod init;
pub mod serve;
pub mod session;
pub mod task;
pub mod timer;
pub mod user;
