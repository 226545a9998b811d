pub mod chassis;
pub mod logs;
pub mod ssh;
