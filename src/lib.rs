// Library exports for rootdaemon

pub mod cli;
pub mod daemon;
pub mod error;
pub mod logs;
