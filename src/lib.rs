// Lambda cost benchmark - library root

pub mod bench;
pub mod config;
pub mod error;
