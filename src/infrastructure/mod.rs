pub mod backend;
pub mod config;
pub mod dialog;
pub mod logging;
pub mod sheet;

#[cfg(feature = "desktop")]
pub mod bootstrap;
