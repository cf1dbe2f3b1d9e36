pub mod application;
pub mod domain;
pub mod infrastructure;

#[cfg(feature = "desktop")]
mod app;
#[cfg(feature = "desktop")]
mod interfaces;

#[cfg(feature = "desktop")]
pub use app::run;
