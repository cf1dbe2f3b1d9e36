pub(crate) mod commands;
pub(crate) mod dialog;
pub(crate) mod state;

pub use dialog::TauriFileDialog;
pub use state::AppState;
