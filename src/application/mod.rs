pub mod use_cases;

pub use use_cases::import_session::{ImportSession, SessionPhase, SessionSnapshot};
pub use use_cases::view_projection::{SessionView, ViewProjection};
