pub mod busy;
pub mod import_session;
pub mod view_projection;
