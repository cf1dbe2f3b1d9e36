use async_trait::async_trait;

use crate::domain::app_config::FileFilter;
use crate::domain::error::Result;

/// Host open/save dialogs. `None` means the user dismissed the dialog.
#[async_trait]
pub trait FileDialog {
    async fn select_open_path(&self, filters: &[FileFilter]) -> Result<Option<String>>;
    async fn select_save_path(
        &self,
        default_name: &str,
        filters: &[FileFilter],
    ) -> Result<Option<String>>;
}
