use async_trait::async_trait;
use tauri::AppHandle;
use tauri_plugin_dialog::{DialogExt, FileDialogBuilder, FilePath};
use tokio::sync::oneshot;

use crate::domain::app_config::FileFilter;
use crate::domain::error::{AppError, Result};
use crate::infrastructure::dialog::FileDialog;

/// Native open/save dialogs through `tauri-plugin-dialog`.
pub struct TauriFileDialog {
    app_handle: AppHandle,
}

impl TauriFileDialog {
    pub fn new(app_handle: AppHandle) -> Self {
        Self { app_handle }
    }

    fn builder(&self, filters: &[FileFilter]) -> FileDialogBuilder<tauri::Wry> {
        filters
            .iter()
            .fold(self.app_handle.dialog().file(), |builder, filter| {
                let extensions: Vec<&str> =
                    filter.extensions.iter().map(String::as_str).collect();
                builder.add_filter(filter.name.clone(), &extensions)
            })
    }
}

fn into_path_string(picked: Option<FilePath>) -> Result<Option<String>> {
    picked
        .map(|path| {
            path.into_path()
                .map(|p| p.to_string_lossy().into_owned())
                .map_err(|e| AppError::IoError(format!("无法解析所选路径: {}", e)))
        })
        .transpose()
}

async fn wait_for(rx: oneshot::Receiver<Option<FilePath>>) -> Result<Option<String>> {
    // A dropped sender means the dialog closed without answering.
    into_path_string(rx.await.unwrap_or(None))
}

#[async_trait]
impl FileDialog for TauriFileDialog {
    async fn select_open_path(&self, filters: &[FileFilter]) -> Result<Option<String>> {
        let (tx, rx) = oneshot::channel();
        self.builder(filters).pick_file(move |picked| {
            let _ = tx.send(picked);
        });
        wait_for(rx).await
    }

    async fn select_save_path(
        &self,
        default_name: &str,
        filters: &[FileFilter],
    ) -> Result<Option<String>> {
        let (tx, rx) = oneshot::channel();
        self.builder(filters)
            .set_file_name(default_name)
            .save_file(move |picked| {
                let _ = tx.send(picked);
            });
        wait_for(rx).await
    }
}
