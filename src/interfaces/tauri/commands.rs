//! Every session command runs its transition and answers with the fresh
//! projection; failures reach the page through the status line.

use std::collections::HashMap;
use std::sync::Arc;

use tauri::State;
use tracing::debug;

use crate::application::SessionView;
use crate::domain::error::Result;
use crate::domain::field_schema::{FieldConfig, FieldSchema};
use crate::domain::mapping::FieldSelection;

use super::state::AppState;

fn respond<T>(state: &AppState, command: &str, outcome: Result<T>) -> Result<SessionView> {
    if let Err(err) = outcome {
        debug!(command, error = %err, "Command finished without applying");
    }
    Ok(state.import_session.view())
}

#[tauri::command]
pub async fn session_view(state: State<'_, Arc<AppState>>) -> Result<SessionView> {
    Ok(state.import_session.view())
}

#[tauri::command]
pub fn field_schema() -> Result<Vec<FieldConfig>> {
    Ok(FieldSchema::fields().to_vec())
}

#[tauri::command]
pub async fn select_file(state: State<'_, Arc<AppState>>, path: String) -> Result<SessionView> {
    let outcome = state.import_session.select_file(path).await;
    respond(&state, "select_file", outcome)
}

#[tauri::command]
pub async fn pick_source_file(state: State<'_, Arc<AppState>>) -> Result<SessionView> {
    let outcome = state.import_session.pick_and_select_file().await;
    respond(&state, "pick_source_file", outcome)
}

#[tauri::command]
pub async fn update_mapping_draft(
    state: State<'_, Arc<AppState>>,
    field_key: String,
    selection: FieldSelection,
) -> Result<SessionView> {
    let outcome = state.import_session.update_draft(&field_key, selection);
    respond(&state, "update_mapping_draft", outcome)
}

/// Without `selections` the draft held by the session is applied.
#[tauri::command]
pub async fn apply_mapping(
    state: State<'_, Arc<AppState>>,
    selections: Option<HashMap<String, FieldSelection>>,
) -> Result<SessionView> {
    let outcome = match selections {
        Some(selections) => state.import_session.apply_mapping(selections).await,
        None => state.import_session.apply_draft().await,
    };
    respond(&state, "apply_mapping", outcome)
}

#[tauri::command]
pub async fn cancel_mapping(state: State<'_, Arc<AppState>>) -> Result<SessionView> {
    let outcome = state.import_session.cancel_mapping();
    respond(&state, "cancel_mapping", outcome)
}

#[tauri::command]
pub async fn merge_duplicates(state: State<'_, Arc<AppState>>) -> Result<SessionView> {
    let outcome = state.import_session.merge_duplicates().await;
    respond(&state, "merge_duplicates", outcome)
}

#[tauri::command]
pub async fn export_file(
    state: State<'_, Arc<AppState>>,
    output_path: String,
) -> Result<SessionView> {
    let outcome = state.import_session.export_to(output_path).await;
    respond(&state, "export_file", outcome)
}

#[tauri::command]
pub async fn pick_export_file(state: State<'_, Arc<AppState>>) -> Result<SessionView> {
    let outcome = state.import_session.pick_and_export().await;
    respond(&state, "pick_export_file", outcome)
}
