use crate::interfaces::tauri::commands;

pub fn run() {
    tauri::Builder::default()
        .plugin(tauri_plugin_dialog::init())
        .setup(|app| crate::infrastructure::bootstrap::setup(app))
        .invoke_handler(tauri::generate_handler![
            commands::session_view,
            commands::field_schema,
            commands::select_file,
            commands::pick_source_file,
            commands::update_mapping_draft,
            commands::apply_mapping,
            commands::cancel_mapping,
            commands::merge_duplicates,
            commands::export_file,
            commands::pick_export_file,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
