//! The import/convert/merge/export state machine.
//!
//! Every user action is a named transition on [`ImportSession`]. Session data
//! sits behind a mutex that is never held across a collaborator call: inputs
//! are snapshotted before the call and the outcome is applied in a single
//! critical section afterwards, so no caller ever sees a half-updated session
//! and a failed call leaves file path, columns, mapping and result untouched.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::application::use_cases::busy::{BusyFlags, BusySnapshot, TransitionKind};
use crate::application::use_cases::view_projection::{SessionView, ViewProjection};
use crate::domain::app_config::AppConfig;
use crate::domain::column::ColumnDescriptor;
use crate::domain::error::{AppError, Result};
use crate::domain::field_schema::{FieldKey, FieldSchema};
use crate::domain::mapping::{FieldSelection, Mapping, MappingBuilder, MappingDraft};
use crate::domain::order::{ConversionResult, ResultOrigin};
use crate::domain::status::{StatusChannel, StatusMessage};
use crate::infrastructure::backend::SpreadsheetBackend;
use crate::infrastructure::dialog::FileDialog;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Empty,
    ColumnsLoaded,
    /// A validated mapping is being converted.
    Mapped,
    Converted,
    Merged,
}

#[derive(Debug, Default)]
struct SessionState {
    file_path: Option<String>,
    columns: Vec<ColumnDescriptor>,
    mapping: Option<Mapping>,
    result: Option<ConversionResult>,
    draft: Option<MappingDraft>,
    pending_mapping: Option<Mapping>,
    status: StatusChannel,
    /// Bumped on every successful file selection.
    file_epoch: u64,
    /// Bumped whenever `result` is replaced or cleared.
    result_generation: u64,
}

impl SessionState {
    fn phase(&self) -> SessionPhase {
        if self.pending_mapping.is_some() {
            return SessionPhase::Mapped;
        }
        match &self.result {
            Some(result) if result.origin == ResultOrigin::Merged => SessionPhase::Merged,
            Some(_) => SessionPhase::Converted,
            None if self.columns.is_empty() => SessionPhase::Empty,
            None => SessionPhase::ColumnsLoaded,
        }
    }

    fn replace_result(&mut self, result: Option<ConversionResult>) {
        self.result = result;
        self.result_generation += 1;
    }
}

/// Point-in-time copy of the session, the only input of the view projection.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub file_path: Option<String>,
    pub columns: Vec<ColumnDescriptor>,
    pub mapping: Option<Mapping>,
    pub result: Option<ConversionResult>,
    pub draft: Option<MappingDraft>,
    pub status: Option<StatusMessage>,
    pub busy: BusySnapshot,
}

pub struct ImportSession {
    backend: Arc<dyn SpreadsheetBackend + Send + Sync>,
    dialog: Arc<dyn FileDialog + Send + Sync>,
    config: AppConfig,
    state: Mutex<SessionState>,
    busy: BusyFlags,
}

const READ_FAILED: &str = "读取失败";
const CONVERT_FAILED: &str = "转换失败";
const MERGE_FAILED: &str = "合并失败";
const EXPORT_FAILED: &str = "导出失败";
const MAPPING_INVALID: &str = "映射无效";

impl ImportSession {
    pub fn new(
        backend: Arc<dyn SpreadsheetBackend + Send + Sync>,
        dialog: Arc<dyn FileDialog + Send + Sync>,
        config: AppConfig,
    ) -> Self {
        Self {
            backend,
            dialog,
            config,
            state: Mutex::new(SessionState::default()),
            busy: BusyFlags::default(),
        }
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Turns an error into the single status line. Busy and cancelled calls
    /// leave the current status alone.
    fn surface(state: &mut SessionState, action: &str, err: &AppError) {
        match err {
            AppError::UserCancelled => debug!(action, "Transition cancelled by user"),
            AppError::Busy(_) => debug!(action, error = %err, "Transition rejected"),
            _ => {
                warn!(action, error = %err, "Transition failed");
                state.status.error(format!("{}: {}", action, err.message()));
            }
        }
    }

    fn reject<T>(&self, action: &str, err: AppError) -> Result<T> {
        let mut state = self.state();
        Self::surface(&mut state, action, &err);
        Err(err)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state();
        SessionSnapshot {
            phase: state.phase(),
            file_path: state.file_path.clone(),
            columns: state.columns.clone(),
            mapping: state.mapping.clone(),
            result: state.result.clone(),
            draft: state.draft.clone(),
            status: state.status.current().cloned(),
            busy: self.busy.snapshot(),
        }
    }

    pub fn view(&self) -> SessionView {
        ViewProjection::new(self.config.duplicate_palette_size).project(&self.snapshot())
    }

    pub fn phase(&self) -> SessionPhase {
        self.state().phase()
    }

    /// Loads the column descriptors of `path`; on success the previous
    /// mapping and result are discarded and the mapping panel opens.
    pub async fn select_file(&self, path: String) -> Result<()> {
        let _guard = match self.busy.try_acquire(TransitionKind::SelectFile) {
            Ok(guard) => guard,
            Err(err) => return self.reject(READ_FAILED, err),
        };
        self.load_columns(path).await
    }

    /// Asks the host for a source file, then loads it like
    /// [`Self::select_file`]. The busy flag covers the dialog too.
    pub async fn pick_and_select_file(&self) -> Result<()> {
        let _guard = match self.busy.try_acquire(TransitionKind::SelectFile) {
            Ok(guard) => guard,
            Err(err) => return self.reject(READ_FAILED, err),
        };
        match self.dialog.select_open_path(&self.config.open_filters).await {
            Ok(Some(path)) => self.load_columns(path).await,
            Ok(None) => self.reject(READ_FAILED, AppError::UserCancelled),
            Err(err) => self.reject(READ_FAILED, err),
        }
    }

    async fn load_columns(&self, path: String) -> Result<()> {
        self.state().status.loading("正在读取列信息...");
        info!(path = %path, "Reading source columns");

        let outcome = match self.backend.read_columns(&path).await {
            Ok(columns) if columns.is_empty() => {
                Err(AppError::IoError("文件中没有可用的表头列".to_string()))
            }
            other => other,
        };

        let mut state = self.state();
        match outcome {
            Ok(columns) => {
                info!(path = %path, columns = columns.len(), "Source columns loaded");
                state.file_path = Some(path);
                state.columns = columns;
                state.mapping = None;
                state.replace_result(None);
                state.draft = Some(MappingDraft::new());
                state.file_epoch += 1;
                state.status.success("请配置列映射");
                Ok(())
            }
            Err(err) => {
                Self::surface(&mut state, READ_FAILED, &err);
                Err(err)
            }
        }
    }

    /// Records one field of the mapping panel while it is being composed.
    pub fn update_draft(&self, field_key: &str, selection: FieldSelection) -> Result<()> {
        let mut state = self.state();
        let validated = field_key.parse::<FieldKey>().and_then(|key| {
            let field = FieldSchema::get(key);
            if !field.kind.allows(selection.operation) {
                return Err(AppError::InvalidMapping(format!(
                    "operation '{}' is not allowed for field '{}'",
                    selection.operation.as_str(),
                    key
                )));
            }
            if let Some(bad) = selection.indices.iter().find(|&&i| i >= state.columns.len()) {
                return Err(AppError::InvalidMapping(format!("unknown column {}", bad)));
            }
            Ok(key)
        });

        let key = match validated {
            Ok(key) => key,
            Err(err) => {
                Self::surface(&mut state, MAPPING_INVALID, &err);
                return Err(err);
            }
        };

        match state.draft.as_mut() {
            Some(draft) => {
                draft.set(key, selection);
                Ok(())
            }
            None => {
                let err = AppError::InvalidState("映射面板未打开".to_string());
                Self::surface(&mut state, MAPPING_INVALID, &err);
                Err(err)
            }
        }
    }

    /// Validates `selections` into a mapping and converts the current file.
    pub async fn apply_mapping(&self, selections: HashMap<String, FieldSelection>) -> Result<()> {
        let _guard = match self.busy.try_acquire(TransitionKind::ApplyMapping) {
            Ok(guard) => guard,
            Err(err) => return self.reject(CONVERT_FAILED, err),
        };

        let (path, mapping, epoch) = {
            let mut state = self.state();
            let prepared = match (&state.file_path, state.columns.is_empty()) {
                (Some(path), false) => MappingBuilder::new(&state.columns)
                    .build(&selections)
                    .map(|mapping| (path.clone(), mapping)),
                _ => Err(AppError::InvalidState("请先选择文件".to_string())),
            };
            let (path, mapping) = match prepared {
                Ok(prepared) => prepared,
                Err(err) => {
                    Self::surface(&mut state, CONVERT_FAILED, &err);
                    return Err(err);
                }
            };
            state.pending_mapping = Some(mapping.clone());
            state.status.loading("正在转换文件...");
            (path, mapping, state.file_epoch)
        };

        info!(path = %path, fields = mapping.len(), "Converting with mapping");
        let outcome = self.backend.convert_with_mapping(&path, &mapping).await;

        let mut state = self.state();
        state.pending_mapping = None;

        if state.file_epoch != epoch {
            warn!(path = %path, "Discarding conversion of a file that is no longer selected");
            return Err(AppError::InvalidState(
                "conversion finished after another file was selected".to_string(),
            ));
        }

        match outcome {
            Ok(result) => {
                let total = result.total_rows;
                state.mapping = Some(mapping);
                state.replace_result(Some(result));
                state.draft = None;
                state
                    .status
                    .success(format!("文件读取成功，共转换 {} 条数据", total));
                Ok(())
            }
            Err(err) => {
                Self::surface(&mut state, CONVERT_FAILED, &err);
                Err(err)
            }
        }
    }

    /// Applies the selections currently held in the draft.
    pub async fn apply_draft(&self) -> Result<()> {
        let selections = self.state().draft.as_ref().map(MappingDraft::to_selections);
        match selections {
            Some(selections) => self.apply_mapping(selections).await,
            None => self.reject(
                CONVERT_FAILED,
                AppError::InvalidState("映射面板未打开".to_string()),
            ),
        }
    }

    /// Closes the mapping panel without converting; loaded columns stay.
    pub fn cancel_mapping(&self) -> Result<()> {
        let mut state = self.state();
        if state.draft.take().is_none() {
            return Err(AppError::InvalidState("映射面板未打开".to_string()));
        }
        state.status.clear();
        debug!("Mapping draft discarded");
        Ok(())
    }

    /// Merges the duplicate groups of the current result. Rejected before any
    /// collaborator call unless the result reports duplicates.
    pub async fn merge_duplicates(&self) -> Result<()> {
        let _guard = match self.busy.try_acquire(TransitionKind::MergeDuplicates) {
            Ok(guard) => guard,
            Err(err) => return self.reject(MERGE_FAILED, err),
        };

        let (rows, generation) = {
            let mut state = self.state();
            let rows = match &state.result {
                Some(result) if result.has_duplicates => Ok(result.rows.clone()),
                Some(_) => Err(AppError::InvalidState("当前没有重复项".to_string())),
                None => Err(AppError::InvalidState(
                    "没有可合并的数据，请先选择并转换文件".to_string(),
                )),
            };
            match rows {
                Ok(rows) => {
                    state.status.loading("正在合并重复项...");
                    (rows, state.result_generation)
                }
                Err(err) => {
                    Self::surface(&mut state, MERGE_FAILED, &err);
                    return Err(err);
                }
            }
        };

        info!(rows = rows.len(), "Merging duplicates");
        let outcome = self.backend.merge_duplicates(&rows).await;

        let mut state = self.state();
        if state.result_generation != generation {
            warn!("Discarding merge of a result that has since been replaced");
            return Err(AppError::InvalidState(
                "merge finished after the result was replaced".to_string(),
            ));
        }

        match outcome {
            Ok(mut result) => {
                result.origin = ResultOrigin::Merged;
                let total = result.total_rows;
                state.replace_result(Some(result));
                state
                    .status
                    .success(format!("合并完成，当前共 {} 条数据", total));
                Ok(())
            }
            Err(err) => {
                Self::surface(&mut state, MERGE_FAILED, &err);
                Err(err)
            }
        }
    }

    /// Writes the current result to `output_path`. No session data changes.
    pub async fn export_to(&self, output_path: String) -> Result<String> {
        let _guard = match self.busy.try_acquire(TransitionKind::Export) {
            Ok(guard) => guard,
            Err(err) => return self.reject(EXPORT_FAILED, err),
        };
        self.write_result(output_path).await
    }

    /// Asks the host for a destination, then exports like
    /// [`Self::export_to`]. The busy flag covers the dialog too.
    pub async fn pick_and_export(&self) -> Result<String> {
        let _guard = match self.busy.try_acquire(TransitionKind::Export) {
            Ok(guard) => guard,
            Err(err) => return self.reject(EXPORT_FAILED, err),
        };
        if self.state().result.is_none() {
            return self.reject(EXPORT_FAILED, no_result_to_export());
        }

        let picked = self
            .dialog
            .select_save_path(&self.config.default_export_name, &self.config.save_filters)
            .await;
        match picked {
            Ok(Some(path)) => self.write_result(path).await,
            Ok(None) => self.reject(EXPORT_FAILED, AppError::UserCancelled),
            Err(err) => self.reject(EXPORT_FAILED, err),
        }
    }

    async fn write_result(&self, output_path: String) -> Result<String> {
        let rows = {
            let mut state = self.state();
            let current = state.result.as_ref().map(|result| result.rows.clone());
            match current {
                Some(rows) => {
                    state.status.loading("正在导出...");
                    rows
                }
                None => {
                    let err = no_result_to_export();
                    Self::surface(&mut state, EXPORT_FAILED, &err);
                    return Err(err);
                }
            }
        };

        info!(output_path = %output_path, rows = rows.len(), "Exporting result");
        let outcome = self.backend.export_file(&rows, &output_path).await;

        let mut state = self.state();
        match outcome {
            Ok(message) => {
                state.status.success(message.clone());
                Ok(message)
            }
            Err(err) => {
                Self::surface(&mut state, EXPORT_FAILED, &err);
                Err(err)
            }
        }
    }

}

fn no_result_to_export() -> AppError {
    AppError::InvalidState("没有可导出的数据，请先选择并转换文件".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::app_config::FileFilter;
    use crate::domain::field_schema::Operation;
    use crate::domain::order::OrderRow;
    use crate::domain::status::Severity;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    #[derive(Default)]
    struct FakeBackend {
        columns: Mutex<VecDeque<Result<Vec<ColumnDescriptor>>>>,
        conversions: Mutex<VecDeque<Result<ConversionResult>>>,
        merges: Mutex<VecDeque<Result<ConversionResult>>>,
        exports: Mutex<VecDeque<Result<String>>>,
        read_calls: AtomicUsize,
        convert_calls: AtomicUsize,
        merge_calls: AtomicUsize,
        export_calls: AtomicUsize,
        convert_gate: Option<Arc<Notify>>,
        exported_rows: Mutex<Vec<OrderRow>>,
    }

    fn pop<T>(queue: &Mutex<VecDeque<Result<T>>>, what: &str) -> Result<T> {
        queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected {} call", what))
    }

    #[async_trait]
    impl SpreadsheetBackend for FakeBackend {
        async fn read_columns(&self, _path: &str) -> Result<Vec<ColumnDescriptor>> {
            self.read_calls.fetch_add(1, Ordering::SeqCst);
            pop(&self.columns, "read_columns")
        }

        async fn convert_with_mapping(
            &self,
            _path: &str,
            _mapping: &Mapping,
        ) -> Result<ConversionResult> {
            self.convert_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.convert_gate {
                gate.notified().await;
            }
            pop(&self.conversions, "convert_with_mapping")
        }

        async fn merge_duplicates(&self, _rows: &[OrderRow]) -> Result<ConversionResult> {
            self.merge_calls.fetch_add(1, Ordering::SeqCst);
            pop(&self.merges, "merge_duplicates")
        }

        async fn export_file(&self, rows: &[OrderRow], _output_path: &str) -> Result<String> {
            self.export_calls.fetch_add(1, Ordering::SeqCst);
            *self.exported_rows.lock().unwrap() = rows.to_vec();
            pop(&self.exports, "export_file")
        }
    }

    #[derive(Default)]
    struct FakeDialog {
        open: Option<String>,
        save: Option<String>,
        open_calls: AtomicUsize,
        save_calls: AtomicUsize,
        gate: Option<Arc<Notify>>,
    }

    impl FakeDialog {
        async fn wait_for_user(&self) {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
        }
    }

    #[async_trait]
    impl FileDialog for FakeDialog {
        async fn select_open_path(&self, filters: &[FileFilter]) -> Result<Option<String>> {
            assert!(!filters.is_empty());
            self.open_calls.fetch_add(1, Ordering::SeqCst);
            self.wait_for_user().await;
            Ok(self.open.clone())
        }

        async fn select_save_path(
            &self,
            default_name: &str,
            _filters: &[FileFilter],
        ) -> Result<Option<String>> {
            assert_eq!(default_name, "output.xlsx");
            self.save_calls.fetch_add(1, Ordering::SeqCst);
            self.wait_for_user().await;
            Ok(self.save.clone())
        }
    }

    fn columns(n: usize) -> Vec<ColumnDescriptor> {
        (0..n)
            .map(|i| ColumnDescriptor::new(i, format!("列{}", i)))
            .collect()
    }

    fn rows(groups: &[usize]) -> Vec<OrderRow> {
        groups
            .iter()
            .enumerate()
            .map(|(i, &group_id)| OrderRow {
                recipient_name: format!("客户{}", i),
                group_id,
                ..OrderRow::default()
            })
            .collect()
    }

    fn converted(groups: &[usize]) -> ConversionResult {
        ConversionResult::new(rows(groups), ResultOrigin::Converted)
    }

    fn merged(groups: &[usize]) -> ConversionResult {
        ConversionResult::new(rows(groups), ResultOrigin::Merged)
    }

    fn name_selection() -> HashMap<String, FieldSelection> {
        HashMap::from([(
            "recipient_name".to_string(),
            FieldSelection::new(vec![0], Operation::Concat),
        )])
    }

    fn session(backend: FakeBackend) -> (Arc<ImportSession>, Arc<FakeBackend>) {
        session_with_dialog(backend, FakeDialog::default()).0
    }

    #[allow(clippy::type_complexity)]
    fn session_with_dialog(
        backend: FakeBackend,
        dialog: FakeDialog,
    ) -> ((Arc<ImportSession>, Arc<FakeBackend>), Arc<FakeDialog>) {
        let backend = Arc::new(backend);
        let dialog = Arc::new(dialog);
        let session = Arc::new(ImportSession::new(
            backend.clone(),
            dialog.clone(),
            AppConfig::default(),
        ));
        ((session, backend), dialog)
    }

    fn queue<T>(items: Vec<Result<T>>) -> Mutex<VecDeque<Result<T>>> {
        Mutex::new(items.into_iter().collect())
    }

    #[tokio::test]
    async fn test_end_to_end_convert_and_merge() {
        let (session, backend) = session(FakeBackend {
            columns: queue(vec![Ok(columns(3))]),
            conversions: queue(vec![Ok(converted(&[1, 1, 0, 0, 0]))]),
            merges: queue(vec![Ok(merged(&[0, 0, 0, 0]))]),
            ..Default::default()
        });

        assert_eq!(session.phase(), SessionPhase::Empty);
        session.select_file("orders.xlsx".to_string()).await.unwrap();
        assert_eq!(session.phase(), SessionPhase::ColumnsLoaded);
        assert!(session.view().mapping_panel.is_some());

        session.apply_mapping(name_selection()).await.unwrap();
        assert_eq!(session.phase(), SessionPhase::Converted);

        let view = session.view();
        assert_eq!(view.table.rows.len(), 5);
        assert!(view.merge_button.visible);
        assert!(view.merge_button.label.contains("2条"));
        assert!(view.export_enabled);
        assert!(view.mapping_panel.is_none());

        session.merge_duplicates().await.unwrap();
        assert_eq!(session.phase(), SessionPhase::Merged);
        let view = session.view();
        assert!(!view.merge_button.visible);
        assert_eq!(view.row_count_label.as_deref(), Some("共 4 条数据"));
        assert_eq!(backend.merge_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_select_failure_keeps_previous_file_and_columns() {
        let (session, _) = session(FakeBackend {
            columns: queue(vec![
                Ok(columns(2)),
                Err(AppError::IoError("无法打开文件".to_string())),
            ]),
            ..Default::default()
        });

        session.select_file("first.xlsx".to_string()).await.unwrap();
        let err = session
            .select_file("broken.xlsx".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::IoError(_)));

        let snapshot = session.snapshot();
        assert_eq!(snapshot.file_path.as_deref(), Some("first.xlsx"));
        assert_eq!(snapshot.columns.len(), 2);
        let status = snapshot.status.unwrap();
        assert_eq!(status.severity, Severity::Error);
        assert!(status.text.starts_with("读取失败"));
    }

    #[tokio::test]
    async fn test_header_less_file_is_rejected() {
        let (session, _) = session(FakeBackend {
            columns: queue(vec![Ok(Vec::new())]),
            ..Default::default()
        });
        let err = session.select_file("empty.csv".to_string()).await.unwrap_err();
        assert!(matches!(err, AppError::IoError(_)));
        assert_eq!(session.phase(), SessionPhase::Empty);
        assert!(session.snapshot().file_path.is_none());
    }

    #[tokio::test]
    async fn test_new_file_discards_mapping_and_result() {
        let (session, _) = session(FakeBackend {
            columns: queue(vec![Ok(columns(3)), Ok(columns(4))]),
            conversions: queue(vec![Ok(converted(&[0, 0]))]),
            ..Default::default()
        });
        session.select_file("a.xlsx".to_string()).await.unwrap();
        session.apply_mapping(name_selection()).await.unwrap();
        session.select_file("b.xlsx".to_string()).await.unwrap();

        let snapshot = session.snapshot();
        assert_eq!(snapshot.phase, SessionPhase::ColumnsLoaded);
        assert!(snapshot.mapping.is_none());
        assert!(snapshot.result.is_none());
        assert_eq!(snapshot.columns.len(), 4);
    }

    #[tokio::test]
    async fn test_apply_failure_rolls_back() {
        let (session, backend) = session(FakeBackend {
            columns: queue(vec![Ok(columns(3))]),
            conversions: queue(vec![
                Ok(converted(&[0, 0, 0])),
                Err(AppError::ConversionError("bad data".to_string())),
            ]),
            ..Default::default()
        });
        session.select_file("orders.xlsx".to_string()).await.unwrap();
        session.apply_mapping(name_selection()).await.unwrap();
        let before = session.snapshot();

        let mut other = name_selection();
        other.insert(
            "product_name".to_string(),
            FieldSelection::new(vec![2], Operation::Concat),
        );
        let err = session.apply_mapping(other).await.unwrap_err();
        assert!(matches!(err, AppError::ConversionError(_)));
        assert_eq!(backend.convert_calls.load(Ordering::SeqCst), 2);

        let after = session.snapshot();
        assert_eq!(after.columns, before.columns);
        assert_eq!(after.mapping, before.mapping);
        assert_eq!(after.result, before.result);
        assert_eq!(after.phase, SessionPhase::Converted);
        assert_eq!(after.status.unwrap().text, "转换失败: bad data");
    }

    #[tokio::test]
    async fn test_invalid_mapping_never_reaches_backend() {
        let (session, backend) = session(FakeBackend {
            columns: queue(vec![Ok(columns(2))]),
            ..Default::default()
        });
        session.select_file("orders.xlsx".to_string()).await.unwrap();

        let selections = HashMap::from([(
            "quantity".to_string(),
            FieldSelection::new(vec![0, 1], Operation::Concat),
        )]);
        let err = session.apply_mapping(selections).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidMapping(_)));
        assert_eq!(backend.convert_calls.load(Ordering::SeqCst), 0);
        assert_eq!(session.phase(), SessionPhase::ColumnsLoaded);
        assert!(session.snapshot().draft.is_some());
    }

    #[tokio::test]
    async fn test_apply_requires_columns() {
        let (session, backend) = session(FakeBackend::default());
        let err = session.apply_mapping(name_selection()).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
        assert_eq!(backend.convert_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_merge_without_duplicates_is_rejected() {
        let (session, backend) = session(FakeBackend {
            columns: queue(vec![Ok(columns(1))]),
            conversions: queue(vec![Ok(converted(&[0, 0]))]),
            ..Default::default()
        });

        let err = session.merge_duplicates().await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        session.select_file("orders.xlsx".to_string()).await.unwrap();
        session.apply_mapping(name_selection()).await.unwrap();
        let err = session.merge_duplicates().await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
        assert_eq!(backend.merge_calls.load(Ordering::SeqCst), 0);
        assert_eq!(session.phase(), SessionPhase::Converted);
    }

    #[tokio::test]
    async fn test_merge_can_repeat_while_duplicates_remain() {
        let (session, backend) = session(FakeBackend {
            columns: queue(vec![Ok(columns(1))]),
            conversions: queue(vec![Ok(converted(&[1, 1, 2, 2]))]),
            merges: queue(vec![Ok(merged(&[1, 1, 0])), Ok(merged(&[0, 0]))]),
            ..Default::default()
        });
        session.select_file("orders.xlsx".to_string()).await.unwrap();
        session.apply_mapping(name_selection()).await.unwrap();

        session.merge_duplicates().await.unwrap();
        assert!(session.view().merge_button.visible);
        session.merge_duplicates().await.unwrap();
        assert!(!session.view().merge_button.visible);
        assert!(session.merge_duplicates().await.is_err());
        assert_eq!(backend.merge_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_merge_failure_keeps_result() {
        let (session, _) = session(FakeBackend {
            columns: queue(vec![Ok(columns(1))]),
            conversions: queue(vec![Ok(converted(&[1, 1]))]),
            merges: queue(vec![Err(AppError::MergeError("boom".to_string()))]),
            ..Default::default()
        });
        session.select_file("orders.xlsx".to_string()).await.unwrap();
        session.apply_mapping(name_selection()).await.unwrap();
        assert!(session.merge_duplicates().await.is_err());

        let snapshot = session.snapshot();
        assert_eq!(snapshot.phase, SessionPhase::Converted);
        assert!(snapshot.result.unwrap().has_duplicates);
        assert_eq!(snapshot.status.unwrap().text, "合并失败: boom");
    }

    #[tokio::test]
    async fn test_export_without_result_is_rejected() {
        let (session, backend) = session(FakeBackend::default());
        let err = session
            .export_to("out.xlsx".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
        assert_eq!(backend.export_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_export_passes_current_rows_and_reports_message() {
        let (session, backend) = session(FakeBackend {
            columns: queue(vec![Ok(columns(1))]),
            conversions: queue(vec![Ok(converted(&[0, 0, 0]))]),
            exports: queue(vec![Ok("成功导出 3 条数据".to_string())]),
            ..Default::default()
        });
        session.select_file("orders.xlsx".to_string()).await.unwrap();
        session.apply_mapping(name_selection()).await.unwrap();
        let before = session.snapshot();

        let message = session.export_to("out.xlsx".to_string()).await.unwrap();
        assert_eq!(message, "成功导出 3 条数据");
        assert_eq!(backend.exported_rows.lock().unwrap().len(), 3);

        let after = session.snapshot();
        assert_eq!(after.result, before.result);
        assert_eq!(after.phase, SessionPhase::Converted);
        let status = after.status.unwrap();
        assert_eq!(status.severity, Severity::Success);
        assert_eq!(status.text, "成功导出 3 条数据");
    }

    #[tokio::test]
    async fn test_cancel_mapping_keeps_columns() {
        let (session, _) = session(FakeBackend {
            columns: queue(vec![Ok(columns(3))]),
            ..Default::default()
        });
        assert!(session.cancel_mapping().is_err());

        session.select_file("orders.xlsx".to_string()).await.unwrap();
        session
            .update_draft(
                "recipient_name",
                FieldSelection::new(vec![2, 0], Operation::Concat),
            )
            .unwrap();
        session.cancel_mapping().unwrap();

        let snapshot = session.snapshot();
        assert!(snapshot.draft.is_none());
        assert!(snapshot.status.is_none());
        assert_eq!(snapshot.columns.len(), 3);
        assert_eq!(snapshot.phase, SessionPhase::ColumnsLoaded);
        assert!(session.cancel_mapping().is_err());
    }

    #[tokio::test]
    async fn test_update_draft_validates_and_apply_draft_uses_it() {
        let (session, backend) = session(FakeBackend {
            columns: queue(vec![Ok(columns(3))]),
            conversions: queue(vec![Ok(converted(&[0]))]),
            ..Default::default()
        });
        session.select_file("orders.xlsx".to_string()).await.unwrap();

        assert!(matches!(
            session.update_draft("quantity", FieldSelection::new(vec![0], Operation::Concat)),
            Err(AppError::InvalidMapping(_))
        ));
        assert!(matches!(
            session.update_draft("remarks", FieldSelection::new(vec![9], Operation::Concat)),
            Err(AppError::InvalidMapping(_))
        ));

        session
            .update_draft(
                "recipient_name",
                FieldSelection::new(vec![1], Operation::Concat),
            )
            .unwrap();
        session.apply_draft().await.unwrap();

        assert_eq!(backend.convert_calls.load(Ordering::SeqCst), 1);
        let mapping = session.snapshot().mapping.unwrap();
        assert_eq!(
            mapping.get(FieldKey::RecipientName).unwrap().source_indices,
            vec![1]
        );
    }

    #[tokio::test]
    async fn test_concurrent_apply_is_rejected_while_one_is_running() {
        let gate = Arc::new(Notify::new());
        let (session, backend) = session(FakeBackend {
            columns: queue(vec![Ok(columns(1))]),
            conversions: queue(vec![Ok(converted(&[0]))]),
            convert_gate: Some(gate.clone()),
            ..Default::default()
        });
        session.select_file("orders.xlsx".to_string()).await.unwrap();

        let running = {
            let session = session.clone();
            tokio::spawn(async move { session.apply_mapping(name_selection()).await })
        };
        while session.phase() != SessionPhase::Mapped {
            tokio::task::yield_now().await;
        }
        assert!(session.snapshot().busy.apply_mapping);

        let err = session.apply_mapping(name_selection()).await.unwrap_err();
        assert!(matches!(err, AppError::Busy(_)));
        // The loading status of the running call is not replaced.
        assert_eq!(
            session.snapshot().status.unwrap().severity,
            Severity::Loading
        );

        gate.notify_one();
        running.await.unwrap().unwrap();
        assert_eq!(backend.convert_calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.phase(), SessionPhase::Converted);
        assert!(!session.snapshot().busy.apply_mapping);
    }

    #[tokio::test]
    async fn test_conversion_for_replaced_file_is_discarded() {
        let gate = Arc::new(Notify::new());
        let (session, _) = session(FakeBackend {
            columns: queue(vec![Ok(columns(1)), Ok(columns(5))]),
            conversions: queue(vec![Ok(converted(&[0, 0]))]),
            convert_gate: Some(gate.clone()),
            ..Default::default()
        });
        session.select_file("a.xlsx".to_string()).await.unwrap();

        let running = {
            let session = session.clone();
            tokio::spawn(async move { session.apply_mapping(name_selection()).await })
        };
        while session.phase() != SessionPhase::Mapped {
            tokio::task::yield_now().await;
        }

        session.select_file("b.xlsx".to_string()).await.unwrap();
        gate.notify_one();
        let err = running.await.unwrap().unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        let snapshot = session.snapshot();
        assert_eq!(snapshot.file_path.as_deref(), Some("b.xlsx"));
        assert_eq!(snapshot.columns.len(), 5);
        assert!(snapshot.result.is_none());
        assert_eq!(snapshot.phase, SessionPhase::ColumnsLoaded);
    }

    #[tokio::test]
    async fn test_dialog_cancel_is_silent() {
        let ((session, backend), dialog) = session_with_dialog(
            FakeBackend {
                columns: queue(vec![Ok(columns(1))]),
                conversions: queue(vec![Ok(converted(&[0]))]),
                ..Default::default()
            },
            FakeDialog::default(),
        );

        let err = session.pick_and_select_file().await.unwrap_err();
        assert!(err.is_cancellation());
        assert!(session.snapshot().status.is_none());
        assert_eq!(backend.read_calls.load(Ordering::SeqCst), 0);

        // Export asks for a destination only once a result exists.
        assert!(session.pick_and_export().await.is_err());
        assert_eq!(dialog.save_calls.load(Ordering::SeqCst), 0);

        session.select_file("orders.xlsx".to_string()).await.unwrap();
        session.apply_mapping(name_selection()).await.unwrap();
        let before = session.snapshot().status;
        let err = session.pick_and_export().await.unwrap_err();
        assert!(err.is_cancellation());
        assert_eq!(dialog.save_calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.snapshot().status, before);
        assert_eq!(backend.export_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dialog_selection_drives_transitions() {
        let ((session, backend), dialog) = session_with_dialog(
            FakeBackend {
                columns: queue(vec![Ok(columns(2))]),
                conversions: queue(vec![Ok(converted(&[0]))]),
                exports: queue(vec![Ok("成功导出 1 条数据".to_string())]),
                ..Default::default()
            },
            FakeDialog {
                open: Some("picked.xlsx".to_string()),
                save: Some("saved.xlsx".to_string()),
                ..Default::default()
            },
        );

        session.pick_and_select_file().await.unwrap();
        assert_eq!(dialog.open_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            session.snapshot().file_path.as_deref(),
            Some("picked.xlsx")
        );

        session.apply_mapping(name_selection()).await.unwrap();
        let message = session.pick_and_export().await.unwrap();
        assert_eq!(message, "成功导出 1 条数据");
        assert_eq!(backend.export_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_open_dialog_is_shown_once_while_select_is_running() {
        let gate = Arc::new(Notify::new());
        let ((session, backend), dialog) = session_with_dialog(
            FakeBackend {
                columns: queue(vec![Ok(columns(2))]),
                ..Default::default()
            },
            FakeDialog {
                open: Some("picked.xlsx".to_string()),
                gate: Some(gate.clone()),
                ..Default::default()
            },
        );

        let running = {
            let session = session.clone();
            tokio::spawn(async move { session.pick_and_select_file().await })
        };
        while dialog.open_calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        assert!(session.snapshot().busy.select_file);

        let err = session.pick_and_select_file().await.unwrap_err();
        assert!(matches!(err, AppError::Busy(_)));
        assert_eq!(dialog.open_calls.load(Ordering::SeqCst), 1);

        gate.notify_one();
        running.await.unwrap().unwrap();
        assert_eq!(backend.read_calls.load(Ordering::SeqCst), 1);
        assert!(!session.snapshot().busy.select_file);
        assert_eq!(
            session.snapshot().file_path.as_deref(),
            Some("picked.xlsx")
        );
    }

    #[tokio::test]
    async fn test_save_dialog_is_shown_once_while_export_is_running() {
        let gate = Arc::new(Notify::new());
        let ((session, backend), dialog) = session_with_dialog(
            FakeBackend {
                columns: queue(vec![Ok(columns(1))]),
                conversions: queue(vec![Ok(converted(&[0, 0]))]),
                exports: queue(vec![Ok("成功导出 2 条数据".to_string())]),
                ..Default::default()
            },
            FakeDialog {
                save: Some("saved.xlsx".to_string()),
                gate: Some(gate.clone()),
                ..Default::default()
            },
        );
        session.select_file("orders.xlsx".to_string()).await.unwrap();
        session.apply_mapping(name_selection()).await.unwrap();

        let running = {
            let session = session.clone();
            tokio::spawn(async move { session.pick_and_export().await })
        };
        while dialog.save_calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        let err = session.pick_and_export().await.unwrap_err();
        assert!(matches!(err, AppError::Busy(_)));
        assert_eq!(dialog.save_calls.load(Ordering::SeqCst), 1);

        gate.notify_one();
        assert_eq!(running.await.unwrap().unwrap(), "成功导出 2 条数据");
        assert_eq!(backend.export_calls.load(Ordering::SeqCst), 1);
    }
}
