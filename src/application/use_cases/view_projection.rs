//! Pure projection of a [`SessionSnapshot`] into what the page paints.

use serde::Serialize;

use crate::application::use_cases::busy::BusySnapshot;
use crate::application::use_cases::import_session::{SessionPhase, SessionSnapshot};
use crate::domain::field_schema::{FieldKey, FieldKind, FieldSchema};
use crate::domain::mapping::MappingDraft;
use crate::domain::status::Severity;

pub const NO_FILE_LABEL: &str = "未选择文件";
pub const EMPTY_TABLE_HINT: &str = "没有数据";

/// Boundary every externally sourced string crosses before reaching the page.
pub trait TextEncoder: Sync {
    fn encode(&self, raw: &str) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlEncoder;

impl TextEncoder for HtmlEncoder {
    fn encode(&self, raw: &str) -> String {
        let mut out = String::with_capacity(raw.len());
        for ch in raw.chars() {
            match ch {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '"' => out.push_str("&quot;"),
                '\'' => out.push_str("&#39;"),
                _ => out.push(ch),
            }
        }
        out
    }
}

static HTML_ENCODER: HtmlEncoder = HtmlEncoder;

#[derive(Debug, Clone, Serialize)]
pub struct CellView {
    pub key: FieldKey,
    pub value: String,
    pub unresolved: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RowView {
    pub ordinal: usize,
    pub cells: Vec<CellView>,
    pub group_class: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableView {
    pub headers: Vec<&'static str>,
    pub rows: Vec<RowView>,
    pub empty_hint: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusView {
    pub text: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, Serialize)]
pub struct MergeButtonView {
    pub visible: bool,
    pub label: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct OperationOption {
    pub value: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnOption {
    pub index: usize,
    pub label: String,
    /// 1-based position within the field's selection, if selected.
    pub selected_order: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MappingFieldView {
    pub key: FieldKey,
    pub label: &'static str,
    pub kind: FieldKind,
    pub operations: Vec<OperationOption>,
    pub columns: Vec<ColumnOption>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MappingPanelView {
    pub fields: Vec<MappingFieldView>,
    pub apply_enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub phase: SessionPhase,
    pub file_label: String,
    pub row_count_label: Option<String>,
    pub table: TableView,
    pub status: Option<StatusView>,
    pub merge_button: MergeButtonView,
    pub select_enabled: bool,
    pub export_enabled: bool,
    pub mapping_panel: Option<MappingPanelView>,
    pub busy: BusySnapshot,
}

pub struct ViewProjection<'a> {
    palette_size: usize,
    encoder: &'a dyn TextEncoder,
}

impl ViewProjection<'static> {
    pub fn new(palette_size: usize) -> Self {
        Self::with_encoder(palette_size, &HTML_ENCODER)
    }
}

impl<'a> ViewProjection<'a> {
    pub fn with_encoder(palette_size: usize, encoder: &'a dyn TextEncoder) -> Self {
        Self {
            palette_size: palette_size.max(1),
            encoder,
        }
    }

    pub fn project(&self, snapshot: &SessionSnapshot) -> SessionView {
        let result = snapshot.result.as_ref();

        let merge_button = MergeButtonView {
            visible: result.is_some_and(|r| r.has_duplicates),
            label: format!(
                "合并重复项 ({}条)",
                result.map(|r| r.duplicate_count).unwrap_or(0)
            ),
            enabled: !snapshot.busy.merge_duplicates,
        };

        SessionView {
            phase: snapshot.phase,
            file_label: snapshot
                .file_path
                .as_deref()
                .map(|path| self.encoder.encode(path))
                .unwrap_or_else(|| NO_FILE_LABEL.to_string()),
            row_count_label: result.map(|r| format!("共 {} 条数据", r.total_rows)),
            table: self.table(snapshot),
            status: snapshot.status.as_ref().map(|status| StatusView {
                text: self.encoder.encode(&status.text),
                severity: status.severity,
            }),
            merge_button,
            select_enabled: !snapshot.busy.select_file,
            export_enabled: result.is_some() && !snapshot.busy.export,
            mapping_panel: snapshot
                .draft
                .as_ref()
                .map(|draft| self.mapping_panel(snapshot, draft)),
            busy: snapshot.busy,
        }
    }

    fn group_class(&self, group_id: usize) -> Option<String> {
        (group_id > 0).then(|| format!("dup-group-{}", (group_id - 1) % self.palette_size))
    }

    fn table(&self, snapshot: &SessionSnapshot) -> TableView {
        let headers = FieldSchema::fields().iter().map(|f| f.label).collect();
        let rows: Vec<RowView> = snapshot
            .result
            .iter()
            .flat_map(|result| result.rows.iter())
            .enumerate()
            .map(|(i, row)| RowView {
                ordinal: i + 1,
                cells: FieldSchema::fields()
                    .iter()
                    .map(|field| CellView {
                        key: field.key,
                        value: self.encoder.encode(row.get(field.key)),
                        unresolved: row.is_unresolved(field.key),
                    })
                    .collect(),
                group_class: self.group_class(row.group_id),
            })
            .collect();

        TableView {
            headers,
            empty_hint: rows.is_empty().then_some(EMPTY_TABLE_HINT),
            rows,
        }
    }

    fn mapping_panel(&self, snapshot: &SessionSnapshot, draft: &MappingDraft) -> MappingPanelView {
        let fields = FieldSchema::fields()
            .iter()
            .map(|field| {
                let selection = draft.get(field.key);
                let current_op = selection
                    .map(|s| s.operation)
                    .unwrap_or_else(|| field.kind.default_operation());
                let picked: &[usize] = selection.map(|s| s.indices.as_slice()).unwrap_or(&[]);

                MappingFieldView {
                    key: field.key,
                    label: field.label,
                    kind: field.kind,
                    operations: field
                        .kind
                        .allowed_operations()
                        .iter()
                        .map(|op| OperationOption {
                            value: op.as_str(),
                            label: op.display_name(),
                            selected: *op == current_op,
                        })
                        .collect(),
                    columns: snapshot
                        .columns
                        .iter()
                        .map(|column| ColumnOption {
                            index: column.index,
                            label: self
                                .encoder
                                .encode(&format!("{} - {}", column.code, column.title)),
                            selected_order: picked
                                .iter()
                                .position(|&i| i == column.index)
                                .map(|p| p + 1),
                        })
                        .collect(),
                }
            })
            .collect();

        MappingPanelView {
            fields,
            apply_enabled: !snapshot.busy.apply_mapping,
        }
    }
}
