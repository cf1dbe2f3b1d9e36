use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

use crate::domain::error::{AppError, Result};

/// Session transitions that call out to a collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    SelectFile,
    ApplyMapping,
    MergeDuplicates,
    Export,
}

impl TransitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionKind::SelectFile => "select_file",
            TransitionKind::ApplyMapping => "apply_mapping",
            TransitionKind::MergeDuplicates => "merge_duplicates",
            TransitionKind::Export => "export",
        }
    }
}

/// One flag per transition kind; kinds never block each other.
#[derive(Debug, Default)]
pub struct BusyFlags {
    select_file: AtomicBool,
    apply_mapping: AtomicBool,
    merge_duplicates: AtomicBool,
    export: AtomicBool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BusySnapshot {
    pub select_file: bool,
    pub apply_mapping: bool,
    pub merge_duplicates: bool,
    pub export: bool,
}

impl BusyFlags {
    fn flag(&self, kind: TransitionKind) -> &AtomicBool {
        match kind {
            TransitionKind::SelectFile => &self.select_file,
            TransitionKind::ApplyMapping => &self.apply_mapping,
            TransitionKind::MergeDuplicates => &self.merge_duplicates,
            TransitionKind::Export => &self.export,
        }
    }

    /// Fails with `Busy` while another call of the same kind is outstanding.
    pub fn try_acquire(&self, kind: TransitionKind) -> Result<BusyGuard<'_>> {
        let flag = self.flag(kind);
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| AppError::Busy(format!("{} is already running", kind.as_str())))?;
        Ok(BusyGuard { flag })
    }

    pub fn is_busy(&self, kind: TransitionKind) -> bool {
        self.flag(kind).load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> BusySnapshot {
        BusySnapshot {
            select_file: self.is_busy(TransitionKind::SelectFile),
            apply_mapping: self.is_busy(TransitionKind::ApplyMapping),
            merge_duplicates: self.is_busy(TransitionKind::MergeDuplicates),
            export: self.is_busy(TransitionKind::Export),
        }
    }
}

/// Clears its flag when dropped, whichever way the transition ends.
#[derive(Debug)]
pub struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
