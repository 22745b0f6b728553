//! Upload/edit session state machine.
//!
//! ```text
//! Idle → ValidatingFiles → UploadingFile[0] → (Transcribing[0] | Describing[0])?
//!      → UploadingFile[1] → … → UpdatingQuota → PersistingRecord → Done
//! ```
//!
//! `Error` is reachable from every non-terminal state. `Done` and `Error`
//! are terminal; a failed session is never resumed.

use std::fmt;

use crate::error::{ArchiveError, Result};

/// Coarse phase of a session, used to say where an error happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum UploadPhase {
    Validating,
    Uploading,
    Transcribing,
    Describing,
    UpdatingQuota,
    PersistingRecord,
}

impl fmt::Display for UploadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Validating => "validation",
            Self::Uploading => "upload",
            Self::Transcribing => "transcription",
            Self::Describing => "image analysis",
            Self::UpdatingQuota => "quota update",
            Self::PersistingRecord => "save",
        })
    }
}

/// Where a session currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    ValidatingFiles,
    UploadingFile {
        index: usize,
        total: usize,
        name: String,
    },
    Transcribing {
        index: usize,
        total: usize,
        name: String,
    },
    Describing {
        index: usize,
        total: usize,
        name: String,
    },
    UpdatingQuota,
    PersistingRecord,
    Done,
    Error {
        phase: UploadPhase,
        index: Option<usize>,
        message: String,
    },
}

impl UploadState {
    /// The phase this state belongs to (`None` for idle and terminal states).
    pub fn phase(&self) -> Option<UploadPhase> {
        match self {
            Self::ValidatingFiles => Some(UploadPhase::Validating),
            Self::UploadingFile { .. } => Some(UploadPhase::Uploading),
            Self::Transcribing { .. } => Some(UploadPhase::Transcribing),
            Self::Describing { .. } => Some(UploadPhase::Describing),
            Self::UpdatingQuota => Some(UploadPhase::UpdatingQuota),
            Self::PersistingRecord => Some(UploadPhase::PersistingRecord),
            Self::Idle | Self::Done | Self::Error { .. } => None,
        }
    }

    /// Index of the file being processed, if any.
    pub fn file_index(&self) -> Option<usize> {
        match self {
            Self::UploadingFile { index, .. }
            | Self::Transcribing { index, .. }
            | Self::Describing { index, .. } => Some(*index),
            Self::Error { index, .. } => *index,
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error { .. })
    }

    /// Progress through the batch in `[0, 100]`, for progress bars.
    pub fn percent(&self) -> u8 {
        match self {
            Self::Idle | Self::ValidatingFiles => 0,
            Self::UploadingFile { index, total, .. } => file_percent(*index, *total, 0),
            Self::Transcribing { index, total, .. } | Self::Describing { index, total, .. } => {
                file_percent(*index, *total, 1)
            }
            Self::UpdatingQuota => 80,
            Self::PersistingRecord => 90,
            Self::Done => 100,
            Self::Error { .. } => 0,
        }
    }

    /// A human-readable progress line.
    pub fn message(&self) -> String {
        match self {
            Self::Idle => "Waiting".to_string(),
            Self::ValidatingFiles => "Checking files...".to_string(),
            Self::UploadingFile { index, total, name } => {
                format!("Uploading {}/{}: {name}", index + 1, total)
            }
            Self::Transcribing { name, .. } => format!("Generating transcription for {name}..."),
            Self::Describing { name, .. } => format!("Analyzing image {name}..."),
            Self::UpdatingQuota => "Updating storage usage...".to_string(),
            Self::PersistingRecord => "Saving item...".to_string(),
            Self::Done => "Upload complete!".to_string(),
            Self::Error {
                phase,
                index: Some(i),
                message,
            } => format!("Error during {phase} of file {}: {message}", i + 1),
            Self::Error {
                phase,
                index: None,
                message,
            } => format!("Error during {phase}: {message}"),
        }
    }
}

/// Uploads take the first 75% of the bar; enrichment sits halfway through a file.
fn file_percent(index: usize, total: usize, half_steps: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let step = 75.0 / total as f64;
    (index as f64 * step + half_steps as f64 * step / 2.0).round() as u8
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// Observer for session transitions. Returning `false` asks to cancel; the
/// request is honoured at the next file boundary.
pub type ProgressFn<'a> = &'a dyn Fn(&UploadState) -> bool;

/// One upload/edit session. Enforces legal transitions and notifies the
/// observer on each one.
pub struct UploadSession<'a> {
    state: UploadState,
    progress: Option<ProgressFn<'a>>,
    cancel_requested: bool,
}

impl<'a> UploadSession<'a> {
    pub fn new(progress: Option<ProgressFn<'a>>) -> Self {
        Self {
            state: UploadState::Idle,
            progress,
            cancel_requested: false,
        }
    }

    pub fn state(&self) -> &UploadState {
        &self.state
    }

    /// Move to `next`, notifying the observer.
    ///
    /// Fails if the transition is illegal, or with [`ArchiveError::Cancelled`]
    /// when cancellation was requested and `next` starts a new file.
    pub fn advance(&mut self, next: UploadState) -> Result<()> {
        if !is_legal(&self.state, &next) {
            return Err(ArchiveError::SessionState(format!(
                "cannot go from '{}' to '{}'",
                self.state, next
            )));
        }

        if self.cancel_requested && matches!(next, UploadState::UploadingFile { .. }) {
            let err = ArchiveError::Cancelled {
                phase: UploadPhase::Uploading,
            };
            self.state = UploadState::Error {
                phase: UploadPhase::Uploading,
                index: next.file_index(),
                message: err.to_string(),
            };
            self.notify();
            return Err(err);
        }

        self.state = next;
        if !self.notify() {
            self.cancel_requested = true;
        }
        Ok(())
    }

    /// Record `err` as the terminal state, keeping the current phase and
    /// file index for the progress message.
    pub fn fail(&mut self, err: &ArchiveError) {
        if self.state.is_terminal() {
            return;
        }
        let phase = self.state.phase().unwrap_or(UploadPhase::Validating);
        let index = self.state.file_index();
        self.state = UploadState::Error {
            phase,
            index,
            message: err.to_string(),
        };
        self.notify();
    }

    fn notify(&self) -> bool {
        match self.progress {
            Some(f) => f(&self.state),
            None => true,
        }
    }
}

fn is_legal(from: &UploadState, to: &UploadState) -> bool {
    use UploadState::*;

    match (from, to) {
        (Done | Error { .. }, _) => false,
        (_, Error { .. }) => true,
        (Idle, ValidatingFiles) => true,
        (ValidatingFiles, UploadingFile { index: 0, .. }) => true,
        (ValidatingFiles, PersistingRecord | Done) => true,
        (UploadingFile { index: i, .. }, Transcribing { index: j, .. })
        | (UploadingFile { index: i, .. }, Describing { index: j, .. }) => i == j,
        (
            UploadingFile { index: i, .. }
            | Transcribing { index: i, .. }
            | Describing { index: i, .. },
            UploadingFile { index: j, .. },
        ) => *j == i + 1,
        (UploadingFile { .. } | Transcribing { .. } | Describing { .. }, UpdatingQuota) => true,
        (UpdatingQuota, PersistingRecord | Done) => true,
        (PersistingRecord, Done) => true,
        _ => false,
    }
}
