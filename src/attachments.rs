//! Prompt attachments
//!
//! Holds what will be sent along with the user's prompt: at most one input
//! source (the captured selection or the clipboard) plus any number of
//! files. Each source has an indicator with a visibility flag (the source
//! exists), an active flag (its content is attached) and a short preview.
//!
//! Source priority on every refresh: selection, then clipboard, then
//! nothing. The two sources are mutually exclusive.

use crate::error::InputError;
use crate::input::{ClipboardImage, InputState};
use serde::Serialize;
use std::path::{Path, PathBuf};

pub const SELECTION_TEXT_ID: &str = "selection_text";
pub const CLIPBOARD_TEXT_ID: &str = "clipboard_text";
pub const CLIPBOARD_IMAGE_ID: &str = "clipboard_image";

/// Archives and binaries that can not be attached
pub const UNSUPPORTED_EXTENSIONS: &[&str] = &[
    "exe", "dll", "so", "bin", "dat", "iso", "msi", "zip", "rar", "7z", "tar", "gz", "bz2", "dmg",
    "pkg", "deb", "rpm",
];

/// Preview length shown on an indicator
const PREVIEW_CHARS: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Selection,
    Clipboard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentContent {
    Text(String),
    Image(ClipboardImage),
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub id: String,
    pub content: AttachmentContent,
    pub name: String,
    /// Input source this came from; None for files
    pub source: Option<SourceType>,
    /// File size in bytes, when known
    pub size: Option<u64>,
}

impl Attachment {
    fn text(id: &str, text: &str, name: &str, source: SourceType) -> Self {
        Self {
            id: id.to_string(),
            content: AttachmentContent::Text(text.to_string()),
            name: name.to_string(),
            source: Some(source),
            size: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceIndicator {
    pub visible: bool,
    pub active: bool,
    pub preview: Option<String>,
}

fn preview(text: &str) -> String {
    let line = text.lines().next().unwrap_or_default().trim();
    if line.chars().count() > PREVIEW_CHARS {
        format!("{}...", line.chars().take(PREVIEW_CHARS).collect::<String>())
    } else {
        line.to_string()
    }
}

/// Whether a file may be attached, judged by extension
pub fn is_file_supported(path: &Path) -> bool {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => !UNSUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()),
        None => true,
    }
}

#[derive(Debug, Default)]
pub struct AttachmentSet {
    attachments: Vec<Attachment>,
    selection: SourceIndicator,
    clipboard: SourceIndicator,
    input: InputState,
}

impl AttachmentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply freshly detected sources and pick the active one.
    ///
    /// Selection wins over clipboard. File attachments are untouched.
    pub fn reconcile(&mut self, input: InputState) -> Option<SourceType> {
        self.input = input;

        self.selection = SourceIndicator {
            visible: self.input.has_selection(),
            active: false,
            preview: self.input.selection_text.as_deref().map(preview),
        };
        self.clipboard = SourceIndicator {
            visible: self.input.has_clipboard_content(),
            active: false,
            preview: match (&self.input.clipboard_text, &self.input.clipboard_image) {
                (Some(text), _) => Some(preview(text)),
                (None, Some(_)) => Some("Image".to_string()),
                (None, None) => None,
            },
        };

        self.remove_selection_attachment();
        self.remove_clipboard_attachments();

        let active = if self.input.has_selection() {
            Some(SourceType::Selection)
        } else if self.input.has_clipboard_content() {
            Some(SourceType::Clipboard)
        } else {
            None
        };
        if let Some(source) = active {
            self.activate(source);
        }
        self.reorder();
        active
    }

    /// User toggled a source indicator
    pub fn toggle_source(&mut self, source: SourceType, active: bool) {
        if active {
            self.activate(source);
        } else {
            match source {
                SourceType::Selection => {
                    self.selection.active = false;
                    self.remove_selection_attachment();
                }
                SourceType::Clipboard => {
                    self.clipboard.active = false;
                    self.remove_clipboard_attachments();
                }
            }
        }
        self.reorder();
    }

    /// Remove any attachment. Removing the last attachment of a source
    /// deactivates its indicator.
    pub fn remove(&mut self, id: &str) -> Option<Attachment> {
        let pos = self.attachments.iter().position(|a| a.id == id)?;
        let removed = self.attachments.remove(pos);

        match removed.source {
            Some(SourceType::Selection) => self.selection.active = false,
            Some(SourceType::Clipboard) => {
                let remaining = self
                    .attachments
                    .iter()
                    .any(|a| a.source == Some(SourceType::Clipboard));
                if !remaining {
                    self.clipboard.active = false;
                }
            }
            None => {}
        }
        Some(removed)
    }

    /// Attach a file. Archives and binaries are rejected.
    pub fn add_file(&mut self, path: &Path) -> Result<&Attachment, InputError> {
        if !is_file_supported(path) {
            return Err(InputError::UnsupportedAttachment(
                path.display().to_string(),
            ));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let size = std::fs::metadata(path).ok().map(|m| m.len());

        self.attachments.push(Attachment {
            id: format!("file_{}", uuid::Uuid::new_v4()),
            content: AttachmentContent::File(path.to_path_buf()),
            name,
            source: None,
            size,
        });
        tracing::debug!("Attached file {:?}", path);

        let index = self.attachments.len() - 1;
        Ok(&self.attachments[index])
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn indicator(&self, source: SourceType) -> &SourceIndicator {
        match source {
            SourceType::Selection => &self.selection,
            SourceType::Clipboard => &self.clipboard,
        }
    }

    pub fn active_source(&self) -> Option<SourceType> {
        if self.selection.active {
            Some(SourceType::Selection)
        } else if self.clipboard.active {
            Some(SourceType::Clipboard)
        } else {
            None
        }
    }

    /// Drop everything, e.g. after the prompt was sent
    pub fn clear(&mut self) {
        self.attachments.clear();
        self.selection.active = false;
        self.clipboard.active = false;
    }

    fn activate(&mut self, source: SourceType) {
        match source {
            SourceType::Selection => {
                let Some(text) = self.input.selection_text.clone() else {
                    return;
                };
                self.clipboard.active = false;
                self.remove_clipboard_attachments();
                self.remove_selection_attachment();
                self.attachments.push(Attachment::text(
                    SELECTION_TEXT_ID,
                    &text,
                    "Selection",
                    SourceType::Selection,
                ));
                self.selection.active = true;
            }
            SourceType::Clipboard => {
                if !self.input.has_clipboard_content() {
                    return;
                }
                self.selection.active = false;
                self.remove_selection_attachment();
                self.remove_clipboard_attachments();
                if let Some(text) = self.input.clipboard_text.clone() {
                    self.attachments.push(Attachment::text(
                        CLIPBOARD_TEXT_ID,
                        &text,
                        "Clipboard",
                        SourceType::Clipboard,
                    ));
                }
                if let Some(image) = self.input.clipboard_image.clone() {
                    self.attachments.push(Attachment {
                        id: CLIPBOARD_IMAGE_ID.to_string(),
                        content: AttachmentContent::Image(image),
                        name: "Clipboard Image".to_string(),
                        source: Some(SourceType::Clipboard),
                        size: None,
                    });
                }
                self.clipboard.active = true;
            }
        }
    }

    fn remove_selection_attachment(&mut self) {
        self.attachments.retain(|a| a.id != SELECTION_TEXT_ID);
    }

    fn remove_clipboard_attachments(&mut self) {
        self.attachments
            .retain(|a| a.id != CLIPBOARD_TEXT_ID && a.id != CLIPBOARD_IMAGE_ID);
    }

    /// Source attachments first; files keep their relative order
    fn reorder(&mut self) {
        self.attachments.sort_by_key(|a| a.source.is_none());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> ClipboardImage {
        ClipboardImage {
            width: 2,
            height: 1,
            bytes: vec![0; 8],
        }
    }

    fn state(selection: Option<&str>, text: Option<&str>, image: Option<ClipboardImage>) -> InputState {
        InputState {
            selection_text: selection.map(str::to_string),
            clipboard_text: text.map(str::to_string),
            clipboard_image: image,
        }
    }

    fn ids(set: &AttachmentSet) -> Vec<&str> {
        set.attachments().iter().map(|a| a.id.as_str()).collect()
    }

    #[test]
    fn test_selection_has_priority() {
        let mut set = AttachmentSet::new();
        let active = set.reconcile(state(Some("selected"), Some("clip"), None));

        assert_eq!(active, Some(SourceType::Selection));
        assert!(set.indicator(SourceType::Selection).active);
        assert!(!set.indicator(SourceType::Clipboard).active);
        assert!(set.indicator(SourceType::Clipboard).visible);
        assert_eq!(ids(&set), vec![SELECTION_TEXT_ID]);
    }

    #[test]
    fn test_clipboard_when_no_selection() {
        let mut set = AttachmentSet::new();
        let active = set.reconcile(state(None, Some("clip"), Some(image())));

        assert_eq!(active, Some(SourceType::Clipboard));
        assert_eq!(ids(&set), vec![CLIPBOARD_TEXT_ID, CLIPBOARD_IMAGE_ID]);
        assert!(!set.indicator(SourceType::Selection).visible);
    }

    #[test]
    fn test_no_sources() {
        let mut set = AttachmentSet::new();
        assert_eq!(set.reconcile(InputState::default()), None);
        assert!(set.attachments().is_empty());
        assert_eq!(set.active_source(), None);
    }

    #[test]
    fn test_image_only_preview() {
        let mut set = AttachmentSet::new();
        set.reconcile(state(None, None, Some(image())));
        assert_eq!(
            set.indicator(SourceType::Clipboard).preview.as_deref(),
            Some("Image")
        );
    }

    #[test]
    fn test_refresh_replaces_stale_sources() {
        let mut set = AttachmentSet::new();
        set.reconcile(state(Some("old selection"), None, None));
        set.reconcile(InputState::default());
        assert!(set.attachments().is_empty());
        assert!(!set.indicator(SourceType::Selection).visible);
    }

    #[test]
    fn test_toggle_is_mutually_exclusive() {
        let mut set = AttachmentSet::new();
        set.reconcile(state(Some("selected"), Some("clip"), None));

        set.toggle_source(SourceType::Clipboard, true);
        assert_eq!(set.active_source(), Some(SourceType::Clipboard));
        assert!(!set.indicator(SourceType::Selection).active);
        assert_eq!(ids(&set), vec![CLIPBOARD_TEXT_ID]);

        set.toggle_source(SourceType::Selection, true);
        assert_eq!(ids(&set), vec![SELECTION_TEXT_ID]);

        set.toggle_source(SourceType::Selection, false);
        assert!(set.attachments().is_empty());
        assert_eq!(set.active_source(), None);
    }

    #[test]
    fn test_removing_last_clipboard_attachment_deactivates() {
        let mut set = AttachmentSet::new();
        set.reconcile(state(None, Some("clip"), Some(image())));

        set.remove(CLIPBOARD_TEXT_ID);
        assert!(set.indicator(SourceType::Clipboard).active);

        set.remove(CLIPBOARD_IMAGE_ID);
        assert!(!set.indicator(SourceType::Clipboard).active);
        assert!(set.remove(CLIPBOARD_IMAGE_ID).is_none());
    }

    #[test]
    fn test_removing_selection_deactivates() {
        let mut set = AttachmentSet::new();
        set.reconcile(state(Some("selected"), None, None));
        set.remove(SELECTION_TEXT_ID);
        assert_eq!(set.active_source(), None);
    }

    #[test]
    fn test_files_follow_sources() {
        let dir = tempfile::tempdir().unwrap();
        let notes = dir.path().join("notes.md");
        std::fs::write(&notes, "hello").unwrap();

        let mut set = AttachmentSet::new();
        let file = set.add_file(&notes).unwrap();
        assert!(file.id.starts_with("file_"));
        assert_eq!(file.name, "notes.md");
        assert_eq!(file.size, Some(5));

        set.add_file(Path::new("/tmp/report.pdf")).unwrap();
        set.reconcile(state(Some("selected"), None, None));

        let names: Vec<&str> = set.attachments().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Selection", "notes.md", "report.pdf"]);
    }

    #[test]
    fn test_unsupported_files_rejected() {
        let mut set = AttachmentSet::new();
        for name in ["setup.exe", "backup.ZIP", "archive.tar.gz", "lib.so"] {
            assert!(matches!(
                set.add_file(Path::new(name)),
                Err(InputError::UnsupportedAttachment(_))
            ));
        }
        assert!(set.add_file(Path::new("README")).is_ok());
        assert_eq!(set.attachments().len(), 1);
    }

    #[test]
    fn test_preview_is_truncated_to_first_line() {
        let long = "x".repeat(200);
        let mut set = AttachmentSet::new();
        let text = format!("{}\nsecond line", long);
        set.reconcile(state(Some(text.as_str()), None, None));
        let preview = set.indicator(SourceType::Selection).preview.clone().unwrap();
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), PREVIEW_CHARS + 3);
    }
}
