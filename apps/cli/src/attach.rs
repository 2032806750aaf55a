//! Turning files into attachments.

use acore::{Attachment, WorkspaceConfig};
use anyhow::{Context, Result};
use std::path::Path;

/// Extensions with a dedicated media type.
const MEDIA_TYPES: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("webp", "image/webp"),
    ("heic", "image/heic"),
    ("heif", "image/heif"),
    ("pdf", "application/pdf"),
    ("csv", "text/csv"),
    ("md", "text/markdown"),
    ("txt", "text/plain"),
];

/// Media type for `path`.
///
/// Source files with an extension from `workspace.allowed_extensions` are
/// sent as plain text; anything else is not attachable.
pub fn mime_type(path: &Path, workspace: &WorkspaceConfig) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    if let Some((_, mime)) = MEDIA_TYPES.iter().find(|(known, _)| *known == ext) {
        return Some(mime);
    }
    workspace
        .allowed_extensions
        .iter()
        .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(&ext))
        .then_some("text/plain")
}

/// Read `path` into an attachment.
pub fn attachment(path: &Path, workspace: &WorkspaceConfig) -> Result<Attachment> {
    let mime = mime_type(path, workspace)
        .with_context(|| format!("{} is not an attachable file type", path.display()))?;
    let data = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let attachment = Attachment::new(mime, data);
    Ok(match path.file_name() {
        Some(name) => attachment.named(name.to_string_lossy()),
        None => attachment,
    })
}
