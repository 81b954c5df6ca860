use crate::errors::UnsupportedExportError;
use std::path::{Path, PathBuf};

/// Office format a native document is exported as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportFormat {
    pub mime_type: &'static str,
    pub extension: &'static str,
}

const EXPORT_FORMATS: &[(&str, ExportFormat)] = &[
    (
        "application/vnd.google-apps.document",
        ExportFormat {
            mime_type: "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            extension: ".docx",
        },
    ),
    (
        "application/vnd.google-apps.spreadsheet",
        ExportFormat {
            mime_type: "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            extension: ".xlsx",
        },
    ),
    (
        "application/vnd.google-apps.presentation",
        ExportFormat {
            mime_type: "application/vnd.openxmlformats-officedocument.presentationml.presentation",
            extension: ".pptx",
        },
    ),
];

/// `Ok(None)` for ordinary files, the export format for supported native
/// types, an error for every other native type.
pub fn resolve_export(mime_type: &str) -> Result<Option<ExportFormat>, UnsupportedExportError> {
    if !mime_type.starts_with(super::NATIVE_MIME_PREFIX) {
        return Ok(None);
    }

    EXPORT_FORMATS
        .iter()
        .find(|(native, _)| *native == mime_type)
        .map(|(_, format)| Some(*format))
        .ok_or_else(|| UnsupportedExportError {
            mime_type: mime_type.to_string(),
        })
}

/// How a remote file lands on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadPlan {
    pub target: PathBuf,
    pub export: Option<ExportFormat>,
}

/// Decides the local path and export format for a remote file.
pub fn plan_download(
    name: &str,
    mime_type: &str,
    dir: &Path,
) -> Result<DownloadPlan, UnsupportedExportError> {
    let export = resolve_export(mime_type)?;

    let mut file_name = sanitize_file_name(name);
    if let Some(format) = export {
        file_name.push_str(format.extension);
    }

    Ok(DownloadPlan {
        target: dir.join(file_name),
        export,
    })
}

// Remote names may contain path separators, which must not escape `dir`
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();

    match cleaned.trim() {
        "" | "." | ".." => "untitled".to_string(),
        _ => cleaned,
    }
}
