use serde::{Deserialize, Serialize};

/// One entry of a Drive listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mime_type: String,
}

impl RemoteFile {
    /// Provider-native documents (Docs, Sheets, ...) have no binary content
    pub fn is_native(&self) -> bool {
        self.mime_type.starts_with(super::NATIVE_MIME_PREFIX)
    }
}

/// Raw `files.list` response page
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileList {
    #[serde(default)]
    pub files: Vec<RemoteFile>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// First page of the user's files, plus whether the provider had more
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileListing {
    pub files: Vec<RemoteFile>,
    pub has_more: bool,
}

/// What a listing looks like to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingRow {
    File { name: String, id: String },
    NoFiles,
}

impl std::fmt::Display for ListingRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListingRow::File { name, id } => write!(f, "{} ({})", name, id),
            ListingRow::NoFiles => write!(f, "No files found."),
        }
    }
}

impl From<FileList> for FileListing {
    fn from(page: FileList) -> Self {
        FileListing {
            has_more: page
                .next_page_token
                .as_deref()
                .is_some_and(|t| !t.is_empty()),
            files: page.files,
        }
    }
}

impl FileListing {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Display rows; an empty listing yields a single "No files found." row
    pub fn rows(&self) -> Vec<ListingRow> {
        if self.files.is_empty() {
            return vec![ListingRow::NoFiles];
        }
        self.files
            .iter()
            .map(|f| ListingRow::File {
                name: f.name.clone(),
                id: f.id.clone(),
            })
            .collect()
    }
}

/// Response of `files.create`
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedFile {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}
