use crate::config::DriveConfig;
use crate::drive::export::plan_download;
use crate::drive::types::{CreatedFile, FileList, FileListing, RemoteFile};
use crate::{Credential, TransferError};
use reqwest::{Client, Response, StatusCode};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

const LIST_FIELDS: &str = "nextPageToken, files(id, name, mimeType)";
const METADATA_FIELDS: &str = "id, name, mimeType";

/// Thin client over the Drive v3 REST API.
///
/// Every call takes the credential explicitly; obtaining and refreshing it is
/// the caller's business.
#[derive(Clone)]
pub struct DriveClient {
    client: Client,
    // Resumable uploads answer 308 without a Location, which must not be followed
    upload_client: Client,
    config: DriveConfig,
}

impl DriveClient {
    pub fn new(config: DriveConfig) -> Result<Self, TransferError> {
        let user_agent = format!("drive-manager/{}", env!("CARGO_PKG_VERSION"));

        let client = Client::builder().user_agent(&user_agent).build()?;
        let upload_client = Client::builder()
            .user_agent(&user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(DriveClient {
            client,
            upload_client,
            config,
        })
    }

    pub fn config(&self) -> &DriveConfig {
        &self.config
    }

    /// 最初のページのみ取得する
    pub async fn list_files(&self, credential: &Credential) -> Result<FileListing, TransferError> {
        let url = format!("{}/files", self.config.api_base_url);
        let page_size = self.config.page_size.to_string();

        let response = self
            .client
            .get(&url)
            .header("Authorization", credential.bearer())
            .query(&[
                ("pageSize", page_size.as_str()),
                ("fields", LIST_FIELDS),
                ("includeItemsFromAllDrives", "true"),
                ("supportsAllDrives", "true"),
            ])
            .send()
            .await?;

        let response = check_status(response).await?;
        let page: FileList = serde_json::from_str(&response.text().await?)?;
        let listing = FileListing::from(page);

        if listing.has_more {
            tracing::info!(
                "Listing truncated to the first {} files",
                self.config.page_size
            );
        }
        tracing::debug!("Listed {} files", listing.files.len());

        Ok(listing)
    }

    pub async fn get_metadata(
        &self,
        credential: &Credential,
        file_id: &str,
    ) -> Result<RemoteFile, TransferError> {
        let url = format!("{}/files/{}", self.config.api_base_url, file_id);

        let response = self
            .client
            .get(&url)
            .header("Authorization", credential.bearer())
            .query(&[("fields", METADATA_FIELDS), ("supportsAllDrives", "true")])
            .send()
            .await?;

        let response = check_status(response).await?;
        Ok(serde_json::from_str(&response.text().await?)?)
    }

    /// Uploads `path` as a new file in the Drive root and returns its id.
    pub async fn upload_file(
        &self,
        credential: &Credential,
        path: &Path,
    ) -> Result<String, TransferError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| TransferError::Generic {
                message: format!("Not a file path: {}", path.display()),
            })?;

        let mut file = tokio::fs::File::open(path).await?;
        let total = file.metadata().await?.len();
        let mime_type = mime_guess::from_path(path).first_or_octet_stream();

        tracing::info!(
            "Uploading {} ({} bytes, {})",
            path.display(),
            total,
            mime_type
        );

        let session_uri = self
            .start_resumable_session(credential, &name, mime_type.as_ref(), total)
            .await?;

        let chunk_size = self.config.upload_chunk_size.max(1);
        let mut offset: u64 = 0;
        let mut stalled = 0;
        let mut buffer = vec![0u8; chunk_size];

        loop {
            let read = read_chunk(&mut file, &mut buffer).await?;
            let content_range = if read == 0 {
                format!("bytes */{}", total)
            } else {
                format!("bytes {}-{}/{}", offset, offset + read as u64 - 1, total)
            };

            let response = self
                .upload_client
                .put(&session_uri)
                .header("Authorization", credential.bearer())
                .header("Content-Range", content_range)
                .body(buffer[..read].to_vec())
                .send()
                .await?;

            // 308 Resume Incomplete: サーバーが受け取った範囲から続行
            if response.status() == StatusCode::PERMANENT_REDIRECT {
                let confirmed = response
                    .headers()
                    .get("Range")
                    .and_then(|v| v.to_str().ok())
                    .and_then(parse_range_end)
                    .map(|end| end + 1)
                    .unwrap_or(0);

                if confirmed <= offset {
                    stalled += 1;
                    if stalled >= 3 {
                        return Err(TransferError::Generic {
                            message: format!("Upload made no progress past byte {}", offset),
                        });
                    }
                } else {
                    stalled = 0;
                }

                if confirmed != offset + read as u64 {
                    file.seek(std::io::SeekFrom::Start(confirmed)).await?;
                }
                offset = confirmed;

                if total > 0 {
                    tracing::info!("Upload {}%", offset * 100 / total);
                }
                continue;
            }

            let response = check_status(response).await?;
            let created: CreatedFile = serde_json::from_str(&response.text().await?)?;
            tracing::info!("File uploaded: {}", created.id);
            return Ok(created.id);
        }
    }

    async fn start_resumable_session(
        &self,
        credential: &Credential,
        name: &str,
        mime_type: &str,
        total: u64,
    ) -> Result<String, TransferError> {
        let url = format!("{}/files", self.config.upload_base_url);

        let response = self
            .upload_client
            .post(&url)
            .header("Authorization", credential.bearer())
            .header("X-Upload-Content-Type", mime_type)
            .header("X-Upload-Content-Length", total.to_string())
            .query(&[
                ("uploadType", "resumable"),
                ("supportsAllDrives", "true"),
                ("fields", "id, name"),
            ])
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await?;

        let response = check_status(response).await?;
        response
            .headers()
            .get("Location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| TransferError::Generic {
                message: "Upload session response had no Location header".to_string(),
            })
    }

    /// Downloads (or exports) a remote file into `dir` and returns the
    /// written path. The body goes to `<target>.part` first, which is removed
    /// on failure.
    pub async fn download_file(
        &self,
        credential: &Credential,
        file_id: &str,
        dir: &Path,
    ) -> Result<PathBuf, TransferError> {
        let metadata = self.get_metadata(credential, file_id).await?;
        let plan = plan_download(&metadata.name, &metadata.mime_type, dir)?;

        let request = match plan.export {
            Some(format) => {
                tracing::info!("Exporting {} as {}", metadata.name, format.mime_type);
                self.client
                    .get(format!(
                        "{}/files/{}/export",
                        self.config.api_base_url, file_id
                    ))
                    .query(&[("mimeType", format.mime_type)])
            }
            None => self
                .client
                .get(format!("{}/files/{}", self.config.api_base_url, file_id))
                .query(&[("alt", "media"), ("supportsAllDrives", "true")]),
        };

        let response = request
            .header("Authorization", credential.bearer())
            .send()
            .await?;
        let response = check_status(response).await?;

        tokio::fs::create_dir_all(dir).await?;

        // Written next to the target and renamed into place, so a failure
        // never touches a file that already exists under the target name
        let partial = partial_path(&plan.target);
        let written = match write_body(response, &partial).await {
            Ok(()) => tokio::fs::rename(&partial, &plan.target)
                .await
                .map_err(TransferError::from),
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                tracing::debug!("Could not remove partial download: {}", cleanup);
            }
            return Err(e);
        }

        tracing::info!("Downloaded {} to {}", file_id, plan.target.display());
        Ok(plan.target)
    }
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

async fn write_body(mut response: Response, target: &Path) -> Result<(), TransferError> {
    let total = response.content_length();
    let mut file = tokio::fs::File::create(target).await?;
    let mut written: u64 = 0;
    let mut last_percent = None;

    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;

        match total {
            Some(total) if total > 0 => {
                let percent = written * 100 / total;
                if last_percent != Some(percent) {
                    tracing::info!("Download {}%", percent);
                    last_percent = Some(percent);
                }
            }
            _ => tracing::debug!("Downloaded {} bytes", written),
        }
    }

    file.flush().await?;
    Ok(())
}

/// Fills `buffer` as far as the file allows; short only at end of file.
async fn read_chunk(file: &mut tokio::fs::File, buffer: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        let n = file.read(&mut buffer[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// `Range: bytes=0-1048575` -> 1048575
fn parse_range_end(range: &str) -> Option<u64> {
    range
        .trim()
        .strip_prefix("bytes=")?
        .split('-')
        .nth(1)?
        .parse()
        .ok()
}

async fn check_status(response: Response) -> Result<Response, TransferError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or(body);

    tracing::warn!("Drive API returned {}: {}", status.as_u16(), message);
    Err(TransferError::ApiError {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range_end() {
        assert_eq!(parse_range_end("bytes=0-262143"), Some(262143));
        assert_eq!(parse_range_end("bytes=0-"), None);
        assert_eq!(parse_range_end("garbage"), None);
    }

    #[test]
    fn test_partial_path_appends_suffix() {
        assert_eq!(
            partial_path(Path::new("/tmp/out/Budget.xlsx")),
            PathBuf::from("/tmp/out/Budget.xlsx.part")
        );
    }

    #[test]
    fn test_client_creation() {
        let client = DriveClient::new(DriveConfig::default()).unwrap();
        assert_eq!(client.config().page_size, 100);
    }

    #[tokio::test]
    async fn test_read_chunk_fills_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, vec![7u8; 10]).unwrap();

        let mut file = tokio::fs::File::open(&path).await.unwrap();
        let mut buffer = vec![0u8; 4];
        assert_eq!(read_chunk(&mut file, &mut buffer).await.unwrap(), 4);
        assert_eq!(read_chunk(&mut file, &mut buffer).await.unwrap(), 4);
        assert_eq!(read_chunk(&mut file, &mut buffer).await.unwrap(), 2);
        assert_eq!(read_chunk(&mut file, &mut buffer).await.unwrap(), 0);
    }
}
