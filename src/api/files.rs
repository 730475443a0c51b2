//! File upload, listing, download and deletion.
//!
//! File bytes are stored by the backend; this module only moves them.

use std::path::Path;

use reqwest::header::CONTENT_DISPOSITION;

use super::client::ApiClient;
use super::error::ApiError;
use super::types::UploadedFile;

/// Multipart field the upload endpoint reads the file from.
const UPLOAD_FIELD: &str = "file";

/// A downloaded file body and the name the server suggested for it.
#[derive(Debug, Clone)]
pub struct Download {
    /// Bare file name from `Content-Disposition`, with any directory part stripped.
    pub file_name: Option<String>,
    pub data: Vec<u8>,
}

/// Upload `data` as `file_name`.
///
/// POST /files/upload/ with multipart form data. Returns the created file metadata.
pub async fn upload_file(
    client: &ApiClient,
    file_name: &str,
    data: Vec<u8>,
) -> Result<UploadedFile, ApiError> {
    let size = data.len();
    let resp = client
        .authenticated_multipart_post("/files/upload/", UPLOAD_FIELD, file_name, data)
        .await?;
    let resp = ApiError::check(resp).await?;

    let uploaded: UploadedFile = resp
        .json()
        .await
        .map_err(|e| ApiError::Decode(format!("upload response: {}", e)))?;

    log::info!(
        "Uploaded {} ({} bytes) as file {}",
        uploaded.original_filename,
        size,
        uploaded.id
    );
    Ok(uploaded)
}

/// Read a local file and upload it under its own file name.
pub async fn upload_path(client: &ApiClient, path: &Path) -> Result<UploadedFile, ApiError> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            ApiError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("not a file path: {}", path.display()),
            ))
        })?
        .to_string();
    let data = tokio::fs::read(path).await?;
    upload_file(client, &file_name, data).await
}

/// GET /files/, newest first.
pub async fn list_files(client: &ApiClient) -> Result<Vec<UploadedFile>, ApiError> {
    let resp = ApiError::check(client.authenticated_get("/files/").await?).await?;
    resp.json()
        .await
        .map_err(|e| ApiError::Decode(format!("file list: {}", e)))
}

/// GET /files/{id}/download/ and collect the body.
pub async fn download_file(client: &ApiClient, id: u64) -> Result<Download, ApiError> {
    let path = format!("/files/{}/download/", id);
    let resp = ApiError::check(client.authenticated_get(&path).await?).await?;

    let file_name = resp
        .headers()
        .get(CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(attachment_filename);

    let data = resp.bytes().await?.to_vec();
    log::info!("Downloaded file {} ({} bytes)", id, data.len());
    Ok(Download { file_name, data })
}

/// DELETE /files/{id}/. The backend removes both the record and the stored bytes.
pub async fn delete_file(client: &ApiClient, id: u64) -> Result<(), ApiError> {
    let path = format!("/files/{}/", id);
    ApiError::check(client.authenticated_delete(&path).await?).await?;
    log::info!("Deleted file {}", id);
    Ok(())
}

/// Extract the filename from a `Content-Disposition: attachment; filename=...` value.
///
/// Only the last path component is kept, so the name can never point outside
/// the directory it is saved into.
fn attachment_filename(header: &str) -> Option<String> {
    let raw = header
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))?
        .trim_matches('"');

    let name = raw.rsplit(['/', '\\']).next()?;
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_filename() {
        assert_eq!(
            attachment_filename("attachment; filename=report.pdf").as_deref(),
            Some("report.pdf")
        );
        assert_eq!(
            attachment_filename(r#"attachment; filename="my notes.txt""#).as_deref(),
            Some("my notes.txt")
        );
        assert_eq!(attachment_filename("attachment"), None);
        assert_eq!(attachment_filename("attachment; filename="), None);
    }

    #[test]
    fn test_attachment_filename_strips_directories() {
        assert_eq!(
            attachment_filename("attachment; filename=../../.bashrc").as_deref(),
            Some(".bashrc")
        );
        assert_eq!(
            attachment_filename("attachment; filename=/etc/cron.d/x").as_deref(),
            Some("x")
        );
        assert_eq!(
            attachment_filename(r#"attachment; filename="..\\..\\boot.ini""#).as_deref(),
            Some("boot.ini")
        );
        assert_eq!(attachment_filename("attachment; filename=.."), None);
        assert_eq!(attachment_filename("attachment; filename=uploads/"), None);
    }
}
