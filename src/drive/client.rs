//! Drive API クライアント

use super::auth::Authenticator;
use super::sync::RemoteStore;
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

const DRIVE_FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";
const DRIVE_UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3/files";
const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
/// アップロードするファイルのContent-Type（拡張子によらず固定）
const FILE_MIME_TYPE: &str = "application/pdf";
/// multipart/related の境界文字列
const MULTIPART_BOUNDARY: &str = "score_exporter_boundary";

/// Drive APIクライアント
pub struct DriveClient {
    authenticator: Authenticator,
    http_client: reqwest::Client,
}

impl DriveClient {
    /// 新しいクライアントを作成
    pub fn new(authenticator: Authenticator) -> Self {
        Self {
            authenticator,
            http_client: reqwest::Client::new(),
        }
    }

    /// (名前, 親フォルダ, ゴミ箱以外) で検索して最初の一致のIDを返す
    async fn find_entry(
        &self,
        name: &str,
        parent_id: &str,
        mime_type: Option<&str>,
    ) -> Result<Option<String>> {
        let mut query = format!(
            "name = '{}' and '{}' in parents and trashed = false",
            escape_query_value(name),
            escape_query_value(parent_id)
        );
        if let Some(mime_type) = mime_type {
            query.push_str(&format!(" and mimeType = '{}'", mime_type));
        }

        let token = self.authenticator.access_token().await?;
        let response = self
            .http_client
            .get(DRIVE_FILES_URL)
            .bearer_auth(&token)
            .query(&[
                ("q", query.as_str()),
                ("spaces", "drive"),
                ("fields", "files(id, name)"),
            ])
            .send()
            .await
            .context("Drive APIリクエストに失敗")?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Drive API エラー: {}", error_text);
        }

        let list: FileList = response
            .json()
            .await
            .context("Drive APIレスポンスのパースに失敗")?;

        // 同名エントリが複数ある場合は先頭を正とみなす
        Ok(list.files.into_iter().next().map(|file| file.id))
    }
}

impl RemoteStore for DriveClient {
    async fn find_folder(&self, name: &str, parent_id: &str) -> Result<Option<String>> {
        self.find_entry(name, parent_id, Some(FOLDER_MIME_TYPE)).await
    }

    async fn create_folder(&self, name: &str, parent_id: &str) -> Result<String> {
        let metadata = json!({
            "name": name,
            "mimeType": FOLDER_MIME_TYPE,
            "parents": [parent_id],
        });

        let token = self.authenticator.access_token().await?;
        let response = self
            .http_client
            .post(DRIVE_FILES_URL)
            .bearer_auth(&token)
            .query(&[("fields", "id")])
            .json(&metadata)
            .send()
            .await
            .context("フォルダ作成リクエストに失敗")?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Drive API エラー: {}", error_text);
        }

        let file: FileRef = response
            .json()
            .await
            .context("Drive APIレスポンスのパースに失敗")?;
        debug!("フォルダを作成: {} ({})", name, file.id);
        Ok(file.id)
    }

    async fn find_file(&self, name: &str, parent_id: &str) -> Result<Option<String>> {
        self.find_entry(name, parent_id, None).await
    }

    async fn create_file(&self, name: &str, parent_id: &str, content: Vec<u8>) -> Result<String> {
        let metadata = json!({
            "name": name,
            "parents": [parent_id],
        });
        let body = multipart_body(&metadata, &content)?;

        let token = self.authenticator.access_token().await?;
        let response = self
            .http_client
            .post(DRIVE_UPLOAD_URL)
            .bearer_auth(&token)
            .query(&[("uploadType", "multipart"), ("fields", "id")])
            .header(
                "Content-Type",
                format!("multipart/related; boundary={}", MULTIPART_BOUNDARY),
            )
            .body(body)
            .send()
            .await
            .context("ファイル作成リクエストに失敗")?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Drive API エラー: {}", error_text);
        }

        let file: FileRef = response
            .json()
            .await
            .context("Drive APIレスポンスのパースに失敗")?;
        debug!("ファイルを作成: {} ({})", name, file.id);
        Ok(file.id)
    }

    async fn update_file(&self, file_id: &str, content: Vec<u8>) -> Result<()> {
        let token = self.authenticator.access_token().await?;
        let url = format!("{}/{}", DRIVE_UPLOAD_URL, file_id);
        let response = self
            .http_client
            .patch(&url)
            .bearer_auth(&token)
            .query(&[("uploadType", "media")])
            .header("Content-Type", FILE_MIME_TYPE)
            .body(content)
            .send()
            .await
            .context("ファイル更新リクエストに失敗")?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Drive API エラー: {}", error_text);
        }

        debug!("ファイルを上書き: {}", file_id);
        Ok(())
    }
}

/// メタデータと本体から multipart/related ボディを組み立てる
fn multipart_body(metadata: &serde_json::Value, content: &[u8]) -> Result<Vec<u8>> {
    let metadata_json =
        serde_json::to_string(metadata).context("メタデータのシリアライズに失敗")?;

    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", MULTIPART_BOUNDARY).as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata_json.as_bytes());
    body.extend_from_slice(format!("\r\n--{}\r\n", MULTIPART_BOUNDARY).as_bytes());
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", FILE_MIME_TYPE).as_bytes());
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", MULTIPART_BOUNDARY).as_bytes());
    Ok(body)
}

/// クエリ値内のバックスラッシュとシングルクォートをエスケープ
fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

// Drive API レスポンス構造体

#[derive(Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<FileRef>,
}

#[derive(Deserialize)]
struct FileRef {
    id: String,
}
