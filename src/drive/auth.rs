//! Google Drive 認証処理 - インストール型OAuthフローとトークンキャッシュ

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::info;

/// Driveフルアクセススコープ
const SCOPE: &str = "https://www.googleapis.com/auth/drive";
/// クライアント認証情報ファイル（DRIVE_CREDENTIALS_FILE で上書き可）
const CREDENTIALS_FILE: &str = "drive_credentials.json";
/// トークンキャッシュファイル（DRIVE_TOKEN_FILE で上書き可）
const TOKEN_FILE: &str = "token.json";
/// 失効判定の余裕（秒）
const EXPIRY_MARGIN_SECS: i64 = 60;

/// クライアント認証情報ファイルの外側
#[derive(Debug, Deserialize)]
struct CredentialsFile {
    installed: InstalledCredentials,
}

/// インストール型アプリのクライアント認証情報
#[derive(Debug, Deserialize)]
pub struct InstalledCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub auth_uri: String,
    pub token_uri: String,
}

/// キャッシュ済みトークン（実行をまたいで保持する唯一の状態）
#[derive(Debug, Serialize, Deserialize)]
struct StoredToken {
    access_token: String,
    refresh_token: Option<String>,
    /// 失効時刻（Unix秒）
    expires_at: i64,
}

/// トークンエンドポイントのレスポンス
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    refresh_token: Option<String>,
}

/// キャッシュ済みトークンが使えない理由
#[derive(Debug, Error)]
enum TokenCacheError {
    #[error("トークンキャッシュが使用できません")]
    Unavailable,
    #[error("トークンが失効しています")]
    Expired { refresh_token: Option<String> },
}

/// Drive API呼び出しを認可するクレデンシャルプロバイダ
///
/// トークンはローカルファイルへキャッシュし、失効時はリフレッシュ、
/// リフレッシュできなければ対話認可へフォールバックする。
pub struct Authenticator {
    credentials: InstalledCredentials,
    token_path: PathBuf,
    http_client: reqwest::Client,
}

impl Authenticator {
    /// クライアント認証情報ファイルを読み込んで作成
    pub fn new() -> Result<Self> {
        let credentials_path = std::env::var("DRIVE_CREDENTIALS_FILE")
            .unwrap_or_else(|_| CREDENTIALS_FILE.to_string());
        let text = std::fs::read_to_string(&credentials_path)
            .with_context(|| format!("クライアント認証情報の読み込みに失敗: {}", credentials_path))?;
        let file: CredentialsFile =
            serde_json::from_str(&text).context("クライアント認証情報のパースに失敗")?;

        let token_path =
            std::env::var("DRIVE_TOKEN_FILE").unwrap_or_else(|_| TOKEN_FILE.to_string());

        Ok(Self {
            credentials: file.installed,
            token_path: PathBuf::from(token_path),
            http_client: reqwest::Client::new(),
        })
    }

    /// 有効なアクセストークンを取得（キャッシュ > リフレッシュ > 対話認可）
    pub async fn access_token(&self) -> Result<String> {
        match self.cached_token() {
            Ok(token) => return Ok(token.access_token),
            Err(TokenCacheError::Expired {
                refresh_token: Some(refresh),
            }) => match self.refresh(&refresh).await {
                Ok(token) => return Ok(token.access_token),
                Err(error) => info!("トークンの再発行に失敗、再認可します: {:#}", error),
            },
            Err(_) => {}
        }

        let token = self.authorize_interactive().await?;
        Ok(token.access_token)
    }

    /// キャッシュ済みトークンを読み出し、有効期限を確認する
    fn cached_token(&self) -> Result<StoredToken, TokenCacheError> {
        let text =
            std::fs::read_to_string(&self.token_path).map_err(|_| TokenCacheError::Unavailable)?;
        let token: StoredToken =
            serde_json::from_str(&text).map_err(|_| TokenCacheError::Unavailable)?;

        if token.expires_at > Utc::now().timestamp() + EXPIRY_MARGIN_SECS {
            Ok(token)
        } else {
            Err(TokenCacheError::Expired {
                refresh_token: token.refresh_token,
            })
        }
    }

    /// リフレッシュトークンでアクセストークンを再発行する
    async fn refresh(&self, refresh_token: &str) -> Result<StoredToken> {
        let response = self
            .http_client
            .post(&self.credentials.token_uri)
            .form(&[
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .context("トークンリクエストに失敗")?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("トークンの再発行に失敗: {}", error_text);
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .context("トークンレスポンスのパースに失敗")?;

        // 再発行レスポンスにはリフレッシュトークンが含まれないことがある
        self.store_token(token_response, Some(refresh_token.to_string()))
    }

    /// ブラウザ経由の対話認可を実行してトークンを保存する
    async fn authorize_interactive(&self) -> Result<StoredToken> {
        // ループバックの空きポートで認可コードを受け取る
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("ループバックポートの確保に失敗")?;
        let port = listener
            .local_addr()
            .context("ループバックポートの確保に失敗")?
            .port();
        let redirect_uri = format!("http://127.0.0.1:{}", port);

        let auth_url = reqwest::Url::parse_with_params(
            &self.credentials.auth_uri,
            &[
                ("response_type", "code"),
                ("client_id", self.credentials.client_id.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("scope", SCOPE),
                ("access_type", "offline"),
            ],
        )
        .context("認可URLの組み立てに失敗")?;

        info!("ブラウザで認可ページを開きます: {}", auth_url);
        if open::that(auth_url.as_str()).is_err() {
            info!("ブラウザを開けませんでした。上記URLを手動で開いてください");
        }

        // コールバックを1件だけ受け付ける
        let (mut stream, _) = listener
            .accept()
            .await
            .context("認可コールバックの受信に失敗")?;
        let mut buffer = vec![0u8; 4096];
        let read = stream
            .read(&mut buffer)
            .await
            .context("認可コールバックの読み取りに失敗")?;
        let request = String::from_utf8_lossy(&buffer[..read]);
        let code = extract_auth_code(&request).context("認可コードが見つかりません")?;

        // ブラウザへ完了ページを返す（失敗しても認可は続行できる）
        let body = "<html><body>認可が完了しました。このタブは閉じて構いません。</body></html>";
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        );
        let _ = stream.write_all(response.as_bytes()).await;

        // 認可コードをトークンへ交換する
        let response = self
            .http_client
            .post(&self.credentials.token_uri)
            .form(&[
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("code", code.as_str()),
                ("grant_type", "authorization_code"),
                ("redirect_uri", redirect_uri.as_str()),
            ])
            .send()
            .await
            .context("トークンリクエストに失敗")?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("認可コードの交換に失敗: {}", error_text);
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .context("トークンレスポンスのパースに失敗")?;

        self.store_token(token_response, None)
    }

    /// トークンをキャッシュファイルへ書き出す
    fn store_token(
        &self,
        response: TokenResponse,
        fallback_refresh: Option<String>,
    ) -> Result<StoredToken> {
        let token = StoredToken {
            access_token: response.access_token,
            refresh_token: response.refresh_token.or(fallback_refresh),
            expires_at: Utc::now().timestamp() + response.expires_in,
        };

        let json =
            serde_json::to_string_pretty(&token).context("トークンのシリアライズに失敗")?;
        std::fs::write(&self.token_path, json)
            .with_context(|| format!("トークンの保存に失敗: {:?}", self.token_path))?;

        Ok(token)
    }
}

/// コールバックリクエストの1行目から認可コードを取り出す
fn extract_auth_code(request: &str) -> Option<String> {
    let line = request.lines().next()?;
    let path = line.split_whitespace().nth(1)?;
    let url = reqwest::Url::parse(&format!("http://127.0.0.1{}", path)).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "code")
        .map(|(_, value)| value.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authenticator_with_token_path(token_path: PathBuf) -> Authenticator {
        Authenticator {
            credentials: InstalledCredentials {
                client_id: "client-id".to_string(),
                client_secret: "client-secret".to_string(),
                auth_uri: "https://accounts.google.com/o/oauth2/auth".to_string(),
                token_uri: "https://oauth2.googleapis.com/token".to_string(),
            },
            token_path,
            http_client: reqwest::Client::new(),
        }
    }

    #[test]
    fn extracts_auth_code_from_callback_request() {
        let request = "GET /?code=4%2Fabc-def&scope=drive HTTP/1.1\r\nHost: 127.0.0.1\r\n\r\n";
        assert_eq!(extract_auth_code(request).as_deref(), Some("4/abc-def"));
    }

    #[test]
    fn callback_without_code_yields_none() {
        let request = "GET /?error=access_denied HTTP/1.1\r\n\r\n";
        assert_eq!(extract_auth_code(request), None);
    }

    #[test]
    fn valid_cached_token_is_returned() {
        let dir = tempfile::tempdir().unwrap();
        let token_path = dir.path().join("token.json");
        let token = StoredToken {
            access_token: "cached".to_string(),
            refresh_token: None,
            expires_at: Utc::now().timestamp() + 3600,
        };
        std::fs::write(&token_path, serde_json::to_string(&token).unwrap()).unwrap();

        let authenticator = authenticator_with_token_path(token_path);
        let cached = authenticator.cached_token().unwrap();
        assert_eq!(cached.access_token, "cached");
    }

    #[test]
    fn expired_token_reports_refresh_token() {
        let dir = tempfile::tempdir().unwrap();
        let token_path = dir.path().join("token.json");
        let token = StoredToken {
            access_token: "stale".to_string(),
            refresh_token: Some("refresh".to_string()),
            expires_at: Utc::now().timestamp() - 10,
        };
        std::fs::write(&token_path, serde_json::to_string(&token).unwrap()).unwrap();

        let authenticator = authenticator_with_token_path(token_path);
        match authenticator.cached_token() {
            Err(TokenCacheError::Expired { refresh_token }) => {
                assert_eq!(refresh_token.as_deref(), Some("refresh"));
            }
            other => panic!("想定外の結果: {:?}", other),
        }
    }

    #[test]
    fn missing_cache_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let authenticator = authenticator_with_token_path(dir.path().join("token.json"));
        assert!(matches!(
            authenticator.cached_token(),
            Err(TokenCacheError::Unavailable)
        ));
    }

    #[test]
    fn token_nearing_expiry_counts_as_expired() {
        let dir = tempfile::tempdir().unwrap();
        let token_path = dir.path().join("token.json");
        let token = StoredToken {
            access_token: "stale".to_string(),
            refresh_token: None,
            expires_at: Utc::now().timestamp() + EXPIRY_MARGIN_SECS / 2,
        };
        std::fs::write(&token_path, serde_json::to_string(&token).unwrap()).unwrap();

        let authenticator = authenticator_with_token_path(token_path);
        assert!(matches!(
            authenticator.cached_token(),
            Err(TokenCacheError::Expired { .. })
        ));
    }
}
