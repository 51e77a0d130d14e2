//! プロジェクト設定モジュール - スコア横の config.yaml の読み込み

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// 設定ファイル名（スコアファイルと同じディレクトリに置く）
const CONFIG_FILE_NAME: &str = "config.yaml";

/// プロジェクト単位の設定
///
/// ファイルが無い場合は全項目未設定として扱う。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectConfig {
    /// 出力ファイル名の接頭辞（未設定ならスコアファイル名から導出）
    pub title: Option<String>,
    /// アップロード先DriveフォルダID（未設定・空文字列なら同期しない）
    pub drive: Option<String>,
}

impl ProjectConfig {
    /// スコアファイルと同じディレクトリから設定を読み込む
    pub fn load(score_path: &Path) -> Result<Self> {
        let config_path = score_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(&config_path)
            .with_context(|| format!("設定ファイルの読み込みに失敗: {:?}", config_path))?;

        // 空ファイルは未設定扱い
        if text.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(&text)
            .with_context(|| format!("設定ファイルのパースに失敗: {:?}", config_path))
    }

    /// タイトルを解決（設定値 > スコアファイル名の拡張子抜き）
    pub fn resolve_title(&self, score_path: &Path) -> String {
        if let Some(ref title) = self.title {
            return title.clone();
        }
        score_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("score")
            .to_string()
    }

    /// 同期先のDriveフォルダID（空文字列は未設定扱い）
    pub fn drive_folder_id(&self) -> Option<&str> {
        self.drive.as_deref().filter(|id| !id.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn missing_config_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let score = dir.path().join("piece.mscz");
        let config = ProjectConfig::load(&score).unwrap();
        assert!(config.title.is_none());
        assert!(config.drive.is_none());
    }

    #[test]
    fn config_file_is_loaded_from_score_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.yaml"),
            "title: My Piece\ndrive: folder-123\n",
        )
        .unwrap();
        let score = dir.path().join("piece.mscz");
        let config = ProjectConfig::load(&score).unwrap();
        assert_eq!(config.title.as_deref(), Some("My Piece"));
        assert_eq!(config.drive_folder_id(), Some("folder-123"));
    }

    #[test]
    fn title_falls_back_to_file_stem() {
        let config = ProjectConfig::default();
        assert_eq!(
            config.resolve_title(&PathBuf::from("/tmp/Foo Bar.mscz")),
            "Foo Bar"
        );
    }

    #[test]
    fn configured_title_overrides_file_stem() {
        let config = ProjectConfig {
            title: Some("My Piece".to_string()),
            drive: None,
        };
        assert_eq!(config.resolve_title(&PathBuf::from("piece.mscz")), "My Piece");
    }

    #[test]
    fn empty_drive_id_disables_sync() {
        let config = ProjectConfig {
            title: None,
            drive: Some(String::new()),
        };
        assert_eq!(config.drive_folder_id(), None);
    }
}
