//! エクスポート処理モジュール - Exportsツリーの構築とDriveへのアップロード

use crate::classifier::SectionClassifier;
use crate::config::ProjectConfig;
use crate::drive::{Authenticator, DriveClient, sync_directory};
use crate::mscore::{self, RenderedPart};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// 出力先ディレクトリ名
const EXPORTS_DIR_NAME: &str = "Exports";

/// スコアファイル1つ分のエクスポートを実行する
pub async fn run(score_path: &Path) -> Result<()> {
    let config = ProjectConfig::load(score_path)?;
    let title = config.resolve_title(score_path);

    info!("パート譜を書き出し中: {:?}", score_path);
    let parts = mscore::export_parts(score_path)?;

    let exports_dir = rebuild_exports_dir(score_path)?;

    let classifier = SectionClassifier::new();
    write_parts(&parts, &exports_dir, &title, &classifier)?;

    // 総譜PDF・プロジェクトファイル・音源を書き出す
    info!("スコアを書き出し中...");
    for extension in ["pdf", "mscz", "mp3"] {
        let output_path = exports_dir.join(format!("{}.{}", title, extension));
        mscore::export_to(score_path, &output_path)?;
    }

    // 設定にDriveフォルダIDがあればミラーリング
    if let Some(folder_id) = config.drive_folder_id() {
        info!("Google Driveへアップロード中...");
        let authenticator = Authenticator::new()?;
        let client = DriveClient::new(authenticator);
        let stats = sync_directory(&client, folder_id, &exports_dir).await?;
        info!(
            "アップロード完了: フォルダ作成 {} / ファイル作成 {} / 上書き {}",
            stats.folders_created, stats.files_created, stats.files_updated
        );
    }

    Ok(())
}

/// Exportsディレクトリを作り直す（前回の内容は破棄）
fn rebuild_exports_dir(score_path: &Path) -> Result<PathBuf> {
    let exports_dir = score_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(EXPORTS_DIR_NAME);

    if exports_dir.exists() {
        std::fs::remove_dir_all(&exports_dir)
            .with_context(|| format!("前回のExportsの削除に失敗: {:?}", exports_dir))?;
    }
    std::fs::create_dir_all(&exports_dir)
        .with_context(|| format!("Exportsの作成に失敗: {:?}", exports_dir))?;

    Ok(exports_dir)
}

/// パート譜をセクション別フォルダへ書き込む
fn write_parts(
    parts: &[RenderedPart],
    exports_dir: &Path,
    title: &str,
    classifier: &SectionClassifier,
) -> Result<()> {
    for part in parts {
        let section = classifier.classify(&part.name);
        let section_dir = exports_dir.join(section.as_str());
        std::fs::create_dir_all(&section_dir)
            .with_context(|| format!("セクションフォルダの作成に失敗: {:?}", section_dir))?;

        let filename = format!("{}-{}.pdf", title, sanitize_part_name(&part.name));
        let file_path = section_dir.join(filename);
        std::fs::write(&file_path, &part.pdf)
            .with_context(|| format!("パート譜の書き込みに失敗: {:?}", file_path))?;
    }

    Ok(())
}

/// パート名から半角スペースと括弧を取り除く
fn sanitize_part_name(part: &str) -> String {
    part.chars().filter(|c| !matches!(c, ' ' | '(' | ')')).collect()
}
