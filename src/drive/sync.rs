//! リモート同期モジュール - ローカルツリーのDriveミラーリング

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// リモートツリーストアの操作（同期ロジックとDrive実装の境界）
///
/// IDはストア側が割り当てる不透明な文字列。検索はゴミ箱を除外し、
/// 同名が複数ある場合は最初の一致を返す。
#[allow(async_fn_in_trait)]
pub trait RemoteStore {
    /// 親フォルダ直下の同名フォルダを検索
    async fn find_folder(&self, name: &str, parent_id: &str) -> Result<Option<String>>;
    /// 親フォルダ直下にフォルダを作成してIDを返す
    async fn create_folder(&self, name: &str, parent_id: &str) -> Result<String>;
    /// 親フォルダ直下の同名ファイルを検索
    async fn find_file(&self, name: &str, parent_id: &str) -> Result<Option<String>>;
    /// 親フォルダ直下にファイルを作成してIDを返す
    async fn create_file(&self, name: &str, parent_id: &str, content: Vec<u8>) -> Result<String>;
    /// 既存ファイルの内容をIDで上書き（親子関係は変更しない）
    async fn update_file(&self, file_id: &str, content: Vec<u8>) -> Result<()>;
}

/// 同期1回分の集計
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncStats {
    pub folders_created: usize,
    pub files_created: usize,
    pub files_updated: usize,
}

/// ローカルディレクトリをリモートフォルダ配下へミラーリングする
///
/// フォルダは1実行につき1回だけ解決する。作成と上書きのみの一方向
/// 同期で、ローカルに無いリモート側のエントリには触れない。最初の
/// リモート呼び出し失敗で全体を中断する（チェックポイントなし）。
pub async fn sync_directory<S: RemoteStore>(
    store: &S,
    root_folder_id: &str,
    local_root: &Path,
) -> Result<SyncStats> {
    let mut stats = SyncStats::default();

    // (ローカルディレクトリ, 対応するリモートフォルダID) の深さ優先スタック
    let mut pending: Vec<(PathBuf, String)> =
        vec![(local_root.to_path_buf(), root_folder_id.to_string())];

    while let Some((dir, folder_id)) = pending.pop() {
        let entries = std::fs::read_dir(&dir)
            .with_context(|| format!("ディレクトリの読み取りに失敗: {:?}", dir))?;

        for entry in entries {
            let entry =
                entry.with_context(|| format!("ディレクトリの読み取りに失敗: {:?}", dir))?;
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();

            if path.is_dir() {
                let child_id = resolve_folder(store, &name, &folder_id, &mut stats).await?;
                pending.push((path, child_id));
            } else {
                upload_file(store, &path, &name, &folder_id, &mut stats).await?;
            }
        }
    }

    Ok(stats)
}

/// 同名リモートフォルダを検索し、無ければ作成してIDを返す
async fn resolve_folder<S: RemoteStore>(
    store: &S,
    name: &str,
    parent_id: &str,
    stats: &mut SyncStats,
) -> Result<String> {
    if let Some(id) = store.find_folder(name, parent_id).await? {
        return Ok(id);
    }
    let id = store.create_folder(name, parent_id).await?;
    stats.folders_created += 1;
    Ok(id)
}

/// ファイルを新規作成または上書きアップロードする
async fn upload_file<S: RemoteStore>(
    store: &S,
    path: &Path,
    name: &str,
    folder_id: &str,
    stats: &mut SyncStats,
) -> Result<()> {
    let content =
        std::fs::read(path).with_context(|| format!("ファイルの読み込みに失敗: {:?}", path))?;

    if let Some(file_id) = store.find_file(name, folder_id).await? {
        debug!("上書き: {}", name);
        store.update_file(&file_id, content).await?;
        stats.files_updated += 1;
    } else {
        debug!("新規アップロード: {}", name);
        store.create_file(name, folder_id, content).await?;
        stats.files_created += 1;
    }

    Ok(())
}
