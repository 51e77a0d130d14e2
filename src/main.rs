//! スコアエクスポーター - メインエントリポイント

use anyhow::{Context, Result};
use std::path::PathBuf;

fn main() -> Result<()> {
    // ロギング初期化
    tracing_subscriber::fmt::init();

    // 環境変数の読み込み
    dotenvy::dotenv().ok();

    // 引数はスコアファイルのパス1つだけ
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 2 {
        eprintln!("使い方: score_exporter <スコアファイル>");
        std::process::exit(1);
    }
    let score_path = PathBuf::from(&args[1]);

    // レンダリングからアップロードまで逐次実行
    let runtime = tokio::runtime::Runtime::new().context("Tokioランタイムの作成に失敗")?;
    runtime.block_on(score_exporter::export::run(&score_path))
}
