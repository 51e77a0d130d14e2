//! スコアエクスポーター - MuseScore譜面のパート別書き出しとGoogle Driveアップロードツール
//!
//! # 機能
//! - MuseScoreを外部コマンドとして起動しパート別PDFを生成
//! - 楽器名によるセクション（Strings, Woodwinds など）への自動振り分け
//! - 総譜PDF・プロジェクトファイル・音源の一括書き出し
//! - ExportsフォルダのGoogle Driveへのミラーリング（作成・上書きのみ、削除なし）

pub mod classifier;
pub mod config;
pub mod drive;
pub mod export;
pub mod mscore;

pub use classifier::{Section, SectionClassifier};
