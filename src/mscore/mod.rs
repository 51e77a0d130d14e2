//! MuseScore連携モジュール - 外部レンダラーの起動と出力の取り込み

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Deserialize;
use std::path::Path;
use std::process::Command;

/// レンダラーコマンド名を上書きする環境変数
const MSCORE_COMMAND_ENV: &str = "MSCORE_COMMAND";
/// 既定のレンダラーコマンド名
const DEFAULT_MSCORE_COMMAND: &str = "mscore";

/// レンダリング済みパート譜
#[derive(Debug, Clone)]
pub struct RenderedPart {
    /// パート名（例: "Violin 1"）
    pub name: String,
    /// デコード済みPDFバイト列
    pub pdf: Vec<u8>,
}

/// `--score-parts-pdf` が標準出力へ書くJSONペイロード
#[derive(Debug, Deserialize)]
struct PartsOutput {
    /// パート名の配列
    parts: Vec<String>,
    /// パート名と同順のBase64エンコード済みPDF
    #[serde(rename = "partsBin")]
    parts_bin: Vec<String>,
}

/// レンダラーコマンド名を取得
fn mscore_command() -> String {
    std::env::var(MSCORE_COMMAND_ENV).unwrap_or_else(|_| DEFAULT_MSCORE_COMMAND.to_string())
}

/// 全パートのPDFをレンダラーから取得
pub fn export_parts(score_path: &Path) -> Result<Vec<RenderedPart>> {
    let command = mscore_command();
    let output = Command::new(&command)
        .arg(score_path)
        .arg("--score-parts-pdf")
        .output()
        .with_context(|| format!("レンダラーの実行に失敗: {}", command))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("パート譜の書き出しに失敗: {}", stderr);
    }

    let payload: PartsOutput =
        serde_json::from_slice(&output.stdout).context("レンダラー出力のパースに失敗")?;
    decode_parts(payload)
}

/// パート名とBase64 PDFを突き合わせてデコードする
///
/// parts と partsBin は位置で対応する。長さが食い違う場合は余剰分を捨てる。
fn decode_parts(payload: PartsOutput) -> Result<Vec<RenderedPart>> {
    payload
        .parts
        .into_iter()
        .zip(payload.parts_bin)
        .map(|(name, encoded)| {
            let pdf = STANDARD
                .decode(encoded.as_bytes())
                .with_context(|| format!("パートPDFのデコードに失敗: {}", name))?;
            Ok(RenderedPart { name, pdf })
        })
        .collect()
}

/// スコアを指定パスへ書き出す（出力形式は拡張子で決まる）
pub fn export_to(score_path: &Path, output_path: &Path) -> Result<()> {
    let command = mscore_command();
    let output = Command::new(&command)
        .arg(score_path)
        .arg("-o")
        .arg(output_path)
        .output()
        .with_context(|| format!("レンダラーの実行に失敗: {}", command))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("書き出しに失敗 {:?}: {}", output_path, stderr);
    }

    Ok(())
}
