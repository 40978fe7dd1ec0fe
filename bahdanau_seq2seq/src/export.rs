use anyhow::{anyhow, Context, Result};
use burn::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

/// Attention履歴をCSVファイルにエクスポート
///
/// attentions: [batch, steps, src_len] のAttention重み
/// save_dir: 保存先ディレクトリ（exports/ 以下に出力）
/// name: ファイル名の接頭辞
///
/// 戻り値: 書き出したファイルのパス（バッチ要素ごとに1つ）
pub fn export_attention_to_csv<B: Backend>(
    attentions: &Tensor<B, 3>,
    save_dir: &Path,
    name: &str,
) -> Result<Vec<PathBuf>> {
    let exports_dir = save_dir.join("exports");
    fs::create_dir_all(&exports_dir)
        .with_context(|| format!("cannot create '{}'", exports_dir.display()))?;

    let [batch_size, steps, src_len] = attentions.dims();

    // データをホストに転送
    let attn_data: Vec<f32> = attentions
        .to_data()
        .convert::<f32>()
        .to_vec()
        .map_err(|e| anyhow!("cannot read attention weights: {:?}", e))?;

    let mut written = Vec::with_capacity(batch_size);
    let per_batch = steps * src_len;

    for batch_idx in 0..batch_size {
        let start = batch_idx * per_batch;
        let csv_content = attention_csv(&attn_data[start..start + per_batch], steps, src_len);

        let filepath = exports_dir.join(format!("{}_batch{}.csv", name, batch_idx));
        fs::write(&filepath, csv_content)
            .with_context(|| format!("cannot write '{}'", filepath.display()))?;
        tracing::info!("exported attention weights: {}", filepath.display());

        written.push(filepath);
    }

    Ok(written)
}

/// [steps, src_len] の重みをCSV文字列に整形
pub fn attention_csv(weights: &[f32], steps: usize, src_len: usize) -> String {
    let mut csv_content = String::new();

    // ヘッダー行（ソース位置）
    csv_content.push_str("step\\src");
    for src_idx in 0..src_len {
        csv_content.push_str(&format!(",{}", src_idx));
    }
    csv_content.push('\n');

    // データ行（デコードステップ）
    for step in 0..steps {
        csv_content.push_str(&format!("{}", step));
        for src_idx in 0..src_len {
            let value = weights[step * src_len + src_idx];
            csv_content.push_str(&format!(",{:.6}", value));
        }
        csv_content.push('\n');
    }

    csv_content
}
