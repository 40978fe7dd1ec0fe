use crate::checkpoint::load_model;
use crate::config::EOS_TOKEN;
use crate::export::export_attention_to_csv;
use crate::model::Seq2Seq;
use anyhow::{anyhow, bail, Context, Result};
use burn::backend::ndarray::NdArray;
use burn::backend::wgpu::{Wgpu, WgpuDevice};
use burn::prelude::*;
use std::path::Path;

/// 推論結果
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeResult {
    /// 全ステップの予測トークン（長さ = max_length）
    pub token_ids: Vec<i64>,
    /// 最初のEOSより前のトークン
    pub trimmed: Vec<i64>,
    /// ステップごとのAttention重み [steps][src_len]
    pub attention: Vec<Vec<f32>>,
}

/// "3,4,5" 形式のトークン列を解析
pub fn parse_token_ids(text: &str) -> Result<Vec<i64>> {
    let ids = text
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .with_context(|| format!("invalid token id '{}'", s))
        })
        .collect::<Result<Vec<_>>>()?;

    if ids.is_empty() {
        bail!("input token sequence is empty");
    }
    Ok(ids)
}

/// 最初のEOSで打ち切る（デコード後の整形のみ）
pub fn trim_at_eos(token_ids: &[i64]) -> Vec<i64> {
    token_ids
        .iter()
        .copied()
        .take_while(|&id| id != EOS_TOKEN as i64)
        .collect()
}

/// 1文の自己回帰デコード（ジェネリックBackend）
pub fn decode_tokens<B: Backend>(
    model: &Seq2Seq<B>,
    src_ids: &[i64],
    device: &B::Device,
    export_dir: Option<&Path>,
) -> Result<DecodeResult> {
    let src_len = src_ids.len();
    let src_tokens = Tensor::<B, 1, Int>::from_data(src_ids, device).reshape([1, src_len]);

    let (predicted, output) = model.greedy_decode(src_tokens)?;

    if let Some(dir) = export_dir {
        export_attention_to_csv(&output.attentions, dir, "decoder_attention")?;
    }

    let token_ids: Vec<i64> = predicted
        .into_data()
        .convert::<i64>()
        .to_vec()
        .map_err(|e| anyhow!("cannot read predicted tokens: {:?}", e))?;

    let weights: Vec<f32> = output
        .attentions
        .into_data()
        .convert::<f32>()
        .to_vec()
        .map_err(|e| anyhow!("cannot read attention weights: {:?}", e))?;
    let attention = weights.chunks(src_len).map(<[f32]>::to_vec).collect();

    let trimmed = trim_at_eos(&token_ids);
    Ok(DecodeResult {
        token_ids,
        trimmed,
        attention,
    })
}

/// バックエンドを選択して推論実行
pub fn run_inference(
    backend_name: &str,
    load_dir: &Path,
    src_ids: &[i64],
    export_dir: Option<&Path>,
) -> Result<DecodeResult> {
    match backend_name {
        "wgpu" => {
            let device = WgpuDevice::default();
            let (model, _) = load_model::<Wgpu>(load_dir, &device)?;
            decode_tokens(&model, src_ids, &device, export_dir)
        }
        "ndarray" => {
            let device = Default::default();
            let (model, _) = load_model::<NdArray>(load_dir, &device)?;
            decode_tokens(&model, src_ids, &device, export_dir)
        }
        "auto" => {
            // WGPUを試し、失敗したらNdArrayにフォールバック
            tracing::info!("selecting backend automatically");
            let wgpu_result = std::panic::catch_unwind(|| {
                let device = WgpuDevice::default();
                load_model::<Wgpu>(load_dir, &device)
            });

            match wgpu_result {
                Ok(Ok((model, _))) => {
                    tracing::info!("backend: wgpu (auto)");
                    let device = WgpuDevice::default();
                    decode_tokens(&model, src_ids, &device, export_dir)
                }
                _ => {
                    tracing::warn!("backend: ndarray (wgpu unavailable)");
                    let device = Default::default();
                    let (model, _) = load_model::<NdArray>(load_dir, &device)?;
                    decode_tokens(&model, src_ids, &device, export_dir)
                }
            }
        }
        _ => Err(anyhow!("unsupported backend: {}", backend_name)),
    }
}
