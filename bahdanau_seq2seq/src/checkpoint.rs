use crate::config::Seq2SeqConfig;
use crate::manifest::{save_manifest, ModelManifest};
use crate::model::Seq2Seq;
use anyhow::{anyhow, Context, Result};
use burn::prelude::*;
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use std::fs;
use std::path::Path;

const MODEL_FILE: &str = "model";
const CONFIG_FILE: &str = "config.json";

/// モデルを保存
///
/// save_dir/model.bin（重み）, config.json, manifest.json, README.md を書き出す。
pub fn save_model<B: Backend>(
    model: &Seq2Seq<B>,
    config: &Seq2SeqConfig,
    save_dir: &Path,
) -> Result<()> {
    fs::create_dir_all(save_dir)
        .with_context(|| format!("cannot create '{}'", save_dir.display()))?;

    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    let model_path = save_dir.join(MODEL_FILE);

    model
        .clone()
        .save_file(model_path.clone(), &recorder)
        .map_err(|e| anyhow!("failed to save model to '{}': {:?}", model_path.display(), e))?;

    let config_path = save_dir.join(CONFIG_FILE);
    config
        .save(&config_path)
        .with_context(|| format!("cannot write '{}'", config_path.display()))?;

    save_manifest(save_dir, &ModelManifest::new(config, model.num_params()))?;

    tracing::info!("saved model to '{}'", save_dir.display());
    Ok(())
}

/// モデルを読み込み（ジェネリックなBackend用）
///
/// config.json からモデルを再構築してから重みを読み込む。
pub fn load_model<B: Backend>(
    load_dir: &Path,
    device: &B::Device,
) -> Result<(Seq2Seq<B>, Seq2SeqConfig)> {
    let config_path = load_dir.join(CONFIG_FILE);
    let config = Seq2SeqConfig::load(&config_path)
        .map_err(|e| anyhow!("cannot read '{}': {:?}", config_path.display(), e))?;
    config
        .validate()
        .with_context(|| format!("invalid config '{}'", config_path.display()))?;

    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    let model_path = load_dir.join(MODEL_FILE);

    let model = config
        .init::<B>(device)
        .load_file(model_path.clone(), &recorder, device)
        .map_err(|e| anyhow!("failed to load model from '{}': {:?}", model_path.display(), e))?;

    tracing::info!(
        "loaded model ({} backend) from '{}'",
        std::any::type_name::<B>(),
        load_dir.display()
    );
    Ok((model, config))
}
