use crate::config::{Seq2SeqConfig, EOS_TOKEN, SOS_TOKEN};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// モデル構成の要約
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ModelSummary {
    pub src_vocab_size: usize,
    pub tgt_vocab_size: usize,
    pub hidden_size: usize,
    pub max_length: usize,
    pub dropout: f64,
    pub sos_token: usize,
    pub eos_token: usize,
}

impl From<&Seq2SeqConfig> for ModelSummary {
    fn from(config: &Seq2SeqConfig) -> Self {
        Self {
            src_vocab_size: config.src_vocab_size,
            tgt_vocab_size: config.tgt_vocab_size,
            hidden_size: config.hidden_size,
            max_length: config.max_length,
            dropout: config.dropout,
            sos_token: SOS_TOKEN,
            eos_token: EOS_TOKEN,
        }
    }
}

/// メタデータ
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Metadata {
    pub crate_version: String,
    pub saved_at: String,
}

/// チェックポイントに同梱するmanifest.json
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ModelManifest {
    pub model: ModelSummary,
    pub num_params: usize,
    pub metadata: Metadata,
}

impl ModelManifest {
    pub fn new(config: &Seq2SeqConfig, num_params: usize) -> Self {
        Self {
            model: ModelSummary::from(config),
            num_params,
            metadata: Metadata {
                crate_version: env!("CARGO_PKG_VERSION").to_string(),
                saved_at: chrono::Local::now().to_rfc3339(),
            },
        }
    }
}

/// manifest.json と README.md を保存
pub fn save_manifest(save_dir: &Path, manifest: &ModelManifest) -> Result<()> {
    fs::create_dir_all(save_dir)
        .with_context(|| format!("cannot create '{}'", save_dir.display()))?;

    let path = save_dir.join("manifest.json");
    let json = serde_json::to_string_pretty(manifest)?;
    fs::write(&path, json).with_context(|| format!("cannot write '{}'", path.display()))?;
    tracing::debug!("saved manifest to '{}'", path.display());

    save_readme(save_dir, manifest)
}

pub fn load_manifest(load_dir: &Path) -> Result<ModelManifest> {
    let path = load_dir.join("manifest.json");
    let json = fs::read_to_string(&path)
        .with_context(|| format!("cannot read '{}'", path.display()))?;

    Ok(serde_json::from_str(&json)?)
}

/// README.mdを自動生成
fn save_readme(save_dir: &Path, manifest: &ModelManifest) -> Result<()> {
    let model = &manifest.model;

    let readme_content = format!(
        r#"# Bahdanau Attention Seq2Seq チェックポイント

## モデル設定

- **隠れ次元**: {}
- **デコードステップ数**: {}
- **Dropout**: {}
- **ソース語彙サイズ**: {}
- **ターゲット語彙サイズ**: {}
- **SOS / EOS**: {} / {}
- **パラメータ数**: {}

## 保存情報

- **保存日時**: {}
- **バージョン**: {}

## 使用方法

```bash
cargo run --release -- \
  --load {} \
  --backend ndarray \
  --input "3,4,5"
```

## ファイル構成

- `model.bin`: モデル重み（Burnバイナリ形式）
- `config.json`: モデル設定（`Seq2SeqConfig`）
- `manifest.json`: 構成要約とメタデータ
- `README.md`: このファイル
"#,
        model.hidden_size,
        model.max_length,
        model.dropout,
        model.src_vocab_size,
        model.tgt_vocab_size,
        model.sos_token,
        model.eos_token,
        manifest.num_params,
        manifest.metadata.saved_at,
        manifest.metadata.crate_version,
        save_dir.display(),
    );

    let path = save_dir.join("README.md");
    fs::write(&path, readme_content).with_context(|| format!("cannot write '{}'", path.display()))?;

    Ok(())
}
