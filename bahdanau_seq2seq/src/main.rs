#![recursion_limit = "256"]

use anyhow::Result;
use bahdanau_seq2seq::checkpoint::save_model;
use bahdanau_seq2seq::config::{Seq2SeqConfig, HIDDEN_SIZE, MAX_LENGTH};
use bahdanau_seq2seq::inference::{decode_tokens, parse_token_ids, run_inference, DecodeResult};
use burn::backend::ndarray::NdArray;
use burn::module::Module;
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;

/// Bahdanau Attention付きSeq2Seqのデコードデモ
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// モデルを読み込むディレクトリ（設定は保存済みの config.json に従う）
    #[arg(
        long,
        requires = "input",
        conflicts_with_all = ["save", "src_vocab", "tgt_vocab", "hidden_size", "max_length"]
    )]
    load: Option<PathBuf>,

    /// モデルを保存するディレクトリ
    #[arg(long)]
    save: Option<PathBuf>,

    /// デコードするソーストークン列（例: "3,4,5"）
    #[arg(long)]
    input: Option<String>,

    /// バックエンドの選択（auto, wgpu, ndarray）。--load 指定時のみ有効
    #[arg(long, default_value = "ndarray")]
    backend: String,

    /// Attention履歴をCSVエクスポートするディレクトリ
    #[arg(long)]
    export_attn: Option<PathBuf>,

    /// 新規モデルのソース語彙サイズ
    #[arg(long, default_value_t = 32)]
    src_vocab: usize,

    /// 新規モデルのターゲット語彙サイズ
    #[arg(long, default_value_t = 32)]
    tgt_vocab: usize,

    /// 新規モデルの隠れ次元
    #[arg(long, default_value_t = HIDDEN_SIZE)]
    hidden_size: usize,

    /// 新規モデルのデコードステップ数
    #[arg(long, default_value_t = MAX_LENGTH, value_parser = parse_max_length)]
    max_length: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("bahdanau_seq2seq=info".parse()?),
        )
        .init();

    let start_time = Instant::now();
    let args = Args::parse();

    let src_ids = args.input.as_deref().map(parse_token_ids).transpose()?;
    let export_dir = args.export_attn.as_deref();

    if let Some(load_dir) = &args.load {
        // 保存済みモデルで推論
        if let Some(src_ids) = &src_ids {
            let result = run_inference(&args.backend, load_dir, src_ids, export_dir)?;
            print_result(src_ids, &result);
        }
    } else {
        // 新規モデル（CPU）
        let device = Default::default();
        let config = Seq2SeqConfig::new(args.src_vocab, args.tgt_vocab)
            .with_hidden_size(args.hidden_size)
            .with_max_length(args.max_length);
        let model = config.init::<NdArray>(&device);
        tracing::info!(
            "initialized model: hidden_size={}, max_length={}, params={}",
            config.hidden_size,
            config.max_length,
            model.num_params()
        );

        if let Some(src_ids) = &src_ids {
            let result = decode_tokens(&model, src_ids, &device, export_dir)?;
            print_result(src_ids, &result);
        }

        if let Some(save_dir) = &args.save {
            save_model(&model, &config, save_dir)?;
        }
    }

    // デモモード（入力なし）
    if src_ids.is_none() && args.save.is_none() {
        println!("===== デモモード =====");
        println!("使用方法:");
        println!("  新規モデルでデコード: cargo run --release -- --input \"3,4,5\"");
        println!("  保存: cargo run --release -- --save models/test");
        println!(
            "  読み込み: cargo run --release -- --load models/test --backend auto --input \"3,4,5\" --export-attn out"
        );
    }

    let duration = start_time.elapsed();
    println!("\n実行時間: {:.2}秒", duration.as_secs_f64());

    Ok(())
}

/// デコードステップ数は1以上
fn parse_max_length(s: &str) -> std::result::Result<usize, String> {
    let value: usize = s.parse().map_err(|e| format!("{e}"))?;
    if value == 0 {
        return Err("max-length must be at least 1".to_string());
    }
    Ok(value)
}

fn print_result(src_ids: &[i64], result: &DecodeResult) {
    println!("入力: {:?}", src_ids);
    println!("予測（全ステップ）: {:?}", result.token_ids);
    println!("予測（EOSまで）: {:?}", result.trimmed);
}
