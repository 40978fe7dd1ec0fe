use crate::decoder::{AttnDecoder, AttnDecoderConfig};
use crate::encoder::{Encoder, EncoderConfig};
use crate::error::ModelError;
use crate::model::Seq2Seq;
use burn::prelude::*;

// 予約トークン
pub const SOS_TOKEN: usize = 0; // 文頭
pub const EOS_TOKEN: usize = 1; // 文末

// モデルハイパーパラメーター（デフォルト値）
pub const HIDDEN_SIZE: usize = 128; // 埋め込み次元 = GRU隠れ状態の次元
pub const MAX_LENGTH: usize = 10; // デコードステップ数（早期終了なし）
pub const DROPOUT: f64 = 0.1; // 埋め込み直後のDropout率

/// Seq2Seqモデル全体の設定
///
/// `config.json` としてチェックポイントと一緒に保存される。
#[derive(Config, Debug)]
pub struct Seq2SeqConfig {
    /// ソース語彙サイズ
    pub src_vocab_size: usize,
    /// ターゲット語彙サイズ
    pub tgt_vocab_size: usize,
    #[config(default = "HIDDEN_SIZE")]
    pub hidden_size: usize,
    #[config(default = "MAX_LENGTH")]
    pub max_length: usize,
    #[config(default = "DROPOUT")]
    pub dropout: f64,
}

impl Seq2SeqConfig {
    pub fn encoder(&self) -> EncoderConfig {
        EncoderConfig::new(self.src_vocab_size, self.hidden_size).with_dropout(self.dropout)
    }

    pub fn decoder(&self) -> AttnDecoderConfig {
        AttnDecoderConfig::new(self.tgt_vocab_size, self.hidden_size)
            .with_max_length(self.max_length)
            .with_dropout(self.dropout)
    }

    /// 外部から読み込んだ設定を検証
    pub fn validate(&self) -> Result<(), ModelError> {
        self.decoder().validate()
    }

    /// Encoder/Decoderを同じ隠れ次元で初期化
    pub fn init<B: Backend>(&self, device: &B::Device) -> Seq2Seq<B> {
        let encoder: Encoder<B> = self.encoder().init(device);
        let decoder: AttnDecoder<B> = self.decoder().init(device);

        Seq2Seq { encoder, decoder }
    }
}
