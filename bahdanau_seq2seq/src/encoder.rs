use crate::config::DROPOUT;
use crate::error::ModelError;
use burn::nn::gru::{Gru, GruConfig};
use burn::nn::{Dropout, DropoutConfig, Embedding, EmbeddingConfig};
use burn::prelude::*;
use burn::tensor::ElementConversion;

// ===== Encoder（埋め込み + 単層GRU） =====

#[derive(Config, Debug)]
pub struct EncoderConfig {
    pub vocab_size: usize,
    pub hidden_size: usize,
    #[config(default = "DROPOUT")]
    pub dropout: f64,
}

impl EncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Encoder<B> {
        let embedding = EmbeddingConfig::new(self.vocab_size, self.hidden_size).init(device);
        let gru = GruConfig::new(self.hidden_size, self.hidden_size, true).init(device);
        let dropout = DropoutConfig::new(self.dropout).init();

        Encoder {
            embedding,
            gru,
            dropout,
            vocab_size: self.vocab_size,
            hidden_size: self.hidden_size,
        }
    }
}

#[derive(Module, Debug)]
pub struct Encoder<B: Backend> {
    pub embedding: Embedding<B>,
    pub gru: Gru<B>,
    pub dropout: Dropout,
    vocab_size: usize,
    hidden_size: usize,
}

/// Encoderの出力
///
/// `hidden` はDecoderの初期状態としてムーブで引き渡される。
#[derive(Debug)]
pub struct EncoderOutput<B: Backend> {
    /// 各位置の隠れ状態 [batch, src_len, hidden]（AttentionのKey）
    pub outputs: Tensor<B, 3>,
    /// 最終ステップの隠れ状態 [batch, hidden]
    pub hidden: Tensor<B, 2>,
}

impl<B: Backend> Encoder<B> {
    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// src_tokens: [batch, src_len]
    ///
    /// `training` がfalseの場合、Dropoutは適用しない。
    pub fn forward(
        &self,
        src_tokens: Tensor<B, 2, Int>,
        training: bool,
    ) -> Result<EncoderOutput<B>, ModelError> {
        let [batch_size, seq_len] = src_tokens.dims();
        if batch_size == 0 || seq_len == 0 {
            return Err(ModelError::EmptySequence);
        }
        check_token_range(&src_tokens, self.vocab_size)?;

        let embedded = self.embedding.forward(src_tokens);
        let embedded = if training {
            self.dropout.forward(embedded)
        } else {
            embedded
        };

        // 時間方向に畳み込み、全ステップの隠れ状態を得る
        let outputs = self.gru.forward(embedded, None);

        let hidden = outputs
            .clone()
            .slice([0..batch_size, seq_len - 1..seq_len, 0..self.hidden_size])
            .reshape([batch_size, self.hidden_size]);

        Ok(EncoderOutput { outputs, hidden })
    }
}

/// トークンIDが [0, vocab_size) に収まっているか確認
pub(crate) fn check_token_range<B: Backend>(
    tokens: &Tensor<B, 2, Int>,
    vocab_size: usize,
) -> Result<(), ModelError> {
    let min_id = tokens.clone().min().into_scalar().elem::<i64>();
    let max_id = tokens.clone().max().into_scalar().elem::<i64>();

    for token_id in [min_id, max_id] {
        if token_id < 0 || token_id as usize >= vocab_size {
            return Err(ModelError::TokenOutOfRange {
                token_id,
                vocab_size,
            });
        }
    }

    Ok(())
}
