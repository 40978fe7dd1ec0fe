use crate::decoder::{AttnDecoder, DecoderOutput};
use crate::encoder::Encoder;
use crate::error::ModelError;
use burn::prelude::*;

// ===== Seq2Seq（Encoder + Attention Decoder） =====

#[derive(Module, Debug)]
pub struct Seq2Seq<B: Backend> {
    pub encoder: Encoder<B>,
    pub decoder: AttnDecoder<B>,
}

impl<B: Backend> Seq2Seq<B> {
    /// 個別に構築したEncoder/Decoderを組み合わせる
    ///
    /// 隠れ次元が異なる場合はブロードキャストに頼らず即座にエラーにする。
    pub fn from_parts(encoder: Encoder<B>, decoder: AttnDecoder<B>) -> Result<Self, ModelError> {
        if encoder.hidden_size() != decoder.hidden_size() {
            return Err(ModelError::HiddenSizeMismatch {
                expected: encoder.hidden_size(),
                actual: decoder.hidden_size(),
            });
        }

        Ok(Self { encoder, decoder })
    }

    /// src_tokens: [batch, src_len]
    /// target: Teacher Forcing用の正解 [batch, >= max_length]
    pub fn forward(
        &self,
        src_tokens: Tensor<B, 2, Int>,
        target: Option<Tensor<B, 2, Int>>,
        training: bool,
    ) -> Result<DecoderOutput<B>, ModelError> {
        let encoder_output = self.encoder.forward(src_tokens, training)?;
        self.decoder.forward(encoder_output, target, training)
    }

    /// 推論時の貪欲デコード
    ///
    /// 戻り値: (予測トークン [batch, max_length], デコード出力)
    pub fn greedy_decode(
        &self,
        src_tokens: Tensor<B, 2, Int>,
    ) -> Result<(Tensor<B, 2, Int>, DecoderOutput<B>), ModelError> {
        let output = self.forward(src_tokens, None, false)?;
        Ok((output.predicted_tokens(), output))
    }
}
