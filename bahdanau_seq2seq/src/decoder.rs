use crate::attention::{AttentionOutput, BahdanauAttention, BahdanauAttentionConfig};
use crate::config::{DROPOUT, MAX_LENGTH, SOS_TOKEN};
use crate::encoder::{check_token_range, EncoderOutput};
use crate::error::ModelError;
use burn::nn::gru::{Gru, GruConfig};
use burn::nn::{Dropout, DropoutConfig, Embedding, EmbeddingConfig, Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::log_softmax;

// ===== Attention Decoder =====

#[derive(Config, Debug)]
pub struct AttnDecoderConfig {
    pub vocab_size: usize,
    pub hidden_size: usize,
    /// デコードステップ数（EOSを予測しても打ち切らない）
    #[config(default = "MAX_LENGTH")]
    pub max_length: usize,
    #[config(default = "DROPOUT")]
    pub dropout: f64,
}

impl AttnDecoderConfig {
    /// デコードステップ数が1以上か確認
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.max_length == 0 {
            return Err(ModelError::ZeroMaxLength);
        }
        Ok(())
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> AttnDecoder<B> {
        let embedding = EmbeddingConfig::new(self.vocab_size, self.hidden_size).init(device);
        let attention = BahdanauAttentionConfig::new(self.hidden_size).init(device);
        // 入力は [埋め込み; context] なので2倍幅
        let gru = GruConfig::new(2 * self.hidden_size, self.hidden_size, true).init(device);
        let output_projection = LinearConfig::new(self.hidden_size, self.vocab_size).init(device);
        let dropout = DropoutConfig::new(self.dropout).init();

        AttnDecoder {
            embedding,
            attention,
            gru,
            output_projection,
            dropout,
            vocab_size: self.vocab_size,
            hidden_size: self.hidden_size,
            max_length: self.max_length,
        }
    }
}

#[derive(Module, Debug)]
pub struct AttnDecoder<B: Backend> {
    pub embedding: Embedding<B>,
    pub attention: BahdanauAttention<B>,
    pub gru: Gru<B>,
    pub output_projection: Linear<B>,
    pub dropout: Dropout,
    vocab_size: usize,
    hidden_size: usize,
    max_length: usize,
}

/// 1ステップ分の出力
#[derive(Debug)]
pub struct DecoderStep<B: Backend> {
    /// 語彙上の生スコア [batch, 1, vocab]
    pub logits: Tensor<B, 3>,
    /// 更新後の隠れ状態 [batch, hidden]
    pub hidden: Tensor<B, 2>,
    /// このステップのAttention重み [batch, 1, src_len]
    pub attention: Tensor<B, 3>,
}

/// デコード全体の出力
#[derive(Debug)]
pub struct DecoderOutput<B: Backend> {
    /// [batch, max_length, vocab]（語彙軸でlog_softmax済み）
    pub log_probs: Tensor<B, 3>,
    /// 最終ステップの隠れ状態 [batch, hidden]
    pub hidden: Tensor<B, 2>,
    /// Attention重みの履歴 [batch, max_length, src_len]
    pub attentions: Tensor<B, 3>,
    /// 各ステップに入力したトークン [batch, max_length]（先頭はSOS）
    pub inputs: Tensor<B, 2, Int>,
}

impl<B: Backend> DecoderOutput<B> {
    /// 各ステップで最も確率の高いトークン [batch, max_length]
    pub fn predicted_tokens(&self) -> Tensor<B, 2, Int> {
        let [batch_size, steps, _] = self.log_probs.dims();
        self.log_probs
            .clone()
            .argmax(2)
            .reshape([batch_size, steps])
    }
}

impl<B: Backend> AttnDecoder<B> {
    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// 1ステップ分の遷移
    ///
    /// input: [batch, 1], hidden: [batch, hidden],
    /// encoder_outputs: [batch, src_len, hidden]（全ステップで共有、読み取り専用）
    pub fn forward_step(
        &self,
        input: Tensor<B, 2, Int>,
        hidden: Tensor<B, 2>,
        encoder_outputs: &Tensor<B, 3>,
        training: bool,
    ) -> Result<DecoderStep<B>, ModelError> {
        let [batch_size, hidden_size] = hidden.dims();
        if hidden_size != self.hidden_size {
            return Err(ModelError::HiddenSizeMismatch {
                expected: self.hidden_size,
                actual: hidden_size,
            });
        }

        check_token_range(&input, self.vocab_size)?;

        let embedded = self.embedding.forward(input);
        let embedded = if training {
            self.dropout.forward(embedded)
        } else {
            embedded
        };

        let query = hidden.clone().unsqueeze_dim::<3>(1);
        let AttentionOutput { context, weights } =
            self.attention.forward(query, encoder_outputs.clone())?;

        let gru_input = Tensor::cat(vec![embedded, context], 2);
        let output = self.gru.forward(gru_input, Some(hidden));
        let next_hidden = output.clone().reshape([batch_size, self.hidden_size]);

        let logits = self.output_projection.forward(output);

        Ok(DecoderStep {
            logits,
            hidden: next_hidden,
            attention: weights,
        })
    }

    /// `max_length` ステップのデコード
    ///
    /// `target` がある場合はTeacher Forcing（[batch, >= max_length]）、
    /// ない場合は自身のargmax予測を次の入力にする。
    pub fn forward(
        &self,
        encoder_output: EncoderOutput<B>,
        target: Option<Tensor<B, 2, Int>>,
        training: bool,
    ) -> Result<DecoderOutput<B>, ModelError> {
        if self.max_length == 0 {
            return Err(ModelError::ZeroMaxLength);
        }

        let EncoderOutput {
            outputs: encoder_outputs,
            hidden,
        } = encoder_output;

        let [batch_size, hidden_size] = hidden.dims();
        if hidden_size != self.hidden_size {
            return Err(ModelError::HiddenSizeMismatch {
                expected: self.hidden_size,
                actual: hidden_size,
            });
        }

        if let Some(target) = &target {
            let [target_batch, target_len] = target.dims();
            if target_batch != batch_size {
                return Err(ModelError::BatchMismatch {
                    expected: batch_size,
                    actual: target_batch,
                });
            }
            if target_len < self.max_length {
                return Err(ModelError::TargetTooShort {
                    required: self.max_length,
                    actual: target_len,
                });
            }
            check_token_range(target, self.vocab_size)?;
        }

        let device = encoder_outputs.device();
        let mut input = Tensor::<B, 2, Int>::full([batch_size, 1], SOS_TOKEN as i64, &device);
        let mut hidden = hidden;

        let mut step_logits = Vec::with_capacity(self.max_length);
        let mut step_attentions = Vec::with_capacity(self.max_length);
        let mut step_inputs = Vec::with_capacity(self.max_length);

        for step in 0..self.max_length {
            step_inputs.push(input.clone());

            let DecoderStep {
                logits,
                hidden: next_hidden,
                attention,
            } = self.forward_step(input, hidden, &encoder_outputs, training)?;
            hidden = next_hidden;

            input = match &target {
                // Teacher Forcing: 予測に関係なく正解トークンを入力
                Some(target) => target.clone().slice([0..batch_size, step..step + 1]),
                // 自己回帰: 勾配を切った予測を定数として入力
                None => logits
                    .clone()
                    .detach()
                    .argmax(2)
                    .reshape([batch_size, 1]),
            };

            step_logits.push(logits);
            step_attentions.push(attention);
        }

        tracing::debug!(
            batch_size,
            steps = self.max_length,
            teacher_forcing = target.is_some(),
            "decoded batch"
        );

        let log_probs = log_softmax(Tensor::cat(step_logits, 1), 2);
        let attentions = Tensor::cat(step_attentions, 1);
        let inputs = Tensor::cat(step_inputs, 1);

        Ok(DecoderOutput {
            log_probs,
            hidden,
            attentions,
            inputs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::EncoderConfig;
    use burn::backend::ndarray::NdArray;
    use burn::module::Param;

    type TestBackend = NdArray;

    /// 出力層を上書きして、常に `token` を予測させる
    fn force_prediction(decoder: &mut AttnDecoder<TestBackend>, token: usize) {
        let device: <TestBackend as Backend>::Device = Default::default();
        let vocab_size = decoder.vocab_size();

        let mut bias = vec![0.0_f32; vocab_size];
        bias[token] = 100.0;

        decoder.output_projection.weight = Param::from_tensor(Tensor::zeros(
            [decoder.hidden_size(), vocab_size],
            &device,
        ));
        decoder.output_projection.bias = Some(Param::from_tensor(Tensor::from_floats(
            bias.as_slice(),
            &device,
        )));
    }

    #[test]
    fn forced_prediction_becomes_next_input() {
        let device = Default::default();
        let encoder = EncoderConfig::new(6, 4).init::<TestBackend>(&device);

        for forced in [3, 4] {
            let mut decoder = AttnDecoderConfig::new(6, 4)
                .with_max_length(4)
                .init::<TestBackend>(&device);
            force_prediction(&mut decoder, forced);

            let src = Tensor::<TestBackend, 1, Int>::from_data([2, 3, 4].as_slice(), &device)
                .reshape([1, 3]);
            let encoded = encoder.forward(src, false).unwrap();
            let output = decoder.forward(encoded, None, false).unwrap();

            let inputs: Vec<i64> = output.inputs.into_data().convert::<i64>().to_vec().unwrap();
            let forced = forced as i64;
            assert_eq!(inputs, vec![SOS_TOKEN as i64, forced, forced, forced]);
        }
    }

    #[test]
    fn single_token_vocabulary_feeds_back_index_zero() {
        let device = Default::default();
        let encoder = EncoderConfig::new(4, 4).init::<TestBackend>(&device);
        let decoder = AttnDecoderConfig::new(1, 4)
            .with_max_length(3)
            .init::<TestBackend>(&device);

        let src = Tensor::<TestBackend, 1, Int>::from_data([1, 2].as_slice(), &device)
            .reshape([1, 2]);
        let output = decoder
            .forward(encoder.forward(src, false).unwrap(), None, false)
            .unwrap();

        let inputs: Vec<i64> = output.inputs.into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(inputs, vec![0, 0, 0]);

        // 語彙1ではlog確率は常に0
        let log_probs: Vec<f32> = output.log_probs.into_data().to_vec().unwrap();
        assert!(log_probs.iter().all(|p| p.abs() < 1e-6));
    }

    #[test]
    fn step_rejects_token_outside_vocabulary() {
        let device = Default::default();
        let encoder = EncoderConfig::new(6, 4).init::<TestBackend>(&device);
        let decoder = AttnDecoderConfig::new(5, 4).init::<TestBackend>(&device);

        let src = Tensor::<TestBackend, 1, Int>::from_data([2, 3].as_slice(), &device)
            .reshape([1, 2]);
        let encoded = encoder.forward(src, false).unwrap();

        let input = Tensor::<TestBackend, 1, Int>::from_data([5].as_slice(), &device)
            .reshape([1, 1]);
        let err = decoder
            .forward_step(input, encoded.hidden, &encoded.outputs, false)
            .unwrap_err();

        assert_eq!(
            err,
            ModelError::TokenOutOfRange {
                token_id: 5,
                vocab_size: 5
            }
        );
    }

    #[test]
    fn zero_max_length_is_rejected() {
        let device = Default::default();
        let config = AttnDecoderConfig::new(6, 4).with_max_length(0);
        assert_eq!(config.validate(), Err(ModelError::ZeroMaxLength));

        // 構築はできるが、デコードはエラーになる
        let encoder = EncoderConfig::new(6, 4).init::<TestBackend>(&device);
        let decoder = config.init::<TestBackend>(&device);
        let src = Tensor::<TestBackend, 1, Int>::from_data([2, 3].as_slice(), &device)
            .reshape([1, 2]);
        let err = decoder
            .forward(encoder.forward(src, false).unwrap(), None, false)
            .unwrap_err();

        assert_eq!(err, ModelError::ZeroMaxLength);
    }
}
