use crate::error::ModelError;
use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::{softmax, tanh};

// ===== Bahdanau Attention（加法型） =====
//
// score(q, k_j) = Va · tanh(Wa·q + Ua·k_j)
// tanhを挟まないと内積型スコアに退化する

#[derive(Config, Debug)]
pub struct BahdanauAttentionConfig {
    pub hidden_size: usize,
}

impl BahdanauAttentionConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> BahdanauAttention<B> {
        let w_a = LinearConfig::new(self.hidden_size, self.hidden_size).init(device);
        let u_a = LinearConfig::new(self.hidden_size, self.hidden_size).init(device);
        let v_a = LinearConfig::new(self.hidden_size, 1).init(device);

        BahdanauAttention {
            w_a,
            u_a,
            v_a,
            hidden_size: self.hidden_size,
        }
    }
}

#[derive(Module, Debug)]
pub struct BahdanauAttention<B: Backend> {
    /// Query射影
    pub w_a: Linear<B>,
    /// Key射影
    pub u_a: Linear<B>,
    /// スカラースコアへの射影
    pub v_a: Linear<B>,
    hidden_size: usize,
}

#[derive(Debug)]
pub struct AttentionOutput<B: Backend> {
    /// [batch, 1, hidden]
    pub context: Tensor<B, 3>,
    /// [batch, 1, src_len]（非負、合計1）
    pub weights: Tensor<B, 3>,
}

impl<B: Backend> BahdanauAttention<B> {
    /// query: [batch, 1, hidden], keys: [batch, src_len, hidden]
    pub fn forward(
        &self,
        query: Tensor<B, 3>,
        keys: Tensor<B, 3>,
    ) -> Result<AttentionOutput<B>, ModelError> {
        let [batch_size, seq_len, key_size] = keys.dims();
        let [query_batch, _, query_size] = query.dims();

        if seq_len == 0 {
            return Err(ModelError::EmptySequence);
        }
        for actual in [key_size, query_size] {
            if actual != self.hidden_size {
                return Err(ModelError::HiddenSizeMismatch {
                    expected: self.hidden_size,
                    actual,
                });
            }
        }
        if query_batch != batch_size {
            return Err(ModelError::BatchMismatch {
                expected: batch_size,
                actual: query_batch,
            });
        }

        // Queryを全Key位置にブロードキャスト
        let projected_query = self.w_a.forward(query).repeat_dim(1, seq_len);
        let projected_keys = self.u_a.forward(keys.clone());
        let energy = tanh(projected_query + projected_keys);

        // [batch, src_len, 1] -> [batch, 1, src_len]
        let scores = self.v_a.forward(energy).swap_dims(1, 2);
        let weights = softmax(scores, 2);

        // 重み付き和: [batch, 1, src_len] x [batch, src_len, hidden]
        let context = weights.clone().matmul(keys);

        Ok(AttentionOutput { context, weights })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn weights_form_distribution_over_keys() {
        let device = Default::default();
        let attention = BahdanauAttentionConfig::new(6).init::<TestBackend>(&device);

        let query = Tensor::<TestBackend, 3>::random(
            [3, 1, 6],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );
        let keys = Tensor::<TestBackend, 3>::random(
            [3, 7, 6],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );

        let output = attention.forward(query, keys).unwrap();
        assert_eq!(output.weights.dims(), [3, 1, 7]);
        assert_eq!(output.context.dims(), [3, 1, 6]);

        let weights: Vec<f32> = output.weights.into_data().to_vec().unwrap();
        assert!(weights.iter().all(|w| *w >= 0.0));
        for row in weights.chunks(7) {
            let sum: f32 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5, "sum = {sum}");
        }
    }

    #[test]
    fn single_key_gets_full_weight() {
        let device = Default::default();
        let attention = BahdanauAttentionConfig::new(4).init::<TestBackend>(&device);

        let query = Tensor::<TestBackend, 3>::ones([1, 1, 4], &device);
        let keys = Tensor::<TestBackend, 3>::ones([1, 1, 4], &device) * 0.5;

        let output = attention.forward(query, keys.clone()).unwrap();
        let weights: Vec<f32> = output.weights.into_data().to_vec().unwrap();
        assert_eq!(weights, vec![1.0]);

        // 重み1.0なのでcontextはKeyそのもの
        let context: Vec<f32> = output.context.into_data().to_vec().unwrap();
        assert_eq!(context, vec![0.5; 4]);
    }

    #[test]
    fn empty_key_sequence_is_rejected() {
        let device = Default::default();
        let attention = BahdanauAttentionConfig::new(4).init::<TestBackend>(&device);

        let query = Tensor::<TestBackend, 3>::zeros([1, 1, 4], &device);
        let keys = Tensor::<TestBackend, 3>::zeros([1, 0, 4], &device);

        assert_eq!(
            attention.forward(query, keys).unwrap_err(),
            ModelError::EmptySequence
        );
    }

    #[test]
    fn key_width_must_match_hidden_size() {
        let device = Default::default();
        let attention = BahdanauAttentionConfig::new(4).init::<TestBackend>(&device);

        let query = Tensor::<TestBackend, 3>::zeros([1, 1, 4], &device);
        let keys = Tensor::<TestBackend, 3>::zeros([1, 3, 5], &device);

        assert_eq!(
            attention.forward(query, keys).unwrap_err(),
            ModelError::HiddenSizeMismatch {
                expected: 4,
                actual: 5
            }
        );
    }
}
