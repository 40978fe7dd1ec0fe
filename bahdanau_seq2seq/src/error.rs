/// フォワード計算の契約違反
///
/// いずれも呼び出し側のバグであり、リトライはしない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// 埋め込みテーブルの範囲外のトークンID
    TokenOutOfRange { token_id: i64, vocab_size: usize },
    /// 長さ0のシーケンス（Attentionのsoftmaxが定義できない）
    EmptySequence,
    /// Encoder/Decoder（またはQuery/Key）の隠れ次元が一致しない
    HiddenSizeMismatch { expected: usize, actual: usize },
    /// Teacher Forcingのターゲットがデコードステップ数より短い
    TargetTooShort { required: usize, actual: usize },
    /// ターゲットとEncoder出力のバッチサイズが一致しない
    BatchMismatch { expected: usize, actual: usize },
    /// デコードステップ数が0（出力を1つも作れない）
    ZeroMaxLength,
}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TokenOutOfRange {
                token_id,
                vocab_size,
            } => write!(
                f,
                "token id {token_id} out of range for vocabulary of size {vocab_size}"
            ),
            Self::EmptySequence => write!(f, "sequence must contain at least one position"),
            Self::HiddenSizeMismatch { expected, actual } => {
                write!(f, "hidden size mismatch: expected {expected}, got {actual}")
            }
            Self::TargetTooShort { required, actual } => write!(
                f,
                "target sequence has {actual} positions but the decoder runs {required} steps"
            ),
            Self::BatchMismatch { expected, actual } => {
                write!(f, "batch size mismatch: expected {expected}, got {actual}")
            }
            Self::ZeroMaxLength => write!(f, "max_length must be at least 1"),
        }
    }
}

impl std::error::Error for ModelError {}
