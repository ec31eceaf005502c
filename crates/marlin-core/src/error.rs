//! 코어 도메인 에러 타입.

use thiserror::Error;

/// 도메인 값 파싱/검증 에러.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// 알 수 없는 타임프레임 표기
    #[error("Invalid timeframe: {0}")]
    InvalidTimeframe(String),

    /// 알 수 없는 지갑 종류 표기
    #[error("Invalid wallet kind: {0}")]
    InvalidWalletKind(String),
}
