//! 실행 계층 에러 타입.

use thiserror::Error;

/// 주문 실행 에러.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    /// 인증되지 않은 게이트웨이로 주문 시도
    #[error("Gateway is not authenticated")]
    NotAuthenticated,

    /// 확인 타임아웃
    #[error("Order confirmation timed out: {id}")]
    ConfirmationTimeout {
        /// 클라이언트 ID 또는 주문 ID
        id: i64,
    },

    /// 거래소가 주문을 거부
    #[error("Order failed ({id}): {reason}")]
    OrderFailed {
        /// 클라이언트 ID
        id: i64,
        /// 거부 사유
        reason: String,
    },

    /// 취소 실패
    #[error("Cancel failed for order {id}")]
    CancelFailed {
        /// 주문 ID
        id: i64,
    },

    /// 게이트웨이 오류
    #[error("Gateway error: {0}")]
    Gateway(String),
}

/// 실행 계층 Result 타입.
pub type ExecutionResult<T> = Result<T, ExecutionError>;
