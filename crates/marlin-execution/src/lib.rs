//! 주문 실행 및 포트폴리오 리컨실리에이션.
//!
//! - `OrderExecutor`: 제출-확인-재시도 루프를 감싼 주문 실행기
//! - `PortfolioReconciler`: 목표 포트폴리오와 거래소 실상태의 차이를
//!   계산해 수렴시키는 엔진

pub mod error;
pub mod executor;
pub mod reconciler;

pub use error::{ExecutionError, ExecutionResult};
pub use executor::OrderExecutor;
pub use reconciler::{PortfolioReconciler, ReconcileReport};
