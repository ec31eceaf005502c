//! 도메인 모델.
//!
//! 거래소 측 상태의 로컬 미러(주문/포지션/지갑)와
//! 전략 계층이 공급하는 목표 상태 타입을 정의합니다.

pub mod candle;
pub mod order;
pub mod position;
pub mod target;

pub use candle::Candle;
pub use order::{ExchangeOrder, NewOrder, OrderKind, OrderState};
pub use position::{Position, Wallet, WalletKind};
pub use target::{DesiredEntry, DesiredExit};
