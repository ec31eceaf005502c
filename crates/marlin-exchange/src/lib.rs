//! 거래소 연결 계층.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - Bitfinex 커넥터 (WebSocket 연결/인증/라우팅/재연결)
//! - 채널 구독 레지스트리
//! - 스레드 안전 콜백 레지스트리
//! - 재연결 폭주를 막는 속도 제한 게이트
//! - 주문/포지션/지갑 상태 저장소
//! - `OrderGateway` trait: 실행 계층이 소비하는 시임

pub mod callback;
pub mod connector;
pub mod error;
pub mod rate_gate;
pub mod traits;

pub use callback::{CallbackId, CallbackRegistry};
pub use connector::bitfinex::{
    BitfinexClient, BitfinexConfig, ChannelRegistry, ConnectionState, HeartbeatMonitor,
    OrderStore, PositionStore, WalletStore,
};
pub use error::*;
pub use rate_gate::ReconnectGate;
pub use traits::OrderGateway;
