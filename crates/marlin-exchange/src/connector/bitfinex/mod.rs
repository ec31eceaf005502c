//! Bitfinex WebSocket 커넥터.
//!
//! 하나의 영속 WebSocket 세션 위에서 연결/인증 핸드셰이크, 채널 구독
//! 관리, 메시지 라우팅, 하트비트 기반 liveness 감지와 자동 재연결을
//! 담당합니다.

pub mod channels;
pub mod client;
pub mod codec;
pub mod heartbeat;
pub mod state;

pub use channels::ChannelRegistry;
pub use client::{BitfinexClient, BitfinexConfig, ConnectionState};
pub use codec::{Command, ControlMessage, Event, Frame};
pub use heartbeat::HeartbeatMonitor;
pub use state::{CandleUpdate, OrderStore, PositionStore, TickerUpdate, WalletStore};
