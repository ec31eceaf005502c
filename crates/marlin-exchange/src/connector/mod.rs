//! 거래소별 커넥터.

pub mod bitfinex;
