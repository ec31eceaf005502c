//! 캔들 도메인 타입.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// OHLCV 캔들.
///
/// 거래소 캔들 채널의 필드 순서는 `[ts, open, close, high, low, volume]`
/// 입니다 (close가 high/low보다 앞).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// 캔들 시작 시각
    pub timestamp: DateTime<Utc>,
    /// 시가
    pub open: Decimal,
    /// 종가
    pub close: Decimal,
    /// 고가
    pub high: Decimal,
    /// 저가
    pub low: Decimal,
    /// 거래량
    pub volume: Decimal,
}
