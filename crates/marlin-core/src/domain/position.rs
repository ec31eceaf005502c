//! 포지션 및 지갑 도메인 타입.
//!
//! 둘 다 거래소 측 상태의 최종적 일관성 미러이며, 인바운드 업데이트마다
//! 통째로 교체됩니다.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// 오픈 포지션 스냅샷.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// 심볼
    pub symbol: String,
    /// 상태 문자열 (ACTIVE / CLOSED)
    pub status: String,
    /// 포지션 수량 (양수 = 롱, 음수 = 숏)
    pub amount: Decimal,
    /// 평균 진입가
    pub base_price: Option<Decimal>,
    /// 미실현 손익
    pub pl: Option<Decimal>,
    /// 미실현 손익률
    pub pl_percent: Option<Decimal>,
    /// 청산 예상가
    pub price_liq: Option<Decimal>,
    /// 마지막 갱신 시각 (로컬 수신 기준)
    pub updated_at: DateTime<Utc>,
}

impl Position {
    /// 활성 포지션인지 확인합니다.
    pub fn is_active(&self) -> bool {
        self.status.starts_with("ACTIVE")
    }
}

/// 지갑 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletKind {
    /// 현물 지갑
    Exchange,
    /// 마진 지갑
    Margin,
    /// 펀딩 지갑
    Funding,
}

impl WalletKind {
    /// 와이어 문자열에서 파싱합니다.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "exchange" => Some(WalletKind::Exchange),
            "margin" => Some(WalletKind::Margin),
            "funding" => Some(WalletKind::Funding),
            _ => None,
        }
    }
}

impl FromStr for WalletKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_wire(s).ok_or_else(|| CoreError::InvalidWalletKind(s.to_string()))
    }
}

impl fmt::Display for WalletKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalletKind::Exchange => write!(f, "exchange"),
            WalletKind::Margin => write!(f, "margin"),
            WalletKind::Funding => write!(f, "funding"),
        }
    }
}

/// 지갑 잔고 스냅샷.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    /// 지갑 종류
    pub kind: WalletKind,
    /// 통화 (예: USD, BTC)
    pub currency: String,
    /// 잔고
    pub balance: Decimal,
    /// 미정산 이자
    pub unsettled_interest: Decimal,
    /// 사용 가능 잔고 (거래소가 계산했을 때만 존재)
    pub balance_available: Option<Decimal>,
}
