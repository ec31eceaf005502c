//! 목표 진입/청산 타깃.
//!
//! 전략 계층이 매 사이클 새로 계산해서 공급하는 일시적 값입니다.
//! 거래소 식별자를 갖지 않으며, 실제 주문과의 대응은
//! 리컨실리에이션 엔진이 라이브 주문을 읽어 결정합니다.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 목표 진입 타깃.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredEntry {
    /// 심볼
    pub symbol: String,
    /// 진입 희망가
    pub price: Decimal,
}

impl DesiredEntry {
    /// 새 진입 타깃을 생성합니다.
    pub fn new(symbol: impl Into<String>, price: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            price,
        }
    }
}

/// 목표 청산 타깃.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredExit {
    /// 심볼
    pub symbol: String,
    /// 청산 (스탑) 가격
    pub price: Decimal,
}

impl DesiredExit {
    /// 새 청산 타깃을 생성합니다.
    pub fn new(symbol: impl Into<String>, price: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            price,
        }
    }
}
