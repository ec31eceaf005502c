//! 주문 도메인 타입.
//!
//! `ExchangeOrder`는 거래소가 주문 채널로 내려주는 서버 측 주문 레코드이며,
//! 인바운드 메시지마다 통째로 교체됩니다. 로컬에서 필드를 계산하지 않습니다.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 거래소가 보고하는 주문 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    /// 미체결 활성 주문
    Active,
    /// 전량 체결됨
    Executed,
    /// 부분 체결됨
    PartiallyFilled,
    /// 취소됨
    Canceled,
    /// postonly 조건 위반으로 취소됨
    PostOnlyCanceled,
    /// 거래소가 에러로 거부함
    Error,
}

impl OrderState {
    /// 거래소 상태 문자열에서 파싱합니다.
    ///
    /// 상태 문자열은 `"EXECUTED @ 10000.0(0.09)"`처럼 세부 내용이 뒤에
    /// 붙기 때문에 접두사로만 판별합니다.
    pub fn from_status(status: &str) -> Self {
        let status = status.trim();
        if status.starts_with("ACTIVE") {
            OrderState::Active
        } else if status.starts_with("EXECUTED") {
            OrderState::Executed
        } else if status.starts_with("PARTIALLY FILLED") {
            OrderState::PartiallyFilled
        } else if status.starts_with("POSTONLY CANCELED") {
            OrderState::PostOnlyCanceled
        } else if status.starts_with("CANCELED") {
            OrderState::Canceled
        } else {
            OrderState::Error
        }
    }

    /// 주문 생명주기가 끝난 상태인지 확인합니다.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderState::Executed
                | OrderState::Canceled
                | OrderState::PostOnlyCanceled
                | OrderState::Error
        )
    }

    /// 취소 계열 상태인지 확인합니다.
    pub fn is_canceled(&self) -> bool {
        matches!(self, OrderState::Canceled | OrderState::PostOnlyCanceled)
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderState::Active => write!(f, "active"),
            OrderState::Executed => write!(f, "executed"),
            OrderState::PartiallyFilled => write!(f, "partially_filled"),
            OrderState::Canceled => write!(f, "canceled"),
            OrderState::PostOnlyCanceled => write!(f, "postonly_canceled"),
            OrderState::Error => write!(f, "error"),
        }
    }
}

/// 서버 측 주문 레코드.
///
/// 거래소의 희소 인코딩을 따라 없는 필드는 `Option`으로 표현합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeOrder {
    /// 거래소 주문 ID
    pub order_id: i64,
    /// 주문 그룹 ID
    pub group_id: Option<i64>,
    /// 로컬 생성 클라이언트 ID
    pub client_id: i64,
    /// 심볼 (예: tBTCUSD)
    pub symbol: String,
    /// 생성 시각
    pub created_at: DateTime<Utc>,
    /// 마지막 갱신 시각
    pub updated_at: DateTime<Utc>,
    /// 잔여 수량 (양수 = 매수, 음수 = 매도)
    pub amount: Decimal,
    /// 최초 주문 수량
    pub amount_orig: Decimal,
    /// 주문 유형 문자열 (거래소 표기 그대로)
    pub order_type: String,
    /// 주문 상태
    pub state: OrderState,
    /// 지정가
    pub price: Option<Decimal>,
    /// 평균 체결가
    pub avg_price: Option<Decimal>,
    /// 트레일링 가격
    pub trailing_price: Option<Decimal>,
    /// 보조 지정가 (stop-limit의 limit 가격)
    pub aux_limit_price: Option<Decimal>,
    /// 알림 플래그
    pub notify: bool,
    /// 히든 주문 여부
    pub hidden: bool,
}

impl ExchangeOrder {
    /// 매수 주문인지 확인합니다 (잔여 수량 기준).
    pub fn is_buy(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    /// 매도 주문인지 확인합니다.
    pub fn is_sell(&self) -> bool {
        self.amount < Decimal::ZERO
    }
}

/// 아웃바운드 주문 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    /// 현물 지갑 지정가
    ExchangeLimit,
    /// 현물 지갑 스탑
    ExchangeStop,
    /// 현물 지갑 스탑-리밋
    ExchangeStopLimit,
    /// 마진 지정가
    Limit,
    /// 마진 스탑
    Stop,
    /// 마진 스탑-리밋
    StopLimit,
    /// 트레일링 스탑
    TrailingStop,
}

impl OrderKind {
    /// 거래소 와이어 표기를 반환합니다.
    pub fn as_wire(&self) -> &'static str {
        match self {
            OrderKind::ExchangeLimit => "EXCHANGE LIMIT",
            OrderKind::ExchangeStop => "EXCHANGE STOP",
            OrderKind::ExchangeStopLimit => "EXCHANGE STOP LIMIT",
            OrderKind::Limit => "LIMIT",
            OrderKind::Stop => "STOP",
            OrderKind::StopLimit => "STOP LIMIT",
            OrderKind::TrailingStop => "TRAILING STOP",
        }
    }
}

/// 신규 주문 요청.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    /// 클라이언트 ID (확인 콜백 상관관계 키)
    pub client_id: i64,
    /// 심볼
    pub symbol: String,
    /// 주문 유형
    pub kind: OrderKind,
    /// 수량 (양수 = 매수, 음수 = 매도)
    pub amount: Decimal,
    /// 지정가
    pub price: Option<Decimal>,
    /// 트레일링 가격
    pub price_trailing: Option<Decimal>,
    /// 보조 지정가
    pub price_aux_limit: Option<Decimal>,
    /// 히든 주문 여부
    pub hidden: bool,
    /// postonly 여부
    pub post_only: bool,
    /// 주문 그룹 ID
    pub group_id: Option<i64>,
}

impl NewOrder {
    /// 지정가 주문을 생성합니다.
    pub fn limit(
        client_id: i64,
        symbol: impl Into<String>,
        kind: OrderKind,
        amount: Decimal,
        price: Decimal,
    ) -> Self {
        Self {
            client_id,
            symbol: symbol.into(),
            kind,
            amount,
            price: Some(price),
            price_trailing: None,
            price_aux_limit: None,
            hidden: false,
            post_only: false,
            group_id: None,
        }
    }

    /// 주문 그룹을 지정합니다.
    pub fn with_group(mut self, group_id: i64) -> Self {
        self.group_id = Some(group_id);
        self
    }

    /// 보조 지정가를 지정합니다.
    pub fn with_aux_limit(mut self, price: Decimal) -> Self {
        self.price_aux_limit = Some(price);
        self
    }

    /// 히든 주문으로 설정합니다.
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// postonly 주문으로 설정합니다.
    pub fn post_only(mut self) -> Self {
        self.post_only = true;
        self
    }
}
