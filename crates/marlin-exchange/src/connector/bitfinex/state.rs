//! 인증 컨트롤 채널이 밀어주는 주문/포지션/지갑의 로컬 미러와
//! 데이터 채널 이벤트 타입.
//!
//! 각 스토어는 스냅샷으로 초기화되고 이후 증분 업데이트를 통째로
//! 교체 적용합니다. 주문이 몇 번 갱신되든 스토어에는 주문당
//! 최신 레코드 하나만 남습니다.

use std::collections::HashMap;
use std::sync::Mutex;

use rust_decimal::Decimal;

use marlin_core::{Candle, ExchangeOrder, Position, Timeframe, Wallet, WalletKind};

use crate::callback::CallbackRegistry;

/// 티커 체결가 이벤트.
#[derive(Debug, Clone, PartialEq)]
pub struct TickerUpdate {
    /// 심볼
    pub symbol: String,
    /// 최종 체결가
    pub price: Decimal,
}

/// 캔들 이벤트 (스냅샷 리플레이 시 캔들당 한 번씩 발행).
#[derive(Debug, Clone, PartialEq)]
pub struct CandleUpdate {
    /// 심볼
    pub symbol: String,
    /// 타임프레임
    pub timeframe: Timeframe,
    /// 캔들
    pub candle: Candle,
}

/// 활성 주문 미러.
///
/// 취소/종결 상태로 전이한 주문은 구독자에게 최종 레코드를 알린 뒤
/// 맵에서 제거합니다.
pub struct OrderStore {
    orders: Mutex<HashMap<i64, ExchangeOrder>>,
    callbacks: CallbackRegistry<ExchangeOrder>,
}

impl OrderStore {
    /// 빈 스토어를 생성합니다.
    pub fn new() -> Self {
        Self {
            orders: Mutex::new(HashMap::new()),
            callbacks: CallbackRegistry::default(),
        }
    }

    /// 주문 이벤트 콜백 레지스트리.
    pub fn callbacks(&self) -> &CallbackRegistry<ExchangeOrder> {
        &self.callbacks
    }

    /// 스냅샷으로 전체 맵을 교체합니다.
    pub fn apply_snapshot(&self, orders: Vec<ExchangeOrder>) {
        let mut map = self.orders.lock().unwrap_or_else(|e| e.into_inner());
        map.clear();
        for order in orders {
            if !order.state.is_canceled() {
                map.insert(order.order_id, order);
            }
        }
    }

    /// 증분 업데이트를 적용하고 구독자에게 알립니다.
    pub fn apply(&self, order: ExchangeOrder) {
        {
            let mut map = self.orders.lock().unwrap_or_else(|e| e.into_inner());
            if order.state.is_canceled() {
                map.remove(&order.order_id);
            } else {
                map.insert(order.order_id, order.clone());
            }
        }
        // 제거된 주문도 최종 레코드는 전달한다
        self.callbacks.notify(order);
    }

    /// 주문 ID로 조회합니다.
    pub fn get(&self, order_id: i64) -> Option<ExchangeOrder> {
        self.orders
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&order_id)
            .cloned()
    }

    /// 클라이언트 ID로 조회합니다.
    pub fn by_client_id(&self, client_id: i64) -> Option<ExchangeOrder> {
        self.orders
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .find(|o| o.client_id == client_id)
            .cloned()
    }

    /// 현재 활성 주문들의 복사본.
    pub fn snapshot(&self) -> Vec<ExchangeOrder> {
        self.orders
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }

    /// 활성 주문 수.
    pub fn len(&self) -> usize {
        self.orders.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// 비어 있는지 여부.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 재연결 전 로컬 상태를 비웁니다.
    pub fn clear(&self) {
        self.orders
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

impl Default for OrderStore {
    fn default() -> Self {
        Self::new()
    }
}

/// 포지션 미러 (심볼 단위).
pub struct PositionStore {
    positions: Mutex<HashMap<String, Position>>,
}

impl PositionStore {
    /// 빈 스토어를 생성합니다.
    pub fn new() -> Self {
        Self {
            positions: Mutex::new(HashMap::new()),
        }
    }

    /// 스냅샷으로 전체 맵을 교체합니다.
    pub fn apply_snapshot(&self, positions: Vec<Position>) {
        let mut map = self.positions.lock().unwrap_or_else(|e| e.into_inner());
        map.clear();
        for position in positions {
            map.insert(position.symbol.clone(), position);
        }
    }

    /// 증분 업데이트를 적용합니다.
    pub fn apply(&self, position: Position) {
        self.positions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(position.symbol.clone(), position);
    }

    /// 포지션 종료를 적용합니다.
    pub fn close(&self, symbol: &str) {
        self.positions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(symbol);
    }

    /// 심볼로 조회합니다.
    pub fn get(&self, symbol: &str) -> Option<Position> {
        self.positions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(symbol)
            .cloned()
    }

    /// 현재 포지션들의 복사본.
    pub fn snapshot(&self) -> Vec<Position> {
        self.positions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }

    /// 재연결 전 로컬 상태를 비웁니다.
    pub fn clear(&self) {
        self.positions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

impl Default for PositionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// 지갑 미러 ((종류, 통화) 단위).
pub struct WalletStore {
    wallets: Mutex<HashMap<(WalletKind, String), Wallet>>,
}

impl WalletStore {
    /// 빈 스토어를 생성합니다.
    pub fn new() -> Self {
        Self {
            wallets: Mutex::new(HashMap::new()),
        }
    }

    /// 스냅샷으로 전체 맵을 교체합니다.
    pub fn apply_snapshot(&self, wallets: Vec<Wallet>) {
        let mut map = self.wallets.lock().unwrap_or_else(|e| e.into_inner());
        map.clear();
        for wallet in wallets {
            map.insert((wallet.kind, wallet.currency.clone()), wallet);
        }
    }

    /// 증분 업데이트를 적용합니다.
    pub fn apply(&self, wallet: Wallet) {
        self.wallets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert((wallet.kind, wallet.currency.clone()), wallet);
    }

    /// 잔고를 조회합니다.
    pub fn balance(&self, kind: WalletKind, currency: &str) -> Option<Decimal> {
        self.wallets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(kind, currency.to_string()))
            .map(|w| w.balance)
    }

    /// 현재 지갑들의 복사본.
    pub fn snapshot(&self) -> Vec<Wallet> {
        self.wallets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }

    /// 재연결 전 로컬 상태를 비웁니다.
    pub fn clear(&self) {
        self.wallets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

impl Default for WalletStore {
    fn default() -> Self {
        Self::new()
    }
}
