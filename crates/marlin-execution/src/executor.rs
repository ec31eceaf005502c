//! 주문 실행기.
//!
//! 제출은 fire-and-forget WebSocket 명령이므로, 실행기는 주문 스토어
//! 콜백으로 확인을 상관시키고 타임아웃/재시도를 감쌉니다. 일시적
//! 거부(잔고 정리 전 재주문 등)는 고정 지연 후 재시도로 흡수합니다.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::oneshot;
use tracing::{debug, error, warn};

use marlin_core::{ExchangeOrder, ExecutionConfig, NewOrder, OrderState};
use marlin_exchange::OrderGateway;

use crate::error::{ExecutionError, ExecutionResult};

/// 제출-확인-재시도 루프를 감싼 주문 실행기.
pub struct OrderExecutor {
    gateway: Arc<dyn OrderGateway>,
    config: ExecutionConfig,
    next_client_id: AtomicI64,
}

impl OrderExecutor {
    /// 실행기를 생성합니다.
    pub fn new(gateway: Arc<dyn OrderGateway>, config: ExecutionConfig) -> Self {
        Self {
            gateway,
            config,
            // 재시작 간 충돌을 피하려 epoch 밀리초에서 시작
            next_client_id: AtomicI64::new(Utc::now().timestamp_millis()),
        }
    }

    /// 게이트웨이 핸들.
    pub fn gateway(&self) -> &Arc<dyn OrderGateway> {
        &self.gateway
    }

    /// 고유 클라이언트 ID를 발급합니다.
    pub fn next_client_id(&self) -> i64 {
        self.next_client_id.fetch_add(1, Ordering::SeqCst)
    }

    /// 주문을 제출하고 거래소 확인을 기다립니다.
    ///
    /// 설정된 횟수만큼 재시도하고, 소진 시 마지막으로 관측한 실패를
    /// 반환합니다.
    pub async fn place_and_confirm(&self, order: NewOrder) -> ExecutionResult<ExchangeOrder> {
        if !self.gateway.is_authenticated() {
            error!(symbol = %order.symbol, "Refusing to place order: not authenticated");
            return Err(ExecutionError::NotAuthenticated);
        }

        let client_id = order.client_id;
        let mut last_error = ExecutionError::ConfirmationTimeout { id: client_id };

        for attempt in 1..=self.config.retries.max(1) {
            // 이전 시도의 타임아웃과 이번 시도의 콜백 등록 사이에 도착한
            // 확인을 놓치지 않도록, 시도마다 스토어를 먼저 확인한다
            if let Some(existing) = self.gateway.orders().by_client_id(client_id) {
                if existing.state != OrderState::Error {
                    debug!(
                        client_id,
                        order_id = existing.order_id,
                        "Order already confirmed in store"
                    );
                    return Ok(existing);
                }
            }

            let (tx, rx) = oneshot::channel::<ExchangeOrder>();
            let gate = Arc::new(Mutex::new(Some(tx)));

            let gate_clone = Arc::clone(&gate);
            let callback_id = self
                .gateway
                .orders()
                .callbacks()
                .register(move |confirmed: ExchangeOrder| {
                    if confirmed.client_id != client_id {
                        return;
                    }
                    if let Some(tx) = gate_clone
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .take()
                    {
                        let _ = tx.send(confirmed);
                    }
                });

            self.gateway.submit_order(&order).await;
            let outcome = tokio::time::timeout(self.config.confirm_timeout(), rx).await;
            self.gateway.orders().callbacks().unregister(callback_id);

            match outcome {
                Ok(Ok(confirmed)) if confirmed.state != OrderState::Error => {
                    debug!(
                        client_id,
                        order_id = confirmed.order_id,
                        attempt,
                        "Order confirmed"
                    );
                    return Ok(confirmed);
                }
                Ok(Ok(confirmed)) => {
                    warn!(client_id, attempt, "Exchange rejected order");
                    last_error = ExecutionError::OrderFailed {
                        id: client_id,
                        reason: format!(
                            "order {} entered error state",
                            confirmed.order_id
                        ),
                    };
                }
                Ok(Err(_)) | Err(_) => {
                    warn!(client_id, attempt, "No order confirmation within deadline");
                    last_error = ExecutionError::ConfirmationTimeout { id: client_id };
                }
            }

            if attempt < self.config.retries {
                tokio::time::sleep(self.config.retry_delay()).await;
            }
        }

        Err(last_error)
    }

    /// 주문 취소를 요청하고 취소 확인을 기다립니다.
    pub async fn cancel_and_confirm(&self, order_id: i64) -> ExecutionResult<()> {
        if !self.gateway.is_authenticated() {
            error!(order_id, "Refusing to cancel order: not authenticated");
            return Err(ExecutionError::NotAuthenticated);
        }

        let mut last_error = ExecutionError::CancelFailed { id: order_id };

        for attempt in 1..=self.config.retries.max(1) {
            // 스토어에 없는 주문은 이미 종결된 것으로 본다. 시도 사이에
            // 도착한 취소 확인도 이 검사로 수습된다
            if self.gateway.orders().get(order_id).is_none() {
                debug!(order_id, "Order already gone, cancel is a no-op");
                return Ok(());
            }

            let (tx, rx) = oneshot::channel::<()>();
            let gate = Arc::new(Mutex::new(Some(tx)));

            let gate_clone = Arc::clone(&gate);
            let callback_id = self
                .gateway
                .orders()
                .callbacks()
                .register(move |confirmed: ExchangeOrder| {
                    if confirmed.order_id != order_id || !confirmed.state.is_canceled() {
                        return;
                    }
                    if let Some(tx) = gate_clone
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .take()
                    {
                        let _ = tx.send(());
                    }
                });

            self.gateway.cancel_order(order_id).await;
            let outcome = tokio::time::timeout(self.config.confirm_timeout(), rx).await;
            self.gateway.orders().callbacks().unregister(callback_id);

            if matches!(outcome, Ok(Ok(()))) {
                debug!(order_id, attempt, "Cancel confirmed");
                return Ok(());
            }
            warn!(order_id, attempt, "No cancel confirmation within deadline");
            last_error = ExecutionError::CancelFailed { id: order_id };

            if attempt < self.config.retries {
                tokio::time::sleep(self.config.retry_delay()).await;
            }
        }

        Err(last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use marlin_core::OrderKind;
    use marlin_exchange::{OrderStore, PositionStore, WalletStore};
    use rust_decimal_macros::dec;
    use std::time::Duration;

    /// 제출/취소를 기록만 하는 게이트웨이. 확인은 테스트가 직접
    /// 스토어에 주입한다.
    struct MockGateway {
        authenticated: bool,
        orders: OrderStore,
        positions: PositionStore,
        wallets: WalletStore,
        submitted: Mutex<Vec<NewOrder>>,
        canceled: Mutex<Vec<i64>>,
    }

    impl MockGateway {
        fn new(authenticated: bool) -> Self {
            Self {
                authenticated,
                orders: OrderStore::new(),
                positions: PositionStore::new(),
                wallets: WalletStore::new(),
                submitted: Mutex::new(Vec::new()),
                canceled: Mutex::new(Vec::new()),
            }
        }

        fn submitted_count(&self) -> usize {
            self.submitted.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl OrderGateway for MockGateway {
        fn is_authenticated(&self) -> bool {
            self.authenticated
        }

        async fn submit_order(&self, order: &NewOrder) {
            self.submitted.lock().unwrap().push(order.clone());
        }

        async fn cancel_order(&self, order_id: i64) {
            self.canceled.lock().unwrap().push(order_id);
        }

        fn orders(&self) -> &OrderStore {
            &self.orders
        }

        fn wallets(&self) -> &WalletStore {
            &self.wallets
        }

        fn positions(&self) -> &PositionStore {
            &self.positions
        }
    }

    fn confirmation(order_id: i64, client_id: i64, state: OrderState) -> ExchangeOrder {
        ExchangeOrder {
            order_id,
            group_id: None,
            client_id,
            symbol: "tBTCUSD".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            amount: dec!(0.09),
            amount_orig: dec!(0.09),
            order_type: "EXCHANGE LIMIT".to_string(),
            state,
            price: Some(dec!(10000)),
            avg_price: None,
            trailing_price: None,
            aux_limit_price: None,
            notify: false,
            hidden: false,
        }
    }

    fn fast_config(retries: u32) -> ExecutionConfig {
        ExecutionConfig {
            confirm_timeout_secs: 1,
            retries,
            retry_delay_ms: 10,
        }
    }

    fn sample_order(client_id: i64) -> NewOrder {
        NewOrder::limit(client_id, "tBTCUSD", OrderKind::ExchangeLimit, dec!(0.09), dec!(10000))
    }

    #[tokio::test]
    async fn test_refuses_when_not_authenticated() {
        let gateway = Arc::new(MockGateway::new(false));
        let executor = OrderExecutor::new(gateway.clone(), fast_config(3));

        let result = executor.place_and_confirm(sample_order(1)).await;

        assert_eq!(result, Err(ExecutionError::NotAuthenticated));
        assert_eq!(gateway.submitted_count(), 0);
    }

    #[tokio::test]
    async fn test_place_confirms_on_matching_client_id() {
        let gateway = Arc::new(MockGateway::new(true));
        let executor = OrderExecutor::new(gateway.clone(), fast_config(3));

        let confirming = gateway.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            // 다른 클라이언트 ID는 무시되어야 한다
            confirming.orders.apply(confirmation(99, 999, OrderState::Active));
            confirming.orders.apply(confirmation(1234, 42, OrderState::Active));
        });

        let confirmed = executor.place_and_confirm(sample_order(42)).await.unwrap();

        assert_eq!(confirmed.order_id, 1234);
        assert_eq!(gateway.submitted_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_bound_and_last_failure() {
        let gateway = Arc::new(MockGateway::new(true));
        let executor = OrderExecutor::new(gateway.clone(), fast_config(2));

        let result = executor.place_and_confirm(sample_order(7)).await;

        assert_eq!(result, Err(ExecutionError::ConfirmationTimeout { id: 7 }));
        assert_eq!(gateway.submitted_count(), 2);
    }

    #[tokio::test]
    async fn test_error_state_surfaces_order_failed() {
        let gateway = Arc::new(MockGateway::new(true));
        let executor = OrderExecutor::new(gateway.clone(), fast_config(1));

        let confirming = gateway.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            confirming.orders.apply(confirmation(1234, 7, OrderState::Error));
        });

        let result = executor.place_and_confirm(sample_order(7)).await;

        assert!(matches!(
            result,
            Err(ExecutionError::OrderFailed { id: 7, .. })
        ));
    }

    #[tokio::test]
    async fn test_cancel_confirms_on_canceled_state() {
        let gateway = Arc::new(MockGateway::new(true));
        gateway.orders.apply(confirmation(1234, 42, OrderState::Active));
        let executor = OrderExecutor::new(gateway.clone(), fast_config(3));

        let confirming = gateway.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            confirming.orders.apply(confirmation(1234, 42, OrderState::Canceled));
        });

        executor.cancel_and_confirm(1234).await.unwrap();
        assert_eq!(gateway.canceled.lock().unwrap().as_slice(), &[1234]);
    }

    #[tokio::test]
    async fn test_cancel_of_unknown_order_is_noop() {
        let gateway = Arc::new(MockGateway::new(true));
        let executor = OrderExecutor::new(gateway.clone(), fast_config(3));

        executor.cancel_and_confirm(555).await.unwrap();
        assert!(gateway.canceled.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_confirmation_between_attempts_is_recovered() {
        let gateway = Arc::new(MockGateway::new(true));
        gateway.orders.apply(confirmation(1234, 42, OrderState::Active));
        let config = ExecutionConfig {
            confirm_timeout_secs: 1,
            retries: 2,
            retry_delay_ms: 1000,
        };
        let executor = OrderExecutor::new(gateway.clone(), config);

        // 1차 시도 타임아웃(1초)과 2차 시도 시작(2초) 사이에 확인 도착
        let confirming = gateway.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            confirming.orders.apply(confirmation(1234, 42, OrderState::Canceled));
        });

        executor.cancel_and_confirm(1234).await.unwrap();
        assert_eq!(gateway.canceled.lock().unwrap().as_slice(), &[1234]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_place_confirmation_between_attempts_is_recovered() {
        let gateway = Arc::new(MockGateway::new(true));
        let config = ExecutionConfig {
            confirm_timeout_secs: 1,
            retries: 2,
            retry_delay_ms: 1000,
        };
        let executor = OrderExecutor::new(gateway.clone(), config);

        let confirming = gateway.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            confirming.orders.apply(confirmation(1234, 7, OrderState::Active));
        });

        let confirmed = executor.place_and_confirm(sample_order(7)).await.unwrap();

        assert_eq!(confirmed.order_id, 1234);
        // 이미 확인된 주문을 같은 클라이언트 ID로 다시 제출하면 안 된다
        assert_eq!(gateway.submitted_count(), 1);
    }

    #[tokio::test]
    async fn test_client_ids_are_monotonic() {
        let gateway = Arc::new(MockGateway::new(true));
        let executor = OrderExecutor::new(gateway, fast_config(1));

        let a = executor.next_client_id();
        let b = executor.next_client_id();
        assert!(b > a);
    }
}
