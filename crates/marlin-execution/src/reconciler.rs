//! 포트폴리오 리컨실리에이션 엔진.
//!
//! 목표 진입/청산 집합과 거래소의 실제 주문·포지션을 비교해 차이를
//! 취소/재주문으로 수렴시킵니다. 사이클은 멱등합니다: 실상태가 목표와
//! 일치하면 아무 명령도 내지 않습니다. 개별 주문 실패는 사이클을 멈추지
//! 않고, 남은 차이는 다음 사이클이 다시 시도합니다.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use marlin_core::{
    DesiredEntry, DesiredExit, ExchangeOrder, NewOrder, OrderKind, PortfolioConfig, WalletKind,
    WalletMode,
};
use marlin_exchange::OrderGateway;

use crate::executor::OrderExecutor;

/// 기준 통화.
const QUOTE_CURRENCY: &str = "USD";

/// 한 사이클의 행동 요약.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    /// 제출한 주문 수
    pub placed: usize,
    /// 취소한 주문 수
    pub canceled: usize,
    /// 최소 주문 금액 미달 등으로 건너뛴 목표 수
    pub skipped: usize,
}

impl ReconcileReport {
    /// 사이클이 아무 명령도 내지 않았는지 여부.
    pub fn is_noop(&self) -> bool {
        self.placed == 0 && self.canceled == 0
    }
}

/// 목표 포트폴리오와 실상태의 차이를 수렴시키는 엔진.
pub struct PortfolioReconciler {
    gateway: Arc<dyn OrderGateway>,
    executor: OrderExecutor,
    config: PortfolioConfig,
}

impl PortfolioReconciler {
    /// 엔진을 생성합니다.
    pub fn new(
        gateway: Arc<dyn OrderGateway>,
        executor: OrderExecutor,
        config: PortfolioConfig,
    ) -> Self {
        Self {
            gateway,
            executor,
            config,
        }
    }

    /// 리컨실리에이션 한 사이클을 수행합니다.
    pub async fn reconcile(
        &self,
        entries: &[DesiredEntry],
        exits: &[DesiredExit],
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        // 마진은 진입+청산 모두 자본을 점유하고, 현물 청산 자금은
        // 포지션 자체가 들고 있으므로 진입만 센다
        let denominator = match self.config.wallet_mode {
            WalletMode::Margin => entries.len() + exits.len(),
            WalletMode::Spot => entries.len(),
        };

        self.reconcile_entries(entries, denominator, &mut report)
            .await;
        self.reconcile_exits(exits, &mut report).await;

        info!(
            placed = report.placed,
            canceled = report.canceled,
            skipped = report.skipped,
            "Reconcile cycle finished"
        );
        report
    }

    async fn reconcile_entries(
        &self,
        entries: &[DesiredEntry],
        denominator: usize,
        report: &mut ReconcileReport,
    ) {
        let desired: HashMap<&str, &DesiredEntry> =
            entries.iter().map(|e| (e.symbol.as_str(), e)).collect();

        // 목표에서 빠진 심볼의 진입 주문 정리
        for order in self.live_orders(|o| o.is_buy()) {
            if !desired.contains_key(order.symbol.as_str()) {
                debug!(symbol = %order.symbol, order_id = order.order_id, "Entry no longer desired");
                self.cancel(order.order_id, report).await;
            }
        }

        for entry in entries {
            let Some(capital) = self.capital_per_position(denominator) else {
                report.skipped += 1;
                continue;
            };
            if capital < self.config.min_order_usd {
                debug!(
                    symbol = %entry.symbol,
                    capital = %capital,
                    "Per-position capital below minimum, skipping entry"
                );
                report.skipped += 1;
                continue;
            }
            if entry.price <= Decimal::ZERO {
                warn!(symbol = %entry.symbol, price = %entry.price, "Invalid entry price");
                report.skipped += 1;
                continue;
            }

            let size = (capital / entry.price).round_dp(self.config.size_precision);
            if size.is_zero() {
                report.skipped += 1;
                continue;
            }

            // 결정마다 스토어를 다시 읽는다; 직전 행동의 성공을 가정하지 않는다
            let live = self.live_orders(|o| o.is_buy() && o.symbol == entry.symbol);

            // 중복 진입 주문은 전부 취소하고 다음 사이클이 다시 건다
            if live.len() > 1 {
                warn!(symbol = %entry.symbol, count = live.len(), "Duplicate entry orders");
                for order in live {
                    self.cancel(order.order_id, report).await;
                }
                continue;
            }

            if let Some(order) = live.into_iter().next() {
                if order.price == Some(entry.price) && order.amount == size {
                    continue;
                }
                debug!(
                    symbol = %entry.symbol,
                    order_id = order.order_id,
                    "Entry order diverged from target"
                );
                self.cancel(order.order_id, report).await;
            }

            let order = NewOrder::limit(
                self.executor.next_client_id(),
                entry.symbol.clone(),
                self.order_kind(),
                size,
                entry.price,
            );
            self.place(order, report).await;
        }
    }

    async fn reconcile_exits(&self, exits: &[DesiredExit], report: &mut ReconcileReport) {
        let desired: HashMap<&str, &DesiredExit> =
            exits.iter().map(|e| (e.symbol.as_str(), e)).collect();

        // 목표에서 빠진 심볼의 청산 주문 정리
        for order in self.live_orders(|o| o.is_sell()) {
            if !desired.contains_key(order.symbol.as_str()) {
                debug!(symbol = %order.symbol, order_id = order.order_id, "Exit no longer desired");
                self.cancel(order.order_id, report).await;
            }
        }

        for exit in exits {
            let live = self.live_orders(|o| o.is_sell() && o.symbol == exit.symbol);

            // 중복 청산 주문은 전부 취소하고 다음 사이클이 다시 건다
            if live.len() > 1 {
                warn!(symbol = %exit.symbol, count = live.len(), "Duplicate exit orders");
                for order in live {
                    self.cancel(order.order_id, report).await;
                }
                continue;
            }

            if let Some(order) = live.into_iter().next() {
                // 목표보다 낮은 가격의 청산만 교체한다
                if order.price.map_or(false, |p| p < exit.price) {
                    debug!(
                        symbol = %exit.symbol,
                        order_id = order.order_id,
                        "Exit price below new target"
                    );
                    self.cancel(order.order_id, report).await;
                } else {
                    continue;
                }
            }

            let Some(position) = self.gateway.positions().get(&exit.symbol) else {
                debug!(symbol = %exit.symbol, "No position to exit");
                continue;
            };
            if !position.is_active() || position.amount.is_zero() {
                continue;
            }

            // 전량 청산: 포지션 수량의 부호 반전
            let order = NewOrder::limit(
                self.executor.next_client_id(),
                exit.symbol.clone(),
                self.order_kind(),
                -position.amount,
                exit.price,
            );
            self.place(order, report).await;
        }
    }

    fn live_orders(&self, filter: impl Fn(&ExchangeOrder) -> bool) -> Vec<ExchangeOrder> {
        self.gateway
            .orders()
            .snapshot()
            .into_iter()
            .filter(|o| filter(o))
            .collect()
    }

    /// 포지션당 배분 자본 (잔고 × 투자 비율 / 분모).
    fn capital_per_position(&self, denominator: usize) -> Option<Decimal> {
        if denominator == 0 {
            return None;
        }
        let balance = self
            .gateway
            .wallets()
            .balance(self.wallet_kind(), QUOTE_CURRENCY)?;
        Some(balance * self.config.investment_rate / Decimal::from(denominator))
    }

    fn wallet_kind(&self) -> WalletKind {
        match self.config.wallet_mode {
            WalletMode::Margin => WalletKind::Margin,
            WalletMode::Spot => WalletKind::Exchange,
        }
    }

    fn order_kind(&self) -> OrderKind {
        match self.config.wallet_mode {
            WalletMode::Margin => OrderKind::Limit,
            WalletMode::Spot => OrderKind::ExchangeLimit,
        }
    }

    async fn cancel(&self, order_id: i64, report: &mut ReconcileReport) {
        match self.executor.cancel_and_confirm(order_id).await {
            Ok(()) => report.canceled += 1,
            Err(e) => warn!(order_id, error = %e, "Cancel failed, will retry next cycle"),
        }
    }

    async fn place(&self, order: NewOrder, report: &mut ReconcileReport) {
        let symbol = order.symbol.clone();
        match self.executor.place_and_confirm(order).await {
            Ok(confirmed) => {
                debug!(symbol = %symbol, order_id = confirmed.order_id, "Order placed");
                report.placed += 1;
            }
            Err(e) => warn!(symbol = %symbol, error = %e, "Placement failed, will retry next cycle"),
        }
    }
}
