//! 하트비트 기반 liveness 감시와 자동 재연결.
//!
//! 주기적으로 연결 건강 상태를 점검하고, 죽었다고 판단되면 속도 제한
//! 게이트를 통과한 뒤 재연결을 수행합니다. 점검 순서:
//!
//! 1. 소켓이 끊겨 있으면 즉시 재연결
//! 2. 한동안 송신이 없었으면 keep-alive ping
//! 3. 특정 심볼 시세가 오래 끊겼으면 재연결 (채널만 죽는 경우)
//! 4. 전역 하트비트가 만료되면 재연결

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use marlin_core::{HeartbeatConfig, ReconnectConfig};

use crate::error::ExchangeResult;
use crate::rate_gate::ReconnectGate;

use super::client::BitfinexClient;

/// 연결 감시자.
pub struct HeartbeatMonitor {
    client: Arc<BitfinexClient>,
    gate: ReconnectGate,
    config: HeartbeatConfig,
    /// 재연결 진행 중 점검 억제 플래그.
    suspended: AtomicBool,
}

impl HeartbeatMonitor {
    /// 감시자를 생성합니다.
    pub fn new(
        client: Arc<BitfinexClient>,
        heartbeat: HeartbeatConfig,
        reconnect: &ReconnectConfig,
    ) -> ExchangeResult<Self> {
        let gate = ReconnectGate::new(
            reconnect.max_events,
            Duration::from_secs(reconnect.window_secs),
        )?;
        Ok(Self {
            client,
            gate,
            config: heartbeat,
            suspended: AtomicBool::new(false),
        })
    }

    /// 감시 루프를 실행합니다. 태스크로 spawn해서 사용합니다.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(
            poll_secs = self.config.poll_secs,
            connection_timeout_secs = self.config.connection_timeout_secs,
            "Heartbeat monitor started"
        );
        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }

    /// 점검 한 사이클을 수행합니다.
    pub async fn tick(&self) {
        if self.suspended.load(Ordering::SeqCst) {
            return;
        }
        let now = Utc::now();

        if !self.client.is_connected() {
            warn!("Connection is down");
            self.trigger_reconnect().await;
            return;
        }

        let quiet = now - self.client.last_sent();
        if quiet.to_std().unwrap_or_default() >= self.config.heartbeat_interval() {
            debug!("Sending keep-alive ping");
            self.client.ping().await;
        }

        let stale = stale_symbols(&self.client.ticker_seen(), now, self.config.ticker_timeout());
        if !stale.is_empty() {
            warn!(symbols = ?stale, "Ticker feeds went stale");
            self.trigger_reconnect().await;
            return;
        }

        let silence = now - self.client.last_heartbeat();
        if silence.to_std().unwrap_or_default() > self.config.connection_timeout() {
            warn!(
                silence_secs = silence.num_seconds(),
                "Connection heartbeat expired"
            );
            self.trigger_reconnect().await;
        }
    }

    /// 속도 제한 게이트를 통과한 뒤 재연결을 수행합니다.
    ///
    /// 실패하면 연결은 끊긴 상태로 남고 다음 점검 사이클이 재시도합니다.
    async fn trigger_reconnect(&self) {
        self.suspended.store(true, Ordering::SeqCst);

        self.client.disconnect().await;
        if self.gate.wait_for_slot().await {
            debug!("Reconnect was rate limited before proceeding");
        }
        self.gate.record_event();

        if let Err(e) = self.client.reconnect().await {
            warn!(error = %e, "Reconnect attempt failed");
        }

        self.suspended.store(false, Ordering::SeqCst);
    }
}

/// 시세 수신이 임계치를 넘겨 끊긴 심볼을 찾습니다.
fn stale_symbols(
    seen: &HashMap<String, DateTime<Utc>>,
    now: DateTime<Utc>,
    timeout: Duration,
) -> Vec<String> {
    let mut stale: Vec<String> = seen
        .iter()
        .filter(|(_, last)| {
            (now - **last).to_std().unwrap_or_default() > timeout
        })
        .map(|(symbol, _)| symbol.clone())
        .collect();
    stale.sort();
    stale
}
