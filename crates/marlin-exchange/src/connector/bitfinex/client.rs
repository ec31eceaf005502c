//! Bitfinex WebSocket 클라이언트.
//!
//! 연결 수립, 인증 핸드셰이크, 인바운드 프레임 라우팅, 구독 복원을
//! 담당합니다. 소켓 리더는 별도 태스크로 돌고 모든 상태 변경은
//! `dispatch`를 단일 진입점으로 통과합니다.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use secrecy::SecretString;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_tungstenite::{
    connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, error, info, trace, warn};

use marlin_core::{AppConfig, NewOrder, Timeframe};

use crate::callback::CallbackRegistry;
use crate::error::{ExchangeError, ExchangeResult};
use crate::traits::OrderGateway;

use super::channels::ChannelRegistry;
use super::codec::{self, Command, ControlMessage, Event, Frame};
use super::state::{CandleUpdate, OrderStore, PositionStore, TickerUpdate, WalletStore};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// 인증 응답 대기 한도.
const AUTH_TIMEOUT: Duration = Duration::from_secs(10);
/// 스냅샷 게이트 대기 한도.
const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(10);
/// 재구독 확인 폴링 주기.
const RESUBSCRIBE_POLL: Duration = Duration::from_millis(200);

/// 클라이언트 연결 설정.
#[derive(Clone)]
pub struct BitfinexConfig {
    /// WebSocket 엔드포인트
    pub ws_url: String,
    /// API 키
    pub api_key: Option<String>,
    /// API 시크릿
    pub api_secret: Option<SecretString>,
    /// 재구독 확인 폴링 횟수
    pub resubscribe_attempts: u32,
}

impl BitfinexConfig {
    /// 애플리케이션 설정에서 연결 설정을 구성합니다.
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            ws_url: config.exchange.ws_url.clone(),
            api_key: config.exchange.api_key.clone(),
            api_secret: config
                .exchange
                .api_secret
                .clone()
                .map(SecretString::from),
            resubscribe_attempts: config.reconnect.resubscribe_attempts,
        }
    }

    /// 인증 자격증명이 구성되어 있는지 확인합니다.
    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some() && self.api_secret.is_some()
    }
}

impl std::fmt::Debug for BitfinexConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitfinexConfig")
            .field("ws_url", &self.ws_url)
            .field("api_key", &self.api_key.as_deref().map(|_| "***"))
            .field("api_secret", &self.api_secret.as_ref().map(|_| "***"))
            .field("resubscribe_attempts", &self.resubscribe_attempts)
            .finish()
    }
}

/// 연결 수명주기 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// 연결 안 됨
    Disconnected,
    /// 소켓 연결 중
    Connecting,
    /// 소켓 연결됨 (미인증)
    Connected,
    /// 인증 핸드셰이크 진행 중
    Authenticating,
    /// 계정 스냅샷 대기 중
    AwaitingSnapshots,
    /// 운용 준비 완료
    Ready,
}

/// Bitfinex v2 WebSocket 클라이언트.
pub struct BitfinexClient {
    config: BitfinexConfig,
    state: RwLock<ConnectionState>,
    writer: tokio::sync::Mutex<Option<WsSink>>,
    /// 리더 태스크 세대. 증가하면 이전 리더는 스스로 종료한다.
    generation: AtomicU64,

    channels: ChannelRegistry,
    orders: OrderStore,
    positions: PositionStore,
    wallets: WalletStore,

    auth_gate: Mutex<Option<oneshot::Sender<bool>>>,
    order_snapshot_gate: Mutex<Option<oneshot::Sender<()>>>,
    position_snapshot_gate: Mutex<Option<oneshot::Sender<()>>>,
    wallet_snapshot_gate: Mutex<Option<oneshot::Sender<()>>>,

    last_heartbeat: RwLock<DateTime<Utc>>,
    last_sent: RwLock<DateTime<Utc>>,
    ticker_seen: RwLock<HashMap<String, DateTime<Utc>>>,

    ticks: CallbackRegistry<TickerUpdate>,
    candles: CallbackRegistry<CandleUpdate>,
}

impl BitfinexClient {
    /// 클라이언트를 생성합니다. `connect` 전까지 네트워크를 만지지 않습니다.
    pub fn new(config: BitfinexConfig) -> Self {
        Self {
            config,
            state: RwLock::new(ConnectionState::Disconnected),
            writer: tokio::sync::Mutex::new(None),
            generation: AtomicU64::new(0),
            channels: ChannelRegistry::new(),
            orders: OrderStore::new(),
            positions: PositionStore::new(),
            wallets: WalletStore::new(),
            auth_gate: Mutex::new(None),
            order_snapshot_gate: Mutex::new(None),
            position_snapshot_gate: Mutex::new(None),
            wallet_snapshot_gate: Mutex::new(None),
            last_heartbeat: RwLock::new(Utc::now()),
            last_sent: RwLock::new(Utc::now()),
            ticker_seen: RwLock::new(HashMap::new()),
            ticks: CallbackRegistry::default(),
            candles: CallbackRegistry::default(),
        }
    }

    /// 현재 연결 상태.
    pub fn state(&self) -> ConnectionState {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// 소켓이 살아 있는지 여부.
    pub fn is_connected(&self) -> bool {
        !matches!(
            self.state(),
            ConnectionState::Disconnected | ConnectionState::Connecting
        )
    }

    /// 채널 레지스트리.
    pub fn channels(&self) -> &ChannelRegistry {
        &self.channels
    }

    /// 티커 이벤트 콜백 레지스트리.
    pub fn ticks(&self) -> &CallbackRegistry<TickerUpdate> {
        &self.ticks
    }

    /// 캔들 이벤트 콜백 레지스트리.
    pub fn candle_updates(&self) -> &CallbackRegistry<CandleUpdate> {
        &self.candles
    }

    /// 마지막 인바운드 프레임 시각.
    pub fn last_heartbeat(&self) -> DateTime<Utc> {
        *self
            .last_heartbeat
            .read()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// 마지막 송신 시각.
    pub fn last_sent(&self) -> DateTime<Utc> {
        *self.last_sent.read().unwrap_or_else(|e| e.into_inner())
    }

    /// 심볼별 마지막 시세 수신 시각의 복사본.
    pub fn ticker_seen(&self) -> HashMap<String, DateTime<Utc>> {
        self.ticker_seen
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// 소켓을 연결하고 (자격증명이 있으면) 인증한 뒤 스냅샷을 기다립니다.
    ///
    /// 인증 실패는 에러지만 스냅샷 타임아웃은 경고로 강등됩니다.
    /// 스토어는 이후 증분 업데이트로 수렴합니다.
    pub async fn connect(self: &Arc<Self>) -> ExchangeResult<()> {
        self.set_state(ConnectionState::Connecting);
        info!(url = %self.config.ws_url, "Connecting to exchange WebSocket");

        let (ws_stream, _) = match connect_async(&self.config.ws_url).await {
            Ok(pair) => pair,
            Err(e) => {
                self.set_state(ConnectionState::Disconnected);
                return Err(ExchangeError::NetworkError(e.to_string()));
            }
        };
        let (sink, mut stream) = ws_stream.split();

        *self.writer.lock().await = Some(sink);
        *self
            .last_heartbeat
            .write()
            .unwrap_or_else(|e| e.into_inner()) = Utc::now();

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let client = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                if client.generation.load(Ordering::SeqCst) != generation {
                    debug!(generation, "Reader superseded, exiting");
                    return;
                }
                match message {
                    Ok(Message::Text(text)) => {
                        if let Err(e) = client.dispatch(&text).await {
                            warn!(error = %e, "Failed to handle inbound frame");
                        }
                    }
                    Ok(Message::Ping(data)) => {
                        let mut writer = client.writer.lock().await;
                        if let Some(sink) = writer.as_mut() {
                            let _ = sink.send(Message::Pong(data)).await;
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        info!(?frame, "Server closed connection");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(error = %e, "WebSocket read error");
                        break;
                    }
                }
            }
            // 현재 세대의 리더가 끝났다면 연결이 죽은 것
            if client.generation.load(Ordering::SeqCst) == generation {
                client.set_state(ConnectionState::Disconnected);
                warn!("WebSocket reader terminated");
            }
        });

        self.set_state(ConnectionState::Connected);

        if self.config.has_credentials() {
            // 인증 실패 시 리더와 상태를 정리하고 나간다
            if let Err(e) = self.authenticate().await {
                self.disconnect().await;
                return Err(e);
            }
            self.await_snapshots().await;
        }
        self.set_state(ConnectionState::Ready);
        info!("Exchange connection ready");
        Ok(())
    }

    async fn authenticate(&self) -> ExchangeResult<()> {
        let (api_key, api_secret) = match (&self.config.api_key, &self.config.api_secret) {
            (Some(key), Some(secret)) => (key, secret),
            _ => return Ok(()),
        };

        self.set_state(ConnectionState::Authenticating);
        let (tx, rx) = oneshot::channel();
        *self.auth_gate.lock().unwrap_or_else(|e| e.into_inner()) = Some(tx);

        self.try_send_command(codec::auth_command(api_key, api_secret))
            .await?;

        match tokio::time::timeout(AUTH_TIMEOUT, rx).await {
            Ok(Ok(true)) => {
                info!("Authentication succeeded");
                Ok(())
            }
            Ok(Ok(false)) => Err(ExchangeError::Unauthorized(
                "authentication rejected by exchange".to_string(),
            )),
            // 응답 부재도 인증 실패다; 재시도해봐야 같은 자격증명이다
            Ok(Err(_)) | Err(_) => Err(ExchangeError::Unauthorized(
                "no auth response within deadline".to_string(),
            )),
        }
    }

    async fn await_snapshots(&self) {
        self.set_state(ConnectionState::AwaitingSnapshots);

        let gates: [(&str, &Mutex<Option<oneshot::Sender<()>>>); 3] = [
            ("orders", &self.order_snapshot_gate),
            ("positions", &self.position_snapshot_gate),
            ("wallets", &self.wallet_snapshot_gate),
        ];

        for (name, gate) in gates {
            let (tx, rx) = oneshot::channel();
            *gate.lock().unwrap_or_else(|e| e.into_inner()) = Some(tx);

            match tokio::time::timeout(SNAPSHOT_TIMEOUT, rx).await {
                Ok(Ok(())) => debug!(snapshot = name, "Snapshot received"),
                _ => warn!(snapshot = name, "Snapshot not received within deadline"),
            }
        }
    }

    /// 인바운드 텍스트 프레임을 처리합니다.
    ///
    /// 모든 프레임은 종류와 무관하게 전역 하트비트를 갱신합니다.
    pub async fn dispatch(&self, text: &str) -> ExchangeResult<()> {
        let frame = codec::parse_frame(text)?;
        *self
            .last_heartbeat
            .write()
            .unwrap_or_else(|e| e.into_inner()) = Utc::now();

        match frame {
            Frame::Event(event) => self.handle_event(event),
            Frame::Control(message) => self.handle_control(message),
            Frame::Data {
                channel_id,
                payload,
            } => self.handle_data(channel_id, &payload),
        }
        Ok(())
    }

    fn handle_event(&self, event: Event) {
        match event {
            Event::Info => debug!("Server info received"),
            Event::Subscribed { channel_id, key } => {
                info!(channel_id, key = %key, "Channel subscribed");
                self.channels.insert(channel_id, key);
            }
            Event::Unsubscribed { channel_id } => {
                if let Some(key) = self.channels.remove(channel_id) {
                    info!(channel_id, key = %key, "Channel unsubscribed");
                }
            }
            Event::Auth { success, message } => {
                if !success {
                    warn!(message = ?message, "Authentication failed");
                }
                if let Some(gate) = self
                    .auth_gate
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .take()
                {
                    let _ = gate.send(success);
                }
            }
            Event::Pong => trace!("Pong received"),
            Event::Error { message } => warn!(message = %message, "Protocol error event"),
        }
    }

    fn handle_control(&self, message: ControlMessage) {
        match message {
            ControlMessage::Heartbeat => trace!("Control heartbeat"),
            ControlMessage::OrderSnapshot(orders) => {
                debug!(count = orders.len(), "Order snapshot");
                self.orders.apply_snapshot(orders);
                Self::open_gate(&self.order_snapshot_gate);
            }
            ControlMessage::OrderUpdate(order) | ControlMessage::OrderCancel(order) => {
                debug!(
                    order_id = order.order_id,
                    state = %format!("{:?}", order.state),
                    "Order update"
                );
                self.orders.apply(order);
            }
            ControlMessage::PositionSnapshot(positions) => {
                debug!(count = positions.len(), "Position snapshot");
                self.positions.apply_snapshot(positions);
                Self::open_gate(&self.position_snapshot_gate);
            }
            ControlMessage::PositionUpdate(position) => self.positions.apply(position),
            ControlMessage::PositionClose(position) => self.positions.close(&position.symbol),
            ControlMessage::WalletSnapshot(wallets) => {
                debug!(count = wallets.len(), "Wallet snapshot");
                self.wallets.apply_snapshot(wallets);
                Self::open_gate(&self.wallet_snapshot_gate);
            }
            ControlMessage::WalletUpdate(wallet) => self.wallets.apply(wallet),
            ControlMessage::Notification { kind, status, text } => {
                if status == "ERROR" {
                    warn!(kind = %kind, text = %text, "Exchange notification error");
                } else {
                    info!(kind = %kind, status = %status, text = %text, "Exchange notification");
                }
            }
            ControlMessage::Ignored(tag) => trace!(tag = %tag, "Ignoring control tag"),
        }
    }

    fn open_gate(gate: &Mutex<Option<oneshot::Sender<()>>>) {
        if let Some(tx) = gate.lock().unwrap_or_else(|e| e.into_inner()).take() {
            let _ = tx.send(());
        }
    }

    fn handle_data(&self, channel_id: i64, payload: &serde_json::Value) {
        // 데이터 채널 하트비트: [chanId, "hb"]
        if payload.as_str() == Some("hb") {
            return;
        }

        let Some(key) = self.channels.key_for(channel_id) else {
            trace!(channel_id, "Data for unknown channel");
            return;
        };

        if let Some((timeframe, symbol)) = Timeframe::parse_candle_key(&key) {
            match codec::parse_candles(payload) {
                Ok(candles) => {
                    for candle in candles {
                        self.candles.notify(CandleUpdate {
                            symbol: symbol.clone(),
                            timeframe,
                            candle,
                        });
                    }
                }
                Err(e) => warn!(key = %key, error = %e, "Malformed candle payload"),
            }
            return;
        }

        match codec::parse_last_price(payload) {
            Some(price) => {
                self.ticker_seen
                    .write()
                    .unwrap_or_else(|e| e.into_inner())
                    .insert(key.clone(), Utc::now());
                self.ticks.notify(TickerUpdate { symbol: key, price });
            }
            None => trace!(key = %key, "Ticker payload without last price"),
        }
    }

    async fn try_send_command(&self, command: Command) -> ExchangeResult<()> {
        let wire = command.to_wire()?;
        let mut writer = self.writer.lock().await;
        let sink = writer
            .as_mut()
            .ok_or_else(|| ExchangeError::Disconnected("no active writer".to_string()))?;

        sink.send(Message::Text(wire))
            .await
            .map_err(|e| ExchangeError::WebSocket(e.to_string()))?;
        *self.last_sent.write().unwrap_or_else(|e| e.into_inner()) = Utc::now();
        Ok(())
    }

    /// 명령을 전송합니다. 전송 실패는 로깅만 합니다.
    pub async fn send_command(&self, command: Command) {
        let label = format!("{:?}", command);
        if let Err(e) = self.try_send_command(command).await {
            error!(command = %label, error = %e, "Failed to send command");
        }
    }

    /// 티커 채널을 구독합니다.
    pub async fn subscribe_ticker(&self, symbol: &str) {
        self.send_command(Command::SubscribeTicker {
            symbol: symbol.to_string(),
        })
        .await;
    }

    /// 캔들 채널을 구독합니다.
    pub async fn subscribe_candles(&self, symbol: &str, timeframe: Timeframe) {
        self.send_command(Command::SubscribeCandles {
            key: timeframe.candle_key(symbol),
        })
        .await;
    }

    /// 호가창 채널을 구독합니다.
    pub async fn subscribe_book(&self, symbol: &str, precision: &str, frequency: &str, depth: u32) {
        self.send_command(Command::SubscribeBook {
            symbol: symbol.to_string(),
            precision: precision.to_string(),
            frequency: frequency.to_string(),
            depth,
        })
        .await;
    }

    /// 키로 채널 구독을 해제합니다.
    pub async fn unsubscribe(&self, key: &str) {
        match self.channels.id_for(key) {
            Some(channel_id) => self.send_command(Command::Unsubscribe { channel_id }).await,
            None => warn!(key = %key, "Unsubscribe for unknown key"),
        }
    }

    /// 주문 그룹 전체를 취소합니다.
    pub async fn cancel_order_group(&self, group_id: i64) {
        self.send_command(Command::CancelOrderGroup { group_id }).await;
    }

    /// keep-alive ping을 전송합니다.
    pub async fn ping(&self) {
        self.send_command(Command::Ping).await;
    }

    /// 소켓을 닫고 리더를 중단합니다.
    pub async fn disconnect(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let mut writer = self.writer.lock().await;
        if let Some(mut sink) = writer.take() {
            let _ = sink.close().await;
        }
        self.set_state(ConnectionState::Disconnected);
        info!("Disconnected from exchange");
    }

    /// 재연결하고 이전 구독을 복원합니다.
    ///
    /// 구독 복원이 확인되지 않으면 `SubscriptionFailed`를 반환합니다.
    /// 주문/포지션 미러와 시세 liveness는 재연결 전에 비워서 stale
    /// 데이터 위에서 의사결정하지 않도록 합니다.
    pub async fn reconnect(self: &Arc<Self>) -> ExchangeResult<()> {
        let prior = self.channels.snapshot();
        let expected = prior.len();
        info!(channels = expected, "Reconnecting");

        self.ticker_seen
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        self.orders.clear();
        self.positions.clear();

        self.disconnect().await;
        self.channels.clear();
        self.connect().await?;

        for (_, key) in &prior {
            if Timeframe::parse_candle_key(key).is_some() {
                self.send_command(Command::SubscribeCandles { key: key.clone() })
                    .await;
            } else {
                self.send_command(Command::SubscribeTicker {
                    symbol: key.clone(),
                })
                .await;
            }
        }

        for _ in 0..self.config.resubscribe_attempts {
            if self.channels.len() >= expected {
                info!(channels = expected, "Subscriptions restored");
                return Ok(());
            }
            tokio::time::sleep(RESUBSCRIBE_POLL).await;
        }

        let actual = self.channels.len();
        error!(expected, actual, "Failed to restore subscriptions");
        // 다음 재연결 시도가 복원 대상을 알 수 있도록 이전 맵을 되살린다
        self.channels.restore(&prior);
        Err(ExchangeError::SubscriptionFailed { expected, actual })
    }
}

#[async_trait]
impl OrderGateway for BitfinexClient {
    fn is_authenticated(&self) -> bool {
        self.config.has_credentials() && self.state() == ConnectionState::Ready
    }

    async fn submit_order(&self, order: &NewOrder) {
        self.send_command(Command::PlaceOrder(order.clone())).await;
    }

    async fn cancel_order(&self, order_id: i64) {
        self.send_command(Command::CancelOrder { order_id }).await;
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

#[cfg(test)]
mod tests {
    use super::*;
    use marlin_core::{OrderState, WalletKind};
    use rust_decimal_macros::dec;
    use std::sync::atomic::AtomicUsize;

    fn test_client() -> BitfinexClient {
        BitfinexClient::new(BitfinexConfig {
            ws_url: "wss://example.invalid/ws/2".to_string(),
            api_key: None,
            api_secret: None,
            resubscribe_attempts: 3,
        })
    }

    #[tokio::test]
    async fn test_subscribed_event_registers_channel() {
        let client = test_client();
        client
            .dispatch(r#"{"event":"subscribed","channel":"ticker","chanId":17,"symbol":"tBTCUSD"}"#)
            .await
            .unwrap();

        assert_eq!(client.channels().key_for(17).as_deref(), Some("tBTCUSD"));
        assert_eq!(client.channels().id_for("tBTCUSD"), Some(17));
    }

    #[tokio::test]
    async fn test_auth_event_opens_gate() {
        let client = test_client();
        let (tx, rx) = oneshot::channel();
        *client.auth_gate.lock().unwrap() = Some(tx);

        client
            .dispatch(r#"{"event":"auth","status":"OK","chanId":0}"#)
            .await
            .unwrap();

        assert_eq!(rx.await, Ok(true));
    }

    #[tokio::test]
    async fn test_order_update_reaches_store() {
        let client = test_client();
        client.dispatch(r#"[0,"ou",[1234,null,42,"tBTCUSD",0,0,0.09,0.09,"EXCHANGE LIMIT",null,null,null,0,"ACTIVE",null,null,10000,0,0,0,null,null,null,0,0,null]]"#).await.unwrap();

        let order = client.orders.get(1234).unwrap();
        assert_eq!(order.state, OrderState::Active);
        assert_eq!(order.client_id, 42);
    }

    #[tokio::test]
    async fn test_order_snapshot_opens_gate() {
        let client = test_client();
        let (tx, rx) = oneshot::channel();
        *client.order_snapshot_gate.lock().unwrap() = Some(tx);

        client
            .dispatch(r#"[0,"os",[]]"#)
            .await
            .unwrap();

        assert_eq!(rx.await, Ok(()));
        assert!(client.orders.is_empty());
    }

    #[tokio::test]
    async fn test_wallet_snapshot_reaches_store() {
        let client = test_client();
        client
            .dispatch(r#"[0,"ws",[["margin","USD",1000,0,null]]]"#)
            .await
            .unwrap();

        assert_eq!(
            client.wallets.balance(WalletKind::Margin, "USD"),
            Some(dec!(1000))
        );
    }

    #[tokio::test]
    async fn test_ticker_data_notifies_and_tracks_liveness() {
        let client = test_client();
        client.channels.insert(17, "tBTCUSD");

        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        client.ticks().register(move |tick: TickerUpdate| {
            assert_eq!(tick.symbol, "tBTCUSD");
            assert_eq!(tick.price, dec!(236.52));
            seen_clone.fetch_add(1, Ordering::SeqCst);
        });

        client
            .dispatch(r#"[17,[236.62,9.0029,236.88,7.1138,-1.02,0,236.52,50,236.2,235.1]]"#)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert!(client.ticker_seen().contains_key("tBTCUSD"));
    }

    #[tokio::test]
    async fn test_candle_snapshot_replayed_in_order() {
        let client = test_client();
        client.channels.insert(21, "trade:1m:tBTCUSD");

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        client.candle_updates().register(move |update: CandleUpdate| {
            let _ = tx.send(update.candle.timestamp);
        });

        client
            .dispatch(r#"[21,[[1573504560000,33,34,35,32,100],[1573504500000,30,31,32,29,50]]]"#)
            .await
            .unwrap();

        let first = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        let second = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(first < second);
    }

    #[tokio::test]
    async fn test_data_heartbeat_is_skipped() {
        let client = test_client();
        client.channels.insert(17, "tBTCUSD");
        let before = client.last_heartbeat();

        tokio::time::sleep(Duration::from_millis(10)).await;
        client.dispatch(r#"[17,"hb"]"#).await.unwrap();

        assert!(client.last_heartbeat() > before);
        assert!(client.ticker_seen().is_empty());
    }

    #[tokio::test]
    async fn test_unauthenticated_without_credentials() {
        let client = test_client();
        client.set_state(ConnectionState::Ready);
        assert!(!client.is_authenticated());
    }

    #[tokio::test]
    async fn test_connect_failure_resets_state() {
        let client = Arc::new(BitfinexClient::new(BitfinexConfig {
            ws_url: "not a url".to_string(),
            api_key: None,
            api_secret: None,
            resubscribe_attempts: 1,
        }));

        let err = client.connect().await.unwrap_err();

        assert!(matches!(err, ExchangeError::NetworkError(_)));
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_auth_rejection_is_auth_error_and_disconnects() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // 인증 요청에 거부 응답을 돌려주는 로컬 서버
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            while let Some(Ok(message)) = ws.next().await {
                if let Message::Text(text) = message {
                    if text.contains("\"auth\"") {
                        let reply =
                            r#"{"event":"auth","status":"FAILED","chanId":0,"msg":"invalid key"}"#;
                        let _ = ws.send(Message::Text(reply.to_string())).await;
                    }
                }
            }
        });

        let client = Arc::new(BitfinexClient::new(BitfinexConfig {
            ws_url: format!("ws://{}/ws/2", addr),
            api_key: Some("key".to_string()),
            api_secret: Some(SecretString::from("secret")),
            resubscribe_attempts: 1,
        }));

        let err = client.connect().await.unwrap_err();

        assert!(err.is_auth_error());
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_config_debug_masks_secrets() {
        let config = BitfinexConfig {
            ws_url: "wss://example.invalid".to_string(),
            api_key: Some("my-key".to_string()),
            api_secret: Some(SecretString::from("my-secret")),
            resubscribe_attempts: 1,
        };
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("my-key"));
        assert!(!rendered.contains("my-secret"));
    }
}
