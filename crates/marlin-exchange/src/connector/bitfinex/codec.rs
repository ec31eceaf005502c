//! Bitfinex v2 와이어 코덱.
//!
//! 인바운드 프레임은 두 가지 봉투 형태입니다:
//! - 객체 봉투 `{"event": ...}` — 프로토콜 이벤트 (info/subscribed/auth/...)
//! - 배열 봉투 `[chanId, payload...]` — 채널 0은 컨트롤 채널(주문/포지션/
//!   지갑/알림 태그), 그 외에는 데이터 채널(티커/캔들)
//!
//! 아웃바운드 명령은 `Command`로 표현하고 `to_wire()`로 직렬화합니다.

use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Map, Value};
use sha2::Sha384;
use std::str::FromStr;

use marlin_core::{Candle, ExchangeOrder, NewOrder, OrderState, Position, Wallet, WalletKind};

use crate::error::{ExchangeError, ExchangeResult};

type HmacSha384 = Hmac<Sha384>;

// ============================================================================
// 인바운드
// ============================================================================

/// 객체 봉투 이벤트.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// 서버 info (무시)
    Info,
    /// 채널 구독 승인
    Subscribed {
        /// 거래소가 할당한 채널 ID
        channel_id: i64,
        /// 구독 키 (심볼 또는 candles key)
        key: String,
    },
    /// 구독 해제 승인
    Unsubscribed {
        /// 해제된 채널 ID
        channel_id: i64,
    },
    /// 인증 응답
    Auth {
        /// status == "OK"
        success: bool,
        /// 실패 사유 (있다면)
        message: Option<String>,
    },
    /// ping 응답
    Pong,
    /// 프로토콜 에러 이벤트
    Error {
        /// 에러 메시지
        message: String,
    },
}

/// 컨트롤 채널(채널 0) 메시지.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    /// 하트비트
    Heartbeat,
    /// 주문 스냅샷 (os)
    OrderSnapshot(Vec<ExchangeOrder>),
    /// 주문 생성/갱신 (on/ou)
    OrderUpdate(ExchangeOrder),
    /// 주문 취소 (oc)
    OrderCancel(ExchangeOrder),
    /// 포지션 스냅샷 (ps)
    PositionSnapshot(Vec<Position>),
    /// 포지션 생성/갱신 (pn/pu)
    PositionUpdate(Position),
    /// 포지션 종료 (pc)
    PositionClose(Position),
    /// 지갑 스냅샷 (ws)
    WalletSnapshot(Vec<Wallet>),
    /// 지갑 갱신 (wu)
    WalletUpdate(Wallet),
    /// 알림 (n)
    Notification {
        /// 알림 종류 (예: on-req, oc-req)
        kind: String,
        /// 상태 (SUCCESS / ERROR / ...)
        status: String,
        /// 메시지 본문
        text: String,
    },
    /// 무시되는 태그 (펀딩/체결 등)
    Ignored(String),
}

/// 파싱된 인바운드 프레임.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// 객체 봉투
    Event(Event),
    /// 컨트롤 채널 메시지
    Control(ControlMessage),
    /// 데이터 채널 페이로드 (채널 해석은 레지스트리 담당)
    Data {
        /// 채널 ID
        channel_id: i64,
        /// 원본 페이로드
        payload: Value,
    },
}

/// 인바운드 텍스트 프레임을 파싱합니다.
pub fn parse_frame(text: &str) -> ExchangeResult<Frame> {
    let value: Value = serde_json::from_str(text)?;

    match value {
        Value::Object(map) => parse_event(&map).map(Frame::Event),
        Value::Array(items) => parse_array(&items),
        other => Err(ExchangeError::ParseError(format!(
            "unexpected envelope: {}",
            other
        ))),
    }
}

fn parse_event(map: &Map<String, Value>) -> ExchangeResult<Event> {
    let event = map
        .get("event")
        .and_then(Value::as_str)
        .ok_or_else(|| ExchangeError::ParseError("missing event field".to_string()))?;

    match event {
        "info" => Ok(Event::Info),
        "subscribed" => {
            let channel_id = map
                .get("chanId")
                .and_then(Value::as_i64)
                .ok_or_else(|| ExchangeError::ParseError("subscribed without chanId".to_string()))?;
            // 캔들 구독은 key, 티커 구독은 symbol을 돌려준다
            let key = map
                .get("key")
                .or_else(|| map.get("symbol"))
                .and_then(Value::as_str)
                .ok_or_else(|| ExchangeError::ParseError("subscribed without key".to_string()))?;
            Ok(Event::Subscribed {
                channel_id,
                key: key.to_string(),
            })
        }
        "unsubscribed" => {
            let channel_id = map.get("chanId").and_then(Value::as_i64).ok_or_else(|| {
                ExchangeError::ParseError("unsubscribed without chanId".to_string())
            })?;
            Ok(Event::Unsubscribed { channel_id })
        }
        "auth" => {
            let success = map.get("status").and_then(Value::as_str) == Some("OK");
            let message = map
                .get("msg")
                .and_then(Value::as_str)
                .map(|s| s.to_string());
            Ok(Event::Auth { success, message })
        }
        "pong" => Ok(Event::Pong),
        "error" => Ok(Event::Error {
            message: map
                .get("msg")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
        }),
        other => Err(ExchangeError::ParseError(format!(
            "unknown event: {}",
            other
        ))),
    }
}

fn parse_array(items: &[Value]) -> ExchangeResult<Frame> {
    let channel_id = items
        .first()
        .and_then(Value::as_i64)
        .ok_or_else(|| ExchangeError::ParseError("array frame without channel id".to_string()))?;

    if channel_id != 0 {
        let payload = items
            .get(1)
            .cloned()
            .ok_or_else(|| ExchangeError::ParseError("data frame without payload".to_string()))?;
        return Ok(Frame::Data {
            channel_id,
            payload,
        });
    }

    let tag = items
        .get(1)
        .and_then(Value::as_str)
        .ok_or_else(|| ExchangeError::ParseError("control frame without tag".to_string()))?;

    if tag == "hb" {
        return Ok(Frame::Control(ControlMessage::Heartbeat));
    }

    let payload = items
        .get(2)
        .ok_or_else(|| ExchangeError::ParseError(format!("control '{}' without payload", tag)))?;

    let message = match tag {
        "os" => ControlMessage::OrderSnapshot(parse_list(payload, parse_order)?),
        "on" | "ou" => ControlMessage::OrderUpdate(parse_order(payload)?),
        "oc" => ControlMessage::OrderCancel(parse_order(payload)?),
        "ps" => ControlMessage::PositionSnapshot(parse_list(payload, parse_position)?),
        "pn" | "pu" => ControlMessage::PositionUpdate(parse_position(payload)?),
        "pc" => ControlMessage::PositionClose(parse_position(payload)?),
        "ws" => ControlMessage::WalletSnapshot(parse_list(payload, parse_wallet)?),
        "wu" => ControlMessage::WalletUpdate(parse_wallet(payload)?),
        "n" => parse_notification(payload),
        other => ControlMessage::Ignored(other.to_string()),
    };

    Ok(Frame::Control(message))
}

fn parse_list<T>(
    payload: &Value,
    item_parser: impl Fn(&Value) -> ExchangeResult<T>,
) -> ExchangeResult<Vec<T>> {
    payload
        .as_array()
        .ok_or_else(|| ExchangeError::ParseError("snapshot payload is not an array".to_string()))?
        .iter()
        .map(item_parser)
        .collect()
}

fn parse_notification(payload: &Value) -> ControlMessage {
    // [MTS, TYPE, MESSAGE_ID, null, NOTIFY_INFO, CODE, STATUS, TEXT]
    let kind = str_at(payload, 1).unwrap_or_default();
    let status = str_at(payload, 6).unwrap_or_default();
    let text = str_at(payload, 7).unwrap_or_default();
    ControlMessage::Notification { kind, status, text }
}

/// 주문 배열을 파싱합니다 (Bitfinex v2 인덱스 레이아웃).
///
/// `[ID, GID, CID, SYMBOL, MTS_CREATE, MTS_UPDATE, AMOUNT, AMOUNT_ORIG,
///   TYPE, TYPE_PREV, _, _, FLAGS, STATUS, _, _, PRICE, PRICE_AVG,
///   PRICE_TRAILING, PRICE_AUX_LIMIT, _, _, _, NOTIFY, HIDDEN, ...]`
pub fn parse_order(value: &Value) -> ExchangeResult<ExchangeOrder> {
    let order_id = i64_at(value, 0)
        .ok_or_else(|| ExchangeError::ParseError("order without id".to_string()))?;
    let symbol = str_at(value, 3)
        .ok_or_else(|| ExchangeError::ParseError("order without symbol".to_string()))?;
    let status = str_at(value, 13)
        .ok_or_else(|| ExchangeError::ParseError("order without status".to_string()))?;

    Ok(ExchangeOrder {
        order_id,
        group_id: i64_at(value, 1),
        client_id: i64_at(value, 2).unwrap_or(0),
        symbol,
        created_at: millis_to_datetime(i64_at(value, 4).unwrap_or(0)),
        updated_at: millis_to_datetime(i64_at(value, 5).unwrap_or(0)),
        amount: decimal_at(value, 6).unwrap_or(Decimal::ZERO),
        amount_orig: decimal_at(value, 7).unwrap_or(Decimal::ZERO),
        order_type: str_at(value, 8).unwrap_or_default(),
        state: OrderState::from_status(&status),
        price: decimal_at(value, 16),
        avg_price: decimal_at(value, 17).filter(|p| !p.is_zero()),
        trailing_price: decimal_at(value, 18).filter(|p| !p.is_zero()),
        aux_limit_price: decimal_at(value, 19).filter(|p| !p.is_zero()),
        notify: flag_at(value, 23),
        hidden: flag_at(value, 24),
    })
}

/// 포지션 배열을 파싱합니다.
///
/// `[SYMBOL, STATUS, AMOUNT, BASE_PRICE, FUNDING, FUNDING_TYPE,
///   PL, PL_PERC, PRICE_LIQ, LEVERAGE, ...]`
pub fn parse_position(value: &Value) -> ExchangeResult<Position> {
    let symbol = str_at(value, 0)
        .ok_or_else(|| ExchangeError::ParseError("position without symbol".to_string()))?;

    Ok(Position {
        symbol,
        status: str_at(value, 1).unwrap_or_default(),
        amount: decimal_at(value, 2).unwrap_or(Decimal::ZERO),
        base_price: decimal_at(value, 3),
        pl: decimal_at(value, 6),
        pl_percent: decimal_at(value, 7),
        price_liq: decimal_at(value, 8),
        updated_at: Utc::now(),
    })
}

/// 지갑 배열을 파싱합니다.
///
/// `[WALLET_TYPE, CURRENCY, BALANCE, UNSETTLED_INTEREST, BALANCE_AVAILABLE]`
pub fn parse_wallet(value: &Value) -> ExchangeResult<Wallet> {
    let kind_str = str_at(value, 0)
        .ok_or_else(|| ExchangeError::ParseError("wallet without type".to_string()))?;
    let kind = WalletKind::from_wire(&kind_str)
        .ok_or_else(|| ExchangeError::ParseError(format!("unknown wallet type: {}", kind_str)))?;
    let currency = str_at(value, 1)
        .ok_or_else(|| ExchangeError::ParseError("wallet without currency".to_string()))?;

    Ok(Wallet {
        kind,
        currency,
        balance: decimal_at(value, 2).unwrap_or(Decimal::ZERO),
        unsettled_interest: decimal_at(value, 3).unwrap_or(Decimal::ZERO),
        balance_available: decimal_at(value, 4),
    })
}

/// 캔들 배열 하나를 파싱합니다: `[MTS, OPEN, CLOSE, HIGH, LOW, VOLUME]`.
pub fn parse_candle(value: &Value) -> ExchangeResult<Candle> {
    let timestamp = i64_at(value, 0)
        .ok_or_else(|| ExchangeError::ParseError("candle without timestamp".to_string()))?;

    Ok(Candle {
        timestamp: millis_to_datetime(timestamp),
        open: decimal_at(value, 1).unwrap_or(Decimal::ZERO),
        close: decimal_at(value, 2).unwrap_or(Decimal::ZERO),
        high: decimal_at(value, 3).unwrap_or(Decimal::ZERO),
        low: decimal_at(value, 4).unwrap_or(Decimal::ZERO),
        volume: decimal_at(value, 5).unwrap_or(Decimal::ZERO),
    })
}

/// 캔들 페이로드를 파싱합니다.
///
/// 스냅샷(배열의 배열)은 타임스탬프 오름차순으로 정렬해서 반환하고,
/// 증분 업데이트(단일 배열)는 원소 하나짜리 Vec으로 반환합니다.
pub fn parse_candles(payload: &Value) -> ExchangeResult<Vec<Candle>> {
    let items = payload
        .as_array()
        .ok_or_else(|| ExchangeError::ParseError("candle payload is not an array".to_string()))?;

    if items.first().map(Value::is_array).unwrap_or(false) {
        let mut candles: Vec<Candle> = items
            .iter()
            .map(parse_candle)
            .collect::<ExchangeResult<_>>()?;
        candles.sort_by_key(|c| c.timestamp);
        Ok(candles)
    } else {
        Ok(vec![parse_candle(payload)?])
    }
}

/// 티커 페이로드에서 최종 체결가를 추출합니다 (인덱스 6).
pub fn parse_last_price(payload: &Value) -> Option<Decimal> {
    decimal_at(payload, 6)
}

// ============================================================================
// 배열 필드 접근 헬퍼
// ============================================================================

fn i64_at(value: &Value, index: usize) -> Option<i64> {
    value.get(index).and_then(Value::as_i64)
}

fn str_at(value: &Value, index: usize) -> Option<String> {
    value
        .get(index)
        .and_then(Value::as_str)
        .map(|s| s.to_string())
}

fn decimal_at(value: &Value, index: usize) -> Option<Decimal> {
    match value.get(index)? {
        // JSON 리터럴 텍스트를 거쳐 파싱해 이진 부동소수점 오차를 피한다
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        Value::String(s) => Decimal::from_str(s).ok(),
        _ => None,
    }
}

fn flag_at(value: &Value, index: usize) -> bool {
    match value.get(index) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0) != 0,
        _ => false,
    }
}

fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or_else(Utc::now)
}

// ============================================================================
// 아웃바운드
// ============================================================================

/// 아웃바운드 명령.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// 인증 핸드셰이크
    Auth {
        /// API 키
        api_key: String,
        /// HMAC-SHA384 서명 (hex)
        signature: String,
        /// 서명된 페이로드
        payload: String,
        /// 논스
        nonce: i64,
    },
    /// 티커 구독
    SubscribeTicker {
        /// 심볼
        symbol: String,
    },
    /// 캔들 구독
    SubscribeCandles {
        /// `trade:<tf>:<심볼>` 키
        key: String,
    },
    /// 호가창 구독
    SubscribeBook {
        /// 심볼
        symbol: String,
        /// 정밀도 (P0~P4)
        precision: String,
        /// 갱신 빈도 (F0/F1)
        frequency: String,
        /// 깊이
        depth: u32,
    },
    /// 채널 구독 해제
    Unsubscribe {
        /// 채널 ID
        channel_id: i64,
    },
    /// keep-alive ping
    Ping,
    /// 주문 제출 (on)
    PlaceOrder(NewOrder),
    /// 주문 취소 (oc)
    CancelOrder {
        /// 거래소 주문 ID
        order_id: i64,
    },
    /// 그룹 단위 취소 (oc_multi)
    CancelOrderGroup {
        /// 주문 그룹 ID
        group_id: i64,
    },
}

impl Command {
    /// 와이어 표현으로 직렬화합니다.
    pub fn to_wire(&self) -> ExchangeResult<String> {
        let value = match self {
            Command::Auth {
                api_key,
                signature,
                payload,
                nonce,
            } => json!({
                "event": "auth",
                "apiKey": api_key,
                "authSig": signature,
                "authPayload": payload,
                "authNonce": nonce,
            }),
            Command::SubscribeTicker { symbol } => json!({
                "event": "subscribe",
                "channel": "ticker",
                "symbol": symbol,
            }),
            Command::SubscribeCandles { key } => json!({
                "event": "subscribe",
                "channel": "candles",
                "key": key,
            }),
            Command::SubscribeBook {
                symbol,
                precision,
                frequency,
                depth,
            } => json!({
                "event": "subscribe",
                "channel": "book",
                "symbol": symbol,
                "prec": precision,
                "freq": frequency,
                "len": depth.to_string(),
            }),
            Command::Unsubscribe { channel_id } => json!({
                "event": "unsubscribe",
                "chanId": channel_id,
            }),
            Command::Ping => json!({ "event": "ping" }),
            Command::PlaceOrder(order) => {
                let mut body = Map::new();
                body.insert("cid".to_string(), json!(order.client_id));
                body.insert("type".to_string(), json!(order.kind.as_wire()));
                body.insert("symbol".to_string(), json!(order.symbol));
                body.insert("amount".to_string(), json!(order.amount.to_string()));
                if let Some(price) = order.price {
                    body.insert("price".to_string(), json!(price.to_string()));
                }
                if let Some(trailing) = order.price_trailing {
                    body.insert("price_trailing".to_string(), json!(trailing.to_string()));
                }
                if let Some(aux) = order.price_aux_limit {
                    body.insert("price_aux_limit".to_string(), json!(aux.to_string()));
                }
                if order.hidden {
                    body.insert("hidden".to_string(), json!(1));
                }
                if order.post_only {
                    body.insert("postonly".to_string(), json!(1));
                }
                if let Some(gid) = order.group_id {
                    body.insert("gid".to_string(), json!(gid));
                }
                json!([0, "on", Value::Null, Value::Object(body)])
            }
            Command::CancelOrder { order_id } => {
                json!([0, "oc", Value::Null, { "id": order_id }])
            }
            Command::CancelOrderGroup { group_id } => {
                json!([0, "oc_multi", Value::Null, { "gid": group_id }])
            }
        };

        serde_json::to_string(&value).map_err(Into::into)
    }
}

/// 인증 명령을 생성합니다.
///
/// 서명은 `"AUTH" + nonce` 위의 HMAC-SHA384이고 nonce는 epoch 마이크로초
/// 입니다.
pub fn auth_command(api_key: &str, api_secret: &SecretString) -> Command {
    let nonce = Utc::now().timestamp_micros();
    let payload = format!("AUTH{}", nonce);
    let signature = sign_payload(api_secret, &payload);

    Command::Auth {
        api_key: api_key.to_string(),
        signature,
        payload,
        nonce,
    }
}

/// 페이로드를 API 시크릿으로 서명합니다.
pub fn sign_payload(api_secret: &SecretString, payload: &str) -> String {
    let mut mac = HmacSha384::new_from_slice(api_secret.expose_secret().as_bytes())
        .expect("HMAC accepts any key length");
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use marlin_core::OrderKind;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_subscribed_ticker() {
        let frame =
            parse_frame(r#"{"event":"subscribed","channel":"ticker","chanId":17,"symbol":"tBTCUSD"}"#)
                .unwrap();
        assert_eq!(
            frame,
            Frame::Event(Event::Subscribed {
                channel_id: 17,
                key: "tBTCUSD".to_string()
            })
        );
    }

    #[test]
    fn test_parse_subscribed_candles_prefers_key() {
        let frame = parse_frame(
            r#"{"event":"subscribed","channel":"candles","chanId":21,"key":"trade:1m:tBTCUSD"}"#,
        )
        .unwrap();
        assert_eq!(
            frame,
            Frame::Event(Event::Subscribed {
                channel_id: 21,
                key: "trade:1m:tBTCUSD".to_string()
            })
        );
    }

    #[test]
    fn test_parse_auth_status() {
        let ok = parse_frame(r#"{"event":"auth","status":"OK","chanId":0,"userId":1}"#).unwrap();
        assert_eq!(
            ok,
            Frame::Event(Event::Auth {
                success: true,
                message: None
            })
        );

        let failed =
            parse_frame(r#"{"event":"auth","status":"FAILED","msg":"invalid key"}"#).unwrap();
        assert_eq!(
            failed,
            Frame::Event(Event::Auth {
                success: false,
                message: Some("invalid key".to_string())
            })
        );
    }

    #[test]
    fn test_parse_heartbeat_and_pong() {
        assert_eq!(
            parse_frame(r#"[0,"hb"]"#).unwrap(),
            Frame::Control(ControlMessage::Heartbeat)
        );
        assert_eq!(
            parse_frame(r#"{"event":"pong","ts":1,"cid":2}"#).unwrap(),
            Frame::Event(Event::Pong)
        );
    }

    #[test]
    fn test_parse_order_update() {
        let text = r#"[0,"ou",[1234,null,42,"tBTCUSD",1574955083558,1574955083558,0.09,0.09,"EXCHANGE LIMIT",null,null,null,0,"ACTIVE",null,null,10000,0,0,0,null,null,null,0,0,null]]"#;
        let frame = parse_frame(text).unwrap();

        let Frame::Control(ControlMessage::OrderUpdate(order)) = frame else {
            panic!("expected order update, got {:?}", frame);
        };
        assert_eq!(order.order_id, 1234);
        assert_eq!(order.client_id, 42);
        assert_eq!(order.group_id, None);
        assert_eq!(order.symbol, "tBTCUSD");
        assert_eq!(order.state, OrderState::Active);
        assert_eq!(order.amount, dec!(0.09));
        assert_eq!(order.price, Some(dec!(10000)));
        assert_eq!(order.avg_price, None);
        assert!(!order.hidden);
    }

    #[test]
    fn test_parse_order_snapshot() {
        let text = r#"[0,"os",[[1,null,10,"tBTCUSD",0,0,0.1,0.1,"LIMIT",null,null,null,0,"ACTIVE",null,null,9000,0,0,0,null,null,null,0,0,null],[2,7,11,"tETHUSD",0,0,-1.0,-1.0,"LIMIT",null,null,null,0,"ACTIVE",null,null,300,0,0,0,null,null,null,0,1,null]]]"#;
        let frame = parse_frame(text).unwrap();

        let Frame::Control(ControlMessage::OrderSnapshot(orders)) = frame else {
            panic!("expected order snapshot");
        };
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[1].group_id, Some(7));
        assert!(orders[1].is_sell());
        assert!(orders[1].hidden);
    }

    #[test]
    fn test_parse_canceled_status() {
        let text = r#"[0,"oc",[1234,null,42,"tBTCUSD",0,0,0.09,0.09,"EXCHANGE LIMIT",null,null,null,0,"CANCELED was: ACTIVE",null,null,10000,0,0,0,null,null,null,0,0,null]]"#;
        let Frame::Control(ControlMessage::OrderCancel(order)) = parse_frame(text).unwrap() else {
            panic!("expected order cancel");
        };
        assert_eq!(order.state, OrderState::Canceled);
    }

    #[test]
    fn test_parse_wallet() {
        let text = r#"[0,"wu",["exchange","USD",1000.0,0,995.5]]"#;
        let Frame::Control(ControlMessage::WalletUpdate(wallet)) = parse_frame(text).unwrap()
        else {
            panic!("expected wallet update");
        };
        assert_eq!(wallet.kind, WalletKind::Exchange);
        assert_eq!(wallet.currency, "USD");
        assert_eq!(wallet.balance, dec!(1000));
        assert_eq!(wallet.balance_available, Some(dec!(995.5)));
    }

    #[test]
    fn test_parse_position() {
        let text = r#"[0,"pu",["tBTCUSD","ACTIVE",0.09,9900.0,0,0,12.5,1.4,8000.0,2.5]]"#;
        let Frame::Control(ControlMessage::PositionUpdate(position)) = parse_frame(text).unwrap()
        else {
            panic!("expected position update");
        };
        assert_eq!(position.symbol, "tBTCUSD");
        assert!(position.is_active());
        assert_eq!(position.amount, dec!(0.09));
        assert_eq!(position.pl, Some(dec!(12.5)));
    }

    #[test]
    fn test_parse_notification() {
        let text = r#"[0,"n",[1575282446000,"on-req",null,null,null,null,"ERROR","Invalid order: not enough exchange balance"]]"#;
        let Frame::Control(ControlMessage::Notification { kind, status, text }) =
            parse_frame(text).unwrap()
        else {
            panic!("expected notification");
        };
        assert_eq!(kind, "on-req");
        assert_eq!(status, "ERROR");
        assert!(text.contains("not enough exchange balance"));
    }

    #[test]
    fn test_unknown_control_tag_ignored() {
        let frame = parse_frame(r#"[0,"fos",[]]"#).unwrap();
        assert_eq!(
            frame,
            Frame::Control(ControlMessage::Ignored("fos".to_string()))
        );
    }

    #[test]
    fn test_parse_candle_snapshot_sorted() {
        let payload: Value = serde_json::from_str(
            r#"[[1573504560000,33,34,35,32,100],[1573504500000,30,31,32,29,50]]"#,
        )
        .unwrap();
        let candles = parse_candles(&payload).unwrap();

        assert_eq!(candles.len(), 2);
        assert!(candles[0].timestamp < candles[1].timestamp);
        assert_eq!(candles[0].open, dec!(30));
        assert_eq!(candles[1].close, dec!(34));
    }

    #[test]
    fn test_parse_candle_update_single() {
        let payload: Value =
            serde_json::from_str(r#"[1573504560000,33.1,34.2,35.0,32.9,100.5]"#).unwrap();
        let candles = parse_candles(&payload).unwrap();

        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].high, dec!(35.0));
        assert_eq!(candles[0].volume, dec!(100.5));
    }

    #[test]
    fn test_parse_last_price_index() {
        let payload: Value =
            serde_json::from_str(r#"[236.62,9.0029,236.88,7.1138,-1.02,0,236.52,5e1,236.2,235.1]"#)
                .unwrap();
        assert_eq!(parse_last_price(&payload), Some(dec!(236.52)));
    }

    #[test]
    fn test_malformed_frame_is_error_not_panic() {
        assert!(parse_frame("not json").is_err());
        assert!(parse_frame(r#"{"foo":1}"#).is_err());
        assert!(parse_frame(r#"[0,"os","not an array"]"#).is_err());
    }

    #[test]
    fn test_place_order_wire_format() {
        let order = NewOrder::limit(42, "tBTCUSD", OrderKind::ExchangeLimit, dec!(0.09), dec!(10000))
            .post_only();
        let wire = Command::PlaceOrder(order).to_wire().unwrap();

        let value: Value = serde_json::from_str(&wire).unwrap();
        assert_eq!(value[0], 0);
        assert_eq!(value[1], "on");
        assert_eq!(value[2], Value::Null);
        assert_eq!(value[3]["cid"], 42);
        assert_eq!(value[3]["type"], "EXCHANGE LIMIT");
        assert_eq!(value[3]["amount"], "0.09");
        assert_eq!(value[3]["price"], "10000");
        assert_eq!(value[3]["postonly"], 1);
        assert!(value[3].get("hidden").is_none());
    }

    #[test]
    fn test_cancel_order_wire_format() {
        let wire = Command::CancelOrder { order_id: 1234 }.to_wire().unwrap();
        let value: Value = serde_json::from_str(&wire).unwrap();
        assert_eq!(value[1], "oc");
        assert_eq!(value[3]["id"], 1234);

        let wire = Command::CancelOrderGroup { group_id: 9 }.to_wire().unwrap();
        let value: Value = serde_json::from_str(&wire).unwrap();
        assert_eq!(value[1], "oc_multi");
        assert_eq!(value[3]["gid"], 9);
    }

    #[test]
    fn test_subscribe_wire_formats() {
        let wire = Command::SubscribeTicker {
            symbol: "tBTCUSD".to_string(),
        }
        .to_wire()
        .unwrap();
        let value: Value = serde_json::from_str(&wire).unwrap();
        assert_eq!(value["event"], "subscribe");
        assert_eq!(value["channel"], "ticker");
        assert_eq!(value["symbol"], "tBTCUSD");

        let wire = Command::Unsubscribe { channel_id: 17 }.to_wire().unwrap();
        let value: Value = serde_json::from_str(&wire).unwrap();
        assert_eq!(value["event"], "unsubscribe");
        assert_eq!(value["chanId"], 17);
    }

    #[test]
    fn test_auth_signature_shape() {
        let secret = SecretString::from("top-secret");
        let sig_a = sign_payload(&secret, "AUTH1700000000000000");
        let sig_b = sign_payload(&secret, "AUTH1700000000000000");
        let sig_c = sign_payload(&secret, "AUTH1700000000000001");

        // HMAC-SHA384 hex = 96자, 같은 입력엔 결정적
        assert_eq!(sig_a.len(), 96);
        assert_eq!(sig_a, sig_b);
        assert_ne!(sig_a, sig_c);
        assert!(sig_a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_auth_command_payload_matches_nonce() {
        let secret = SecretString::from("top-secret");
        let Command::Auth { payload, nonce, .. } = auth_command("key", &secret) else {
            panic!("expected auth command");
        };
        assert_eq!(payload, format!("AUTH{}", nonce));
    }
}
