//! 재연결 속도 제한 게이트.
//!
//! 슬라이딩 윈도우 안에서 일어날 수 있는 이벤트(재연결) 수를 제한합니다.
//! 하트비트 컨트롤러는 `reconnect()` 호출 전에 반드시 이 게이트를
//! 통과해야 하며, 재연결 폭주가 거래소 측 rate limit을 건드리는 것을
//! 사전에 차단합니다.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{ExchangeError, ExchangeResult};

/// 슬롯 확인 사이의 대기 간격.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// 슬라이딩 윈도우 이벤트 게이트.
pub struct ReconnectGate {
    limit: usize,
    window: Duration,
    events: Mutex<VecDeque<Instant>>,
}

impl ReconnectGate {
    /// 새 게이트를 생성합니다.
    ///
    /// limit이 0이거나 window가 0이면 `InvalidArgument` 에러를 반환합니다.
    pub fn new(limit: u32, window: Duration) -> ExchangeResult<Self> {
        if limit == 0 {
            return Err(ExchangeError::InvalidArgument(
                "rate gate limit must be positive".to_string(),
            ));
        }
        if window.is_zero() {
            return Err(ExchangeError::InvalidArgument(
                "rate gate window must be positive".to_string(),
            ));
        }
        Ok(Self {
            limit: limit as usize,
            window,
            events: Mutex::new(VecDeque::new()),
        })
    }

    /// 이벤트 발생을 기록하고 윈도우 두 배보다 오래된 항목을 정리합니다.
    pub fn record_event(&self) {
        let now = Instant::now();
        let mut events = self.events.lock().expect("rate gate lock poisoned");
        events.push_back(now);

        let horizon = self.window * 2;
        while let Some(front) = events.front() {
            if now.duration_since(*front) > horizon {
                events.pop_front();
            } else {
                break;
            }
        }
    }

    /// 윈도우 내 이벤트 수가 한도 아래로 내려갈 때까지 대기합니다.
    ///
    /// 대기했다면 true를 반환합니다.
    pub async fn wait_for_slot(&self) -> bool {
        let mut waited = false;
        loop {
            let in_window = self.events_in_window();
            if in_window <= self.limit {
                if waited {
                    debug!(in_window, limit = self.limit, "Rate gate slot available");
                }
                return waited;
            }
            waited = true;
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// 현재 윈도우 안의 이벤트 수를 반환합니다.
    pub fn events_in_window(&self) -> usize {
        let now = Instant::now();
        self.events
            .lock()
            .expect("rate gate lock poisoned")
            .iter()
            .filter(|t| now.duration_since(**t) <= self.window)
            .count()
    }
}
