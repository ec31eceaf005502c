//! 채널 구독 레지스트리.
//!
//! 거래소가 할당한 정수 채널 ID와 논리적 구독 키(티커는 심볼,
//! 캔들은 `trade:<tf>:<심볼>`) 사이의 양방향 매핑입니다.
//! `subscribed` 승인에 생성되고 `unsubscribed`에 제거되며,
//! 재연결 후 재구독 로직이 이 레지스트리를 읽습니다.
//!
//! 불변식: 활성 집합 위에서 ID ⇄ 키는 전단사입니다. 같은 ID나 키가
//! 다시 들어오면 낡은 짝이 제거됩니다.

use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::Notify;

#[derive(Default)]
struct ChannelMap {
    by_id: HashMap<i64, String>,
    by_key: HashMap<String, i64>,
}

/// 채널 ID ⇄ 구독 키 레지스트리.
#[derive(Default)]
pub struct ChannelRegistry {
    inner: Mutex<ChannelMap>,
    changed: Notify,
}

impl ChannelRegistry {
    /// 빈 레지스트리를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 채널을 등록합니다. 같은 ID나 키의 낡은 매핑은 교체됩니다.
    pub fn insert(&self, channel_id: i64, key: impl Into<String>) {
        let key = key.into();
        {
            let mut map = self.inner.lock().expect("channel registry lock poisoned");
            if let Some(old_key) = map.by_id.insert(channel_id, key.clone()) {
                map.by_key.remove(&old_key);
            }
            if let Some(old_id) = map.by_key.insert(key, channel_id) {
                if old_id != channel_id {
                    map.by_id.remove(&old_id);
                }
            }
        }
        self.changed.notify_waiters();
    }

    /// 채널을 제거하고 키를 반환합니다. 대기자를 깨웁니다.
    pub fn remove(&self, channel_id: i64) -> Option<String> {
        let removed = {
            let mut map = self.inner.lock().expect("channel registry lock poisoned");
            let key = map.by_id.remove(&channel_id)?;
            map.by_key.remove(&key);
            Some(key)
        };
        self.changed.notify_waiters();
        removed
    }

    /// ID로 구독 키를 조회합니다.
    pub fn key_for(&self, channel_id: i64) -> Option<String> {
        self.inner
            .lock()
            .expect("channel registry lock poisoned")
            .by_id
            .get(&channel_id)
            .cloned()
    }

    /// 키로 채널 ID를 조회합니다.
    pub fn id_for(&self, key: &str) -> Option<i64> {
        self.inner
            .lock()
            .expect("channel registry lock poisoned")
            .by_key
            .get(key)
            .copied()
    }

    /// 활성 채널 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .expect("channel registry lock poisoned")
            .by_id
            .len()
    }

    /// 레지스트리가 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 활성 구독 키 목록을 반환합니다.
    pub fn keys(&self) -> Vec<String> {
        self.inner
            .lock()
            .expect("channel registry lock poisoned")
            .by_key
            .keys()
            .cloned()
            .collect()
    }

    /// `(id, key)` 쌍의 사본을 반환합니다.
    pub fn snapshot(&self) -> Vec<(i64, String)> {
        self.inner
            .lock()
            .expect("channel registry lock poisoned")
            .by_id
            .iter()
            .map(|(id, key)| (*id, key.clone()))
            .collect()
    }

    /// 모든 매핑을 제거합니다.
    pub fn clear(&self) {
        {
            let mut map = self.inner.lock().expect("channel registry lock poisoned");
            map.by_id.clear();
            map.by_key.clear();
        }
        self.changed.notify_waiters();
    }

    /// 스냅샷으로 레지스트리를 되돌립니다 (재구독 실패 시).
    pub fn restore(&self, entries: &[(i64, String)]) {
        {
            let mut map = self.inner.lock().expect("channel registry lock poisoned");
            map.by_id.clear();
            map.by_key.clear();
            for (id, key) in entries {
                map.by_id.insert(*id, key.clone());
                map.by_key.insert(key.clone(), *id);
            }
        }
        self.changed.notify_waiters();
    }

    /// 다음 변경까지 대기합니다.
    pub async fn wait_changed(&self) {
        self.changed.notified().await;
    }
}
