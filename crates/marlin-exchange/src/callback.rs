//! 스레드 안전 멀티 구독자 콜백 레지스트리.
//!
//! 상태 저장소의 모든 변경은 이 레지스트리를 통해 구독자에게 전달됩니다.
//! 알림은 세마포어로 크기가 제한된 워커 풀에서 비동기로 실행되므로,
//! 느리거나 잘못 동작하는 구독자가 소켓 리더 경로를 막을 수 없습니다.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::Semaphore;
use tracing::trace;

/// 등록된 콜백의 식별자.
pub type CallbackId = u64;

/// 동시에 실행될 수 있는 알림 태스크 수의 기본값.
const DEFAULT_MAX_IN_FLIGHT: usize = 16;

type Handler<E> = Arc<dyn Fn(E) + Send + Sync>;

/// 멀티 구독자 알림 레지스트리.
pub struct CallbackRegistry<E> {
    handlers: RwLock<HashMap<CallbackId, Handler<E>>>,
    next_id: AtomicU64,
    pool: Arc<Semaphore>,
}

impl<E> Default for CallbackRegistry<E> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IN_FLIGHT)
    }
}

impl<E> CallbackRegistry<E> {
    /// 알림 동시 실행 한도를 지정해 레지스트리를 생성합니다.
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            pool: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }

    /// 콜백을 등록하고 해제용 ID를 반환합니다.
    pub fn register(&self, handler: impl Fn(E) + Send + Sync + 'static) -> CallbackId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers
            .write()
            .expect("callback registry lock poisoned")
            .insert(id, Arc::new(handler));
        id
    }

    /// 콜백을 해제합니다. 등록되어 있었다면 true를 반환합니다.
    pub fn unregister(&self, id: CallbackId) -> bool {
        self.handlers
            .write()
            .expect("callback registry lock poisoned")
            .remove(&id)
            .is_some()
    }

    /// 등록된 콜백 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.handlers
            .read()
            .expect("callback registry lock poisoned")
            .len()
    }

    /// 레지스트리가 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E: Clone + Send + 'static> CallbackRegistry<E> {
    /// 모든 구독자에게 이벤트를 비동기로 전달합니다.
    ///
    /// 호출자는 절대 구독자 코드 실행을 기다리지 않습니다.
    pub fn notify(&self, event: E) {
        let handlers: Vec<Handler<E>> = self
            .handlers
            .read()
            .expect("callback registry lock poisoned")
            .values()
            .cloned()
            .collect();

        if handlers.is_empty() {
            return;
        }
        trace!(subscribers = handlers.len(), "Dispatching event");

        for handler in handlers {
            let pool = Arc::clone(&self.pool);
            let event = event.clone();
            tokio::spawn(async move {
                let _permit = pool.acquire_owned().await;
                handler(event);
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_register_and_notify() {
        let registry = CallbackRegistry::<u32>::default();
        let (tx, mut rx) = mpsc::unbounded_channel();

        registry.register(move |v| {
            let _ = tx.send(v);
        });
        registry.notify(7);

        let got = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap();
        assert_eq!(got, Some(7));
    }

    #[tokio::test]
    async fn test_unregister_stops_delivery() {
        let registry = CallbackRegistry::<u32>::default();
        let counter = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&counter);
        let id = registry.register(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert!(registry.unregister(id));
        assert!(!registry.unregister(id));

        registry.notify(1);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let registry = CallbackRegistry::<()>::default();
        let a = registry.register(|_| {});
        let b = registry.register(|_| {});
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_all_subscribers_receive_event() {
        let registry = CallbackRegistry::<u32>::new(2);
        let (tx, mut rx) = mpsc::unbounded_channel();

        for _ in 0..5 {
            let tx = tx.clone();
            registry.register(move |v| {
                let _ = tx.send(v);
            });
        }
        drop(tx);

        registry.notify(3);

        let mut received = 0;
        while let Ok(Some(v)) = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await {
            assert_eq!(v, 3);
            received += 1;
            if received == 5 {
                break;
            }
        }
        assert_eq!(received, 5);
    }
}
