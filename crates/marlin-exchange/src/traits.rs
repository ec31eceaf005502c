//! 실행 계층이 거래소 클라이언트에 기대하는 최소 표면.
//!
//! 주문 실행기와 포트폴리오 조정기는 구체 클라이언트 대신 이 트레이트에
//! 의존하므로 네트워크 없이 테스트할 수 있습니다.

use async_trait::async_trait;

use marlin_core::NewOrder;

use crate::connector::bitfinex::{OrderStore, PositionStore, WalletStore};

/// 주문 제출/취소와 계정 상태 조회를 제공하는 게이트웨이.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// 인증 핸드셰이크가 완료되었는지 여부.
    fn is_authenticated(&self) -> bool;

    /// 주문을 제출합니다. 전송 실패는 로깅만 하고 확인은
    /// 주문 스토어 콜백으로 전달됩니다.
    async fn submit_order(&self, order: &NewOrder);

    /// 주문 취소를 요청합니다.
    async fn cancel_order(&self, order_id: i64);

    /// 활성 주문 미러.
    fn orders(&self) -> &OrderStore;

    /// 지갑 미러.
    fn wallets(&self) -> &WalletStore;

    /// 포지션 미러.
    fn positions(&self) -> &PositionStore;
}
