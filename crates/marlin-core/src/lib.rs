//! # Marlin Core
//!
//! 거래소 연결 계층의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 시스템 전반에서 사용되는 기본 타입을 제공합니다:
//! - 주문/포지션/지갑 레코드 (거래소 측 상태의 미러)
//! - 목표 진입/청산 타깃
//! - 캔들 및 타임프레임 정의
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use domain::*;
pub use error::CoreError;
pub use logging::*;
pub use types::*;
