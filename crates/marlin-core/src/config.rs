//! 설정 관리.
//!
//! 이 모듈은 연결/실행/포트폴리오 정책의 설정 표면을 정의합니다.
//! 파일(toml)에서 로드하고 `MARLIN__` 접두사 환경 변수로 오버라이드합니다.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// 거래소 연결 설정
    pub exchange: ExchangeConfig,
    /// 하트비트/liveness 설정
    pub heartbeat: HeartbeatConfig,
    /// 재연결 제한 설정
    pub reconnect: ReconnectConfig,
    /// 주문 실행 설정
    pub execution: ExecutionConfig,
    /// 포트폴리오 리컨실리에이션 정책
    pub portfolio: PortfolioConfig,
    /// 로깅 설정
    pub logging: LoggingConfig,
}

/// 거래소 연결 설정.
///
/// API 키/시크릿이 없으면 인증 없는 읽기 전용 연결로 동작합니다.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// WebSocket 엔드포인트
    pub ws_url: String,
    /// API 키
    pub api_key: Option<String>,
    /// API 시크릿
    pub api_secret: Option<String>,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            ws_url: "wss://api.bitfinex.com/ws/2".to_string(),
            api_key: None,
            api_secret: None,
        }
    }
}

impl ExchangeConfig {
    /// 인증 자격증명이 구성되어 있는지 확인합니다.
    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some() && self.api_secret.is_some()
    }
}

/// 하트비트 및 liveness 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    /// 컨트롤러 폴링 주기 (초)
    pub poll_secs: u64,
    /// 이 시간 동안 송신이 없으면 ping 전송 (초)
    pub interval_secs: u64,
    /// 전역 하트비트 만료 임계치 (초)
    pub connection_timeout_secs: u64,
    /// 심볼별 시세 staleness 임계치 (초)
    pub ticker_timeout_secs: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            poll_secs: 3,
            interval_secs: 5,
            connection_timeout_secs: 30,
            ticker_timeout_secs: 300,
        }
    }
}

impl HeartbeatConfig {
    /// 폴링 주기를 Duration으로 반환합니다.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_secs)
    }

    /// ping 간격을 Duration으로 반환합니다.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// 전역 연결 타임아웃을 Duration으로 반환합니다.
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    /// 심볼별 staleness 임계치를 Duration으로 반환합니다.
    pub fn ticker_timeout(&self) -> Duration {
        Duration::from_secs(self.ticker_timeout_secs)
    }
}

/// 재연결 제한 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// 윈도우 내 허용 재연결 횟수
    pub max_events: u32,
    /// 슬라이딩 윈도우 크기 (초)
    pub window_secs: u64,
    /// 재구독 확인 폴링 횟수
    pub resubscribe_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_events: 3,
            window_secs: 120,
            resubscribe_attempts: 50,
        }
    }
}

/// 주문 실행 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// 주문 확인 대기 타임아웃 (초)
    pub confirm_timeout_secs: u64,
    /// 주문당 최대 시도 횟수
    pub retries: u32,
    /// 재시도 간 대기 (밀리초)
    pub retry_delay_ms: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            confirm_timeout_secs: 10,
            retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

impl ExecutionConfig {
    /// 확인 타임아웃을 Duration으로 반환합니다.
    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(self.confirm_timeout_secs)
    }

    /// 재시도 대기를 Duration으로 반환합니다.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// 지갑 운용 모드.
///
/// 자본 배분 분모 계산이 모드에 따라 다릅니다: 마진은 진입+청산을 모두
/// 세고, 현물은 진입만 셉니다 (청산된 현물 포지션은 자동으로 다른
/// 지갑으로 이동하므로).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletMode {
    /// 마진 거래
    Margin,
    /// 현물 거래
    Spot,
}

/// 포트폴리오 리컨실리에이션 정책.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PortfolioConfig {
    /// 투자 비율 (잔고 대비 0.0 ~ 1.0)
    pub investment_rate: Decimal,
    /// 포지션당 최소 주문 금액 (USD)
    pub min_order_usd: Decimal,
    /// 주문 수량 반올림 자릿수
    pub size_precision: u32,
    /// 지갑 운용 모드
    pub wallet_mode: WalletMode,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            investment_rate: Decimal::new(9, 1), // 0.9
            min_order_usd: Decimal::new(15, 0),
            size_precision: 8,
            wallet_mode: WalletMode::Margin,
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("MARLIN")
                    .separator("__")
                    .try_parsing(true),
            );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> Result<Self, config::ConfigError> {
        Self::load("config/default.toml")
    }

    /// 정책 값의 범위를 검증합니다.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.reconnect.max_events == 0 {
            return Err(config::ConfigError::Message(
                "reconnect.max_events must be positive".to_string(),
            ));
        }
        if self.reconnect.window_secs == 0 {
            return Err(config::ConfigError::Message(
                "reconnect.window_secs must be positive".to_string(),
            ));
        }
        if self.portfolio.investment_rate <= Decimal::ZERO
            || self.portfolio.investment_rate > Decimal::ONE
        {
            return Err(config::ConfigError::Message(
                "portfolio.investment_rate must be in (0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert!(!config.exchange.has_credentials());
        assert_eq!(config.portfolio.investment_rate, dec!(0.9));
        assert_eq!(config.portfolio.wallet_mode, WalletMode::Margin);
        assert_eq!(config.execution.retries, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_window() {
        let mut config = AppConfig::default();
        config.reconnect.window_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_investment_rate() {
        let mut config = AppConfig::default();
        config.portfolio.investment_rate = dec!(1.5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_has_credentials() {
        let mut exchange = ExchangeConfig::default();
        assert!(!exchange.has_credentials());

        exchange.api_key = Some("key".to_string());
        assert!(!exchange.has_credentials());

        exchange.api_secret = Some("secret".to_string());
        assert!(exchange.has_credentials());
    }
}
