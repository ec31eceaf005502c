//! 캔들 데이터를 위한 타임프레임 정의.
//!
//! 거래소 캔들 채널은 `trade:<타임프레임>:<심볼>` 형식의 키로 구독합니다.
//! 이 모듈은 타임프레임과 해당 키 인코딩/디코딩을 제공합니다.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::CoreError;

/// 캔들 타임프레임.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    /// 1분봉
    M1,
    /// 5분봉
    M5,
    /// 15분봉
    M15,
    /// 30분봉
    M30,
    /// 1시간봉
    H1,
    /// 3시간봉
    H3,
    /// 6시간봉
    H6,
    /// 12시간봉
    H12,
    /// 일봉
    D1,
    /// 주봉
    W1,
    /// 2주봉
    W2,
    /// 월봉
    MN1,
}

impl Timeframe {
    /// 이 타임프레임의 기간을 반환합니다.
    pub fn duration(&self) -> Duration {
        match self {
            Timeframe::M1 => Duration::from_secs(60),
            Timeframe::M5 => Duration::from_secs(5 * 60),
            Timeframe::M15 => Duration::from_secs(15 * 60),
            Timeframe::M30 => Duration::from_secs(30 * 60),
            Timeframe::H1 => Duration::from_secs(60 * 60),
            Timeframe::H3 => Duration::from_secs(3 * 60 * 60),
            Timeframe::H6 => Duration::from_secs(6 * 60 * 60),
            Timeframe::H12 => Duration::from_secs(12 * 60 * 60),
            Timeframe::D1 => Duration::from_secs(24 * 60 * 60),
            Timeframe::W1 => Duration::from_secs(7 * 24 * 60 * 60),
            Timeframe::W2 => Duration::from_secs(14 * 24 * 60 * 60),
            Timeframe::MN1 => Duration::from_secs(30 * 24 * 60 * 60), // 근사값
        }
    }

    /// 거래소 간격 문자열로 변환합니다.
    pub fn as_exchange_interval(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H3 => "3h",
            Timeframe::H6 => "6h",
            Timeframe::H12 => "12h",
            Timeframe::D1 => "1D",
            Timeframe::W1 => "7D",
            Timeframe::W2 => "14D",
            Timeframe::MN1 => "1M",
        }
    }

    /// 거래소 간격 문자열에서 파싱합니다.
    pub fn from_exchange_interval(s: &str) -> Option<Self> {
        match s {
            "1m" => Some(Timeframe::M1),
            "5m" => Some(Timeframe::M5),
            "15m" => Some(Timeframe::M15),
            "30m" => Some(Timeframe::M30),
            "1h" => Some(Timeframe::H1),
            "3h" => Some(Timeframe::H3),
            "6h" => Some(Timeframe::H6),
            "12h" => Some(Timeframe::H12),
            "1D" => Some(Timeframe::D1),
            "7D" => Some(Timeframe::W1),
            "14D" => Some(Timeframe::W2),
            "1M" => Some(Timeframe::MN1),
            _ => None,
        }
    }

    /// 캔들 채널 구독 키를 생성합니다 (예: `trade:1m:tBTCUSD`).
    pub fn candle_key(&self, symbol: &str) -> String {
        format!("trade:{}:{}", self.as_exchange_interval(), symbol)
    }

    /// 캔들 채널 키에서 타임프레임과 심볼을 파싱합니다.
    pub fn parse_candle_key(key: &str) -> Option<(Timeframe, String)> {
        let mut parts = key.splitn(3, ':');
        if parts.next() != Some("trade") {
            return None;
        }
        let timeframe = Self::from_exchange_interval(parts.next()?)?;
        let symbol = parts.next()?;
        if symbol.is_empty() {
            return None;
        }
        Some((timeframe, symbol.to_string()))
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_exchange_interval())
    }
}

impl FromStr for Timeframe {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_exchange_interval(s).ok_or_else(|| CoreError::InvalidTimeframe(s.to_string()))
    }
}
