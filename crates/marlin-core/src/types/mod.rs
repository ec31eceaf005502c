//! 공용 기본 타입.

pub mod timeframe;

pub use timeframe::Timeframe;
