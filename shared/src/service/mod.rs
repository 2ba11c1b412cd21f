//! 공용 서비스 레이어
//!
//! 유저 서비스 HTTP 클라이언트와 그 앞단의 캐시, 생존 프로브를 제공합니다.

pub mod userservice;

pub use userservice::{TtlCache, UserServiceClient, UserServiceProbe};
