//! 마스터 서버 공용 라이브러리
//!
//! 마스터 서버와 주변 백엔드 서비스가 함께 사용하는 코드를 모아둔 크레이트입니다.
//! 유저 서비스 HTTP 클라이언트, 사용자/인벤토리 모델, 환경 설정, 공통 에러를 포함합니다.
//!
//! # 모듈 구조
//!
//! - **model**: 유저 서비스와 주고받는 사용자/인벤토리 레코드
//! - **config**: 환경변수 기반 유저 서비스 설정
//! - **service**: 유저 서비스 HTTP 클라이언트, TTL 캐시, 생존 프로브
//! - **tool**: 공통 에러 타입

pub mod config;
pub mod model;
pub mod service;
pub mod tool;

pub use config::UserServiceConfig;
pub use model::{BuyMenu, Cosmetics, Inventory, Loadout, User};
pub use service::userservice::{UserServiceClient, UserServiceProbe};
pub use tool::error::AppError;
