//! 유저 서비스 환경 설정 모듈
//!
//! .env 파일과 시스템 환경변수에서 유저 서비스 접속 정보를 로드합니다.

use anyhow::{bail, Result};
use std::path::Path;
use tracing::{info, warn};

/// 유저 서비스 접속 설정
///
/// `USERSERVICE_HOST`와 `USERSERVICE_PORT`는 필수 환경변수입니다.
#[derive(Debug, Clone)]
pub struct UserServiceConfig {
    /// 유저 서비스 호스트 주소
    pub host: String,
    /// 유저 서비스 포트 번호
    pub port: u16,
}

impl UserServiceConfig {
    /// 환경변수에서 설정을 로드합니다.
    ///
    /// 로드 순서:
    /// 1. 상위/현재 디렉토리의 .env 파일
    /// 2. 시스템 환경변수
    ///
    /// 필수 변수가 없으면 에러를 반환합니다.
    pub fn from_env() -> Result<Self> {
        Self::load_env_file();

        let host = match std::env::var("USERSERVICE_HOST") {
            Ok(v) if !v.is_empty() => v,
            _ => bail!("필수 환경변수 USERSERVICE_HOST가 설정되지 않았습니다"),
        };

        let port: u16 = match std::env::var("USERSERVICE_PORT") {
            Ok(v) => v
                .parse()
                .map_err(|_| anyhow::anyhow!("USERSERVICE_PORT가 유효한 포트 번호가 아닙니다: {}", v))?,
            Err(_) => bail!("필수 환경변수 USERSERVICE_PORT가 설정되지 않았습니다"),
        };

        let config = Self { host, port };
        validate_config(&config)?;

        info!("유저 서비스 설정 로드 완료: {:?}", config);
        Ok(config)
    }

    /// 유저 서비스 베이스 URL을 반환합니다.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// .env 파일을 로드합니다.
    fn load_env_file() {
        let env_paths = ["../.env", ".env", "../../.env"];

        let mut loaded = false;
        for path in env_paths {
            if Path::new(path).exists() && dotenv::from_filename(path).is_ok() {
                info!(".env 파일 로드 성공: {}", path);
                loaded = true;
                break;
            }
        }

        if !loaded {
            warn!(".env 파일을 찾을 수 없습니다. 시스템 환경변수를 사용합니다.");
        }
    }
}

/// 설정 검증 유틸리티
pub fn validate_config(config: &UserServiceConfig) -> Result<()> {
    if config.host.is_empty() {
        bail!("유저 서비스 호스트 주소가 비어있습니다");
    }

    if config.port == 0 {
        bail!("유효하지 않은 유저 서비스 포트 번호: {}", config.port);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url() {
        let config = UserServiceConfig {
            host: "127.0.0.1".to_string(),
            port: 30100,
        };
        assert_eq!(config.base_url(), "http://127.0.0.1:30100");
    }

    #[test]
    fn test_validate_rejects_empty_host() {
        let config = UserServiceConfig {
            host: String::new(),
            port: 30100,
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_port() {
        let config = UserServiceConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        };
        assert!(validate_config(&config).is_err());
    }
}
