//! 유저 서비스 생존 프로브
//!
//! 유저 서비스의 `/ping`을 주기적으로 호출하여 생존 여부를 추적합니다.
//! 의존 핸들러들은 `is_alive()`로 게이트되고, 클라이언트에서 전송 에러가
//! 발생하면 즉시 재확인이 예약됩니다.

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::config::UserServiceConfig;

/// 프로브 주기 (5초)
pub const PROBE_INTERVAL: Duration = Duration::from_secs(5);

/// 프로브 요청 타임아웃
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// 유저 서비스 생존 프로브
pub struct UserServiceProbe {
    http: reqwest::Client,
    ping_url: String,
    alive: Arc<AtomicBool>,
    is_running: Arc<Mutex<bool>>,
    ticker_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl UserServiceProbe {
    /// 새로운 프로브 생성
    ///
    /// 첫 체크 전까지는 낙관적으로 생존 상태로 시작합니다.
    pub fn new(config: &UserServiceConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            ping_url: format!("{}/ping", config.base_url()),
            alive: Arc::new(AtomicBool::new(true)),
            is_running: Arc::new(Mutex::new(false)),
            ticker_handle: Mutex::new(None),
        })
    }

    /// 현재 생존 상태 조회
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// 즉시 생존 체크를 수행하고 내부 상태를 갱신합니다.
    pub async fn check_now(&self) -> bool {
        let alive = Self::ping_once(&self.http, &self.ping_url).await;
        self.record(alive);
        alive
    }

    /// 전송 에러 직후 호출되는 비동기 재확인
    pub fn trigger_recheck(&self) {
        let http = self.http.clone();
        let ping_url = self.ping_url.clone();
        let alive = self.alive.clone();

        tokio::spawn(async move {
            let ok = Self::ping_once(&http, &ping_url).await;
            let was = alive.swap(ok, Ordering::AcqRel);
            if was != ok {
                if ok {
                    info!("✅ 유저 서비스 재확인: 응답 복구됨");
                } else {
                    warn!("유저 서비스 재확인: 응답 없음");
                }
            }
        });
    }

    /// 프로브 티커 시작 (5초 간격)
    pub async fn start(&self) -> Result<()> {
        let mut is_running = self.is_running.lock().await;

        if *is_running {
            warn!("유저 서비스 프로브가 이미 실행 중입니다");
            return Ok(());
        }

        *is_running = true;
        drop(is_running);

        info!(
            "🔄 유저 서비스 프로브 시작 ({}초 간격, {})",
            PROBE_INTERVAL.as_secs(),
            self.ping_url
        );

        let http = self.http.clone();
        let ping_url = self.ping_url.clone();
        let alive = self.alive.clone();
        let is_running_ref = self.is_running.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(PROBE_INTERVAL);

            while *is_running_ref.lock().await {
                ticker.tick().await;

                let ok = Self::ping_once(&http, &ping_url).await;
                let was = alive.swap(ok, Ordering::AcqRel);
                if was != ok {
                    if ok {
                        info!("✅ 유저 서비스 응답 복구됨");
                    } else {
                        warn!("유저 서비스가 응답하지 않습니다");
                    }
                }
            }

            info!("유저 서비스 프로브 종료");
        });

        *self.ticker_handle.lock().await = Some(handle);
        Ok(())
    }

    /// 프로브 티커 중지
    pub async fn stop(&self) {
        let mut is_running = self.is_running.lock().await;

        if !*is_running {
            return;
        }

        *is_running = false;
        drop(is_running);

        if let Some(handle) = self.ticker_handle.lock().await.take() {
            handle.abort();
            debug!("프로브 티커 핸들 종료됨");
        }

        info!("🛑 유저 서비스 프로브 중지 완료");
    }

    fn record(&self, alive: bool) {
        let was = self.alive.swap(alive, Ordering::AcqRel);
        if was != alive {
            if alive {
                info!("✅ 유저 서비스 응답 복구됨");
            } else {
                warn!("유저 서비스가 응답하지 않습니다");
            }
        }
    }

    async fn ping_once(http: &reqwest::Client, ping_url: &str) -> bool {
        match http.get(ping_url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!("유저 서비스 핑 실패: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// 아무도 듣지 않는 포트를 확보한다.
    async fn unused_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        port
    }

    #[tokio::test]
    async fn test_check_now_dead_upstream() {
        let config = UserServiceConfig {
            host: "127.0.0.1".to_string(),
            port: unused_port().await,
        };
        let probe = UserServiceProbe::new(&config).unwrap();

        assert!(probe.is_alive()); // 낙관적 초기 상태
        assert!(!probe.check_now().await);
        assert!(!probe.is_alive());
    }

    #[tokio::test]
    async fn test_start_stop_idempotent() {
        let config = UserServiceConfig {
            host: "127.0.0.1".to_string(),
            port: unused_port().await,
        };
        let probe = UserServiceProbe::new(&config).unwrap();

        probe.start().await.unwrap();
        probe.start().await.unwrap(); // 중복 시작은 무시
        probe.stop().await;
        probe.stop().await; // 중복 중지도 무시
    }
}
