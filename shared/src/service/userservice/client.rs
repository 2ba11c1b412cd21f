//! 유저 서비스 HTTP 클라이언트
//!
//! 계정/인벤토리의 영속 데이터를 소유하는 유저 서비스에 대한 요청 클라이언트입니다.
//! 읽기 경로 앞에는 짧은 TTL 캐시가 있고, 쓰기 작업은 해당 항목을 무효화합니다.
//! 전송 에러는 프로브 재확인을 걸고, 프로브가 죽은 동안 조회는 네트워크 호출
//! 없이 즉시 빈 결과를 돌려줍니다.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::cache::TtlCache;
use super::probe::UserServiceProbe;
use crate::config::UserServiceConfig;
use crate::model::{BuyMenu, Cosmetics, Inventory, Loadout, User};
use crate::tool::error::AppError;

/// HTTP 요청 타임아웃
const HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// 사용자 캐시 용량
pub const USER_CACHE_CAPACITY: usize = 100;

/// 캐시 TTL (15초)
pub const CACHE_TTL: Duration = Duration::from_secs(15);

/// 유저 서비스 클라이언트
pub struct UserServiceClient {
    http: reqwest::Client,
    base_url: String,
    probe: Arc<UserServiceProbe>,
    user_cache: TtlCache<u32, User>,
    session_cache: TtlCache<(), u32>,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    #[serde(rename = "userId")]
    user_id: i32,
}

#[derive(Debug, Deserialize)]
struct PingResponse {
    sessions: u32,
}

impl UserServiceClient {
    pub fn new(config: &UserServiceConfig, probe: Arc<UserServiceProbe>) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| AppError::Configuration(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url(),
            probe,
            user_cache: TtlCache::new(USER_CACHE_CAPACITY, CACHE_TTL),
            session_cache: TtlCache::new(1, CACHE_TTL),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// 전송 계층 실패를 AppError로 변환하고 프로브 재확인을 겁니다.
    fn transport_error(&self, operation: &str, err: reqwest::Error) -> AppError {
        warn!("유저 서비스 {} 전송 실패: {}", operation, err);
        self.probe.trigger_recheck();

        if err.is_timeout() {
            AppError::Timeout(format!("{}: {}", operation, err))
        } else {
            AppError::UpstreamUnavailable(format!("{}: {}", operation, err))
        }
    }

    fn gate(&self, operation: &str) -> Result<(), AppError> {
        if self.probe.is_alive() {
            Ok(())
        } else {
            debug!("유저 서비스 {} 차단: 프로브 비활성 상태", operation);
            Err(AppError::UpstreamUnavailable(format!(
                "{}: 유저 서비스가 응답하지 않는 상태입니다",
                operation
            )))
        }
    }

    async fn parse_json<T: DeserializeOwned>(
        operation: &str,
        resp: reqwest::Response,
    ) -> Result<T, AppError> {
        resp.json::<T>()
            .await
            .map_err(|e| AppError::InvalidResponse(format!("{}: {}", operation, e)))
    }

    // ── 인증 ──────────────────────────────────────────────────────────

    /// 로그인 검증
    ///
    /// 반환값: 사용자 id | 0 (계정 없음) | -1 (비밀번호 불일치)
    pub async fn login(&self, username: &str, password: &str) -> Result<i32, AppError> {
        self.gate("login")?;

        let resp = self
            .http
            .post(self.url("/users/auth/login"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .map_err(|e| self.transport_error("login", e))?;

        match resp.status() {
            reqwest::StatusCode::OK => {
                let auth: AuthResponse = Self::parse_json("login", resp).await?;
                Ok(auth.user_id)
            }
            reqwest::StatusCode::NOT_FOUND => Ok(0),
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => Ok(-1),
            status => Err(AppError::UpstreamUnavailable(format!(
                "login: 상태 코드 {}",
                status
            ))),
        }
    }

    /// 로그아웃 통지. 세션 카운트와 사용자 캐시를 무효화합니다.
    pub async fn logout(&self, user_id: u32) -> Result<(), AppError> {
        self.user_cache.invalidate(&user_id);
        self.session_cache.invalidate(&());

        let resp = self
            .http
            .post(self.url("/users/auth/logout"))
            .json(&json!({ "userId": user_id }))
            .send()
            .await
            .map_err(|e| self.transport_error("logout", e))?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(AppError::UpstreamUnavailable(format!(
                "logout: 상태 코드 {}",
                resp.status()
            )))
        }
    }

    /// 자격 증명 검증 (웹사이트/복구 플로우용)
    pub async fn validate_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<i32, AppError> {
        self.gate("validate_credentials")?;

        let resp = self
            .http
            .post(self.url("/users/auth/validate"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .map_err(|e| self.transport_error("validate_credentials", e))?;

        match resp.status() {
            reqwest::StatusCode::OK => {
                let auth: AuthResponse = Self::parse_json("validate_credentials", resp).await?;
                Ok(auth.user_id)
            }
            reqwest::StatusCode::NOT_FOUND => Ok(0),
            status => Err(AppError::UpstreamUnavailable(format!(
                "validate_credentials: 상태 코드 {}",
                status
            ))),
        }
    }

    /// 비밀번호 복구 검증
    pub async fn validate_password_recovery(
        &self,
        username: &str,
        security_answer: &str,
    ) -> Result<i32, AppError> {
        self.gate("validate_password_recovery")?;

        let resp = self
            .http
            .post(self.url("/users/auth/validate_security"))
            .json(&json!({ "username": username, "securityAnswer": security_answer }))
            .send()
            .await
            .map_err(|e| self.transport_error("validate_password_recovery", e))?;

        match resp.status() {
            reqwest::StatusCode::OK => {
                let auth: AuthResponse =
                    Self::parse_json("validate_password_recovery", resp).await?;
                Ok(auth.user_id)
            }
            reqwest::StatusCode::NOT_FOUND => Ok(0),
            status => Err(AppError::UpstreamUnavailable(format!(
                "validate_password_recovery: 상태 코드 {}",
                status
            ))),
        }
    }

    // ── 사용자 조회/관리 ─────────────────────────────────────────────

    /// id로 사용자 조회 (캐시 우선, 프로브 비활성 시 즉시 None)
    pub async fn get_by_id(&self, user_id: u32) -> Result<Option<User>, AppError> {
        if !self.probe.is_alive() {
            debug!("get_by_id({}) 차단: 프로브 비활성 상태", user_id);
            return Ok(None);
        }

        if let Some(user) = self.user_cache.get(&user_id) {
            return Ok(Some(user));
        }

        let resp = self
            .http
            .get(self.url(&format!("/users/{}", user_id)))
            .send()
            .await
            .map_err(|e| self.transport_error("get_by_id", e))?;

        match resp.status() {
            reqwest::StatusCode::OK => {
                let user: User = Self::parse_json("get_by_id", resp).await?;
                self.user_cache.insert(user_id, user.clone());
                Ok(Some(user))
            }
            reqwest::StatusCode::NOT_FOUND => Ok(None),
            status => Err(AppError::UpstreamUnavailable(format!(
                "get_by_id: 상태 코드 {}",
                status
            ))),
        }
    }

    /// 계정 이름으로 사용자 조회
    pub async fn get_by_name(&self, name: &str) -> Result<Option<User>, AppError> {
        if !self.probe.is_alive() {
            debug!("get_by_name({}) 차단: 프로브 비활성 상태", name);
            return Ok(None);
        }

        let resp = self
            .http
            .get(self.url(&format!("/users/byname/{}", name)))
            .send()
            .await
            .map_err(|e| self.transport_error("get_by_name", e))?;

        match resp.status() {
            reqwest::StatusCode::OK => {
                let user: User = Self::parse_json("get_by_name", resp).await?;
                self.user_cache.insert(user.id, user.clone());
                Ok(Some(user))
            }
            reqwest::StatusCode::NOT_FOUND => Ok(None),
            status => Err(AppError::UpstreamUnavailable(format!(
                "get_by_name: 상태 코드 {}",
                status
            ))),
        }
    }

    /// 신규 계정 생성
    pub async fn create_user(
        &self,
        username: &str,
        playername: &str,
        password: &str,
    ) -> Result<User, AppError> {
        self.gate("create_user")?;

        let resp = self
            .http
            .post(self.url("/users/"))
            .json(&json!({
                "username": username,
                "playername": playername,
                "password": password,
            }))
            .send()
            .await
            .map_err(|e| self.transport_error("create_user", e))?;

        if resp.status() == reqwest::StatusCode::CREATED {
            Self::parse_json("create_user", resp).await
        } else {
            Err(AppError::UpstreamUnavailable(format!(
                "create_user: 상태 코드 {}",
                resp.status()
            )))
        }
    }

    /// 비밀번호 변경
    pub async fn set_password(&self, user_id: u32, new_password: &str) -> Result<(), AppError> {
        self.gate("set_password")?;
        self.user_cache.invalidate(&user_id);

        let resp = self
            .http
            .put(self.url(&format!("/users/{}", user_id)))
            .json(&json!({ "password": new_password }))
            .send()
            .await
            .map_err(|e| self.transport_error("set_password", e))?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(AppError::UpstreamUnavailable(format!(
                "set_password: 상태 코드 {}",
                resp.status()
            )))
        }
    }

    /// 계정 삭제
    pub async fn delete_user(&self, user_id: u32) -> Result<(), AppError> {
        self.gate("delete_user")?;
        self.user_cache.invalidate(&user_id);

        let resp = self
            .http
            .delete(self.url(&format!("/users/{}", user_id)))
            .send()
            .await
            .map_err(|e| self.transport_error("delete_user", e))?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(AppError::UpstreamUnavailable(format!(
                "delete_user: 상태 코드 {}",
                resp.status()
            )))
        }
    }

    /// 현재 접속 세션 수 (캐시 우선)
    pub async fn session_count(&self) -> Result<u32, AppError> {
        if let Some(count) = self.session_cache.get(&()) {
            return Ok(count);
        }

        self.gate("session_count")?;

        let resp = self
            .http
            .get(self.url("/ping"))
            .send()
            .await
            .map_err(|e| self.transport_error("session_count", e))?;

        if resp.status().is_success() {
            let ping: PingResponse = Self::parse_json("session_count", resp).await?;
            self.session_cache.insert((), ping.sessions);
            Ok(ping.sessions)
        } else {
            Err(AppError::UpstreamUnavailable(format!(
                "session_count: 상태 코드 {}",
                resp.status()
            )))
        }
    }

    // ── 인벤토리 부트스트랩 ──────────────────────────────────────────

    async fn create_at(&self, operation: &str, path: String) -> Result<(), AppError> {
        self.gate(operation)?;

        let resp = self
            .http
            .post(self.url(&path))
            .send()
            .await
            .map_err(|e| self.transport_error(operation, e))?;

        if resp.status() == reqwest::StatusCode::CREATED || resp.status().is_success() {
            Ok(())
        } else {
            Err(AppError::UpstreamUnavailable(format!(
                "{}: 상태 코드 {}",
                operation,
                resp.status()
            )))
        }
    }

    pub async fn create_inventory(&self, user_id: u32) -> Result<(), AppError> {
        self.create_at("create_inventory", format!("/inventory/{}", user_id))
            .await
    }

    pub async fn create_cosmetics(&self, user_id: u32) -> Result<(), AppError> {
        self.create_at(
            "create_cosmetics",
            format!("/inventory/{}/cosmetics", user_id),
        )
        .await
    }

    pub async fn create_loadouts(&self, user_id: u32) -> Result<(), AppError> {
        self.create_at("create_loadouts", format!("/inventory/{}/loadout", user_id))
            .await
    }

    pub async fn create_buy_menu(&self, user_id: u32) -> Result<(), AppError> {
        self.create_at("create_buy_menu", format!("/inventory/{}/buymenu", user_id))
            .await
    }

    // ── 인벤토리 조회 ────────────────────────────────────────────────

    async fn fetch_optional<T: DeserializeOwned>(
        &self,
        operation: &str,
        path: String,
    ) -> Result<Option<T>, AppError> {
        if !self.probe.is_alive() {
            debug!("{} 차단: 프로브 비활성 상태", operation);
            return Ok(None);
        }

        let resp = self
            .http
            .get(self.url(&path))
            .send()
            .await
            .map_err(|e| self.transport_error(operation, e))?;

        match resp.status() {
            reqwest::StatusCode::OK => Ok(Some(Self::parse_json(operation, resp).await?)),
            reqwest::StatusCode::NOT_FOUND => Ok(None),
            status => Err(AppError::UpstreamUnavailable(format!(
                "{}: 상태 코드 {}",
                operation, status
            ))),
        }
    }

    pub async fn get_inventory(&self, user_id: u32) -> Result<Option<Inventory>, AppError> {
        self.fetch_optional("get_inventory", format!("/inventory/{}", user_id))
            .await
    }

    pub async fn get_cosmetics(&self, user_id: u32) -> Result<Option<Cosmetics>, AppError> {
        self.fetch_optional("get_cosmetics", format!("/inventory/{}/cosmetics", user_id))
            .await
    }

    pub async fn get_loadouts(&self, user_id: u32) -> Result<Option<Vec<Loadout>>, AppError> {
        self.fetch_optional("get_loadouts", format!("/inventory/{}/loadout", user_id))
            .await
    }

    pub async fn get_buy_menu(&self, user_id: u32) -> Result<Option<BuyMenu>, AppError> {
        self.fetch_optional("get_buy_menu", format!("/inventory/{}/buymenu", user_id))
            .await
    }

    // ── 인벤토리 설정 ────────────────────────────────────────────────

    /// 로드아웃 슬롯에 무기 장착
    pub async fn set_loadout_weapon(
        &self,
        user_id: u32,
        loadout_num: u8,
        weapon_slot: u8,
        item_id: u32,
    ) -> Result<(), AppError> {
        self.gate("set_loadout_weapon")?;

        let resp = self
            .http
            .put(self.url(&format!("/inventory/{}/loadout", user_id)))
            .json(&json!({
                "loadoutNum": loadout_num,
                "weaponSlot": weapon_slot,
                "itemId": item_id,
            }))
            .send()
            .await
            .map_err(|e| self.transport_error("set_loadout_weapon", e))?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(AppError::UpstreamUnavailable(format!(
                "set_loadout_weapon: 상태 코드 {}",
                resp.status()
            )))
        }
    }

    /// 치장 슬롯 장착
    pub async fn set_cosmetic_slot(
        &self,
        user_id: u32,
        slot: u8,
        item_id: u32,
    ) -> Result<(), AppError> {
        self.gate("set_cosmetic_slot")?;

        let resp = self
            .http
            .put(self.url(&format!("/inventory/{}/cosmetics", user_id)))
            .json(&json!({ "slot": slot, "itemId": item_id }))
            .send()
            .await
            .map_err(|e| self.transport_error("set_cosmetic_slot", e))?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(AppError::UpstreamUnavailable(format!(
                "set_cosmetic_slot: 상태 코드 {}",
                resp.status()
            )))
        }
    }

    /// 구매 메뉴 전체 갱신
    pub async fn set_buy_menu(&self, user_id: u32, menu: &BuyMenu) -> Result<(), AppError> {
        self.gate("set_buy_menu")?;

        let resp = self
            .http
            .put(self.url(&format!("/inventory/{}/buymenu", user_id)))
            .json(menu)
            .send()
            .await
            .map_err(|e| self.transport_error("set_buy_menu", e))?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(AppError::UpstreamUnavailable(format!(
                "set_buy_menu: 상태 코드 {}",
                resp.status()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn dead_client() -> UserServiceClient {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = UserServiceConfig {
            host: "127.0.0.1".to_string(),
            port,
        };
        let probe = Arc::new(UserServiceProbe::new(&config).unwrap());
        probe.check_now().await;
        UserServiceClient::new(&config, probe).unwrap()
    }

    #[tokio::test]
    async fn test_get_short_circuits_when_probe_dead() {
        let client = dead_client().await;

        // 프로브가 죽은 상태에서는 네트워크 호출 없이 None
        assert!(matches!(client.get_by_id(99).await, Ok(None)));
        assert!(matches!(client.get_by_name("alice").await, Ok(None)));
        assert!(matches!(client.get_inventory(99).await, Ok(None)));
    }

    #[tokio::test]
    async fn test_login_gated_when_probe_dead() {
        let client = dead_client().await;

        assert!(matches!(
            client.login("alice", "pw").await,
            Err(AppError::UpstreamUnavailable(_))
        ));
    }
}
