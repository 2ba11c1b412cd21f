//! 로그인 핸들러
//!
//! 유저 서비스로 자격을 검증하고, 세션을 만들어 레지스트리에 등록한 뒤
//! 로그인 번들을 순서대로 내려보냅니다:
//! UserStart → 업적 블롭 → 전체 사용자 정보 → 인벤토리 묶음 → 채널 목록.

use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::{info, warn};

use super::send_dialog;
use crate::channel::session::UserSession;
use crate::protocol::packets_in::LoginRequest;
use crate::protocol::packets_out;
use crate::server::ServerContext;
use crate::service::connection::Connection;
use crate::tool::strings;
use shared::model::{BuyMenu, Cosmetics, Inventory, Loadout};

/// 로그인 핸들러
pub struct LoginHandler {
    ctx: Arc<ServerContext>,
}

impl LoginHandler {
    pub fn new(ctx: Arc<ServerContext>) -> Self {
        Self { ctx }
    }

    pub async fn handle(&self, conn: &Arc<Connection>, payload: &[u8]) -> Result<()> {
        let request = LoginRequest::parse(payload)?;

        if conn.session().is_some() {
            send_dialog(conn, strings::GAME_LOGIN_DUPLICATE).await;
            bail!("연결 {}가 이미 로그인된 상태에서 재로그인 시도", conn.uuid());
        }

        // 유저 서비스 자격 검증
        let user_id = match self
            .ctx
            .userservice
            .login(&request.username, &request.password)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                send_dialog(conn, strings::GAME_LOGIN_SERVICE_DOWN).await;
                return Err(e.into());
            }
        };

        if user_id == 0 {
            send_dialog(conn, strings::GAME_LOGIN_BAD_USERNAME).await;
            bail!("존재하지 않는 계정: {}", request.username);
        }
        if user_id < 0 {
            send_dialog(conn, strings::GAME_LOGIN_BAD_PASSWORD).await;
            bail!("비밀번호 불일치: {}", request.username);
        }

        let user = match self.ctx.userservice.get_by_id(user_id as u32).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                send_dialog(conn, strings::GAME_LOGIN_INVALID_USERINFO).await;
                bail!("로그인 후 사용자 레코드 조회 실패: {}", user_id);
            }
            Err(e) => {
                send_dialog(conn, strings::GAME_LOGIN_SERVICE_DOWN).await;
                return Err(e.into());
            }
        };

        // 중복 접속 거부 (기존 세션 유지)
        if self.ctx.registry.find_by_owner_id(user.id).is_some() {
            send_dialog(conn, strings::GAME_LOGIN_DUPLICATE).await;
            bail!("중복 로그인 시도: {} ({})", user.player_name, user.id);
        }

        let session = Arc::new(UserSession::new(user.clone(), conn.remote_addr()));
        conn.attach_session(session);

        if !self.ctx.registry.add(conn) {
            conn.detach_session();
            send_dialog(conn, strings::GAME_LOGIN_DUPLICATE).await;
            bail!("레지스트리 등록 경합 패배: {}", user.id);
        }

        // 로그인 번들 (순서 보장: 연결 쓰기 레인이 직렬화)
        conn.send(&packets_out::user_start(
            user.id,
            &user.user_name,
            &user.player_name,
            self.ctx.holepunch_port(),
        )?)
        .await?;
        conn.send(&packets_out::achievement_response()).await?;
        conn.send(&packets_out::user_info_full(&user)?).await?;

        let (inventory, cosmetics, loadouts, buy_menu) = self.fetch_or_bootstrap(user.id).await;
        conn.send(&packets_out::inventory_items(user.id, &inventory))
            .await?;
        conn.send(&packets_out::inventory_favorites(
            user.id, &cosmetics, &loadouts, &buy_menu,
        ))
        .await?;

        self.ctx.directory.send_channel_list_to(conn).await?;

        info!(
            "✅ 로그인 완료: {} (id {}) [{}]",
            user.player_name,
            user.id,
            conn.remote_addr()
        );
        Ok(())
    }

    /// 인벤토리 묶음 조회. 서비스에 레코드가 없으면 부트스트랩을 시도하고,
    /// 그래도 없으면 기본값으로 내려보냅니다.
    async fn fetch_or_bootstrap(
        &self,
        user_id: u32,
    ) -> (Inventory, Cosmetics, Vec<Loadout>, BuyMenu) {
        let inventory = match self.ctx.userservice.get_inventory(user_id).await {
            Ok(Some(inv)) => inv,
            Ok(None) => {
                if let Err(e) = self.ctx.userservice.create_inventory(user_id).await {
                    warn!("인벤토리 부트스트랩 실패 ({}): {}", user_id, e);
                }
                self.ctx
                    .userservice
                    .get_inventory(user_id)
                    .await
                    .ok()
                    .flatten()
                    .unwrap_or_default()
            }
            Err(e) => {
                warn!("인벤토리 조회 실패 ({}): {}", user_id, e);
                Inventory::default()
            }
        };

        let cosmetics = match self.ctx.userservice.get_cosmetics(user_id).await {
            Ok(Some(c)) => c,
            Ok(None) => {
                if let Err(e) = self.ctx.userservice.create_cosmetics(user_id).await {
                    warn!("치장 부트스트랩 실패 ({}): {}", user_id, e);
                }
                self.ctx
                    .userservice
                    .get_cosmetics(user_id)
                    .await
                    .ok()
                    .flatten()
                    .unwrap_or_default()
            }
            Err(e) => {
                warn!("치장 조회 실패 ({}): {}", user_id, e);
                Cosmetics::default()
            }
        };

        let loadouts = match self.ctx.userservice.get_loadouts(user_id).await {
            Ok(Some(l)) if !l.is_empty() => l,
            Ok(_) => {
                if let Err(e) = self.ctx.userservice.create_loadouts(user_id).await {
                    warn!("로드아웃 부트스트랩 실패 ({}): {}", user_id, e);
                }
                self.ctx
                    .userservice
                    .get_loadouts(user_id)
                    .await
                    .ok()
                    .flatten()
                    .unwrap_or_else(Self::default_loadouts)
            }
            Err(e) => {
                warn!("로드아웃 조회 실패 ({}): {}", user_id, e);
                Self::default_loadouts()
            }
        };

        let buy_menu = match self.ctx.userservice.get_buy_menu(user_id).await {
            Ok(Some(b)) => b,
            Ok(None) => {
                if let Err(e) = self.ctx.userservice.create_buy_menu(user_id).await {
                    warn!("구매 메뉴 부트스트랩 실패 ({}): {}", user_id, e);
                }
                self.ctx
                    .userservice
                    .get_buy_menu(user_id)
                    .await
                    .ok()
                    .flatten()
                    .unwrap_or_default()
            }
            Err(e) => {
                warn!("구매 메뉴 조회 실패 ({}): {}", user_id, e);
                BuyMenu::default()
            }
        };

        (inventory, cosmetics, loadouts, buy_menu)
    }

    fn default_loadouts() -> Vec<Loadout> {
        (0..3)
            .map(|n| Loadout {
                loadout_num: n,
                ..Default::default()
            })
            .collect()
    }
}
