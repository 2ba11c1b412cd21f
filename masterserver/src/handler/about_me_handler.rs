//! AboutMe 핸들러
//!
//! 클라이언트의 내 정보 갱신 요청에 전체 사용자 정보로 응답합니다.

use anyhow::{bail, Result};
use std::sync::Arc;

use super::send_dialog;
use crate::protocol::packets_out;
use crate::server::ServerContext;
use crate::service::connection::Connection;
use crate::tool::strings;

pub struct AboutMeHandler {
    ctx: Arc<ServerContext>,
}

impl AboutMeHandler {
    pub fn new(ctx: Arc<ServerContext>) -> Self {
        Self { ctx }
    }

    pub async fn handle(&self, conn: &Arc<Connection>, _payload: &[u8]) -> Result<()> {
        let Some(session) = conn.session() else {
            bail!("세션 없는 연결 {}의 AboutMe 요청", conn.uuid());
        };

        // 캐시를 거쳐 최신 레코드를 다시 읽는다
        let user = match self.ctx.userservice.get_by_id(session.user_id()).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                send_dialog(conn, strings::GAME_LOGIN_INVALID_USERINFO).await;
                bail!("사용자 레코드 조회 실패: {}", session.user_id());
            }
            Err(e) => return Err(e.into()),
        };

        conn.send(&packets_out::user_info_full(&user)?).await?;
        Ok(())
    }
}
