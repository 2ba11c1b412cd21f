//! 업적 핸들러
//!
//! 업적 페이로드는 이 서버에서 해석하지 않는 불투명 블롭입니다.
//! 클라이언트가 기대하는 고정 응답만 돌려줍니다.

use anyhow::{bail, Result};
use std::sync::Arc;

use crate::protocol::packets_out;
use crate::server::ServerContext;
use crate::service::connection::Connection;

pub struct AchievementHandler {
    _ctx: Arc<ServerContext>,
}

impl AchievementHandler {
    pub fn new(ctx: Arc<ServerContext>) -> Self {
        Self { _ctx: ctx }
    }

    pub async fn handle(&self, conn: &Arc<Connection>, _payload: &[u8]) -> Result<()> {
        if conn.session().is_none() {
            bail!("세션 없는 연결 {}의 업적 요청", conn.uuid());
        }

        conn.send(&packets_out::achievement_response()).await?;
        Ok(())
    }
}
