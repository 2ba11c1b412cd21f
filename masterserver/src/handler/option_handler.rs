//! 옵션 핸들러
//!
//! 구매 메뉴 하위 메뉴 갱신을 유저 서비스에 반영합니다.

use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::debug;

use crate::protocol::codec::PacketReader;
use crate::protocol::packet_id::OptionOp;
use crate::protocol::packets_in::SetBuyMenuRequest;
use crate::server::ServerContext;
use crate::service::connection::Connection;

pub struct OptionHandler {
    ctx: Arc<ServerContext>,
}

impl OptionHandler {
    pub fn new(ctx: Arc<ServerContext>) -> Self {
        Self { ctx }
    }

    pub async fn handle(&self, conn: &Arc<Connection>, payload: &[u8]) -> Result<()> {
        let Some(session) = conn.session() else {
            bail!("세션 없는 연결 {}의 옵션 요청", conn.uuid());
        };

        let mut reader = PacketReader::new(payload);
        let op_byte = reader.read_u8()?;
        let Some(op) = OptionOp::from_u8(op_byte) else {
            bail!("알 수 없는 옵션 op: {}", op_byte);
        };

        match op {
            OptionOp::SetBuyMenu => {
                let request = SetBuyMenuRequest::parse(&mut reader)?;
                self.set_buy_menu(session.user_id(), request).await
            }
        }
    }

    /// 하위 메뉴 하나를 교체해 전체 구매 메뉴를 갱신합니다.
    async fn set_buy_menu(&self, user_id: u32, request: SetBuyMenuRequest) -> Result<()> {
        let mut menu = self
            .ctx
            .userservice
            .get_buy_menu(user_id)
            .await?
            .unwrap_or_default();

        let category = match request.submenu {
            0 => &mut menu.pistols,
            1 => &mut menu.shotguns,
            2 => &mut menu.smgs,
            3 => &mut menu.rifles,
            4 => &mut menu.snipers,
            5 => &mut menu.machineguns,
            6 => &mut menu.melees,
            7 => &mut menu.equipment,
            other => bail!("알 수 없는 구매 메뉴 하위 메뉴: {}", other),
        };
        *category = request.items;

        self.ctx.userservice.set_buy_menu(user_id, &menu).await?;
        debug!("사용자 {} 구매 메뉴 갱신 (하위 메뉴 {})", user_id, request.submenu);
        Ok(())
    }
}
