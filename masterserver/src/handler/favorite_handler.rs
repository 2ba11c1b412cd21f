//! 즐겨찾기 핸들러
//!
//! 로드아웃 무기와 치장 슬롯 변경을 유저 서비스에 반영합니다.

use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::debug;

use crate::protocol::codec::PacketReader;
use crate::protocol::packet_id::FavoriteOp;
use crate::protocol::packets_in::{SetCosmeticsRequest, SetLoadoutRequest};
use crate::server::ServerContext;
use crate::service::connection::Connection;

pub struct FavoriteHandler {
    ctx: Arc<ServerContext>,
}

impl FavoriteHandler {
    pub fn new(ctx: Arc<ServerContext>) -> Self {
        Self { ctx }
    }

    pub async fn handle(&self, conn: &Arc<Connection>, payload: &[u8]) -> Result<()> {
        let Some(session) = conn.session() else {
            bail!("세션 없는 연결 {}의 즐겨찾기 요청", conn.uuid());
        };
        let user_id = session.user_id();

        let mut reader = PacketReader::new(payload);
        let op_byte = reader.read_u8()?;
        let Some(op) = FavoriteOp::from_u8(op_byte) else {
            bail!("알 수 없는 즐겨찾기 op: {}", op_byte);
        };

        match op {
            FavoriteOp::SetLoadout => {
                let request = SetLoadoutRequest::parse(&mut reader)?;
                self.ctx
                    .userservice
                    .set_loadout_weapon(
                        user_id,
                        request.loadout_num,
                        request.weapon_slot,
                        request.item_id,
                    )
                    .await?;
                debug!(
                    "사용자 {} 로드아웃 {} 슬롯 {} ← 아이템 {}",
                    user_id, request.loadout_num, request.weapon_slot, request.item_id
                );
            }
            FavoriteOp::SetCosmetics => {
                let request = SetCosmeticsRequest::parse(&mut reader)?;
                self.ctx
                    .userservice
                    .set_cosmetic_slot(user_id, request.slot, request.item_id)
                    .await?;
                debug!(
                    "사용자 {} 치장 슬롯 {} ← 아이템 {}",
                    user_id, request.slot, request.item_id
                );
            }
        }

        Ok(())
    }
}
