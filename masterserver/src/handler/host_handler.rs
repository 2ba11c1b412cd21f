//! 호스트 핸들러
//!
//! 호스트 권한이 필요한 작업을 처리합니다: 게임 종료, 사용자별 데이터
//! 전달(SetInventory/SetLoadout/SetBuyMenu), 팀 변경/아이템 사용 통지.
//! 전달류 op는 요청자가 현재 방의 호스트인지 검증한 뒤 레지스트리로
//! 대상 연결을 해석해 호스트 범위 패킷을 넘깁니다. 해석에 실패하면
//! 거부합니다.

use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::{info, warn};

use crate::channel::channel::RoomListEntry;
use crate::channel::room::{Room, Team};
use crate::channel::session::UserSession;
use crate::protocol::codec::PacketReader;
use crate::protocol::packet_id::HostOp;
use crate::protocol::packets_in::{HostForwardRequest, ItemUsingRequest, TeamChangingRequest};
use crate::protocol::packets_out;
use crate::server::ServerContext;
use crate::service::connection::Connection;

pub struct HostHandler {
    ctx: Arc<ServerContext>,
}

impl HostHandler {
    pub fn new(ctx: Arc<ServerContext>) -> Self {
        Self { ctx }
    }

    fn room_of(
        &self,
        session: &UserSession,
    ) -> Result<Arc<tokio::sync::Mutex<Room>>> {
        let Some((server_index, channel_index)) = session.channel() else {
            bail!("채널 밖에서 들어온 호스트 요청 (사용자 {})", session.user_id());
        };
        let Some(channel) = self
            .ctx
            .directory
            .channel_by_index(server_index, channel_index)
        else {
            bail!("세션이 가리키는 채널 없음: ({}, {})", server_index, channel_index);
        };
        let Some(room_id) = session.room_id() else {
            bail!("방 밖에서 들어온 호스트 요청 (사용자 {})", session.user_id());
        };
        channel
            .room(room_id)
            .ok_or_else(|| anyhow::anyhow!("세션이 가리키는 방 없음: {}", room_id))
    }

    pub async fn handle(&self, conn: &Arc<Connection>, payload: &[u8]) -> Result<()> {
        let Some(session) = conn.session() else {
            bail!("세션 없는 연결 {}의 호스트 요청", conn.uuid());
        };

        let mut reader = PacketReader::new(payload);
        let op_byte = reader.read_u8()?;
        let Some(op) = HostOp::from_u8(op_byte) else {
            bail!("알 수 없는 호스트 op: {}", op_byte);
        };

        match op {
            HostOp::OnGameEnd => self.on_game_end(&session).await,
            HostOp::SetInventory | HostOp::SetLoadout | HostOp::SetBuyMenu => {
                let request = HostForwardRequest::parse(&mut reader)?;
                self.forward(&session, op, request.target_user_id, &request.data)
                    .await
            }
            HostOp::TeamChanging => {
                let request = TeamChangingRequest::parse(&mut reader)?;
                if Team::from_u8(request.team).is_none() {
                    bail!("알 수 없는 팀 값: {}", request.team);
                }
                self.forward(&session, op, request.target_user_id, &[request.team])
                    .await
            }
            HostOp::ItemUsing => {
                let request = ItemUsingRequest::parse(&mut reader)?;
                self.forward(
                    &session,
                    op,
                    request.target_user_id,
                    &request.item_id.to_le_bytes(),
                )
                .await
            }
            other => bail!("클라이언트가 보낼 수 없는 호스트 op: {:?}", other),
        }
    }

    /// 게임 종료: Ingame → Result 전이 후 전 점유자에게 통지
    async fn on_game_end(&self, session: &UserSession) -> Result<()> {
        let room = self.room_of(session)?;

        let (occupants, entry) = {
            let mut guard = room.lock().await;
            guard.end_game(session.user_id())?;
            (guard.occupant_ids(), RoomListEntry::from_room(&guard))
        };

        let stop_packet = packets_out::host_stop();
        let result_packet = packets_out::room_game_result();
        for user_id in &occupants {
            if let Some(target) = self.ctx.registry.find_by_owner_id(*user_id) {
                if let Err(e) = target.send(&stop_packet).await {
                    warn!("게임 종료 통지 실패 (사용자 {}): {}", user_id, e);
                }
                if let Err(e) = target.send(&result_packet).await {
                    warn!("게임 결과 통지 실패 (사용자 {}): {}", user_id, e);
                }
            }
        }

        info!("방 {} 게임 종료 (호스트 {})", entry.id, session.user_id());
        Ok(())
    }

    /// 호스트 범위 패킷 전달. 요청자는 호스트여야 하고 대상은 같은 방의
    /// 점유자여야 합니다.
    async fn forward(
        &self,
        session: &UserSession,
        op: HostOp,
        target_user_id: u32,
        data: &[u8],
    ) -> Result<()> {
        let room = self.room_of(session)?;

        {
            let guard = room.lock().await;
            if !guard.is_host(session.user_id()) {
                bail!(
                    "비호스트의 호스트 op {:?} 시도 (사용자 {})",
                    op,
                    session.user_id()
                );
            }
            if !guard.is_occupant(target_user_id) {
                bail!("호스트 op {:?} 대상 {}가 방에 없음", op, target_user_id);
            }
        }

        let Some(target) = self.ctx.registry.find_by_owner_id(target_user_id) else {
            bail!("호스트 op {:?} 대상 {} 연결 해석 실패", op, target_user_id);
        };

        target
            .send(&packets_out::host_forward(op, target_user_id, data))
            .await?;
        Ok(())
    }
}
