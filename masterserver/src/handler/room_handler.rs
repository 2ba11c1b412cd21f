//! 방 핸들러
//!
//! 채널 선택, 방 생성/입장/퇴장, 준비/팀/설정, 카운트다운과 게임 시작을
//! 처리합니다. 방 상태 변경은 방 잠금 아래에서 수행하고, 브로드캐스트는
//! 점유자 스냅샷을 뜬 뒤 잠금 밖에서 수행합니다 (잠금 순서: 방 → 채널 →
//! 레지스트리).

use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::send_dialog;
use crate::channel::channel::{Channel, RoomListEntry};
use crate::channel::room::{GameStartKind, LeaveOutcome, Room, RoomError, Team};
use crate::channel::room_settings::RoomSettings;
use crate::channel::session::UserSession;
use crate::protocol::codec::{OutPacket, PacketReader};
use crate::protocol::packet_id::RoomRequest;
use crate::protocol::packets_in::{
    JoinRoomRequest, NewRoomRequest, RequestRoomList, SetUserTeamRequest, StartCountdownRequest,
    UpdateSettingsRequest,
};
use crate::protocol::packets_out;
use crate::server::ServerContext;
use crate::service::connection::Connection;
use crate::tool::strings;

/// 방 핸들러
pub struct RoomHandler {
    ctx: Arc<ServerContext>,
}

impl RoomHandler {
    pub fn new(ctx: Arc<ServerContext>) -> Self {
        Self { ctx }
    }

    fn session_of(&self, conn: &Connection) -> Result<Arc<UserSession>> {
        conn.session()
            .ok_or_else(|| anyhow::anyhow!("세션 없는 연결 {}의 방 요청", conn.uuid()))
    }

    fn channel_of(&self, session: &UserSession) -> Result<Arc<Channel>> {
        let Some((server_index, channel_index)) = session.channel() else {
            bail!("채널 밖에서 들어온 방 요청 (사용자 {})", session.user_id());
        };
        self.ctx
            .directory
            .channel_by_index(server_index, channel_index)
            .ok_or_else(|| {
                anyhow::anyhow!("세션이 가리키는 채널 없음: ({}, {})", server_index, channel_index)
            })
    }

    fn current_room(
        &self,
        session: &UserSession,
        channel: &Channel,
    ) -> Result<Arc<tokio::sync::Mutex<Room>>> {
        let Some(room_id) = session.room_id() else {
            bail!("방 밖에서 들어온 방 요청 (사용자 {})", session.user_id());
        };
        channel
            .room(room_id)
            .ok_or_else(|| anyhow::anyhow!("세션이 가리키는 방 없음: {}", room_id))
    }

    /// 점유자 목록에 패킷 전송. 레지스트리로 연결을 해석합니다.
    async fn broadcast_room(&self, occupants: &[u32], packet: &OutPacket) -> usize {
        let mut success = 0;
        for user_id in occupants {
            let Some(conn) = self.ctx.registry.find_by_owner_id(*user_id) else {
                continue;
            };
            match conn.send(packet).await {
                Ok(()) => success += 1,
                Err(e) => warn!("방 브로드캐스트 실패 (사용자 {}): {}", user_id, e),
            }
        }
        success
    }

    async fn broadcast_room_except(
        &self,
        occupants: &[u32],
        except: u32,
        packet: &OutPacket,
    ) -> usize {
        let others: Vec<u32> = occupants.iter().copied().filter(|u| *u != except).collect();
        self.broadcast_room(&others, packet).await
    }

    // ── 채널 디렉토리 ────────────────────────────────────────────────

    /// 채널 서버 목록 요청
    pub async fn handle_request_channels(&self, conn: &Arc<Connection>) -> Result<()> {
        self.session_of(conn)?;
        self.ctx.directory.send_channel_list_to(conn).await?;
        Ok(())
    }

    /// 채널 선택 + 방 목록 요청
    pub async fn handle_request_room_list(
        &self,
        conn: &Arc<Connection>,
        payload: &[u8],
    ) -> Result<()> {
        let session = self.session_of(conn)?;
        let request = RequestRoomList::parse(payload)?;

        let Some(channel) = self
            .ctx
            .directory
            .channel_by_index(request.server_index, request.channel_index)
        else {
            send_dialog(conn, strings::GAME_CHANNEL_NOT_FOUND).await;
            bail!(
                "존재하지 않는 채널 요청: ({}, {})",
                request.server_index,
                request.channel_index
            );
        };

        // 이전 채널 로비에서 빠진다
        if let Some((prev_server, prev_channel)) = session.channel() {
            if let Some(prev) = self.ctx.directory.channel_by_index(prev_server, prev_channel) {
                prev.leave_lobby(conn.uuid());
            }
        }

        session.set_channel(Some((request.server_index, request.channel_index)));
        channel.enter_lobby(conn);
        self.ctx.directory.send_room_list_to(conn, &channel).await?;

        debug!(
            "사용자 {} 채널 ({}, {}) 입장",
            session.user_id(),
            request.server_index,
            request.channel_index
        );
        Ok(())
    }

    // ── Room 패킷 하위 op 라우팅 ─────────────────────────────────────

    pub async fn handle(&self, conn: &Arc<Connection>, payload: &[u8]) -> Result<()> {
        let mut reader = PacketReader::new(payload);
        let op_byte = reader.read_u8()?;

        let Some(op) = RoomRequest::from_u8(op_byte) else {
            bail!("알 수 없는 방 요청 op: {}", op_byte);
        };

        match op {
            RoomRequest::NewRoom => self.new_room(conn, &mut reader).await,
            RoomRequest::Join => self.join_room(conn, &mut reader).await,
            RoomRequest::Leave => self.leave_room(conn).await,
            RoomRequest::ToggleReady => self.toggle_ready(conn).await,
            RoomRequest::GameStart => self.game_start(conn).await,
            RoomRequest::UpdateSettings => self.update_settings(conn, &mut reader).await,
            RoomRequest::CloseResultWindow => self.close_result_window(conn).await,
            RoomRequest::SetUserTeam => self.set_user_team(conn, &mut reader).await,
            RoomRequest::StartCountdown => self.start_countdown(conn, &mut reader).await,
        }
    }

    /// 방 생성. 이미 방에 있으면 서버가 먼저 강제로 비웁니다 (클라이언트
    /// 상태가 어긋나도 사용자가 두 방을 점유하는 일이 없도록).
    async fn new_room(&self, conn: &Arc<Connection>, reader: &mut PacketReader<'_>) -> Result<()> {
        let session = self.session_of(conn)?;
        let channel = self.channel_of(&session)?;

        if let Some(prior_room_id) = session.room_id() {
            warn!(
                "사용자 {}가 방 {}에 있는 상태에서 방 생성 요청, 강제 퇴장",
                session.user_id(),
                prior_room_id
            );
            self.vacate_room(conn, &channel, &session, prior_room_id, true)
                .await?;
        }

        let request = NewRoomRequest::parse(reader)?;
        let settings = match RoomSettings::create(
            request.name,
            request.password,
            request.game_mode,
            request.map,
            request.win_limit,
            request.kill_limit,
        ) {
            Ok(settings) => settings,
            Err(e) => {
                send_dialog(conn, strings::GAME_ROOM_BAD_SETTINGS).await;
                return Err(e.into());
            }
        };

        let room = channel.create_room(session.user_id(), settings).await;
        let (room_id, create_packet, entry) = {
            let guard = room.lock().await;
            (
                guard.id(),
                packets_out::room_create_and_join(&guard)?,
                RoomListEntry::from_room(&guard),
            )
        };

        session.set_room(Some(room_id));
        channel.leave_lobby(conn.uuid());

        conn.send(&create_packet).await?;
        channel
            .broadcast_lobby(&packets_out::room_list_add(&entry)?)
            .await;

        info!(
            "방 {} 생성: 호스트 {} (채널 {})",
            room_id,
            session.user_id(),
            channel.index()
        );
        Ok(())
    }

    /// 방 입장
    async fn join_room(&self, conn: &Arc<Connection>, reader: &mut PacketReader<'_>) -> Result<()> {
        let session = self.session_of(conn)?;
        let channel = self.channel_of(&session)?;
        let request = JoinRoomRequest::parse(reader)?;

        if session.room_id() == Some(request.room_id) {
            bail!(
                "사용자 {}가 이미 있는 방 {}에 재입장 요청",
                session.user_id(),
                request.room_id
            );
        }

        let Some(room) = channel.room(request.room_id) else {
            send_dialog(conn, strings::GAME_ROOM_NOT_FOUND).await;
            bail!("존재하지 않는 방 입장 요청: {}", request.room_id);
        };

        // 다른 방에 있었으면 먼저 비운다
        if let Some(prior_room_id) = session.room_id() {
            self.vacate_room(conn, &channel, &session, prior_room_id, true)
                .await?;
        }

        let user_id = session.user_id();
        let join_result = {
            let mut guard = room.lock().await;
            guard.join(user_id, &request.password)
        };

        let team = match join_result {
            Ok(team) => team,
            Err(RoomError::Full) => {
                send_dialog(conn, strings::GAME_ROOM_JOIN_FULL).await;
                bail!("방 {} 만석", request.room_id);
            }
            Err(RoomError::BadPassword) => {
                send_dialog(conn, strings::GAME_ROOM_JOIN_BAD_PASSWORD).await;
                bail!("방 {} 비밀번호 불일치", request.room_id);
            }
            Err(RoomError::Closed) => {
                send_dialog(conn, strings::GAME_ROOM_JOIN_CLOSED).await;
                bail!("닫힌 방 {} 입장 요청", request.room_id);
            }
            Err(e) => return Err(e.into()),
        };

        let (create_packet, entry, occupants) = {
            let guard = room.lock().await;
            (
                packets_out::room_create_and_join(&guard)?,
                RoomListEntry::from_room(&guard),
                guard.occupant_ids(),
            )
        };

        session.set_room(Some(request.room_id));
        channel.leave_lobby(conn.uuid());

        // 입장자에게 설정 + 로스터, 기존 점유자에게 새 플레이어
        conn.send(&create_packet).await?;
        self.broadcast_room_except(
            &occupants,
            user_id,
            &packets_out::room_player_join(user_id, team),
        )
        .await;
        channel
            .broadcast_lobby(&packets_out::room_list_update(&entry)?)
            .await;

        info!("사용자 {} 방 {} 입장 ({:?})", user_id, request.room_id, team);
        Ok(())
    }

    /// 자발적 퇴장
    async fn leave_room(&self, conn: &Arc<Connection>) -> Result<()> {
        let session = self.session_of(conn)?;
        let channel = self.channel_of(&session)?;
        let Some(room_id) = session.room_id() else {
            bail!("방 밖에서 퇴장 요청 (사용자 {})", session.user_id());
        };

        self.vacate_room(conn, &channel, &session, room_id, false)
            .await?;

        // 퇴장자는 로비로 돌아간다: 본인 퇴장 확인 + 방 목록 갱신
        conn.send(&packets_out::room_player_leave(session.user_id()))
            .await?;
        self.ctx.directory.send_room_list_to(conn, &channel).await?;
        Ok(())
    }

    /// 방 비우기 공통 경로. 호스트 승계/방 폐쇄 브로드캐스트까지 수행합니다.
    ///
    /// `forced`는 연결 해제와 유령 방 정리처럼 카운트다운 잠금을 무시해야
    /// 하는 경로입니다.
    async fn vacate_room(
        &self,
        conn: &Arc<Connection>,
        channel: &Arc<Channel>,
        session: &Arc<UserSession>,
        room_id: u16,
        forced: bool,
    ) -> Result<()> {
        let Some(room) = channel.room(room_id) else {
            // 방이 이미 사라졌으면 세션만 정리
            session.set_room(None);
            return Ok(());
        };

        let user_id = session.user_id();
        let outcome = {
            let mut guard = room.lock().await;
            if forced {
                guard.force_leave(user_id)
            } else {
                guard.leave(user_id)
            }
        };

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(RoomError::LeaveLockedDuringCountdown) => {
                send_dialog(conn, strings::GAME_ROOM_LEAVE_IN_COUNTDOWN).await;
                bail!("카운트다운 중 퇴장 거부 (사용자 {})", user_id);
            }
            Err(RoomError::NotOccupant(_)) => {
                session.set_room(None);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        session.set_room(None);
        channel.enter_lobby(conn);

        match outcome {
            LeaveOutcome::Closed => {
                channel.remove_room(room_id);
                channel
                    .broadcast_lobby(&packets_out::room_list_remove(room_id))
                    .await;
                info!("방 {} 폐쇄 (마지막 점유자 {} 퇴장)", room_id, user_id);
            }
            LeaveOutcome::Left | LeaveOutcome::HostMigrated(_) => {
                let (occupants, entry) = {
                    let guard = room.lock().await;
                    (guard.occupant_ids(), RoomListEntry::from_room(&guard))
                };

                self.broadcast_room(&occupants, &packets_out::room_player_leave(user_id))
                    .await;

                if let LeaveOutcome::HostMigrated(new_host) = outcome {
                    self.broadcast_room(&occupants, &packets_out::room_set_host(new_host))
                        .await;
                    info!("방 {} 호스트 승계: {} → {}", room_id, user_id, new_host);
                }

                channel
                    .broadcast_lobby(&packets_out::room_list_update(&entry)?)
                    .await;
            }
        }

        Ok(())
    }

    /// 준비 상태 토글
    async fn toggle_ready(&self, conn: &Arc<Connection>) -> Result<()> {
        let session = self.session_of(conn)?;
        let channel = self.channel_of(&session)?;
        let room = self.current_room(&session, &channel)?;
        let user_id = session.user_id();

        let (status, occupants) = {
            let mut guard = room.lock().await;
            let status = guard.toggle_ready(user_id)?;
            (status, guard.occupant_ids())
        };

        self.broadcast_room(
            &occupants,
            &packets_out::room_set_player_ready(user_id, status),
        )
        .await;
        Ok(())
    }

    /// 설정 갱신 (호스트 전용, Countdown/Ingame 잠김)
    async fn update_settings(
        &self,
        conn: &Arc<Connection>,
        reader: &mut PacketReader<'_>,
    ) -> Result<()> {
        let session = self.session_of(conn)?;
        let channel = self.channel_of(&session)?;
        let room = self.current_room(&session, &channel)?;
        let request = UpdateSettingsRequest::parse(reader)?;

        let result = {
            let mut guard = room.lock().await;
            guard
                .update_settings(session.user_id(), &request.update)
                .map(|()| {
                    (
                        guard.settings().clone(),
                        guard.occupant_ids(),
                        RoomListEntry::from_room(&guard),
                    )
                })
        };

        let (settings, occupants, entry) = match result {
            Ok(v) => v,
            Err(RoomError::NotHost(_)) => {
                send_dialog(conn, strings::GAME_ROOM_NOT_HOST).await;
                bail!("비호스트 설정 변경 시도 (사용자 {})", session.user_id());
            }
            Err(RoomError::SettingsLocked) => {
                send_dialog(conn, strings::GAME_ROOM_SETTINGS_LOCKED).await;
                bail!("잠긴 방 설정 변경 시도 (사용자 {})", session.user_id());
            }
            Err(RoomError::BadSettings(e)) => {
                send_dialog(conn, strings::GAME_ROOM_BAD_SETTINGS).await;
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };

        self.broadcast_room(&occupants, &packets_out::room_update_settings(&settings)?)
            .await;
        channel
            .broadcast_lobby(&packets_out::room_list_update(&entry)?)
            .await;
        Ok(())
    }

    /// 팀 변경 (본인). 봇 방에서는 호스트만 바꿀 수 있습니다.
    async fn set_user_team(
        &self,
        conn: &Arc<Connection>,
        reader: &mut PacketReader<'_>,
    ) -> Result<()> {
        let session = self.session_of(conn)?;
        let channel = self.channel_of(&session)?;
        let room = self.current_room(&session, &channel)?;
        let request = SetUserTeamRequest::parse(reader)?;

        let Some(team) = Team::from_u8(request.team) else {
            bail!("알 수 없는 팀 값: {}", request.team);
        };

        let user_id = session.user_id();
        let result = {
            let mut guard = room.lock().await;
            guard
                .set_user_team(user_id, user_id, team)
                .map(|()| guard.occupant_ids())
        };

        let occupants = match result {
            Ok(occupants) => occupants,
            Err(RoomError::ReadyLocked) => {
                send_dialog(conn, strings::GAME_ROOM_TEAM_LOCKED).await;
                bail!("준비 상태에서 팀 변경 시도 (사용자 {})", user_id);
            }
            Err(RoomError::NotHost(_)) => {
                send_dialog(conn, strings::GAME_ROOM_NOT_HOST).await;
                bail!("봇 방에서 비호스트 팀 변경 시도 (사용자 {})", user_id);
            }
            Err(e) => return Err(e.into()),
        };

        self.broadcast_room(&occupants, &packets_out::room_set_user_team(user_id, team))
            .await;
        Ok(())
    }

    /// 카운트다운 진행/중단
    async fn start_countdown(
        &self,
        conn: &Arc<Connection>,
        reader: &mut PacketReader<'_>,
    ) -> Result<()> {
        let session = self.session_of(conn)?;
        let channel = self.channel_of(&session)?;
        let room = self.current_room(&session, &channel)?;
        let request = StartCountdownRequest::parse(reader)?;
        let user_id = session.user_id();

        if request.should_countdown {
            let result = {
                let mut guard = room.lock().await;
                guard
                    .progress_countdown(user_id, request.count)
                    .map(|count| (count, guard.occupant_ids()))
            };

            let (count, occupants) = match result {
                Ok(v) => v,
                Err(RoomError::CannotStart) => {
                    send_dialog(conn, strings::GAME_ROOM_COUNTDOWN_NEEDS_PLAYERS).await;
                    bail!("시작 조건 미충족 (사용자 {})", user_id);
                }
                Err(RoomError::NotHost(_)) => {
                    send_dialog(conn, strings::GAME_ROOM_NOT_HOST).await;
                    bail!("비호스트 카운트다운 시도 (사용자 {})", user_id);
                }
                Err(e) => return Err(e.into()),
            };

            self.broadcast_room(&occupants, &packets_out::room_countdown(count))
                .await;
        } else {
            let occupants = {
                let mut guard = room.lock().await;
                guard.stop_countdown(user_id)?;
                guard.occupant_ids()
            };

            self.broadcast_room(&occupants, &packets_out::room_countdown_stop())
                .await;
        }

        Ok(())
    }

    /// 게임 시작: 호스트는 Countdown→Ingame, 비호스트는 난입
    async fn game_start(&self, conn: &Arc<Connection>) -> Result<()> {
        let session = self.session_of(conn)?;
        let channel = self.channel_of(&session)?;
        let room = self.current_room(&session, &channel)?;
        let user_id = session.user_id();

        let (kind, host_user_id, occupants, entry) = {
            let mut guard = room.lock().await;
            let kind = guard.start_game(user_id)?;
            (
                kind,
                guard.host_user_id(),
                guard.occupant_ids(),
                RoomListEntry::from_room(&guard),
            )
        };

        match kind {
            GameStartKind::HostStart => {
                self.broadcast_room(&occupants, &packets_out::host_game_start(host_user_id))
                    .await;
                channel
                    .broadcast_lobby(&packets_out::room_list_update(&entry)?)
                    .await;
                info!("방 {} 게임 시작 (호스트 {})", entry.id, host_user_id);
            }
            GameStartKind::JoinInProgress => {
                conn.send(&packets_out::host_join(host_user_id)).await?;
                self.broadcast_room_except(
                    &occupants,
                    user_id,
                    &packets_out::room_set_player_ready(
                        user_id,
                        crate::channel::room::SlotStatus::IngameReady,
                    ),
                )
                .await;
                info!("사용자 {} 진행 중 게임 난입 (방 {})", user_id, entry.id);
            }
        }

        Ok(())
    }

    /// 결과 창 닫기 (요청자에게만 응답)
    async fn close_result_window(&self, conn: &Arc<Connection>) -> Result<()> {
        let session = self.session_of(conn)?;
        let channel = self.channel_of(&session)?;
        let room = self.current_room(&session, &channel)?;

        {
            let mut guard = room.lock().await;
            guard.close_result_window(session.user_id())?;
        }

        conn.send(&packets_out::host_leave_result_window()).await?;
        Ok(())
    }

    // ── 연결 해제 정리 ───────────────────────────────────────────────

    /// 소켓이 끊긴 연결의 세션을 정리합니다: 방 강제 퇴장(호스트 승계 포함),
    /// 로비 이탈, 레지스트리 제거, 업스트림 로그아웃.
    pub async fn handle_disconnect(&self, conn: &Arc<Connection>) {
        let Some(session) = conn.session() else {
            return;
        };

        if let Some((server_index, channel_index)) = session.channel() {
            if let Some(channel) = self
                .ctx
                .directory
                .channel_by_index(server_index, channel_index)
            {
                if let Some(room_id) = session.room_id() {
                    if let Err(e) = self
                        .vacate_room(conn, &channel, &session, room_id, true)
                        .await
                    {
                        warn!("연결 해제 중 방 정리 실패: {:#}", e);
                    }
                }
                channel.leave_lobby(conn.uuid());
            }
        }

        self.ctx.registry.remove(conn);
        conn.detach_session();

        if let Err(e) = self.ctx.userservice.logout(session.user_id()).await {
            debug!("업스트림 로그아웃 실패 ({}): {}", session.user_id(), e);
        }

        info!(
            "세션 종료: {} (id {})",
            session.player_name(),
            session.user_id()
        );
    }
}
