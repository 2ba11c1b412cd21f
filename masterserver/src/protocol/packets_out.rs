//! 송신 패킷 빌더
//!
//! 핸들러가 내보내는 응답/브로드캐스트 패킷을 조립합니다. 시퀀스는 여기서
//! 찍지 않고 각 연결의 쓰기 레인이 전송 직전에 찍습니다.

use super::codec::{CodecError, OutPacket};
use super::packet_id::{ChatKind, HostOp, InventoryOp, PacketId, RoomListOp, RoomReply};
use crate::channel::channel::RoomListEntry;
use crate::channel::directory::ChannelServer;
use crate::channel::room::{Room, SlotStatus, Team};
use crate::channel::room_settings::RoomSettings;
use shared::model::{BuyMenu, Cosmetics, Inventory, Loadout, User};

/// 업적 응답 블롭. 클라이언트가 기대하는 불투명 바이트열로, 서버는
/// 내용을 해석하지 않습니다.
const ACHIEVEMENT_BLOB: &[u8] = &[
    0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0x00, 0x00,
    0x00, 0x00,
];

// ── 공통 ─────────────────────────────────────────────────────────────

/// 시스템 채팅 라인
pub fn chat_system(message: &str) -> Result<OutPacket, CodecError> {
    let mut packet = OutPacket::new(PacketId::Chat);
    packet.write_u8(ChatKind::System as u8);
    packet.write_long_string(message)?;
    Ok(packet)
}

/// 모달 다이얼로그
pub fn dialog(message: &str) -> Result<OutPacket, CodecError> {
    let mut packet = OutPacket::new(PacketId::Chat);
    packet.write_u8(ChatKind::DialogBox as u8);
    packet.write_long_string(message)?;
    Ok(packet)
}

// ── 로그인 시퀀스 ────────────────────────────────────────────────────

/// 로그인 성공 첫 패킷: 사용자 식별과 홀펀치 포트
pub fn user_start(
    user_id: u32,
    user_name: &str,
    player_name: &str,
    holepunch_port: u16,
) -> Result<OutPacket, CodecError> {
    let mut packet = OutPacket::new(PacketId::UserStart);
    packet.write_u32_le(user_id);
    packet.write_string(user_name)?;
    packet.write_string(player_name)?;
    packet.write_u16_le(holepunch_port);
    Ok(packet)
}

/// 업적 블롭 응답
pub fn achievement_response() -> OutPacket {
    let mut packet = OutPacket::new(PacketId::Achievement);
    packet.write_bytes(ACHIEVEMENT_BLOB);
    packet
}

/// 전체 사용자 정보 갱신
pub fn user_info_full(user: &User) -> Result<OutPacket, CodecError> {
    let mut packet = OutPacket::new(PacketId::UserInfo);
    // 전체 갱신: 모든 필드 플래그 셋
    packet.write_u32_le(0xFFFF_FFFF);
    packet.write_u32_le(user.id);
    packet.write_string(&user.player_name)?;
    packet.write_u16_le(user.level);
    packet.write_u64_le(user.cur_exp);
    packet.write_u64_le(user.max_exp);
    packet.write_u32_le(user.wins);
    packet.write_u32_le(user.losses);
    packet.write_u32_le(user.kills);
    packet.write_u32_le(user.deaths);
    packet.write_u32_le(user.assists);
    packet.write_u64_le(user.points);
    packet.write_u32_le(user.cash);
    packet.write_u8(user.vip_level);
    Ok(packet)
}

/// 인벤토리 아이템 목록
pub fn inventory_items(user_id: u32, inventory: &Inventory) -> OutPacket {
    let mut packet = OutPacket::new(PacketId::Inventory);
    packet.write_u8(InventoryOp::Items as u8);
    packet.write_u32_le(user_id);
    packet.write_u16_le(inventory.items.len() as u16);
    for item in &inventory.items {
        packet.write_u32_le(item.item_id);
        packet.write_u16_le(item.amount);
    }
    packet
}

/// 치장/로드아웃/구매 메뉴 묶음
pub fn inventory_favorites(
    user_id: u32,
    cosmetics: &Cosmetics,
    loadouts: &[Loadout],
    buy_menu: &BuyMenu,
) -> OutPacket {
    let mut packet = OutPacket::new(PacketId::Inventory);
    packet.write_u8(InventoryOp::Favorites as u8);
    packet.write_u32_le(user_id);

    packet.write_u32_le(cosmetics.ct_item);
    packet.write_u32_le(cosmetics.ter_item);
    packet.write_u32_le(cosmetics.head_item);
    packet.write_u32_le(cosmetics.glove_item);
    packet.write_u32_le(cosmetics.back_item);
    packet.write_u32_le(cosmetics.steps_item);
    packet.write_u32_le(cosmetics.card_item);
    packet.write_u32_le(cosmetics.spray_item);

    packet.write_u8(loadouts.len() as u8);
    for loadout in loadouts {
        packet.write_u8(loadout.loadout_num);
        packet.write_u32_le(loadout.primary_weapon);
        packet.write_u32_le(loadout.secondary_weapon);
        packet.write_u32_le(loadout.melee);
        packet.write_u32_le(loadout.hegrenade);
        packet.write_u32_le(loadout.flash);
        packet.write_u32_le(loadout.smoke);
    }

    for category in [
        &buy_menu.pistols,
        &buy_menu.shotguns,
        &buy_menu.smgs,
        &buy_menu.rifles,
        &buy_menu.snipers,
        &buy_menu.machineguns,
        &buy_menu.melees,
        &buy_menu.equipment,
    ] {
        packet.write_u8(category.len() as u8);
        for item_id in category {
            packet.write_u32_le(*item_id);
        }
    }

    packet
}

// ── 디렉토리 ─────────────────────────────────────────────────────────

/// 채널 서버/채널 트리 스냅샷
pub fn channel_list(servers: &[ChannelServer]) -> Result<OutPacket, CodecError> {
    let mut packet = OutPacket::new(PacketId::ServerList);
    packet.write_u8(servers.len() as u8);

    for server in servers {
        packet.write_u8(server.index);
        packet.write_string(&server.name)?;
        packet.write_u8(server.channels.len() as u8);
        for channel in &server.channels {
            packet.write_u8(channel.index());
            packet.write_string(channel.name())?;
        }
    }

    Ok(packet)
}

fn write_room_list_entry(
    packet: &mut OutPacket,
    entry: &RoomListEntry,
) -> Result<(), CodecError> {
    packet.write_u16_le(entry.id);
    packet.write_string(&entry.name)?;
    packet.write_u8(entry.has_password as u8);
    packet.write_u8(entry.status as u8);
    packet.write_u8(entry.player_count);
    packet.write_u8(entry.max_players);
    packet.write_u8(entry.game_mode);
    packet.write_u8(entry.map);
    Ok(())
}

/// 방 목록 전체 스냅샷
pub fn room_list_full(entries: &[RoomListEntry]) -> Result<OutPacket, CodecError> {
    let mut packet = OutPacket::new(PacketId::RoomList);
    packet.write_u8(RoomListOp::Full as u8);
    packet.write_u8(entries.len() as u8);
    for entry in entries {
        write_room_list_entry(&mut packet, entry)?;
    }
    Ok(packet)
}

/// 방 목록에 항목 추가 (로비 브로드캐스트)
pub fn room_list_add(entry: &RoomListEntry) -> Result<OutPacket, CodecError> {
    let mut packet = OutPacket::new(PacketId::RoomList);
    packet.write_u8(RoomListOp::Add as u8);
    write_room_list_entry(&mut packet, entry)?;
    Ok(packet)
}

/// 방 목록 항목 갱신
pub fn room_list_update(entry: &RoomListEntry) -> Result<OutPacket, CodecError> {
    let mut packet = OutPacket::new(PacketId::RoomList);
    packet.write_u8(RoomListOp::Update as u8);
    write_room_list_entry(&mut packet, entry)?;
    Ok(packet)
}

/// 방 목록에서 항목 제거
pub fn room_list_remove(room_id: u16) -> OutPacket {
    let mut packet = OutPacket::new(PacketId::RoomList);
    packet.write_u8(RoomListOp::Remove as u8);
    packet.write_u16_le(room_id);
    packet
}

// ── 방 ───────────────────────────────────────────────────────────────

fn write_settings_block(
    packet: &mut OutPacket,
    settings: &RoomSettings,
) -> Result<(), CodecError> {
    packet.write_string(&settings.name)?;
    packet.write_u8(settings.has_password() as u8);
    packet.write_u8(settings.game_mode);
    packet.write_u8(settings.map);
    packet.write_u8(settings.win_limit);
    packet.write_u8(settings.kill_limit);
    packet.write_u8(settings.max_players);
    packet.write_u8(settings.bots_enabled as u8);
    packet.write_u8(settings.num_ct_bots);
    packet.write_u8(settings.num_tr_bots);
    Ok(())
}

/// 방 생성/입장 응답: id, 호스트, 설정, 로스터
pub fn room_create_and_join(room: &Room) -> Result<OutPacket, CodecError> {
    let mut packet = OutPacket::new(PacketId::Room);
    packet.write_u8(RoomReply::CreateAndJoin as u8);
    packet.write_u16_le(room.id());
    packet.write_u32_le(room.host_user_id());
    write_settings_block(&mut packet, room.settings())?;

    packet.write_u8(room.occupant_count() as u8);
    for slot in room.slots() {
        packet.write_u32_le(slot.user_id);
        packet.write_u8(slot.team as u8);
        packet.write_u8(slot.status as u8);
    }

    Ok(packet)
}

/// 새 플레이어 입장 브로드캐스트
pub fn room_player_join(user_id: u32, team: Team) -> OutPacket {
    let mut packet = OutPacket::new(PacketId::Room);
    packet.write_u8(RoomReply::PlayerJoin as u8);
    packet.write_u32_le(user_id);
    packet.write_u8(team as u8);
    packet.write_u8(SlotStatus::NotReady as u8);
    packet
}

/// 플레이어 퇴장 브로드캐스트
pub fn room_player_leave(user_id: u32) -> OutPacket {
    let mut packet = OutPacket::new(PacketId::Room);
    packet.write_u8(RoomReply::PlayerLeave as u8);
    packet.write_u32_le(user_id);
    packet
}

/// 준비 상태 변경 브로드캐스트
pub fn room_set_player_ready(user_id: u32, status: SlotStatus) -> OutPacket {
    let mut packet = OutPacket::new(PacketId::Room);
    packet.write_u8(RoomReply::SetPlayerReady as u8);
    packet.write_u32_le(user_id);
    packet.write_u8(status as u8);
    packet
}

/// 설정 변경 브로드캐스트
pub fn room_update_settings(settings: &RoomSettings) -> Result<OutPacket, CodecError> {
    let mut packet = OutPacket::new(PacketId::Room);
    packet.write_u8(RoomReply::UpdateSettings as u8);
    write_settings_block(&mut packet, settings)?;
    Ok(packet)
}

/// 호스트 승계 브로드캐스트
pub fn room_set_host(user_id: u32) -> OutPacket {
    let mut packet = OutPacket::new(PacketId::Room);
    packet.write_u8(RoomReply::SetHost as u8);
    packet.write_u32_le(user_id);
    packet
}

/// 팀 변경 브로드캐스트
pub fn room_set_user_team(user_id: u32, team: Team) -> OutPacket {
    let mut packet = OutPacket::new(PacketId::Room);
    packet.write_u8(RoomReply::SetUserTeam as u8);
    packet.write_u32_le(user_id);
    packet.write_u8(team as u8);
    packet
}

/// 카운트다운 진행 틱
pub fn room_countdown(count: u8) -> OutPacket {
    let mut packet = OutPacket::new(PacketId::Room);
    packet.write_u8(RoomReply::Countdown as u8);
    packet.write_u8(1);
    packet.write_u8(count);
    packet
}

/// 카운트다운 중단
pub fn room_countdown_stop() -> OutPacket {
    let mut packet = OutPacket::new(PacketId::Room);
    packet.write_u8(RoomReply::Countdown as u8);
    packet.write_u8(0);
    packet
}

/// 게임 결과 상태 브로드캐스트
pub fn room_game_result() -> OutPacket {
    let mut packet = OutPacket::new(PacketId::Room);
    packet.write_u8(RoomReply::SetGameResult as u8);
    packet
}

// ── 호스트 ───────────────────────────────────────────────────────────

/// 게임 시작 통지 (전 점유자)
pub fn host_game_start(host_user_id: u32) -> OutPacket {
    let mut packet = OutPacket::new(PacketId::Host);
    packet.write_u8(HostOp::GameStart as u8);
    packet.write_u32_le(host_user_id);
    packet
}

/// 진행 중 게임 난입 통지 (요청자)
pub fn host_join(host_user_id: u32) -> OutPacket {
    let mut packet = OutPacket::new(PacketId::Host);
    packet.write_u8(HostOp::HostJoin as u8);
    packet.write_u32_le(host_user_id);
    packet
}

/// 게임 종료 통지
pub fn host_stop() -> OutPacket {
    let mut packet = OutPacket::new(PacketId::Host);
    packet.write_u8(HostOp::HostStop as u8);
    packet
}

/// 결과 창 닫기 응답 (요청자 전용)
pub fn host_leave_result_window() -> OutPacket {
    let mut packet = OutPacket::new(PacketId::Host);
    packet.write_u8(HostOp::LeaveResultWindow as u8);
    packet
}

/// 호스트 권한 패킷 전달: 대상 연결로 하위 op와 불투명 페이로드를
/// 그대로 넘깁니다.
pub fn host_forward(op: HostOp, target_user_id: u32, data: &[u8]) -> OutPacket {
    let mut packet = OutPacket::new(PacketId::Host);
    packet.write_u8(op as u8);
    packet.write_u32_le(target_user_id);
    packet.write_bytes(data);
    packet
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::codec::PacketReader;
    use crate::protocol::HEADER_LENGTH;

    #[test]
    fn test_user_start_layout() {
        let packet = user_start(42, "alice", "Alice", 30002).unwrap();
        let frame = packet.to_frame(0).unwrap();
        assert_eq!(frame[HEADER_LENGTH], PacketId::UserStart.as_u8());

        let mut reader = PacketReader::new(&frame[HEADER_LENGTH + 1..]);
        assert_eq!(reader.read_u32_le().unwrap(), 42);
        assert_eq!(reader.read_string().unwrap(), "alice");
        assert_eq!(reader.read_string().unwrap(), "Alice");
        assert_eq!(reader.read_u16_le().unwrap(), 30002);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_dialog_carries_message() {
        let packet = dialog("존재하지 않는 방입니다.").unwrap();
        let frame = packet.to_frame(0).unwrap();

        let mut reader = PacketReader::new(&frame[HEADER_LENGTH + 1..]);
        assert_eq!(reader.read_u8().unwrap(), ChatKind::DialogBox as u8);
        assert_eq!(reader.read_long_string().unwrap(), "존재하지 않는 방입니다.");
    }

    #[test]
    fn test_room_countdown_tick() {
        let packet = room_countdown(5);
        let frame = packet.to_frame(0).unwrap();

        let mut reader = PacketReader::new(&frame[HEADER_LENGTH + 1..]);
        assert_eq!(reader.read_u8().unwrap(), RoomReply::Countdown as u8);
        assert_eq!(reader.read_u8().unwrap(), 1);
        assert_eq!(reader.read_u8().unwrap(), 5);
    }

    #[test]
    fn test_achievement_blob_is_opaque_payload() {
        let packet = achievement_response();
        let frame = packet.to_frame(0).unwrap();
        assert_eq!(&frame[HEADER_LENGTH + 1..], ACHIEVEMENT_BLOB);
    }
}
