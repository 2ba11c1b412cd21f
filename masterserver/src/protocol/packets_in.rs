//! 수신 패킷 페이로드 해석
//!
//! 핸들러가 모델 연산으로 넘어가기 전에 와이어 페이로드를 타입 있는
//! 요청으로 바꿉니다. 해석 실패는 잘못된 요청으로 로깅되고 연결은
//! 유지됩니다.

use super::codec::{CodecError, PacketReader};
use crate::channel::room_settings::{BotsUpdate, RoomSettingsUpdate};

/// 로그인 요청
#[derive(Debug)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    pub client_version: u32,
}

impl LoginRequest {
    pub fn parse(payload: &[u8]) -> Result<Self, CodecError> {
        let mut reader = PacketReader::new(payload);
        Ok(Self {
            username: reader.read_string()?,
            password: reader.read_long_string()?,
            client_version: reader.read_u32_le()?,
        })
    }
}

/// 방 목록 요청 (채널 선택)
#[derive(Debug)]
pub struct RequestRoomList {
    pub server_index: u8,
    pub channel_index: u8,
}

impl RequestRoomList {
    pub fn parse(payload: &[u8]) -> Result<Self, CodecError> {
        let mut reader = PacketReader::new(payload);
        Ok(Self {
            server_index: reader.read_u8()?,
            channel_index: reader.read_u8()?,
        })
    }
}

/// 방 생성 요청
#[derive(Debug)]
pub struct NewRoomRequest {
    pub name: String,
    pub password: String,
    pub game_mode: u8,
    pub map: u8,
    pub win_limit: u8,
    pub kill_limit: u8,
}

impl NewRoomRequest {
    pub fn parse(reader: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            name: reader.read_string()?,
            password: reader.read_string()?,
            game_mode: reader.read_u8()?,
            map: reader.read_u8()?,
            win_limit: reader.read_u8()?,
            kill_limit: reader.read_u8()?,
        })
    }
}

/// 방 입장 요청
#[derive(Debug)]
pub struct JoinRoomRequest {
    pub room_id: u16,
    pub password: String,
}

impl JoinRoomRequest {
    pub fn parse(reader: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            room_id: reader.read_u16_le()?,
            password: reader.read_string()?,
        })
    }
}

/// 팀 변경 요청 (본인)
#[derive(Debug)]
pub struct SetUserTeamRequest {
    pub team: u8,
}

impl SetUserTeamRequest {
    pub fn parse(reader: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            team: reader.read_u8()?,
        })
    }
}

/// 카운트다운 요청: 진행이면 현재 카운트가 따라오고, 아니면 중단
#[derive(Debug)]
pub struct StartCountdownRequest {
    pub should_countdown: bool,
    pub count: u8,
}

impl StartCountdownRequest {
    pub fn parse(reader: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        let should_countdown = reader.read_u8()? != 0;
        let count = if should_countdown { reader.read_u8()? } else { 0 };
        Ok(Self {
            should_countdown,
            count,
        })
    }
}

/// 설정 부분 갱신 요청: 플래그 비트마스크 뒤에 존재하는 필드만 이어짐
#[derive(Debug)]
pub struct UpdateSettingsRequest {
    pub update: RoomSettingsUpdate,
}

const SETTINGS_FLAG_NAME: u16 = 1 << 0;
const SETTINGS_FLAG_PASSWORD: u16 = 1 << 1;
const SETTINGS_FLAG_GAME_MODE: u16 = 1 << 2;
const SETTINGS_FLAG_MAP: u16 = 1 << 3;
const SETTINGS_FLAG_WIN_LIMIT: u16 = 1 << 4;
const SETTINGS_FLAG_KILL_LIMIT: u16 = 1 << 5;
const SETTINGS_FLAG_MAX_PLAYERS: u16 = 1 << 6;
const SETTINGS_FLAG_BOTS: u16 = 1 << 7;

impl UpdateSettingsRequest {
    pub fn parse(reader: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        let flags = reader.read_u16_le()?;
        let mut update = RoomSettingsUpdate::default();

        if flags & SETTINGS_FLAG_NAME != 0 {
            update.name = Some(reader.read_string()?);
        }
        if flags & SETTINGS_FLAG_PASSWORD != 0 {
            update.password = Some(reader.read_string()?);
        }
        if flags & SETTINGS_FLAG_GAME_MODE != 0 {
            update.game_mode = Some(reader.read_u8()?);
        }
        if flags & SETTINGS_FLAG_MAP != 0 {
            update.map = Some(reader.read_u8()?);
        }
        if flags & SETTINGS_FLAG_WIN_LIMIT != 0 {
            update.win_limit = Some(reader.read_u8()?);
        }
        if flags & SETTINGS_FLAG_KILL_LIMIT != 0 {
            update.kill_limit = Some(reader.read_u8()?);
        }
        if flags & SETTINGS_FLAG_MAX_PLAYERS != 0 {
            update.max_players = Some(reader.read_u8()?);
        }
        if flags & SETTINGS_FLAG_BOTS != 0 {
            update.bots = Some(BotsUpdate {
                enabled: reader.read_u8()? != 0,
                num_ct_bots: reader.read_u8()?,
                num_tr_bots: reader.read_u8()?,
            });
        }

        Ok(Self { update })
    }
}

/// 호스트 권한 전달 요청 (SetInventory/SetLoadout/SetBuyMenu)
#[derive(Debug)]
pub struct HostForwardRequest {
    pub target_user_id: u32,
    pub data: Vec<u8>,
}

impl HostForwardRequest {
    pub fn parse(reader: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            target_user_id: reader.read_u32_le()?,
            data: reader.read_rest().to_vec(),
        })
    }
}

/// 호스트의 팀 변경 통지
#[derive(Debug)]
pub struct TeamChangingRequest {
    pub target_user_id: u32,
    pub team: u8,
}

impl TeamChangingRequest {
    pub fn parse(reader: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            target_user_id: reader.read_u32_le()?,
            team: reader.read_u8()?,
        })
    }
}

/// 호스트의 아이템 사용 통지
#[derive(Debug)]
pub struct ItemUsingRequest {
    pub target_user_id: u32,
    pub item_id: u32,
}

impl ItemUsingRequest {
    pub fn parse(reader: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            target_user_id: reader.read_u32_le()?,
            item_id: reader.read_u32_le()?,
        })
    }
}

/// 구매 메뉴 하위 메뉴 갱신 (Option 패킷)
#[derive(Debug)]
pub struct SetBuyMenuRequest {
    pub submenu: u8,
    pub items: Vec<u32>,
}

impl SetBuyMenuRequest {
    pub fn parse(reader: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        let submenu = reader.read_u8()?;
        let count = reader.read_u8()? as usize;
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(reader.read_u32_le()?);
        }
        Ok(Self { submenu, items })
    }
}

/// 로드아웃 무기 변경 (Favorite 패킷)
#[derive(Debug)]
pub struct SetLoadoutRequest {
    pub loadout_num: u8,
    pub weapon_slot: u8,
    pub item_id: u32,
}

impl SetLoadoutRequest {
    pub fn parse(reader: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            loadout_num: reader.read_u8()?,
            weapon_slot: reader.read_u8()?,
            item_id: reader.read_u32_le()?,
        })
    }
}

/// 치장 슬롯 변경 (Favorite 패킷)
#[derive(Debug)]
pub struct SetCosmeticsRequest {
    pub slot: u8,
    pub item_id: u32,
}

impl SetCosmeticsRequest {
    pub fn parse(reader: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            slot: reader.read_u8()?,
            item_id: reader.read_u32_le()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::codec::OutPacket;
    use crate::protocol::packet_id::PacketId;
    use crate::protocol::HEADER_LENGTH;

    fn payload(packet: &OutPacket) -> Vec<u8> {
        packet.to_frame(0).unwrap()[HEADER_LENGTH + 1..].to_vec()
    }

    #[test]
    fn test_login_request_round_trip() {
        let mut packet = OutPacket::new(PacketId::Login);
        packet.write_string("alice").unwrap();
        packet.write_long_string("hunter2").unwrap();
        packet.write_u32_le(1305);

        let raw = payload(&packet);
        let request = LoginRequest::parse(&raw).unwrap();
        assert_eq!(request.username, "alice");
        assert_eq!(request.password, "hunter2");
        assert_eq!(request.client_version, 1305);
    }

    #[test]
    fn test_update_settings_subset() {
        let mut packet = OutPacket::new(PacketId::Room);
        packet.write_u16_le(SETTINGS_FLAG_MAP | SETTINGS_FLAG_KILL_LIMIT);
        packet.write_u8(7); // map
        packet.write_u8(60); // kill limit

        let raw = payload(&packet);
        let mut reader = PacketReader::new(&raw);
        let request = UpdateSettingsRequest::parse(&mut reader).unwrap();

        assert_eq!(request.update.map, Some(7));
        assert_eq!(request.update.kill_limit, Some(60));
        assert_eq!(request.update.name, None);
        assert_eq!(request.update.bots, None);
    }

    #[test]
    fn test_countdown_stop_has_no_count() {
        let mut packet = OutPacket::new(PacketId::Room);
        packet.write_u8(0);

        let raw = payload(&packet);
        let mut reader = PacketReader::new(&raw);
        let request = StartCountdownRequest::parse(&mut reader).unwrap();

        assert!(!request.should_countdown);
        assert_eq!(request.count, 0);
    }

    #[test]
    fn test_truncated_payload_rejected() {
        let raw = [1u8]; // room_id u16가 없음
        let mut reader = PacketReader::new(&raw);
        assert!(JoinRoomRequest::parse(&mut reader).is_err());
    }
}
