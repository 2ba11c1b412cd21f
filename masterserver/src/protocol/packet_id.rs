//! 패킷 id 열거
//!
//! 클라이언트와 공유하는 고정 열거입니다. 알 수 없는 id는 디스패처가
//! 명시적으로 로깅 후 버립니다.

/// 최상위 패킷 id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketId {
    Version = 0,
    Reply = 1,
    Login = 3,
    ServerList = 5,
    Character = 6,
    RequestRoomList = 7,
    RequestChannels = 10,
    Room = 65,
    Chat = 67,
    Host = 68,
    AboutMe = 69,
    Udp = 70,
    Option = 76,
    Favorite = 77,
    Achievement = 96,
    UserStart = 150,
    RoomList = 151,
    Inventory = 154,
    UserInfo = 157,
}

impl PacketId {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Version),
            1 => Some(Self::Reply),
            3 => Some(Self::Login),
            5 => Some(Self::ServerList),
            6 => Some(Self::Character),
            7 => Some(Self::RequestRoomList),
            10 => Some(Self::RequestChannels),
            65 => Some(Self::Room),
            67 => Some(Self::Chat),
            68 => Some(Self::Host),
            69 => Some(Self::AboutMe),
            70 => Some(Self::Udp),
            76 => Some(Self::Option),
            77 => Some(Self::Favorite),
            96 => Some(Self::Achievement),
            150 => Some(Self::UserStart),
            151 => Some(Self::RoomList),
            154 => Some(Self::Inventory),
            157 => Some(Self::UserInfo),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Room 패킷 요청 하위 op (클라이언트 → 서버)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RoomRequest {
    NewRoom = 0,
    Join = 1,
    Leave = 3,
    ToggleReady = 4,
    GameStart = 5,
    UpdateSettings = 6,
    CloseResultWindow = 7,
    SetUserTeam = 9,
    StartCountdown = 19,
}

impl RoomRequest {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::NewRoom),
            1 => Some(Self::Join),
            3 => Some(Self::Leave),
            4 => Some(Self::ToggleReady),
            5 => Some(Self::GameStart),
            6 => Some(Self::UpdateSettings),
            7 => Some(Self::CloseResultWindow),
            9 => Some(Self::SetUserTeam),
            19 => Some(Self::StartCountdown),
            _ => None,
        }
    }
}

/// Room 패킷 응답 하위 op (서버 → 클라이언트)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RoomReply {
    CreateAndJoin = 0,
    PlayerJoin = 1,
    PlayerLeave = 2,
    SetPlayerReady = 3,
    UpdateSettings = 4,
    SetHost = 5,
    SetGameResult = 6,
    SetUserTeam = 7,
    Countdown = 14,
}

/// Host 패킷 하위 op
///
/// 100번대는 호스트 권한으로 대상 연결에 전달되는 사용자별 데이터입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HostOp {
    GameStart = 0,
    HostJoin = 1,
    HostStop = 2,
    LeaveResultWindow = 3,
    OnGameEnd = 4,
    ItemUsing = 105,
    TeamChanging = 110,
    SetInventory = 101,
    SetLoadout = 107,
    SetBuyMenu = 111,
}

impl HostOp {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::GameStart),
            1 => Some(Self::HostJoin),
            2 => Some(Self::HostStop),
            3 => Some(Self::LeaveResultWindow),
            4 => Some(Self::OnGameEnd),
            105 => Some(Self::ItemUsing),
            110 => Some(Self::TeamChanging),
            101 => Some(Self::SetInventory),
            107 => Some(Self::SetLoadout),
            111 => Some(Self::SetBuyMenu),
            _ => None,
        }
    }
}

/// Option 패킷 하위 op
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OptionOp {
    SetBuyMenu = 1,
}

impl OptionOp {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::SetBuyMenu),
            _ => None,
        }
    }
}

/// Favorite 패킷 하위 op
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FavoriteOp {
    SetLoadout = 0,
    SetCosmetics = 1,
}

impl FavoriteOp {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::SetLoadout),
            1 => Some(Self::SetCosmetics),
            _ => None,
        }
    }
}

/// RoomList 패킷 하위 op (서버 → 클라이언트)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RoomListOp {
    Full = 0,
    Add = 1,
    Remove = 2,
    Update = 3,
}

/// Inventory 패킷 하위 op (서버 → 클라이언트)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InventoryOp {
    Items = 0,
    Favorites = 1,
}

/// Chat 패킷 메시지 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChatKind {
    Channel = 1,
    Room = 3,
    /// 시스템 채팅 라인
    System = 40,
    /// 모달 다이얼로그
    DialogBox = 60,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_id_round_trip() {
        for id in [
            PacketId::Version,
            PacketId::Login,
            PacketId::Room,
            PacketId::Host,
            PacketId::Achievement,
            PacketId::UserStart,
            PacketId::UserInfo,
        ] {
            assert_eq!(PacketId::from_u8(id.as_u8()), Some(id));
        }
    }

    #[test]
    fn test_unknown_packet_id() {
        assert_eq!(PacketId::from_u8(200), None);
        assert_eq!(PacketId::from_u8(42), None);
    }

    #[test]
    fn test_room_request_round_trip() {
        for op in [
            RoomRequest::NewRoom,
            RoomRequest::Join,
            RoomRequest::Leave,
            RoomRequest::ToggleReady,
            RoomRequest::GameStart,
            RoomRequest::UpdateSettings,
            RoomRequest::SetUserTeam,
            RoomRequest::StartCountdown,
        ] {
            assert_eq!(RoomRequest::from_u8(op as u8), Some(op));
        }
        assert_eq!(RoomRequest::from_u8(99), None);
    }
}
