//! 채널/방 모델
//!
//! 채널 서버 → 채널 → 방 계층과 로그인 세션을 정의합니다.
//! 방 상태 기계는 동기 코어(`room`)로 분리되어 있고, 잠금 획득 순서는
//! 방 → 채널 → 레지스트리입니다.

pub mod channel;
pub mod directory;
pub mod room;
pub mod room_settings;
pub mod session;

pub use channel::{Channel, RoomListEntry};
pub use directory::{ChannelDirectory, ChannelServer};
pub use room::{GameStartKind, LeaveOutcome, Room, RoomError, RoomStatus, SlotStatus, Team};
pub use room_settings::{RoomSettings, RoomSettingsUpdate, SettingsError};
pub use session::UserSession;
