//! 사용자 세션
//!
//! 로그인 이후 연결에 붙는 상태입니다. 사용자 레코드와 현재 위치
//! (채널, 방)를 추적합니다. 방/채널 참조는 id로만 보관하고 실제 객체는
//! 디렉토리와 레지스트리를 통해 해석합니다.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::net::SocketAddr;

use shared::model::User;

/// 채널 위치: (채널 서버 인덱스, 채널 인덱스)
pub type ChannelPos = (u8, u8);

#[derive(Debug, Default, Clone, Copy)]
struct SessionPosition {
    channel: Option<ChannelPos>,
    room_id: Option<u16>,
}

/// 로그인된 사용자 세션
#[derive(Debug)]
pub struct UserSession {
    user: User,
    remote_addr: SocketAddr,
    login_at: DateTime<Utc>,
    position: RwLock<SessionPosition>,
}

impl UserSession {
    pub fn new(user: User, remote_addr: SocketAddr) -> Self {
        Self {
            user,
            remote_addr,
            login_at: Utc::now(),
            position: RwLock::new(SessionPosition::default()),
        }
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn user_id(&self) -> u32 {
        self.user.id
    }

    pub fn user_name(&self) -> &str {
        &self.user.user_name
    }

    pub fn player_name(&self) -> &str {
        &self.user.player_name
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    pub fn login_at(&self) -> DateTime<Utc> {
        self.login_at
    }

    pub fn channel(&self) -> Option<ChannelPos> {
        self.position.read().channel
    }

    pub fn set_channel(&self, channel: Option<ChannelPos>) {
        self.position.write().channel = channel;
    }

    pub fn room_id(&self) -> Option<u16> {
        self.position.read().room_id
    }

    pub fn set_room(&self, room_id: Option<u16>) {
        self.position.write().room_id = room_id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user() -> User {
        User {
            id: 42,
            user_name: "alice".to_string(),
            player_name: "Alice".to_string(),
            level: 1,
            cur_exp: 0,
            max_exp: 1000,
            points: 0,
            cash: 0,
            wins: 0,
            losses: 0,
            kills: 0,
            deaths: 0,
            assists: 0,
            vip_level: 0,
        }
    }

    #[test]
    fn test_position_tracking() {
        let session = UserSession::new(test_user(), "127.0.0.1:5000".parse().unwrap());

        assert_eq!(session.channel(), None);
        assert_eq!(session.room_id(), None);

        session.set_channel(Some((0, 2)));
        session.set_room(Some(7));
        assert_eq!(session.channel(), Some((0, 2)));
        assert_eq!(session.room_id(), Some(7));

        session.set_room(None);
        assert_eq!(session.room_id(), None);
        assert_eq!(session.channel(), Some((0, 2)));
    }
}
