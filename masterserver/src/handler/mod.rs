//! 패킷 핸들러 레이어
//!
//! 디스패처가 패킷 id로 핸들러를 찾아 호출합니다. 알 수 없는 id는
//! 명시적으로 로깅 후 버리고, 로그인 전 요청은 Login/Version을 제외하고
//! 모두 차단합니다. 핸들러 실패는 불리언으로 집계되며 연결은 유지됩니다.

pub mod about_me_handler;
pub mod achievement_handler;
pub mod favorite_handler;
pub mod host_handler;
pub mod login_handler;
pub mod option_handler;
pub mod room_handler;

pub use about_me_handler::AboutMeHandler;
pub use achievement_handler::AchievementHandler;
pub use favorite_handler::FavoriteHandler;
pub use host_handler::HostHandler;
pub use login_handler::LoginHandler;
pub use option_handler::OptionHandler;
pub use room_handler::RoomHandler;

use std::sync::Arc;
use tracing::{debug, warn};

use crate::protocol::packet_id::PacketId;
use crate::protocol::packets_out;
use crate::server::ServerContext;
use crate::service::connection::Connection;

/// 사용자에게 다이얼로그를 보냅니다. 전송 실패는 경고로만 남깁니다.
pub(crate) async fn send_dialog(conn: &Connection, message: &str) {
    match packets_out::dialog(message) {
        Ok(packet) => {
            if let Err(e) = conn.send(&packet).await {
                warn!("다이얼로그 전송 실패 ({}): {}", conn.uuid(), e);
            }
        }
        Err(e) => warn!("다이얼로그 조립 실패: {}", e),
    }
}

/// 패킷 디스패처
pub struct PacketDispatcher {
    login: LoginHandler,
    about_me: AboutMeHandler,
    room: RoomHandler,
    host: HostHandler,
    option: OptionHandler,
    favorite: FavoriteHandler,
    achievement: AchievementHandler,
}

impl PacketDispatcher {
    pub fn new(ctx: Arc<ServerContext>) -> Self {
        Self {
            login: LoginHandler::new(ctx.clone()),
            about_me: AboutMeHandler::new(ctx.clone()),
            room: RoomHandler::new(ctx.clone()),
            host: HostHandler::new(ctx.clone()),
            option: OptionHandler::new(ctx.clone()),
            favorite: FavoriteHandler::new(ctx.clone()),
            achievement: AchievementHandler::new(ctx),
        }
    }

    /// 해석된 패킷을 핸들러로 라우팅합니다. 처리 성공 여부를 반환합니다.
    pub async fn dispatch(&self, conn: &Arc<Connection>, packet_id: u8, payload: &[u8]) -> bool {
        let Some(id) = PacketId::from_u8(packet_id) else {
            warn!("알 수 없는 패킷 id {} (연결 {})", packet_id, conn.uuid());
            return false;
        };

        // 로그인 전에는 Login/Version만 허용
        if conn.session().is_none() && !matches!(id, PacketId::Login | PacketId::Version) {
            warn!("인증되지 않은 요청: {:?} (연결 {})", id, conn.uuid());
            return false;
        }

        let result = match id {
            PacketId::Login => self.login.handle(conn, payload).await,
            PacketId::RequestChannels => self.room.handle_request_channels(conn).await,
            PacketId::RequestRoomList => self.room.handle_request_room_list(conn, payload).await,
            PacketId::Room => self.room.handle(conn, payload).await,
            PacketId::Host => self.host.handle(conn, payload).await,
            PacketId::AboutMe => self.about_me.handle(conn, payload).await,
            PacketId::Option => self.option.handle(conn, payload).await,
            PacketId::Favorite => self.favorite.handle(conn, payload).await,
            PacketId::Achievement => self.achievement.handle(conn, payload).await,
            PacketId::Version | PacketId::Udp => {
                debug!("정보성 패킷 {:?} 무시 (연결 {})", id, conn.uuid());
                Ok(())
            }
            other => {
                debug!("서버 발신 전용 패킷 {:?} 수신, 버림 (연결 {})", other, conn.uuid());
                return false;
            }
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!("패킷 {:?} 처리 실패 (연결 {}): {:#}", id, conn.uuid(), e);
                false
            }
        }
    }

    /// 연결 해제 정리: 방/채널 퇴장, 레지스트리 제거, 업스트림 로그아웃
    pub async fn handle_disconnect(&self, conn: &Arc<Connection>) {
        self.room.handle_disconnect(conn).await;
    }
}
