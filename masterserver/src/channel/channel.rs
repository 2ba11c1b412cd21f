//! 채널
//!
//! 채널은 방 가시성과 브로드캐스트의 단위입니다. 방 테이블과 로비에
//! 머무는 연결 집합을 관리합니다. 방 id는 채널 안에서 유일하며,
//! 방 폐쇄 후 재사용됩니다 (1 이상의 가장 작은 빈 id).

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

use super::room::{Room, RoomStatus};
use super::room_settings::RoomSettings;
use crate::protocol::codec::OutPacket;
use crate::service::connection::Connection;

/// 방 목록 스냅샷 항목
#[derive(Debug, Clone)]
pub struct RoomListEntry {
    pub id: u16,
    pub name: String,
    pub has_password: bool,
    pub status: RoomStatus,
    pub player_count: u8,
    pub max_players: u8,
    pub game_mode: u8,
    pub map: u8,
}

impl RoomListEntry {
    pub fn from_room(room: &Room) -> Self {
        Self {
            id: room.id(),
            name: room.settings().name.clone(),
            has_password: room.settings().has_password(),
            status: room.status(),
            player_count: room.occupant_count() as u8,
            max_players: room.settings().max_players,
            game_mode: room.settings().game_mode,
            map: room.settings().map,
        }
    }
}

/// 채널
pub struct Channel {
    server_index: u8,
    index: u8,
    name: String,
    rooms: DashMap<u16, Arc<Mutex<Room>>>,
    lobby: DashMap<Uuid, Arc<Connection>>,
    /// 방 id 할당과 테이블 삽입 직렬화
    creation_lock: Mutex<()>,
}

impl Channel {
    pub fn new(server_index: u8, index: u8, name: String) -> Self {
        Self {
            server_index,
            index,
            name,
            rooms: DashMap::new(),
            lobby: DashMap::new(),
            creation_lock: Mutex::new(()),
        }
    }

    pub fn server_index(&self) -> u8 {
        self.server_index
    }

    pub fn index(&self) -> u8 {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn lobby_count(&self) -> usize {
        self.lobby.len()
    }

    /// 방 생성. 요청자가 호스트이자 0번 점유자가 됩니다.
    pub async fn create_room(
        &self,
        host_user_id: u32,
        settings: RoomSettings,
    ) -> Arc<Mutex<Room>> {
        let _guard = self.creation_lock.lock().await;

        let id = self.allocate_room_id();
        let room = Arc::new(Mutex::new(Room::new(id, host_user_id, settings)));
        self.rooms.insert(id, room.clone());
        room
    }

    /// 1 이상의 가장 작은 빈 id. 폐쇄된 방의 id는 재사용됩니다.
    fn allocate_room_id(&self) -> u16 {
        let mut id: u16 = 1;
        while self.rooms.contains_key(&id) {
            id += 1;
        }
        id
    }

    pub fn room(&self, id: u16) -> Option<Arc<Mutex<Room>>> {
        self.rooms.get(&id).map(|e| e.value().clone())
    }

    pub fn remove_room(&self, id: u16) -> bool {
        self.rooms.remove(&id).is_some()
    }

    /// 로비 입장 (채널 선택 시)
    pub fn enter_lobby(&self, conn: &Arc<Connection>) {
        self.lobby.insert(conn.uuid(), conn.clone());
    }

    pub fn leave_lobby(&self, uuid: Uuid) {
        self.lobby.remove(&uuid);
    }

    /// 로비 멤버 스냅샷. 잠금을 오래 잡지 않도록 복사본을 반환합니다.
    pub fn lobby_members(&self) -> Vec<Arc<Connection>> {
        self.lobby.iter().map(|e| e.value().clone()).collect()
    }

    /// 로비 전체에 패킷을 브로드캐스트합니다. 전송 성공 수를 반환합니다.
    pub async fn broadcast_lobby(&self, packet: &OutPacket) -> usize {
        let members = self.lobby_members();
        let mut success = 0;

        for conn in members {
            match conn.send(packet).await {
                Ok(()) => success += 1,
                Err(e) => {
                    warn!("로비 브로드캐스트 실패 ({}): {}", conn.uuid(), e);
                }
            }
        }

        success
    }

    /// 방 목록 스냅샷 (Closed 제외)
    pub async fn room_list_entries(&self) -> Vec<RoomListEntry> {
        let rooms: Vec<Arc<Mutex<Room>>> =
            self.rooms.iter().map(|e| e.value().clone()).collect();

        let mut entries = Vec::with_capacity(rooms.len());
        for room in rooms {
            let room = room.lock().await;
            if room.status() != RoomStatus::Closed {
                entries.push(RoomListEntry::from_room(&room));
            }
        }

        entries.sort_by_key(|e| e.id);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> RoomSettings {
        RoomSettings::create("r1".to_string(), String::new(), 1, 5, 3, 30).unwrap()
    }

    #[tokio::test]
    async fn test_room_id_allocation_and_reuse() {
        let channel = Channel::new(0, 0, "일반 채널 1".to_string());

        let r1 = channel.create_room(100, settings()).await;
        let r2 = channel.create_room(101, settings()).await;
        assert_eq!(r1.lock().await.id(), 1);
        assert_eq!(r2.lock().await.id(), 2);

        // 1번 방이 닫히면 id가 재사용된다
        channel.remove_room(1);
        let r3 = channel.create_room(102, settings()).await;
        assert_eq!(r3.lock().await.id(), 1);
    }

    #[tokio::test]
    async fn test_room_list_snapshot() {
        let channel = Channel::new(0, 0, "일반 채널 1".to_string());

        let room = channel.create_room(100, settings()).await;
        room.lock().await.join(101, "").unwrap();

        let entries = channel.room_list_entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, 1);
        assert_eq!(entries[0].name, "r1");
        assert_eq!(entries[0].player_count, 2);
        assert!(!entries[0].has_password);
    }
}
