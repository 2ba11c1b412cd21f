//! 세션 레지스트리
//!
//! 인증된 연결 전체를 사용자 id와 플레이어 이름으로 색인합니다.
//! 두 색인의 일관성을 위해 변이는 작은 뮤텍스로 직렬화합니다.
//! 레지스트리는 소유자가 아니며, 연결의 수명은 수락 루프가 책임집니다.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

use crate::service::connection::Connection;

/// 세션 레지스트리
pub struct SessionRegistry {
    by_user: DashMap<u32, Arc<Connection>>,
    name_index: DashMap<String, u32>,
    /// 두 색인의 동시 변이 직렬화
    mutation: Mutex<()>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            by_user: DashMap::new(),
            name_index: DashMap::new(),
            mutation: Mutex::new(()),
        }
    }

    /// 연결 등록. 같은 연결에 대해 멱등이며, 같은 사용자의 다른 연결이
    /// 이미 등록돼 있으면 거부합니다. 세션이 없는 연결은 등록할 수
    /// 없습니다.
    pub fn add(&self, conn: &Arc<Connection>) -> bool {
        let Some(session) = conn.session() else {
            debug!("세션 없는 연결 {} 등록 시도", conn.uuid());
            return false;
        };

        let _guard = self.mutation.lock();
        let user_id = session.user_id();

        if let Some(existing) = self.by_user.get(&user_id) {
            return existing.uuid() == conn.uuid();
        }

        self.by_user.insert(user_id, conn.clone());
        self.name_index
            .insert(session.player_name().to_string(), user_id);
        true
    }

    /// 연결 제거. 해당 사용자로 등록된 연결이 본인일 때만 제거합니다.
    pub fn remove(&self, conn: &Arc<Connection>) -> bool {
        let Some(session) = conn.session() else {
            return false;
        };

        let _guard = self.mutation.lock();
        let user_id = session.user_id();

        match self.by_user.get(&user_id) {
            Some(existing) if existing.uuid() == conn.uuid() => {}
            _ => return false,
        }

        self.by_user.remove(&user_id);
        self.name_index.remove(session.player_name());
        true
    }

    pub fn find_by_owner_id(&self, user_id: u32) -> Option<Arc<Connection>> {
        self.by_user.get(&user_id).map(|e| e.value().clone())
    }

    pub fn find_by_player_name(&self, name: &str) -> Option<Arc<Connection>> {
        let user_id = *self.name_index.get(name)?;
        self.find_by_owner_id(user_id)
    }

    pub fn count(&self) -> usize {
        self.by_user.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_user.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::session::UserSession;
    use shared::model::User;
    use tokio::net::{TcpListener, TcpStream};

    fn test_user(id: u32, player_name: &str) -> User {
        User {
            id,
            user_name: format!("user{}", id),
            player_name: player_name.to_string(),
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

    async fn authed_conn(id: u32, player_name: &str) -> (TcpStream, Arc<Connection>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        let (conn, _read_half) = Connection::new(server, None).unwrap();

        let session = Arc::new(UserSession::new(
            test_user(id, player_name),
            conn.remote_addr(),
        ));
        conn.attach_session(session);
        (client, conn)
    }

    #[tokio::test]
    async fn test_add_is_idempotent_for_same_connection() {
        let registry = SessionRegistry::new();
        let (_c, conn) = authed_conn(42, "Alice").await;

        assert!(registry.add(&conn));
        assert!(registry.add(&conn)); // 같은 연결은 멱등
        assert_eq!(registry.count(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_user_rejected() {
        let registry = SessionRegistry::new();
        let (_c1, conn1) = authed_conn(42, "Alice").await;
        let (_c2, conn2) = authed_conn(42, "Alice").await;

        assert!(registry.add(&conn1));
        assert!(!registry.add(&conn2)); // 다른 연결의 같은 사용자
        assert_eq!(registry.count(), 1);
    }

    #[tokio::test]
    async fn test_find_by_id_and_name() {
        let registry = SessionRegistry::new();
        let (_c1, conn1) = authed_conn(42, "Alice").await;
        let (_c2, conn2) = authed_conn(43, "Bob").await;
        registry.add(&conn1);
        registry.add(&conn2);

        assert_eq!(
            registry.find_by_owner_id(42).map(|c| c.uuid()),
            Some(conn1.uuid())
        );
        assert_eq!(
            registry.find_by_player_name("Bob").map(|c| c.uuid()),
            Some(conn2.uuid())
        );
        assert!(registry.find_by_owner_id(99).is_none());
        assert!(registry.find_by_player_name("Carol").is_none());
    }

    #[tokio::test]
    async fn test_login_logout_leaves_registry_empty() {
        let registry = SessionRegistry::new();
        let (_c, conn) = authed_conn(42, "Alice").await;

        registry.add(&conn);
        assert!(!registry.is_empty());

        assert!(registry.remove(&conn));
        assert!(registry.is_empty());
        assert!(registry.find_by_owner_id(42).is_none());
        assert!(registry.find_by_player_name("Alice").is_none());
    }
}
