//! 연결 서비스
//!
//! 살아있는 연결 집합을 관리하고 연결별 읽기 루프를 구동합니다.
//! 프레임 해석 실패(시그니처/길이)는 연결에 치명적이고, 핸들러 실패는
//! 로깅 후 연결을 유지합니다.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::handler::PacketDispatcher;
use crate::protocol::codec::FrameHeader;
use crate::protocol::HEADER_LENGTH;
use crate::service::connection::Connection;
use crate::tool::error::MasterError;

/// 부분 프레임 대기 한계. 이 시간 동안 진전이 없으면 연결을 닫습니다.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(120);

/// 연결 서비스
pub struct ConnectionService {
    connections: Arc<DashMap<Uuid, Arc<Connection>>>,
    max_connections: usize,
}

impl ConnectionService {
    pub fn new(max_connections: usize) -> Self {
        Self {
            connections: Arc::new(DashMap::new()),
            max_connections,
        }
    }

    /// 연결 등록. 최대 연결 수를 초과하면 거부합니다.
    pub fn register(&self, conn: &Arc<Connection>) -> Result<(), MasterError> {
        if self.connections.len() >= self.max_connections {
            warn!(
                "최대 연결 수 초과: {}/{}",
                self.connections.len(),
                self.max_connections
            );
            return Err(MasterError::BadRequest("서버가 가득 참".to_string()));
        }

        self.connections.insert(conn.uuid(), conn.clone());
        Ok(())
    }

    pub fn unregister(&self, uuid: Uuid) -> bool {
        self.connections.remove(&uuid).is_some()
    }

    pub fn get(&self, uuid: Uuid) -> Option<Arc<Connection>> {
        self.connections.get(&uuid).map(|e| e.value().clone())
    }

    pub fn count(&self) -> usize {
        self.connections.len()
    }

    /// 모든 연결 종료 (서버 중지 경로)
    pub async fn close_all(&self) {
        let conns: Vec<Arc<Connection>> =
            self.connections.iter().map(|e| e.value().clone()).collect();
        let count = conns.len();

        for conn in conns {
            conn.close().await;
        }
        self.connections.clear();

        info!("모든 사용자 연결 해제: {}개", count);
    }

    /// 연결의 읽기 루프를 시작합니다.
    ///
    /// 프레임 단위로 읽어 디스패처에 넘기고, 루프 종료 시 연결 해제
    /// 정리(방 퇴장, 레지스트리 제거)를 수행합니다.
    pub fn spawn_read_loop(
        &self,
        conn: Arc<Connection>,
        read_half: OwnedReadHalf,
        dispatcher: Arc<PacketDispatcher>,
    ) {
        let connections_ref = self.connections.clone();

        tokio::spawn(async move {
            let mut reader = BufReader::new(read_half);

            loop {
                // 헤더 4바이트
                let mut header_raw = [0u8; HEADER_LENGTH];
                match timeout(IDLE_TIMEOUT, reader.read_exact(&mut header_raw)).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => {
                        debug!("연결 {} 소켓 종료: {}", conn.uuid(), e);
                        break;
                    }
                    Err(_) => {
                        warn!("연결 {} 유휴 타임아웃", conn.uuid());
                        break;
                    }
                }

                let header = match FrameHeader::parse(&header_raw) {
                    Ok(h) => h,
                    Err(e) => {
                        warn!("연결 {} 프레임 에러: {}", conn.uuid(), e);
                        break;
                    }
                };

                // 바디: 패킷 id 1바이트 + 페이로드
                let mut body = vec![0u8; header.body_length as usize];
                match timeout(IDLE_TIMEOUT, reader.read_exact(&mut body)).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => {
                        warn!("연결 {} 바디 수신 실패: {}", conn.uuid(), e);
                        break;
                    }
                    Err(_) => {
                        warn!("연결 {} 부분 프레임 타임아웃", conn.uuid());
                        break;
                    }
                }

                let real_seq = conn.note_inbound(header.sequence);
                let packet_id = body[0];
                conn.dump_inbound(real_seq, packet_id, &header_raw, &body);

                if !dispatcher.dispatch(&conn, packet_id, &body[1..]).await {
                    debug!(
                        "연결 {} 패킷 {} 처리 실패 (연결 유지)",
                        conn.uuid(),
                        packet_id
                    );
                }
            }

            // 연결 정리: 방/채널 퇴장, 레지스트리 제거, 소켓 종료
            dispatcher.handle_disconnect(&conn).await;
            connections_ref.remove(&conn.uuid());
            conn.close().await;

            info!("연결 {} 해제 완료 ({})", conn.uuid(), conn.remote_addr());
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::{TcpListener, TcpStream};

    async fn loopback_conn() -> (TcpStream, Arc<Connection>, OwnedReadHalf) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        let (conn, read_half) = Connection::new(server, None).unwrap();
        (client, conn, read_half)
    }

    #[tokio::test]
    async fn test_register_and_capacity() {
        let service = ConnectionService::new(1);

        let (_c1, conn1, _r1) = loopback_conn().await;
        let (_c2, conn2, _r2) = loopback_conn().await;

        assert!(service.register(&conn1).is_ok());
        assert_eq!(service.count(), 1);

        // 용량 초과
        assert!(service.register(&conn2).is_err());

        assert!(service.unregister(conn1.uuid()));
        assert!(service.register(&conn2).is_ok());
    }

    #[tokio::test]
    async fn test_close_all() {
        let service = ConnectionService::new(10);

        let (_c1, conn1, _r1) = loopback_conn().await;
        let (_c2, conn2, _r2) = loopback_conn().await;
        service.register(&conn1).unwrap();
        service.register(&conn2).unwrap();

        service.close_all().await;
        assert_eq!(service.count(), 0);
        assert!(conn1.is_destroyed());
        assert!(conn2.is_destroyed());
    }
}
