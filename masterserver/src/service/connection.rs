//! 개별 클라이언트 연결
//!
//! 하나의 소켓을 소유하며 세션 포인터, 방향별 시퀀스 상태, 쓰기 직렬화,
//! 선택적 패킷 덤프를 담당합니다. 모든 전송은 연결별 배타 잠금을 거치므로
//! 프레임에 찍힌 시퀀스 바이트가 와이어 상의 실제 순서와 일치합니다.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::debug;
use uuid::Uuid;

use crate::channel::session::UserSession;
use crate::protocol::codec::{OutPacket, PacketSequence};
use crate::protocol::HEADER_LENGTH;
use crate::service::packet_dump::{DumpDirection, DumpEntry, PacketDumpService};
use crate::tool::error::MasterError;

struct WriteLane {
    writer: BufWriter<OwnedWriteHalf>,
    sequence: PacketSequence,
}

/// 클라이언트 연결
pub struct Connection {
    uuid: Uuid,
    remote_addr: SocketAddr,
    write_lane: tokio::sync::Mutex<WriteLane>,
    in_sequence: parking_lot::Mutex<PacketSequence>,
    session: parking_lot::RwLock<Option<Arc<UserSession>>>,
    destroyed: AtomicBool,
    dumper: Option<Arc<PacketDumpService>>,
}

impl Connection {
    /// 소켓을 감싸 연결을 만들고 읽기 절반을 반환합니다.
    pub fn new(
        stream: TcpStream,
        dumper: Option<Arc<PacketDumpService>>,
    ) -> Result<(Arc<Self>, OwnedReadHalf), MasterError> {
        let remote_addr = stream.peer_addr()?;
        let (read_half, write_half) = stream.into_split();

        let conn = Arc::new(Self {
            uuid: Uuid::new_v4(),
            remote_addr,
            write_lane: tokio::sync::Mutex::new(WriteLane {
                writer: BufWriter::new(write_half),
                sequence: PacketSequence::new(),
            }),
            in_sequence: parking_lot::Mutex::new(PacketSequence::new()),
            session: parking_lot::RwLock::new(None),
            destroyed: AtomicBool::new(false),
            dumper,
        });

        Ok((conn, read_half))
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    pub fn session(&self) -> Option<Arc<UserSession>> {
        self.session.read().clone()
    }

    pub fn attach_session(&self, session: Arc<UserSession>) {
        *self.session.write() = Some(session);
    }

    pub fn detach_session(&self) -> Option<Arc<UserSession>> {
        self.session.write().take()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// 다음 송신 프레임에 찍힐 시퀀스 바이트
    pub async fn out_sequence(&self) -> u8 {
        self.write_lane.lock().await.sequence.peek()
    }

    /// 다음에 기대되는 수신 시퀀스 바이트 (로깅용)
    pub fn in_sequence(&self) -> u8 {
        self.in_sequence.lock().peek()
    }

    /// 수신 프레임의 시퀀스를 기록합니다. 수신 시퀀스는 검증하지 않고
    /// 로깅/덤프 용도로만 씁니다. 덤프 파일명에 쓰이는 실제 순번을
    /// 반환합니다.
    pub fn note_inbound(&self, wire_sequence: u8) -> u64 {
        let mut seq = self.in_sequence.lock();
        let (expected, real) = seq.advance();
        if expected != wire_sequence {
            debug!(
                "연결 {} 수신 시퀀스 어긋남: 기대 {}, 수신 {}",
                self.uuid, expected, wire_sequence
            );
        }
        real
    }

    /// 패킷 전송. 쓰기 잠금 아래에서 시퀀스를 찍고 프레임을 원자적으로
    /// 기록합니다.
    pub async fn send(&self, packet: &OutPacket) -> Result<(), MasterError> {
        if self.is_destroyed() {
            return Err(MasterError::ConnectionClosed(self.uuid));
        }

        let mut lane = self.write_lane.lock().await;
        let (sequence, real) = lane.sequence.advance();
        let frame = packet.to_frame(sequence)?;

        if let Err(e) = lane.writer.write_all(&frame).await {
            self.destroyed.store(true, Ordering::Release);
            return Err(MasterError::Io(e));
        }
        if let Err(e) = lane.writer.flush().await {
            self.destroyed.store(true, Ordering::Release);
            return Err(MasterError::Io(e));
        }

        if let Some(dumper) = &self.dumper {
            dumper.record(DumpEntry {
                direction: DumpDirection::Outbound,
                conn_uuid: self.uuid,
                real_seq: real,
                packet_id: packet.packet_id(),
                frame,
            });
        }

        Ok(())
    }

    /// 이미 조립된 프레임 전송. 시퀀스 바이트는 이 연결의 카운터로
    /// 덮어씁니다.
    pub async fn send_raw(&self, frame: &[u8]) -> Result<(), MasterError> {
        if self.is_destroyed() {
            return Err(MasterError::ConnectionClosed(self.uuid));
        }

        let mut lane = self.write_lane.lock().await;
        let (sequence, real) = lane.sequence.advance();

        let mut buf = frame.to_vec();
        if buf.len() > 1 {
            buf[1] = sequence;
        }

        if let Err(e) = lane.writer.write_all(&buf).await {
            self.destroyed.store(true, Ordering::Release);
            return Err(MasterError::Io(e));
        }
        if let Err(e) = lane.writer.flush().await {
            self.destroyed.store(true, Ordering::Release);
            return Err(MasterError::Io(e));
        }

        if let Some(dumper) = &self.dumper {
            let packet_id = if buf.len() > HEADER_LENGTH {
                buf[HEADER_LENGTH]
            } else {
                0
            };
            dumper.record(DumpEntry {
                direction: DumpDirection::Outbound,
                conn_uuid: self.uuid,
                real_seq: real,
                packet_id,
                frame: bytes::Bytes::from(buf),
            });
        }

        Ok(())
    }

    /// 수신 프레임 전체(헤더 + 바디)를 덤프에 기록합니다.
    pub fn dump_inbound(&self, real_seq: u64, packet_id: u8, header: &[u8], body: &[u8]) {
        if let Some(dumper) = &self.dumper {
            let mut frame = Vec::with_capacity(header.len() + body.len());
            frame.extend_from_slice(header);
            frame.extend_from_slice(body);

            dumper.record(DumpEntry {
                direction: DumpDirection::Inbound,
                conn_uuid: self.uuid,
                real_seq,
                packet_id,
                frame: bytes::Bytes::from(frame),
            });
        }
    }

    /// 연결 종료. 중복 호출은 무시됩니다.
    pub async fn close(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }

        let mut lane = self.write_lane.lock().await;
        let _ = lane.writer.shutdown().await;
        debug!("연결 {} 종료됨", self.uuid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::packet_id::PacketId;
    use crate::protocol::PACKET_SIGNATURE;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    async fn loopback_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        (client, server)
    }

    #[tokio::test]
    async fn test_send_stamps_contiguous_sequences() {
        let (client, server) = loopback_pair().await;
        let (conn, _read_half) = Connection::new(server, None).unwrap();

        // 257번 전송: 래핑 포함 0..=255, 0
        let mut packet = OutPacket::new(PacketId::Version);
        packet.write_u8(1);
        for _ in 0..257 {
            conn.send(&packet).await.unwrap();
        }

        let mut reader = tokio::io::BufReader::new(client);
        let mut observed = Vec::new();
        for _ in 0..257 {
            let mut header = [0u8; 4];
            reader.read_exact(&mut header).await.unwrap();
            assert_eq!(header[0], PACKET_SIGNATURE);
            observed.push(header[1]);
            let body_len = u16::from_le_bytes([header[2], header[3]]) as usize;
            let mut body = vec![0u8; body_len];
            reader.read_exact(&mut body).await.unwrap();
        }

        for (i, seq) in observed.iter().enumerate().take(256) {
            assert_eq!(*seq, i as u8);
        }
        assert_eq!(observed[256], 0);
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let (_client, server) = loopback_pair().await;
        let (conn, _read_half) = Connection::new(server, None).unwrap();

        conn.close().await;

        let mut packet = OutPacket::new(PacketId::Version);
        packet.write_u8(1);
        assert!(matches!(
            conn.send(&packet).await,
            Err(MasterError::ConnectionClosed(_))
        ));
    }
}
