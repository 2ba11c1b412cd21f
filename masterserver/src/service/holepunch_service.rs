//! UDP 홀펀치 엔드포인트
//!
//! 클라이언트가 자신의 공인 `(ip, port)`를 발견할 수 있도록, 수신한
//! 모든 데이터그램에 대해 관측된 IPv4 4바이트 + 포트 2바이트(BE)를
//! 돌려보냅니다.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// UDP 홀펀치 서비스
pub struct HolepunchService {
    local_addr: parking_lot::Mutex<Option<SocketAddr>>,
    task_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Default for HolepunchService {
    fn default() -> Self {
        Self::new()
    }
}

impl HolepunchService {
    pub fn new() -> Self {
        Self {
            local_addr: parking_lot::Mutex::new(None),
            task_handle: Mutex::new(None),
        }
    }

    /// 실제로 바인드된 주소
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    /// 소켓을 바인드하고 에코 루프를 시작합니다.
    pub async fn start(&self, bind_addr: SocketAddr) -> Result<SocketAddr> {
        let socket = UdpSocket::bind(bind_addr)
            .await
            .context("홀펀치 UDP 소켓 바인드 실패")?;
        let local_addr = socket.local_addr()?;
        *self.local_addr.lock() = Some(local_addr);

        info!("✅ 홀펀치 엔드포인트 시작: {}", local_addr);

        let handle = tokio::spawn(async move {
            let mut buf = [0u8; 1024];

            loop {
                let (_, peer) = match socket.recv_from(&mut buf).await {
                    Ok(v) => v,
                    Err(e) => {
                        warn!("홀펀치 수신 실패: {}", e);
                        continue;
                    }
                };

                match peer {
                    SocketAddr::V4(v4) => {
                        let mut reply = [0u8; 6];
                        reply[..4].copy_from_slice(&v4.ip().octets());
                        reply[4..].copy_from_slice(&v4.port().to_be_bytes());

                        if let Err(e) = socket.send_to(&reply, peer).await {
                            warn!("홀펀치 응답 실패 ({}): {}", peer, e);
                        } else {
                            debug!("홀펀치 응답: {} → {:?}", peer, reply);
                        }
                    }
                    SocketAddr::V6(_) => {
                        debug!("IPv6 홀펀치 요청 무시: {}", peer);
                    }
                }
            }
        });

        *self.task_handle.lock().await = Some(handle);
        Ok(local_addr)
    }

    /// 에코 루프 중지
    pub async fn stop(&self) {
        if let Some(handle) = self.task_handle.lock().await.take() {
            handle.abort();
            info!("🛑 홀펀치 엔드포인트 중지됨");
        }
    }
}
