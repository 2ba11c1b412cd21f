//! 마스터 서버 인스턴스
//!
//! TCP 리스너와 UDP 홀펀치 엔드포인트를 부팅하고 전체 구성요소를
//! 조립합니다. 레지스트리/프로브 같은 단일 인스턴스 객체는 전역이 아니라
//! `ServerContext`를 통해 핸들러에 주입됩니다.

use anyhow::{bail, Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::channel::directory::ChannelDirectory;
use crate::config::ServerConfig;
use crate::handler::PacketDispatcher;
use crate::service::connection::Connection;
use crate::service::connection_service::ConnectionService;
use crate::service::holepunch_service::HolepunchService;
use crate::service::packet_dump::PacketDumpService;
use crate::service::session_registry::SessionRegistry;
use shared::config::UserServiceConfig;
use shared::service::userservice::{UserServiceClient, UserServiceProbe};

/// 패킷 덤프 기본 디렉토리
const PACKET_DUMP_DIR: &str = "packet_dumps";

/// 핸들러에 주입되는 서버 컨텍스트
pub struct ServerContext {
    pub config: ServerConfig,
    pub connections: Arc<ConnectionService>,
    pub registry: Arc<SessionRegistry>,
    pub directory: Arc<ChannelDirectory>,
    pub userservice: Arc<UserServiceClient>,
    pub probe: Arc<UserServiceProbe>,
    pub dumper: Option<Arc<PacketDumpService>>,
    /// 실제 바인드된 홀펀치 포트 (UserStart에 실림)
    holepunch_port: AtomicU16,
}

impl ServerContext {
    pub fn holepunch_port(&self) -> u16 {
        self.holepunch_port.load(Ordering::Acquire)
    }

    fn set_holepunch_port(&self, port: u16) {
        self.holepunch_port.store(port, Ordering::Release);
    }
}

/// 마스터 서버
pub struct MasterServer {
    ctx: Arc<ServerContext>,
    dispatcher: Arc<PacketDispatcher>,
    holepunch: HolepunchService,
    is_running: Arc<tokio::sync::Mutex<bool>>,
    accept_handle: tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
    tcp_addr: parking_lot::Mutex<Option<SocketAddr>>,
}

impl MasterServer {
    /// 구성요소 조립. 유저 서비스 클라이언트와 프로브는 같은 설정을
    /// 공유합니다.
    pub fn new(config: ServerConfig, userservice_config: &UserServiceConfig) -> Result<Self> {
        let probe = Arc::new(UserServiceProbe::new(userservice_config)?);
        let userservice = Arc::new(UserServiceClient::new(userservice_config, probe.clone())?);

        let dumper = if config.log_packets {
            Some(Arc::new(PacketDumpService::new(PathBuf::from(
                PACKET_DUMP_DIR,
            ))?))
        } else {
            None
        };

        let holepunch_port = AtomicU16::new(config.port_holepunch);
        let max_connections = config.max_connections;

        let ctx = Arc::new(ServerContext {
            config,
            connections: Arc::new(ConnectionService::new(max_connections)),
            registry: Arc::new(SessionRegistry::new()),
            directory: Arc::new(ChannelDirectory::new()),
            userservice,
            probe,
            dumper,
            holepunch_port,
        });

        let dispatcher = Arc::new(PacketDispatcher::new(ctx.clone()));

        Ok(Self {
            ctx,
            dispatcher,
            holepunch: HolepunchService::new(),
            is_running: Arc::new(tokio::sync::Mutex::new(false)),
            accept_handle: tokio::sync::Mutex::new(None),
            tcp_addr: parking_lot::Mutex::new(None),
        })
    }

    pub fn context(&self) -> &Arc<ServerContext> {
        &self.ctx
    }

    /// 실제 바인드된 TCP 주소
    pub fn tcp_addr(&self) -> Option<SocketAddr> {
        *self.tcp_addr.lock()
    }

    /// 실제 바인드된 홀펀치 UDP 주소
    pub fn holepunch_addr(&self) -> Option<SocketAddr> {
        self.holepunch.local_addr()
    }

    /// 서버 시작: 프로브 → 홀펀치 → TCP 수락 루프
    pub async fn start(&self) -> Result<SocketAddr> {
        let mut is_running = self.is_running.lock().await;
        if *is_running {
            bail!("마스터 서버가 이미 실행 중입니다");
        }
        *is_running = true;
        drop(is_running);

        info!("🚀 마스터 서버 시작 중...");

        // 기동 시 1회 즉시 확인 후 5초 티커
        self.ctx.probe.check_now().await;
        self.ctx.probe.start().await?;

        let holepunch_addr = self
            .holepunch
            .start(self.ctx.config.holepunch_bind_addr())
            .await?;
        self.ctx.set_holepunch_port(holepunch_addr.port());

        let listener = TcpListener::bind(self.ctx.config.master_bind_addr())
            .await
            .context("마스터 TCP 리스너 바인드 실패")?;
        let local_addr = listener.local_addr()?;
        *self.tcp_addr.lock() = Some(local_addr);

        info!("✅ 마스터 서버가 {}에서 실행 중입니다", local_addr);

        let ctx = self.ctx.clone();
        let dispatcher = self.dispatcher.clone();
        let is_running_ref = self.is_running.clone();

        let handle = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        if !*is_running_ref.lock().await {
                            break;
                        }
                        debug!("새 연결 수락: {}", addr);

                        match Connection::new(stream, ctx.dumper.clone()) {
                            Ok((conn, read_half)) => {
                                if let Err(e) = ctx.connections.register(&conn) {
                                    warn!("연결 등록 거부 ({}): {}", addr, e);
                                    conn.close().await;
                                    continue;
                                }
                                ctx.connections
                                    .spawn_read_loop(conn, read_half, dispatcher.clone());
                            }
                            Err(e) => warn!("연결 래핑 실패 ({}): {}", addr, e),
                        }
                    }
                    Err(e) => {
                        error!("연결 수락 실패: {}", e);
                    }
                }
            }
        });

        *self.accept_handle.lock().await = Some(handle);
        Ok(local_addr)
    }

    /// 서버 중지: 수락 중단, 연결 종료, 프로브/홀펀치/덤프 정리
    pub async fn stop(&self) -> Result<()> {
        let mut is_running = self.is_running.lock().await;
        if !*is_running {
            warn!("마스터 서버가 이미 중지되어 있습니다");
            return Ok(());
        }
        *is_running = false;
        drop(is_running);

        info!("🛑 마스터 서버 중지 중...");

        if let Some(handle) = self.accept_handle.lock().await.take() {
            handle.abort();
        }

        self.ctx.connections.close_all().await;
        self.holepunch.stop().await;
        self.ctx.probe.stop().await;

        if let Some(dumper) = &self.ctx.dumper {
            dumper.stop().await;
        }

        info!("✅ 마스터 서버가 성공적으로 중지되었습니다");
        Ok(())
    }
}
