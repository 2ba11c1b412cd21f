//! 마스터 서버 진입점
//!
//! 필수 환경변수:
//! - USERSERVICE_HOST: 유저 서비스 호스트
//! - USERSERVICE_PORT: 유저 서비스 포트

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use masterserver::config::{resolve_config, validate_config, Args};
use masterserver::server::MasterServer;
use shared::config::UserServiceConfig;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config = match resolve_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(e.exit_code());
        }
    };
    validate_config(&config)?;

    let userservice_config = UserServiceConfig::from_env()?;

    info!("=== 마스터 서버 설정 ===");
    info!("TCP 리스너: {}", config.master_bind_addr());
    info!("홀펀치 UDP: {}", config.holepunch_bind_addr());
    info!("유저 서비스: {}", userservice_config.base_url());
    info!(
        "패킷 덤프: {}",
        if config.log_packets { "켜짐" } else { "꺼짐" }
    );
    info!("========================");

    let server = MasterServer::new(config, &userservice_config)?;
    server.start().await?;

    wait_for_shutdown_signal().await;
    info!("종료 시그널 수신, 서버를 중지합니다...");

    server.stop().await?;
    Ok(())
}

/// SIGINT 또는 SIGTERM을 기다립니다.
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                error!("SIGTERM 핸들러 등록 실패: {}", e);
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
