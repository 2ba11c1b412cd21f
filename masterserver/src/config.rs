//! 마스터 서버 실행 설정
//!
//! CLI 플래그와 네트워크 인터페이스 선택을 처리합니다. `-i`와 `-I`는
//! 배타적이며, 둘 다 없으면 인터페이스 목록을 보여주고 선택을 받습니다.
//!
//! 종료 코드: 0 정상, 1 인터페이스를 찾지 못했거나 선택 실패,
//! 2 `-i`와 `-I` 동시 지정.

use clap::Parser;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use sysinfo::Networks;
use thiserror::Error;
use tracing::info;

/// 기본 마스터 TCP 포트
pub const DEFAULT_MASTER_PORT: u16 = 30001;

/// 기본 홀펀치 UDP 포트
pub const DEFAULT_HOLEPUNCH_PORT: u16 = 30002;

/// 기본 최대 동시 연결 수
pub const DEFAULT_MAX_CONNECTIONS: usize = 1000;

/// CLI 인자
#[derive(Parser, Debug)]
#[clap(author, version, about = "레거시 온라인 게임 마스터 서버")]
pub struct Args {
    /// 바인드할 IP 주소 (-I와 동시 사용 불가)
    #[clap(short = 'i', long = "ip-address")]
    pub ip_address: Option<String>,

    /// 바인드할 네트워크 인터페이스 이름
    #[clap(short = 'I', long = "interface")]
    pub interface: Option<String>,

    /// 마스터 서버 TCP 포트
    #[clap(short = 'p', long = "port-master", default_value_t = DEFAULT_MASTER_PORT)]
    pub port_master: u16,

    /// 홀펀치 UDP 포트
    #[clap(short = 'P', long = "port-holepunch", default_value_t = DEFAULT_HOLEPUNCH_PORT)]
    pub port_holepunch: u16,

    /// 수신/송신 프레임을 파일로 덤프
    #[clap(short = 'l', long = "log-packets")]
    pub log_packets: bool,
}

/// 설정 해석 에러
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("-i/--ip-address와 -I/--interface는 함께 사용할 수 없습니다")]
    ConflictingAddressFlags,

    #[error("네트워크 인터페이스를 찾을 수 없습니다: {0}")]
    InterfaceNotFound(String),

    #[error("인터페이스 선택에 실패했습니다")]
    SelectionFailed,

    #[error("유효하지 않은 IP 주소: {0}")]
    InvalidIpAddress(String),
}

impl ConfigError {
    /// 프로세스 종료 코드
    pub fn exit_code(&self) -> i32 {
        match self {
            ConfigError::ConflictingAddressFlags => 2,
            ConfigError::InterfaceNotFound(_)
            | ConfigError::SelectionFailed
            | ConfigError::InvalidIpAddress(_) => 1,
        }
    }
}

/// 마스터 서버 설정
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_ip: IpAddr,
    pub port_master: u16,
    pub port_holepunch: u16,
    pub log_packets: bool,
    pub max_connections: usize,
}

impl ServerConfig {
    pub fn master_bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port_master)
    }

    pub fn holepunch_bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port_holepunch)
    }
}

/// CLI 인자에서 설정을 해석합니다. 인터페이스가 필요하면 대화형 선택까지
/// 수행합니다.
pub fn resolve_config(args: &Args) -> Result<ServerConfig, ConfigError> {
    let bind_ip = resolve_bind_ip(args)?;

    Ok(ServerConfig {
        bind_ip,
        port_master: args.port_master,
        port_holepunch: args.port_holepunch,
        log_packets: args.log_packets,
        max_connections: DEFAULT_MAX_CONNECTIONS,
    })
}

fn resolve_bind_ip(args: &Args) -> Result<IpAddr, ConfigError> {
    match (&args.ip_address, &args.interface) {
        (Some(_), Some(_)) => Err(ConfigError::ConflictingAddressFlags),
        (Some(ip), None) => ip
            .parse()
            .map_err(|_| ConfigError::InvalidIpAddress(ip.clone())),
        (None, Some(name)) => interface_ipv4(name)
            .ok_or_else(|| ConfigError::InterfaceNotFound(name.clone())),
        (None, None) => select_interface_interactive(),
    }
}

/// 시스템의 (인터페이스 이름, IPv4) 목록
fn list_interfaces() -> Vec<(String, Ipv4Addr)> {
    let networks = Networks::new_with_refreshed_list();
    let mut interfaces = Vec::new();

    for (name, data) in &networks {
        for network in data.ip_networks() {
            if let IpAddr::V4(v4) = network.addr {
                interfaces.push((name.clone(), v4));
                break;
            }
        }
    }

    interfaces.sort();
    interfaces
}

fn interface_ipv4(name: &str) -> Option<IpAddr> {
    list_interfaces()
        .into_iter()
        .find(|(n, _)| n == name)
        .map(|(_, ip)| IpAddr::V4(ip))
}

/// 인터페이스 목록을 보여주고 표준 입력으로 선택을 받습니다.
fn select_interface_interactive() -> Result<IpAddr, ConfigError> {
    let interfaces = list_interfaces();
    if interfaces.is_empty() {
        return Err(ConfigError::SelectionFailed);
    }

    println!("바인드할 네트워크 인터페이스를 선택하세요:");
    for (i, (name, ip)) in interfaces.iter().enumerate() {
        println!("  [{}] {} ({})", i, name, ip);
    }

    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .map_err(|_| ConfigError::SelectionFailed)?;

    select_from_input(&line, &interfaces)
}

/// 입력 한 줄을 인터페이스 인덱스로 해석합니다.
fn select_from_input(
    line: &str,
    interfaces: &[(String, Ipv4Addr)],
) -> Result<IpAddr, ConfigError> {
    let index: usize = line
        .trim()
        .parse()
        .map_err(|_| ConfigError::SelectionFailed)?;

    interfaces
        .get(index)
        .map(|(_, ip)| IpAddr::V4(*ip))
        .ok_or(ConfigError::SelectionFailed)
}

/// 설정 검증 유틸리티
pub fn validate_config(config: &ServerConfig) -> anyhow::Result<()> {
    // 포트 0은 임시 포트 할당을 뜻한다 (테스트 경로)
    if config.port_master != 0 && config.port_master == config.port_holepunch {
        anyhow::bail!(
            "마스터 포트와 홀펀치 포트가 같습니다: {}",
            config.port_master
        );
    }

    info!("마스터 서버 설정 확인 완료: {:?}", config);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(ip: Option<&str>, interface: Option<&str>) -> Args {
        Args {
            ip_address: ip.map(String::from),
            interface: interface.map(String::from),
            port_master: DEFAULT_MASTER_PORT,
            port_holepunch: DEFAULT_HOLEPUNCH_PORT,
            log_packets: false,
        }
    }

    #[test]
    fn test_conflicting_flags_exit_code_2() {
        let err = resolve_bind_ip(&args(Some("127.0.0.1"), Some("eth0"))).unwrap_err();
        assert_eq!(err, ConfigError::ConflictingAddressFlags);
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_explicit_ip() {
        let ip = resolve_bind_ip(&args(Some("10.0.0.5"), None)).unwrap();
        assert_eq!(ip, "10.0.0.5".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_invalid_ip_exit_code_1() {
        let err = resolve_bind_ip(&args(Some("not-an-ip"), None)).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_missing_interface_exit_code_1() {
        let err =
            resolve_bind_ip(&args(None, Some("존재하지-않는-인터페이스-이름"))).unwrap_err();
        assert!(matches!(err, ConfigError::InterfaceNotFound(_)));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_select_from_input() {
        let interfaces = vec![
            ("eth0".to_string(), Ipv4Addr::new(10, 0, 0, 5)),
            ("lo".to_string(), Ipv4Addr::new(127, 0, 0, 1)),
        ];

        assert_eq!(
            select_from_input("1\n", &interfaces).unwrap(),
            IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
        );
        assert_eq!(
            select_from_input("abc\n", &interfaces).unwrap_err(),
            ConfigError::SelectionFailed
        );
        assert_eq!(
            select_from_input("9\n", &interfaces).unwrap_err(),
            ConfigError::SelectionFailed
        );
    }

    #[test]
    fn test_validate_rejects_equal_ports() {
        let config = ServerConfig {
            bind_ip: "127.0.0.1".parse().unwrap(),
            port_master: 30001,
            port_holepunch: 30001,
            log_packets: false,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        };
        assert!(validate_config(&config).is_err());
    }
}
