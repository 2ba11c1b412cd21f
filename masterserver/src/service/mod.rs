//! 마스터 서버 서비스 레이어
//!
//! 연결 관리, 세션 색인, 홀펀치, 패킷 덤프 등 핵심 서비스를 정의합니다.
//!
//! # 서비스 구조
//!
//! ```text
//! Service Layer
//! ├── Connection (개별 소켓, 쓰기 직렬화, 시퀀스)
//! ├── ConnectionService (연결 집합, 읽기 루프)
//! ├── SessionRegistry (사용자 id/이름 색인)
//! ├── HolepunchService (UDP 공인 주소 에코)
//! └── PacketDumpService (선택적 프레임 덤프)
//! ```

pub mod connection;
pub mod connection_service;
pub mod holepunch_service;
pub mod packet_dump;
pub mod session_registry;

pub use connection::Connection;
pub use connection_service::{ConnectionService, IDLE_TIMEOUT};
pub use holepunch_service::HolepunchService;
pub use packet_dump::{DumpDirection, DumpEntry, PacketDumpService};
pub use session_registry::SessionRegistry;
