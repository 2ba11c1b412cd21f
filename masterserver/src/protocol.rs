//! 마스터 서버 게임 프로토콜 정의
//!
//! 클라이언트 실행 파일과 주고받는 커스텀 바이너리 프로토콜을 정의합니다.
//!
//! # 프레임 구조
//!
//! ```text
//! [시그니처: 1바이트 = 0x55][시퀀스: 1바이트][바디 길이: 2바이트 LE][패킷 id: 1바이트][바디]
//! ```
//!
//! 바디 길이는 패킷 id 바이트를 포함합니다. 시퀀스는 연결별, 방향별로
//! 0..=255를 순환하며 래핑 시 0으로 돌아갑니다.

pub mod codec;
pub mod packet_id;
pub mod packets_in;
pub mod packets_out;

pub use codec::{CodecError, FrameHeader, OutPacket, PacketReader, PacketSequence};
pub use packet_id::PacketId;

/// 프레임 시그니처 바이트
pub const PACKET_SIGNATURE: u8 = 0x55;

/// 프레임 헤더 길이 (시그니처 + 시퀀스 + 바디 길이)
pub const HEADER_LENGTH: usize = 4;
