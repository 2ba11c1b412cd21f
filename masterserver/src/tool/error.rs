//! 마스터 서버 공통 에러 처리
//!
//! 프레이밍, 핸들러, 방/채널 연산에서 발생하는 에러를 분류합니다.
//! 치명적인 프레임 에러만 연결을 종료하고, 나머지는 로깅 후 연결을
//! 유지합니다.

use thiserror::Error;
use uuid::Uuid;

use crate::channel::room::RoomError;
use crate::protocol::codec::CodecError;
use shared::tool::error::AppError;

/// 마스터 서버 에러 타입
#[derive(Error, Debug)]
pub enum MasterError {
    /// 시그니처/길이 불일치. 연결에 치명적입니다.
    #[error("잘못된 프레임: {0}")]
    BadFrame(#[from] CodecError),

    /// 로그인 전에 수신된 요청. 로깅 후 버립니다.
    #[error("인증되지 않은 요청: 패킷 id {0}")]
    Unauthenticated(u8),

    /// 형식이 깨졌거나 범위를 벗어난 페이로드. 연결은 유지됩니다.
    #[error("잘못된 요청: {0}")]
    BadRequest(String),

    /// 파괴된 소켓에 대한 전송. 경고와 함께 무시됩니다.
    #[error("이미 종료된 연결입니다: {0}")]
    ConnectionClosed(Uuid),

    /// 방/채널 상태 단언 실패. 사용자에게 다이얼로그로 응답합니다.
    #[error("방 상태 위반: {0}")]
    Room(#[from] RoomError),

    /// 유저 서비스 전송 실패 또는 비정상 응답
    #[error("업스트림 사용 불가: {0}")]
    Upstream(#[from] AppError),

    /// 사용자/방 조회 결과 없음
    #[error("대상을 찾을 수 없습니다: {0}")]
    NotFound(String),

    #[error("입출력 오류: {0}")]
    Io(#[from] std::io::Error),
}

impl MasterError {
    /// 이 에러가 연결을 종료시켜야 하는지 여부
    pub fn is_fatal(&self) -> bool {
        matches!(self, MasterError::BadFrame(_) | MasterError::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        let frame_err = MasterError::BadFrame(CodecError::BadSignature(0x54));
        assert!(frame_err.is_fatal());

        let room_err = MasterError::Room(RoomError::Full);
        assert!(!room_err.is_fatal());

        let not_found = MasterError::NotFound("room 7".to_string());
        assert!(!not_found.is_fatal());
    }
}
