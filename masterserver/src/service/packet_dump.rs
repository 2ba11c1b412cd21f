//! 패킷 덤프 사이드카
//!
//! `-l` 플래그로 켜지는 포렌식 리플레이용 싱크입니다. 수신/송신 프레임을
//! `{base}/{in|out}/{연결uuid}_{순번}-{패킷id}.bin` 파일로 기록합니다.
//! 쓰기 경로를 막지 않도록 유한 채널 뒤의 별도 태스크가 기록하고,
//! 채널이 가득 차면 항목을 버립니다.

use anyhow::{Context, Result};
use bytes::Bytes;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 덤프 채널 용량
const DUMP_QUEUE_CAPACITY: usize = 1024;

/// 프레임 방향
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpDirection {
    Inbound,
    Outbound,
}

impl DumpDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            DumpDirection::Inbound => "in",
            DumpDirection::Outbound => "out",
        }
    }
}

/// 덤프 항목
#[derive(Debug)]
pub struct DumpEntry {
    pub direction: DumpDirection,
    pub conn_uuid: Uuid,
    pub real_seq: u64,
    pub packet_id: u8,
    pub frame: Bytes,
}

/// 패킷 덤프 서비스
pub struct PacketDumpService {
    tx: mpsc::Sender<DumpEntry>,
    dropped: AtomicU64,
    writer_handle: tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl PacketDumpService {
    /// 덤프 디렉토리를 비우고 기록 태스크를 시작합니다.
    pub fn new(base_dir: PathBuf) -> Result<Self> {
        for sub in ["in", "out"] {
            let dir = base_dir.join(sub);
            if dir.exists() {
                std::fs::remove_dir_all(&dir)
                    .with_context(|| format!("덤프 디렉토리 정리 실패: {}", dir.display()))?;
            }
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("덤프 디렉토리 생성 실패: {}", dir.display()))?;
        }

        let (tx, mut rx) = mpsc::channel::<DumpEntry>(DUMP_QUEUE_CAPACITY);

        let writer_base = base_dir.clone();
        let handle = tokio::spawn(async move {
            while let Some(entry) = rx.recv().await {
                let path = writer_base.join(entry.direction.as_str()).join(format!(
                    "{}_{:06}-{}.bin",
                    entry.conn_uuid, entry.real_seq, entry.packet_id
                ));

                if let Err(e) = tokio::fs::write(&path, &entry.frame).await {
                    warn!("패킷 덤프 기록 실패 ({}): {}", path.display(), e);
                }
            }
            debug!("패킷 덤프 기록 태스크 종료");
        });

        info!("패킷 덤프 활성화: {}", base_dir.display());

        Ok(Self {
            tx,
            dropped: AtomicU64::new(0),
            writer_handle: tokio::sync::Mutex::new(Some(handle)),
        })
    }

    /// 프레임 기록. 큐가 가득 차면 버립니다 (쓰기 경로 비차단).
    pub fn record(&self, entry: DumpEntry) {
        if self.tx.try_send(entry).is_err() {
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            if dropped % 100 == 1 {
                warn!("패킷 덤프 큐 포화: 누적 {}건 유실", dropped);
            }
        }
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// 기록 태스크를 종료합니다.
    pub async fn stop(&self) {
        if let Some(handle) = self.writer_handle.lock().await.take() {
            handle.abort();
        }
    }
}
