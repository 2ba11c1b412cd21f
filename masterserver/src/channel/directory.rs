//! 채널 서버 디렉토리
//!
//! 시작 시 고정 구성되는 채널 서버 → 채널 트리입니다. 두 인덱스 범위는
//! 기동 이후 변하지 않습니다.

use std::sync::Arc;

use super::channel::Channel;
use crate::protocol::packets_out;
use crate::service::connection::Connection;
use crate::tool::error::MasterError;

/// 채널 서버당 채널 수
const CHANNELS_PER_SERVER: u8 = 5;

/// 채널 서버
pub struct ChannelServer {
    pub index: u8,
    pub name: String,
    pub channels: Vec<Arc<Channel>>,
}

/// 채널 디렉토리
pub struct ChannelDirectory {
    servers: Vec<ChannelServer>,
}

impl Default for ChannelDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelDirectory {
    /// 고정 구성: 채널 서버 1개, 채널 5개
    pub fn new() -> Self {
        let channels = (0..CHANNELS_PER_SERVER)
            .map(|i| Arc::new(Channel::new(0, i, format!("일반 채널 {}", i + 1))))
            .collect();

        Self {
            servers: vec![ChannelServer {
                index: 0,
                name: "마스터 서버 1".to_string(),
                channels,
            }],
        }
    }

    pub fn servers(&self) -> &[ChannelServer] {
        &self.servers
    }

    pub fn server_by_index(&self, index: u8) -> Option<&ChannelServer> {
        self.servers.iter().find(|s| s.index == index)
    }

    pub fn channel_by_index(&self, server_index: u8, channel_index: u8) -> Option<Arc<Channel>> {
        self.server_by_index(server_index)?
            .channels
            .iter()
            .find(|c| c.index() == channel_index)
            .cloned()
    }

    /// 채널 서버/채널 트리 스냅샷을 전송합니다.
    pub async fn send_channel_list_to(&self, conn: &Connection) -> Result<(), MasterError> {
        let packet = packets_out::channel_list(&self.servers)?;
        conn.send(&packet).await
    }

    /// 채널의 방 목록 스냅샷을 전송합니다.
    pub async fn send_room_list_to(
        &self,
        conn: &Connection,
        channel: &Channel,
    ) -> Result<(), MasterError> {
        let entries = channel.room_list_entries().await;
        let packet = packets_out::room_list_full(&entries)?;
        conn.send(&packet).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_bounds() {
        let directory = ChannelDirectory::new();

        assert!(directory.server_by_index(0).is_some());
        assert!(directory.server_by_index(1).is_none());

        assert!(directory.channel_by_index(0, 0).is_some());
        assert!(directory.channel_by_index(0, 4).is_some());
        assert!(directory.channel_by_index(0, 5).is_none());
        assert!(directory.channel_by_index(9, 0).is_none());
    }

    #[test]
    fn test_channel_identity() {
        let directory = ChannelDirectory::new();
        let channel = directory.channel_by_index(0, 2).unwrap();

        assert_eq!(channel.server_index(), 0);
        assert_eq!(channel.index(), 2);
        assert_eq!(channel.name(), "일반 채널 3");
    }
}
