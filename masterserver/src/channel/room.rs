//! 방 상태 기계
//!
//! 방은 생성/입장/퇴장/준비/팀/카운트다운/게임 진행/결과/폐쇄를 거치는
//! 상태 기계입니다. 이 타입은 동기 코어로, 잠금과 브로드캐스트는 바깥의
//! 채널/핸들러 계층이 담당합니다.
//!
//! 불변식:
//! - 호스트는 항상 점유자 중 하나이거나, 방이 Closed 상태다.
//! - Countdown/Ingame 상태에서는 설정이 변경되지 않는다.
//! - 슬롯 순서는 입장 순서를 유지한다 (호스트 승계 순서).

use thiserror::Error;

use super::room_settings::{RoomSettings, RoomSettingsUpdate, SettingsError};

/// 카운트다운 시작 값 (초)
pub const ROOM_COUNTDOWN_SECONDS: u8 = 7;

/// 방 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RoomStatus {
    Waiting = 0,
    Countdown = 1,
    Ingame = 2,
    Result = 3,
    Closed = 4,
}

/// 플레이어 팀
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Team {
    Terror = 1,
    Counter = 2,
}

impl Team {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::Terror),
            2 => Some(Self::Counter),
            _ => None,
        }
    }
}

/// 슬롯 준비 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SlotStatus {
    NotReady = 0,
    Ready = 1,
    IngameReady = 2,
}

/// 점유된 플레이어 슬롯 (입장 순서 보존)
#[derive(Debug, Clone)]
pub struct RoomSlot {
    pub user_id: u32,
    pub team: Team,
    pub status: SlotStatus,
}

/// 방 연산 에러
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoomError {
    #[error("방이 가득 찼습니다")]
    Full,

    #[error("방 비밀번호가 일치하지 않습니다")]
    BadPassword,

    #[error("이미 닫힌 방입니다")]
    Closed,

    #[error("사용자 {0}는 이 방의 점유자가 아닙니다")]
    NotOccupant(u32),

    #[error("사용자 {0}는 이 방의 호스트가 아닙니다")]
    NotHost(u32),

    #[error("사용자 {0}는 이미 이 방에 있습니다")]
    AlreadyOccupant(u32),

    #[error("대기 상태의 방에서만 가능한 요청입니다")]
    NotWaiting,

    #[error("게임이 시작된 방의 설정은 변경할 수 없습니다")]
    SettingsLocked,

    #[error("준비 상태의 플레이어는 팀을 변경할 수 없습니다")]
    ReadyLocked,

    #[error("카운트다운 중에는 준비 상태로 방을 나갈 수 없습니다")]
    LeaveLockedDuringCountdown,

    #[error("양 팀에 플레이어가 없어 게임을 시작할 수 없습니다")]
    CannotStart,

    #[error("카운트다운 값이 역행하지 않습니다: 현재 {current}, 수신 {got}")]
    BadCountdown { current: u8, got: u8 },

    #[error("현재 방 상태({actual:?})에서 허용되지 않는 전이입니다")]
    BadState { actual: RoomStatus },

    #[error("방 설정 오류: {0}")]
    BadSettings(#[from] SettingsError),
}

/// 퇴장 처리 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// 일반 퇴장
    Left,
    /// 호스트가 나가 승계가 일어남 (새 호스트 user id)
    HostMigrated(u32),
    /// 마지막 점유자가 나가 방이 닫힘
    Closed,
}

/// 게임 시작 요청의 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStartKind {
    /// 호스트가 카운트다운을 끝내고 시작
    HostStart,
    /// 진행 중인 게임에 비호스트가 난입
    JoinInProgress,
}

/// 방
#[derive(Debug)]
pub struct Room {
    id: u16,
    host_user_id: u32,
    slots: Vec<RoomSlot>,
    settings: RoomSettings,
    status: RoomStatus,
    countdown: u8,
}

impl Room {
    /// 방 생성. 요청자가 호스트이자 0번 점유자가 됩니다.
    pub fn new(id: u16, host_user_id: u32, settings: RoomSettings) -> Self {
        Self {
            id,
            host_user_id,
            slots: vec![RoomSlot {
                user_id: host_user_id,
                team: Team::Terror,
                status: SlotStatus::NotReady,
            }],
            settings,
            status: RoomStatus::Waiting,
            countdown: ROOM_COUNTDOWN_SECONDS,
        }
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn host_user_id(&self) -> u32 {
        self.host_user_id
    }

    pub fn status(&self) -> RoomStatus {
        self.status
    }

    pub fn countdown(&self) -> u8 {
        self.countdown
    }

    pub fn settings(&self) -> &RoomSettings {
        &self.settings
    }

    pub fn slots(&self) -> &[RoomSlot] {
        &self.slots
    }

    pub fn occupant_count(&self) -> usize {
        self.slots.len()
    }

    pub fn free_slots(&self) -> usize {
        (self.settings.max_players as usize).saturating_sub(self.slots.len())
    }

    pub fn is_occupant(&self, user_id: u32) -> bool {
        self.slots.iter().any(|s| s.user_id == user_id)
    }

    pub fn is_host(&self, user_id: u32) -> bool {
        self.host_user_id == user_id && self.status != RoomStatus::Closed
    }

    pub fn occupant_ids(&self) -> Vec<u32> {
        self.slots.iter().map(|s| s.user_id).collect()
    }

    fn slot_of(&self, user_id: u32) -> Option<&RoomSlot> {
        self.slots.iter().find(|s| s.user_id == user_id)
    }

    fn slot_of_mut(&mut self, user_id: u32) -> Option<&mut RoomSlot> {
        self.slots.iter_mut().find(|s| s.user_id == user_id)
    }

    /// 입장. 비밀번호는 바이트 단위로 정확히 비교합니다.
    /// 배정 팀을 반환합니다 (인원이 적은 쪽, 동수면 테러).
    pub fn join(&mut self, user_id: u32, password: &str) -> Result<Team, RoomError> {
        if self.status == RoomStatus::Closed {
            return Err(RoomError::Closed);
        }
        if self.is_occupant(user_id) {
            return Err(RoomError::AlreadyOccupant(user_id));
        }
        if self.free_slots() == 0 {
            return Err(RoomError::Full);
        }
        if self.settings.has_password() && self.settings.password.as_bytes() != password.as_bytes()
        {
            return Err(RoomError::BadPassword);
        }

        let terror = self.slots.iter().filter(|s| s.team == Team::Terror).count();
        let counter = self.slots.iter().filter(|s| s.team == Team::Counter).count();
        let team = if counter < terror {
            Team::Counter
        } else {
            Team::Terror
        };

        self.slots.push(RoomSlot {
            user_id,
            team,
            status: SlotStatus::NotReady,
        });
        Ok(team)
    }

    /// 퇴장. 준비 상태로 카운트다운 중이면 거부됩니다.
    pub fn leave(&mut self, user_id: u32) -> Result<LeaveOutcome, RoomError> {
        let slot = self
            .slot_of(user_id)
            .ok_or(RoomError::NotOccupant(user_id))?;

        if slot.status == SlotStatus::Ready && self.status == RoomStatus::Countdown {
            return Err(RoomError::LeaveLockedDuringCountdown);
        }

        Ok(self.remove_occupant(user_id))
    }

    /// 강제 퇴장: 연결 종료나 유령 방 정리처럼 잠금을 무시해야 하는 경로.
    pub fn force_leave(&mut self, user_id: u32) -> Result<LeaveOutcome, RoomError> {
        if !self.is_occupant(user_id) {
            return Err(RoomError::NotOccupant(user_id));
        }
        Ok(self.remove_occupant(user_id))
    }

    fn remove_occupant(&mut self, user_id: u32) -> LeaveOutcome {
        self.slots.retain(|s| s.user_id != user_id);

        if self.slots.is_empty() {
            self.status = RoomStatus::Closed;
            return LeaveOutcome::Closed;
        }

        if self.host_user_id == user_id {
            // 입장 순서상 가장 앞의 점유자가 새 호스트
            let new_host = self.slots[0].user_id;
            self.host_user_id = new_host;
            return LeaveOutcome::HostMigrated(new_host);
        }

        LeaveOutcome::Left
    }

    /// 준비 상태 토글. 대기 상태의 방에서만 가능합니다.
    pub fn toggle_ready(&mut self, user_id: u32) -> Result<SlotStatus, RoomError> {
        if self.status != RoomStatus::Waiting {
            return Err(RoomError::NotWaiting);
        }

        let slot = self
            .slot_of_mut(user_id)
            .ok_or(RoomError::NotOccupant(user_id))?;

        slot.status = match slot.status {
            SlotStatus::NotReady => SlotStatus::Ready,
            SlotStatus::Ready => SlotStatus::NotReady,
            SlotStatus::IngameReady => SlotStatus::IngameReady,
        };
        Ok(slot.status)
    }

    /// 설정 갱신. 호스트 전용이고 Countdown/Ingame에서는 잠깁니다.
    pub fn update_settings(
        &mut self,
        requester: u32,
        update: &RoomSettingsUpdate,
    ) -> Result<(), RoomError> {
        if !self.is_host(requester) {
            return Err(RoomError::NotHost(requester));
        }
        if matches!(self.status, RoomStatus::Countdown | RoomStatus::Ingame) {
            return Err(RoomError::SettingsLocked);
        }

        self.settings.apply(update)?;
        Ok(())
    }

    /// 팀 변경. 준비된 슬롯은 바꿀 수 없고, 봇 방에서는 호스트만 바꿀 수
    /// 있습니다.
    pub fn set_user_team(
        &mut self,
        requester: u32,
        target: u32,
        team: Team,
    ) -> Result<(), RoomError> {
        if !self.is_occupant(requester) {
            return Err(RoomError::NotOccupant(requester));
        }
        if self.settings.bots_enabled && !self.is_host(requester) {
            return Err(RoomError::NotHost(requester));
        }

        let slot = self
            .slot_of_mut(target)
            .ok_or(RoomError::NotOccupant(target))?;

        if slot.status != SlotStatus::NotReady {
            return Err(RoomError::ReadyLocked);
        }

        slot.team = team;
        Ok(())
    }

    /// 양 팀에 플레이어가 있거나 봇이 켜져 있으면 시작 가능합니다.
    pub fn can_start_game(&self) -> bool {
        if self.settings.bots_enabled {
            return true;
        }
        let terror = self.slots.iter().any(|s| s.team == Team::Terror);
        let counter = self.slots.iter().any(|s| s.team == Team::Counter);
        terror && counter
    }

    /// 카운트다운 진행 틱. 호스트 전용. 수신 값은 현재 값에서 역행하면 안
    /// 됩니다 (클라이언트가 초 단위로 감소시키며 보냄).
    pub fn progress_countdown(&mut self, requester: u32, count: u8) -> Result<u8, RoomError> {
        if !self.is_host(requester) {
            return Err(RoomError::NotHost(requester));
        }
        if !matches!(self.status, RoomStatus::Waiting | RoomStatus::Countdown) {
            return Err(RoomError::BadState {
                actual: self.status,
            });
        }
        if !self.can_start_game() {
            return Err(RoomError::CannotStart);
        }
        if count > self.countdown {
            return Err(RoomError::BadCountdown {
                current: self.countdown,
                got: count,
            });
        }

        self.status = RoomStatus::Countdown;
        self.countdown = count;
        Ok(count)
    }

    /// 카운트다운 중단. 대기 상태로 돌아갑니다.
    pub fn stop_countdown(&mut self, requester: u32) -> Result<(), RoomError> {
        if !self.is_host(requester) {
            return Err(RoomError::NotHost(requester));
        }
        if self.status != RoomStatus::Countdown {
            return Err(RoomError::BadState {
                actual: self.status,
            });
        }

        self.status = RoomStatus::Waiting;
        self.countdown = ROOM_COUNTDOWN_SECONDS;
        Ok(())
    }

    /// 게임 시작. 호스트는 Countdown→Ingame 전이, 비호스트는 진행 중
    /// 게임에 난입합니다.
    pub fn start_game(&mut self, requester: u32) -> Result<GameStartKind, RoomError> {
        if self.is_host(requester) {
            if self.status != RoomStatus::Countdown {
                return Err(RoomError::BadState {
                    actual: self.status,
                });
            }

            self.status = RoomStatus::Ingame;
            self.countdown = ROOM_COUNTDOWN_SECONDS;
            for slot in &mut self.slots {
                if slot.status == SlotStatus::Ready {
                    slot.status = SlotStatus::IngameReady;
                }
            }
            return Ok(GameStartKind::HostStart);
        }

        if !self.is_occupant(requester) {
            return Err(RoomError::NotOccupant(requester));
        }
        if self.status != RoomStatus::Ingame {
            return Err(RoomError::BadState {
                actual: self.status,
            });
        }

        if let Some(slot) = self.slot_of_mut(requester) {
            slot.status = SlotStatus::IngameReady;
        }
        Ok(GameStartKind::JoinInProgress)
    }

    /// 게임 종료. 호스트 전용, Ingame→Result 전이.
    pub fn end_game(&mut self, requester: u32) -> Result<(), RoomError> {
        if !self.is_host(requester) {
            return Err(RoomError::NotHost(requester));
        }
        if self.status != RoomStatus::Ingame {
            return Err(RoomError::BadState {
                actual: self.status,
            });
        }

        self.status = RoomStatus::Result;
        Ok(())
    }

    /// 결과 창 닫기. 요청자에게만 영향이 있으며, 모든 점유자가 닫으면
    /// 방이 대기 상태로 돌아갑니다.
    pub fn close_result_window(&mut self, user_id: u32) -> Result<(), RoomError> {
        if !self.is_occupant(user_id) {
            return Err(RoomError::NotOccupant(user_id));
        }

        if let Some(slot) = self.slot_of_mut(user_id) {
            slot.status = SlotStatus::NotReady;
        }

        if self.status == RoomStatus::Result
            && self.slots.iter().all(|s| s.status == SlotStatus::NotReady)
        {
            self.status = RoomStatus::Waiting;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::room_settings::RoomSettingsUpdate;

    fn settings(password: &str) -> RoomSettings {
        RoomSettings::create("r1".to_string(), password.to_string(), 1, 5, 3, 30).unwrap()
    }

    fn waiting_room() -> Room {
        Room::new(1, 100, settings(""))
    }

    #[test]
    fn test_new_room_host_is_occupant_zero() {
        let room = waiting_room();

        assert_eq!(room.id(), 1);
        assert_eq!(room.host_user_id(), 100);
        assert_eq!(room.status(), RoomStatus::Waiting);
        assert_eq!(room.occupant_count(), 1);
        assert_eq!(room.slots()[0].user_id, 100);
    }

    #[test]
    fn test_join_balances_teams() {
        let mut room = waiting_room();

        assert_eq!(room.join(101, "").unwrap(), Team::Counter);
        assert_eq!(room.join(102, "").unwrap(), Team::Terror);
        assert_eq!(room.join(103, "").unwrap(), Team::Counter);
    }

    #[test]
    fn test_join_wrong_password() {
        let mut room = Room::new(1, 100, settings("secret"));

        assert_eq!(room.join(101, "x"), Err(RoomError::BadPassword));
        assert!(!room.is_occupant(101));
        assert_eq!(room.join(101, "secret").unwrap(), Team::Counter);
    }

    #[test]
    fn test_join_full_room() {
        let mut room = waiting_room();
        for i in 0..15 {
            room.join(200 + i, "").unwrap();
        }

        assert_eq!(room.free_slots(), 0);
        assert_eq!(room.join(999, ""), Err(RoomError::Full));
    }

    #[test]
    fn test_join_leave_restores_free_slots() {
        let mut room = waiting_room();
        let before = room.free_slots();

        room.join(101, "").unwrap();
        assert_eq!(room.free_slots(), before - 1);

        assert_eq!(room.leave(101).unwrap(), LeaveOutcome::Left);
        assert_eq!(room.free_slots(), before);
    }

    #[test]
    fn test_host_leave_migrates_to_earliest_joined() {
        let mut room = waiting_room(); // A=100 (호스트)
        room.join(101, "").unwrap(); // B
        room.join(102, "").unwrap(); // C

        assert_eq!(room.leave(100).unwrap(), LeaveOutcome::HostMigrated(101));
        assert_eq!(room.host_user_id(), 101);
        assert_eq!(room.occupant_ids(), vec![101, 102]);
    }

    #[test]
    fn test_last_leave_closes_room() {
        let mut room = waiting_room();

        assert_eq!(room.leave(100).unwrap(), LeaveOutcome::Closed);
        assert_eq!(room.status(), RoomStatus::Closed);
        assert_eq!(room.join(101, ""), Err(RoomError::Closed));
    }

    #[test]
    fn test_host_invariant() {
        let mut room = waiting_room();
        room.join(101, "").unwrap();
        room.join(102, "").unwrap();

        // 어떤 퇴장 순서에서도: 호스트는 점유자이거나 방이 Closed
        for leaver in [100, 101, 102] {
            room.force_leave(leaver).unwrap();
            assert!(room.is_occupant(room.host_user_id()) || room.status() == RoomStatus::Closed);
        }
    }

    #[test]
    fn test_toggle_ready_waiting_only() {
        let mut room = waiting_room();
        room.join(101, "").unwrap();

        assert_eq!(room.toggle_ready(101).unwrap(), SlotStatus::Ready);
        assert_eq!(room.toggle_ready(101).unwrap(), SlotStatus::NotReady);

        room.toggle_ready(101).unwrap();
        room.progress_countdown(100, 5).unwrap();
        assert_eq!(room.toggle_ready(101), Err(RoomError::NotWaiting));
    }

    #[test]
    fn test_ready_player_cannot_leave_during_countdown() {
        let mut room = waiting_room();
        room.join(101, "").unwrap();
        room.toggle_ready(101).unwrap();
        room.progress_countdown(100, 5).unwrap();

        assert_eq!(room.leave(101), Err(RoomError::LeaveLockedDuringCountdown));
        // 연결 종료 경로는 잠금을 무시한다
        assert_eq!(room.force_leave(101).unwrap(), LeaveOutcome::Left);
    }

    #[test]
    fn test_countdown_to_ingame() {
        let mut room = waiting_room();
        room.join(101, "").unwrap();

        // 시나리오: count=5 → count=0 → GameStart
        assert_eq!(room.progress_countdown(100, 5).unwrap(), 5);
        assert_eq!(room.status(), RoomStatus::Countdown);
        assert_eq!(room.progress_countdown(100, 0).unwrap(), 0);

        assert_eq!(room.start_game(100).unwrap(), GameStartKind::HostStart);
        assert_eq!(room.status(), RoomStatus::Ingame);
    }

    #[test]
    fn test_countdown_value_must_descend() {
        let mut room = waiting_room();
        room.join(101, "").unwrap();

        room.progress_countdown(100, 5).unwrap();
        assert_eq!(
            room.progress_countdown(100, 6),
            Err(RoomError::BadCountdown { current: 5, got: 6 })
        );
    }

    #[test]
    fn test_countdown_requires_both_teams_or_bots() {
        let mut room = waiting_room(); // 호스트 혼자 (테러)

        assert_eq!(room.progress_countdown(100, 7), Err(RoomError::CannotStart));

        let update = RoomSettingsUpdate {
            bots: Some(crate::channel::room_settings::BotsUpdate {
                enabled: true,
                num_ct_bots: 4,
                num_tr_bots: 4,
            }),
            ..Default::default()
        };
        room.update_settings(100, &update).unwrap();
        assert!(room.progress_countdown(100, 7).is_ok());
    }

    #[test]
    fn test_settings_frozen_during_countdown_and_ingame() {
        let mut room = waiting_room();
        room.join(101, "").unwrap();
        room.progress_countdown(100, 5).unwrap();

        let before = room.settings().clone();
        let update = RoomSettingsUpdate {
            map: Some(9),
            ..Default::default()
        };

        assert_eq!(
            room.update_settings(100, &update),
            Err(RoomError::SettingsLocked)
        );
        assert_eq!(room.settings(), &before);

        room.start_game(100).unwrap();
        assert_eq!(
            room.update_settings(100, &update),
            Err(RoomError::SettingsLocked)
        );
        assert_eq!(room.settings(), &before);
    }

    #[test]
    fn test_settings_update_host_only() {
        let mut room = waiting_room();
        room.join(101, "").unwrap();

        let update = RoomSettingsUpdate {
            map: Some(9),
            ..Default::default()
        };
        assert_eq!(
            room.update_settings(101, &update),
            Err(RoomError::NotHost(101))
        );
        assert!(room.update_settings(100, &update).is_ok());
    }

    #[test]
    fn test_team_change_rejected_while_ready() {
        let mut room = waiting_room();
        room.join(101, "").unwrap();
        room.toggle_ready(101).unwrap();

        assert_eq!(
            room.set_user_team(101, 101, Team::Terror),
            Err(RoomError::ReadyLocked)
        );

        room.toggle_ready(101).unwrap();
        assert!(room.set_user_team(101, 101, Team::Terror).is_ok());
    }

    #[test]
    fn test_team_change_host_only_with_bots() {
        let mut room = waiting_room();
        room.join(101, "").unwrap();

        let update = RoomSettingsUpdate {
            bots: Some(crate::channel::room_settings::BotsUpdate {
                enabled: true,
                num_ct_bots: 2,
                num_tr_bots: 2,
            }),
            ..Default::default()
        };
        room.update_settings(100, &update).unwrap();

        assert_eq!(
            room.set_user_team(101, 101, Team::Terror),
            Err(RoomError::NotHost(101))
        );
        assert!(room.set_user_team(100, 101, Team::Terror).is_ok());
    }

    #[test]
    fn test_join_in_progress() {
        let mut room = waiting_room();
        room.join(101, "").unwrap();
        room.progress_countdown(100, 0).unwrap();
        room.start_game(100).unwrap();

        room.join(102, "").unwrap();
        assert_eq!(
            room.start_game(102).unwrap(),
            GameStartKind::JoinInProgress
        );
        assert_eq!(room.status(), RoomStatus::Ingame);
    }

    #[test]
    fn test_end_game_and_result_window() {
        let mut room = waiting_room();
        room.join(101, "").unwrap();
        room.progress_countdown(100, 0).unwrap();
        room.start_game(100).unwrap();

        // 비호스트는 게임을 종료할 수 없다
        assert_eq!(room.end_game(101), Err(RoomError::NotHost(101)));

        room.end_game(100).unwrap();
        assert_eq!(room.status(), RoomStatus::Result);

        room.close_result_window(100).unwrap();
        room.close_result_window(101).unwrap();
        assert_eq!(room.status(), RoomStatus::Waiting);
    }
}
