//! 방 설정 레코드와 필드별 검증
//!
//! 설정은 항상 검증을 거쳐서만 갱신됩니다. 인식되지 않는 값은
//! 어떤 필드도 변경하지 않고 거부됩니다.

use thiserror::Error;

/// 인식되는 게임 모드 id
pub const RECOGNIZED_GAME_MODES: &[u8] = &[0, 1, 2, 3, 4, 5];

/// 최대 맵 id
pub const MAP_ID_MAX: u8 = 40;

/// 킬 제한 허용 범위
pub const KILL_LIMIT_MIN: u8 = 10;
pub const KILL_LIMIT_MAX: u8 = 100;

/// 라운드 승리 제한 허용 범위
pub const WIN_LIMIT_MIN: u8 = 1;
pub const WIN_LIMIT_MAX: u8 = 20;

/// 방 인원 허용 범위
pub const MAX_PLAYERS_MIN: u8 = 2;
pub const MAX_PLAYERS_MAX: u8 = 16;

/// 방 이름 최대 바이트 수
pub const ROOM_NAME_MAX_BYTES: usize = 40;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    #[error("인식되지 않는 게임 모드: {0}")]
    UnknownGameMode(u8),

    #[error("인식되지 않는 맵: {0}")]
    UnknownMap(u8),

    #[error("킬 제한이 범위를 벗어났습니다: {0}")]
    KillLimitOutOfRange(u8),

    #[error("승리 제한이 범위를 벗어났습니다: {0}")]
    WinLimitOutOfRange(u8),

    #[error("방 인원이 범위를 벗어났습니다: {0}")]
    MaxPlayersOutOfRange(u8),

    #[error("방 이름이 비어있습니다")]
    NameEmpty,

    #[error("방 이름이 너무 깁니다: {0}바이트")]
    NameTooLong(usize),

    #[error("봇 수가 방 인원을 초과합니다: {total} (최대 {max})")]
    TooManyBots { total: u8, max: u8 },
}

/// 봇 설정 갱신 값
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BotsUpdate {
    pub enabled: bool,
    pub num_ct_bots: u8,
    pub num_tr_bots: u8,
}

/// 방 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSettings {
    pub name: String,
    /// 빈 문자열이면 공개 방
    pub password: String,
    pub game_mode: u8,
    pub map: u8,
    pub win_limit: u8,
    pub kill_limit: u8,
    pub max_players: u8,
    pub bots_enabled: bool,
    pub num_ct_bots: u8,
    pub num_tr_bots: u8,
}

/// 설정 부분 갱신 요청 (존재하는 필드만 반영)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomSettingsUpdate {
    pub name: Option<String>,
    pub password: Option<String>,
    pub game_mode: Option<u8>,
    pub map: Option<u8>,
    pub win_limit: Option<u8>,
    pub kill_limit: Option<u8>,
    pub max_players: Option<u8>,
    pub bots: Option<BotsUpdate>,
}

impl RoomSettings {
    /// 방 생성 요청으로부터 설정을 만듭니다. 검증 실패 시 방은 만들어지지
    /// 않습니다.
    pub fn create(
        name: String,
        password: String,
        game_mode: u8,
        map: u8,
        win_limit: u8,
        kill_limit: u8,
    ) -> Result<Self, SettingsError> {
        let settings = Self {
            name,
            password,
            game_mode,
            map,
            win_limit,
            kill_limit,
            max_players: MAX_PLAYERS_MAX,
            bots_enabled: false,
            num_ct_bots: 0,
            num_tr_bots: 0,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn has_password(&self) -> bool {
        !self.password.is_empty()
    }

    /// 전체 필드 검증
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.name.is_empty() {
            return Err(SettingsError::NameEmpty);
        }
        if self.name.len() > ROOM_NAME_MAX_BYTES {
            return Err(SettingsError::NameTooLong(self.name.len()));
        }
        if !RECOGNIZED_GAME_MODES.contains(&self.game_mode) {
            return Err(SettingsError::UnknownGameMode(self.game_mode));
        }
        if self.map > MAP_ID_MAX {
            return Err(SettingsError::UnknownMap(self.map));
        }
        if !(KILL_LIMIT_MIN..=KILL_LIMIT_MAX).contains(&self.kill_limit) {
            return Err(SettingsError::KillLimitOutOfRange(self.kill_limit));
        }
        if !(WIN_LIMIT_MIN..=WIN_LIMIT_MAX).contains(&self.win_limit) {
            return Err(SettingsError::WinLimitOutOfRange(self.win_limit));
        }
        if !(MAX_PLAYERS_MIN..=MAX_PLAYERS_MAX).contains(&self.max_players) {
            return Err(SettingsError::MaxPlayersOutOfRange(self.max_players));
        }
        if self.bots_enabled {
            let total = self.num_ct_bots.saturating_add(self.num_tr_bots);
            if total >= self.max_players {
                return Err(SettingsError::TooManyBots {
                    total,
                    max: self.max_players - 1,
                });
            }
        }
        Ok(())
    }

    /// 부분 갱신 적용. 후보 전체를 검증한 뒤에만 커밋하므로 실패 시
    /// 어떤 필드도 바뀌지 않습니다.
    pub fn apply(&mut self, update: &RoomSettingsUpdate) -> Result<(), SettingsError> {
        let mut candidate = self.clone();

        if let Some(name) = &update.name {
            candidate.name = name.clone();
        }
        if let Some(password) = &update.password {
            candidate.password = password.clone();
        }
        if let Some(game_mode) = update.game_mode {
            candidate.game_mode = game_mode;
        }
        if let Some(map) = update.map {
            candidate.map = map;
        }
        if let Some(win_limit) = update.win_limit {
            candidate.win_limit = win_limit;
        }
        if let Some(kill_limit) = update.kill_limit {
            candidate.kill_limit = kill_limit;
        }
        if let Some(max_players) = update.max_players {
            candidate.max_players = max_players;
        }
        if let Some(bots) = update.bots {
            candidate.bots_enabled = bots.enabled;
            candidate.num_ct_bots = bots.num_ct_bots;
            candidate.num_tr_bots = bots.num_tr_bots;
        }

        candidate.validate()?;
        *self = candidate;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_settings() -> RoomSettings {
        RoomSettings::create("r1".to_string(), String::new(), 1, 5, 3, 30).unwrap()
    }

    #[test]
    fn test_create_validates() {
        assert!(RoomSettings::create("r1".into(), String::new(), 1, 5, 3, 30).is_ok());
        assert_eq!(
            RoomSettings::create("r1".into(), String::new(), 99, 5, 3, 30),
            Err(SettingsError::UnknownGameMode(99))
        );
        assert_eq!(
            RoomSettings::create("r1".into(), String::new(), 1, 99, 3, 30),
            Err(SettingsError::UnknownMap(99))
        );
        assert_eq!(
            RoomSettings::create(String::new(), String::new(), 1, 5, 3, 30),
            Err(SettingsError::NameEmpty)
        );
    }

    #[test]
    fn test_apply_rejects_without_partial_commit() {
        let mut settings = base_settings();
        let before = settings.clone();

        let update = RoomSettingsUpdate {
            name: Some("새 이름".to_string()),
            kill_limit: Some(200), // 범위 밖
            ..Default::default()
        };

        assert!(settings.apply(&update).is_err());
        // 실패한 갱신은 어떤 필드도 바꾸지 않는다
        assert_eq!(settings, before);
    }

    #[test]
    fn test_apply_subset() {
        let mut settings = base_settings();

        let update = RoomSettingsUpdate {
            map: Some(7),
            win_limit: Some(10),
            ..Default::default()
        };

        settings.apply(&update).unwrap();
        assert_eq!(settings.map, 7);
        assert_eq!(settings.win_limit, 10);
        assert_eq!(settings.name, "r1");
    }

    #[test]
    fn test_bots_capacity() {
        let mut settings = base_settings();

        let update = RoomSettingsUpdate {
            bots: Some(BotsUpdate {
                enabled: true,
                num_ct_bots: 8,
                num_tr_bots: 8,
            }),
            ..Default::default()
        };

        // 봇 16명 = 인원 한계, 호스트 자리가 없다
        assert!(matches!(
            settings.apply(&update),
            Err(SettingsError::TooManyBots { .. })
        ));

        let update = RoomSettingsUpdate {
            bots: Some(BotsUpdate {
                enabled: true,
                num_ct_bots: 7,
                num_tr_bots: 8,
            }),
            ..Default::default()
        };
        assert!(settings.apply(&update).is_ok());
        assert!(settings.bots_enabled);
    }
}
