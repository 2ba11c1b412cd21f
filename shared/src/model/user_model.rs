use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "userId")]
    pub id: u32,
    pub user_name: String,
    pub player_name: String,
    #[serde(default)]
    pub level: u16,
    #[serde(default)]
    pub cur_exp: u64,
    #[serde(default)]
    pub max_exp: u64,
    #[serde(default)]
    pub points: u64,
    #[serde(default)]
    pub cash: u32,
    #[serde(default)]
    pub wins: u32,
    #[serde(default)]
    pub losses: u32,
    #[serde(default)]
    pub kills: u32,
    #[serde(default)]
    pub deaths: u32,
    #[serde(default)]
    pub assists: u32,
    #[serde(default)]
    pub vip_level: u8,
}
