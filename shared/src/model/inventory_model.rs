use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub item_id: u32,
    pub amount: u16,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inventory {
    #[serde(default)]
    pub items: Vec<InventoryItem>,
}

/// 캐릭터에 장착된 치장 아이템 슬롯들
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cosmetics {
    #[serde(default)]
    pub ct_item: u32,
    #[serde(default)]
    pub ter_item: u32,
    #[serde(default)]
    pub head_item: u32,
    #[serde(default)]
    pub glove_item: u32,
    #[serde(default)]
    pub back_item: u32,
    #[serde(default)]
    pub steps_item: u32,
    #[serde(default)]
    pub card_item: u32,
    #[serde(default)]
    pub spray_item: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Loadout {
    pub loadout_num: u8,
    #[serde(default)]
    pub primary_weapon: u32,
    #[serde(default)]
    pub secondary_weapon: u32,
    #[serde(default)]
    pub melee: u32,
    #[serde(default)]
    pub hegrenade: u32,
    #[serde(default)]
    pub flash: u32,
    #[serde(default)]
    pub smoke: u32,
}

/// 구매 메뉴: 카테고리별 아이템 id 목록
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyMenu {
    #[serde(default)]
    pub pistols: Vec<u32>,
    #[serde(default)]
    pub shotguns: Vec<u32>,
    #[serde(default)]
    pub smgs: Vec<u32>,
    #[serde(default)]
    pub rifles: Vec<u32>,
    #[serde(default)]
    pub snipers: Vec<u32>,
    #[serde(default)]
    pub machineguns: Vec<u32>,
    #[serde(default)]
    pub melees: Vec<u32>,
    #[serde(default)]
    pub equipment: Vec<u32>,
}
