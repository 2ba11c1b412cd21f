pub mod inventory_model;
pub mod user_model;

pub use inventory_model::{BuyMenu, Cosmetics, Inventory, InventoryItem, Loadout};
pub use user_model::User;
