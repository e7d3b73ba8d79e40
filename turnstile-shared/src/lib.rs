pub mod models;

pub use models::catalog::{Event, Seat};
pub use models::events::InventoryChange;
pub use models::hold::{Hold, HoldStatus};
pub use models::inventory::{SeatInventory, SeatStatus};
pub use models::order::{Order, OrderStatus, Ticket};
pub use models::ParseStatusError;
