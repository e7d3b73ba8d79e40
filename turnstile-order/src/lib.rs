pub mod fulfillment;
pub mod projections;
pub mod settlement;

pub use fulfillment::{FulfillmentError, TicketIssuer};
pub use projections::{AdminSnapshot, InventoryMetrics, QueryFacade, SeatMap, SeatMapFilters};
pub use settlement::{Settlement, SettlementEngine};
