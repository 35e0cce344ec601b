pub mod api_key;
pub mod audit;
pub mod product;
pub mod stock_item;
pub mod stock_movement;

pub use api_key::ApiKey;
pub use audit::{ApiRequestLog, AuditEntry};
pub use product::{Product, Warehouse};
pub use stock_item::{StockItem, StockKey};
pub use stock_movement::{MovementKind, StockMovement};
