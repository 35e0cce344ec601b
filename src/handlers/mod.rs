pub mod external;
pub mod product;
pub mod stock;
pub mod stock_movement;
