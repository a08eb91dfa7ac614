//! Read model views for the CQRS query side.

pub mod postgres;
pub mod sensors;
pub mod tanks;

pub use postgres::PostgresTankView;
pub use sensors::{SensorRow, SensorView};
pub use tanks::{TankQuery, TankRow, TankView};
