pub mod gateway;
pub mod service;
pub mod sweeper;

pub use gateway::{notification_signature, RedirectGateway, SettlementNotice};
pub use service::{BookingService, PassengerSpec};
pub use sweeper::Sweeper;
