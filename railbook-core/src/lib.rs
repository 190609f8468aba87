pub mod error;
pub mod model;
pub mod payment;
pub mod repository;

pub use error::{BookingError, GatewayError, HoldError};
pub use model::{Booking, BookingStatus, Passenger, Schedule, Seat, SeatStatus};
pub use payment::{PaymentGateway, PaymentOutcome, PaymentSession};
pub use repository::ReservationStore;
