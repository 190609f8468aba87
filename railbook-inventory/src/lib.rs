pub mod layout;
pub mod seats;

pub use layout::{generate_seats, CarriageLayout};
pub use seats::SeatInventory;
