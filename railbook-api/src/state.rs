use std::sync::Arc;

use railbook_booking::BookingService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<BookingService>,
    /// Shared secret the payment provider signs notifications with.
    pub server_key: String,
}
