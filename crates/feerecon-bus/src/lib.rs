mod http;
mod mock;

pub use http::{HttpEventBus, HttpEventBusConfig};
pub use mock::MockEventBus;
