//! Capability traits defined in `meshauth-core` and injected into the auth
//! components.

pub mod clock;
pub mod notifier;

pub use clock::{Clock, ManualClock, SystemClock};
pub use notifier::{LogNotifier, Notification, Notifier};
