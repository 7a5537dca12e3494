pub mod bus;
pub mod config;
pub mod error;
pub mod events;
pub mod ingress;
pub mod logging;
pub mod notifier;
pub mod signature;
pub mod status;

pub use bus::{Event, EventBus, EventHandler, EventSubscriber};
pub use config::{ProductProfile, ServiceConfig};
pub use error::{NotifierError, Result};
pub use notifier::StatusNotifier;
pub use status::{GithubStatusClient, StatusClient, StatusState, StatusUpdate};
