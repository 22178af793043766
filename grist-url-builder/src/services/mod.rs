pub mod filter_url;
pub mod grist_client;
pub mod metrics;

pub use grist_client::GristClient;
