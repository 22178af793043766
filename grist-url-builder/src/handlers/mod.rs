pub mod app;
pub mod credentials;
pub mod listings;
pub mod metrics;
pub mod urls;
