pub mod form;
pub mod handler;
pub mod message;
pub mod metrics;
pub mod store;
pub mod subscription_id;
pub mod writer;
