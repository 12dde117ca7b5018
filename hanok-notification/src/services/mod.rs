pub mod store;
pub mod notification_service;
