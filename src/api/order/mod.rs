pub mod dto;
pub mod handlers;
pub mod models;
pub mod service;

pub use handlers::order_config;
pub use service::OrderService;
