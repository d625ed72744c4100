pub mod app;
pub mod models;
pub mod rate_limit;
pub mod routing;
pub mod sheets;
pub mod validation;
pub mod webhook;
