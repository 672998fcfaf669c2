pub mod admin;
pub mod analytics;
pub mod forecast;
pub mod products;
