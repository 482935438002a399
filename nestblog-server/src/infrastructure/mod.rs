pub mod database;
pub mod jwt;
pub mod logging;
