pub mod assignment;
pub mod audit;
pub mod classifier;
pub mod config;
pub mod dictionary;
pub mod gateway;
pub mod output;
pub mod resolver;
pub mod roster;
pub mod server;
pub mod store;
