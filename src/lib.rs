pub mod config;
pub mod departures;
pub mod server;
pub mod skill;
pub mod slots;
pub mod stops;
