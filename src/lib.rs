pub mod communication;
pub mod config;
pub mod control_system;
pub mod error;
pub mod global_variables;
pub mod shared_data;
pub mod simulation_engine;
