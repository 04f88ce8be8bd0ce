// simulation_engine/mod.rs
pub mod collision;
pub mod directions;
pub mod generators;
pub mod intersections;
pub mod run_signal;
pub mod simulation;
pub mod vehicle_manager;
pub mod vehicles;
