// control_system/mod.rs
pub mod demand_counters;
pub mod light_board;
pub mod traffic_light_controller;
