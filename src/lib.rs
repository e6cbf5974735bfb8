pub mod config;
pub mod db;
pub mod display;
pub mod errors;
pub mod graph;
pub mod resolution;
pub mod types;
pub mod vocalization;
pub mod word_graph;
