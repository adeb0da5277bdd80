pub mod commands;
pub mod config;
pub mod gradedb;
pub mod models;
