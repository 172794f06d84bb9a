pub mod adapters;
pub mod config;
pub mod docx;
pub mod error;
pub mod intake;
pub mod web;
