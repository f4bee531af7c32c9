// src/handlers/mod.rs

pub mod auth;
pub mod matching;
pub mod profile;
