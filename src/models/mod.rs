// src/models/mod.rs

pub mod matching;
pub mod session;
pub mod user;
