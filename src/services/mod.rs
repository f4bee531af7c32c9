// src/services/mod.rs

pub mod availability;
pub mod booking;
pub mod calendar;
pub mod events;
pub mod matching;
pub mod popularity;
pub mod scoring;
