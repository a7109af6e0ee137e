// src/models/mod.rs

pub mod exam_attempt;
pub mod exam_set;
pub mod question;
pub mod stats;
pub mod user;
