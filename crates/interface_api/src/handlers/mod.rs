//! Request handlers

pub mod adjudication;
pub mod cases;
pub mod health;
