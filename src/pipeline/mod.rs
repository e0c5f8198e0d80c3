pub mod cost;
pub mod effects;
