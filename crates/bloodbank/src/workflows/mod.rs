pub mod bank;
pub mod roster;
