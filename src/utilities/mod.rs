pub mod enums;
pub mod generator;
pub mod helpers;
pub mod volume;
