pub mod driver;
pub mod event;
pub mod offer;
pub mod ride;
