pub mod drivers;
pub mod offers;
pub mod pricing;
pub mod rides;
