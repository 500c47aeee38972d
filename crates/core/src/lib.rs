pub mod capture;
pub mod detection;
pub mod extraction;
pub mod shared;
