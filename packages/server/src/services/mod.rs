pub mod admission;
pub mod classification;
pub mod lifecycle;
pub mod notify;
