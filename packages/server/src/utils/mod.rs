pub mod jwt;
pub mod media;
