pub mod geocoding;
pub mod pacer;
pub mod places;
