pub mod gcm;
pub mod transport;
