pub mod device;
pub mod dispatch;
pub mod gcm;
pub mod health;
pub mod payload;
pub mod response;
pub mod retry;
pub mod validation;
