pub mod federation;
pub mod otp;
pub mod session;
pub mod user;
