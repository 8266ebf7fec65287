pub mod federation_state;
pub mod otp;
pub mod user;

pub use federation_state::InMemoryStateStore;
pub use otp::InMemoryOtpStore;
pub use user::InMemoryUserRepository;
