pub mod identity_provider;
pub mod messaging;
pub mod repositories;
