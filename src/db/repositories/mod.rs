pub mod mechanic;
pub mod otp;
pub mod rate_limit;
pub mod refresh_token;
pub mod user;
