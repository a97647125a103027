pub mod prelude;

pub mod mechanics;
pub mod otp_codes;
pub mod rate_limits;
pub mod refresh_tokens;
pub mod users;
