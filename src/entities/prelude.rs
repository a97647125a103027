pub use super::mechanics::Entity as Mechanics;
pub use super::otp_codes::Entity as OtpCodes;
pub use super::rate_limits::Entity as RateLimits;
pub use super::refresh_tokens::Entity as RefreshTokens;
pub use super::users::Entity as Users;
