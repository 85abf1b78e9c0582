mod otp_code;
mod profile_patch;
mod user_email;

pub use otp_code::*;
pub use profile_patch::*;
pub use user_email::*;
