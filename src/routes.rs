mod health_check;
mod otp;
mod profile;

pub use health_check::*;
pub use otp::*;
pub use profile::*;
