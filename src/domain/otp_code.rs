use rand::{thread_rng, Rng};

pub const OTP_LENGTH: usize = 6;
/// How long an issued code stays usable. Also quoted in the email text.
pub const OTP_VALIDITY_MINUTES: i64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpCode(String);

impl OtpCode {
    /// Draws each of the six digits uniformly, leading zeros included.
    pub fn generate() -> OtpCode {
        let mut rng = thread_rng();
        Self::from_draw(rng.gen_range(0..1_000_000))
    }

    fn from_draw(draw: u32) -> OtpCode {
        Self(format!("{:0width$}", draw, width = OTP_LENGTH))
    }

    pub fn parse(s: String) -> Result<OtpCode, String> {
        if s.len() == OTP_LENGTH && s.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(s))
        } else {
            Err(format!("An OTP must be exactly {} digits.", OTP_LENGTH))
        }
    }
}

impl AsRef<str> for OtpCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
