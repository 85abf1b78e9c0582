use unicode_segmentation::UnicodeSegmentation;

const MAX_NAME_GRAPHEMES: usize = 256;
const FORBIDDEN_NAME_CHARACTERS: [char; 9] = ['/', '(', ')', '"', '<', '>', '\\', '{', '}'];

/// A validated partial update of the basic profile fields.
///
/// `None` leaves a field untouched. `nick_name` is doubly optional so a
/// client can clear it: `Some(None)` removes the nickname.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfilePatch {
    pub name: Option<ProfileName>,
    pub nick_name: Option<Option<NickName>>,
    pub age: Option<Age>,
    pub height: Option<BodyMeasure>,
    pub weight: Option<BodyMeasure>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileName(String);

impl ProfileName {
    /// Trims surrounding whitespace before checking the name.
    pub fn parse(s: String) -> Result<ProfileName, String> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err("Name must be a non-empty string".into());
        }
        if trimmed.graphemes(true).count() > MAX_NAME_GRAPHEMES {
            return Err(format!(
                "Name must be at most {} characters long",
                MAX_NAME_GRAPHEMES
            ));
        }
        if trimmed.chars().any(|c| FORBIDDEN_NAME_CHARACTERS.contains(&c)) {
            return Err(format!("{} is not a valid name", trimmed));
        }
        Ok(Self(trimmed.to_owned()))
    }
}

impl AsRef<str> for ProfileName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NickName(String);

impl NickName {
    pub fn parse(s: String) -> Result<NickName, String> {
        if s.graphemes(true).count() > MAX_NAME_GRAPHEMES {
            return Err(format!(
                "Nickname must be at most {} characters long",
                MAX_NAME_GRAPHEMES
            ));
        }
        Ok(Self(s))
    }
}

impl AsRef<str> for NickName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Age(i32);

impl Age {
    pub fn parse(value: i64) -> Result<Age, String> {
        match value {
            0..=120 => Ok(Self(value as i32)),
            _ => Err("Age must be between 0 and 120".into()),
        }
    }

    pub fn value(&self) -> i32 {
        self.0
    }
}

/// Height or weight. Must be a finite, strictly positive number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyMeasure(f64);

impl BodyMeasure {
    pub fn parse(value: f64, field: &str) -> Result<BodyMeasure, String> {
        if value.is_finite() && value > 0.0 {
            Ok(Self(value))
        } else {
            Err(format!("{} must be a positive number", field))
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}
