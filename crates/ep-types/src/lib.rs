//! Validated primitive types shared by the evidence profile crates.
//!
//! Each type here can only be constructed through a checking constructor, so holding one is
//! proof that the value passed validation.

/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,
    /// The input exceeded the maximum permitted length
    #[error("Text exceeds maximum length of {0} characters")]
    TooLong(usize),
    /// The input contained characters outside the permitted set
    #[error("Text contains invalid characters (only lowercase a-z, 0-9, '-', '_' allowed)")]
    InvalidCharacters,
}

/// Errors that can occur when creating an [`Order`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum OrderError {
    #[error("order is not an integer: {0:?}")]
    NotAnInteger(String),
    #[error("order must be a positive integer, got {0}")]
    NotPositive(i64),
}

/// A string type that guarantees non-empty content.
///
/// This type wraps a `String` and ensures it contains at least one non-whitespace character.
/// The input is automatically trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// The input is trimmed of leading and trailing whitespace. If the trimmed
    /// result is empty, an error is returned.
    ///
    /// # Errors
    ///
    /// Returns `Err(TextError::Empty)` if the input is empty or contains only whitespace.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

/// URL-safe name of an evidence profile, unique within its assessment.
///
/// Accepts lowercase ASCII letters, digits, `-` and `_`, up to [`Slug::MAX_LEN`] characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Slug(String);

impl Slug {
    pub const MAX_LEN: usize = 128;

    /// Creates a new `Slug`, trimming surrounding whitespace first.
    ///
    /// # Errors
    ///
    /// Returns a [`TextError`] if the slug is blank, too long, or contains characters outside
    /// the permitted set.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        if trimmed.len() > Self::MAX_LEN {
            return Err(TextError::TooLong(Self::MAX_LEN));
        }
        let ok = trimmed
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'z' | b'-' | b'_'));
        if !ok {
            return Err(TextError::InvalidCharacters);
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Slug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for Slug {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for Slug {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Slug::new(&s).map_err(serde::de::Error::custom)
    }
}

/// A 1-based ordering position as declared by a submitted form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Order(u32);

impl Order {
    /// Creates an `Order` from a number, rejecting zero.
    pub fn new(value: u32) -> Result<Self, OrderError> {
        if value == 0 {
            return Err(OrderError::NotPositive(0));
        }
        Ok(Self(value))
    }

    /// Parses a submitted order value.
    ///
    /// Surrounding whitespace is ignored. Zero, negative and non-numeric values are rejected.
    pub fn parse(input: &str) -> Result<Self, OrderError> {
        let trimmed = input.trim();
        let value: i64 = trimmed
            .parse()
            .map_err(|_| OrderError::NotAnInteger(input.to_owned()))?;
        if value <= 0 {
            return Err(OrderError::NotPositive(value));
        }
        u32::try_from(value)
            .map(Self)
            .map_err(|_| OrderError::NotAnInteger(input.to_owned()))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl serde::Serialize for Order {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u32(self.0)
    }
}

impl<'de> serde::Deserialize<'de> for Order {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = u32::deserialize(deserializer)?;
        Order::new(value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_text_trims_and_rejects_blank() {
        assert_eq!(NonEmptyText::new("  Human  ").unwrap().as_str(), "Human");
        assert_eq!(NonEmptyText::new("   "), Err(TextError::Empty));
    }

    #[test]
    fn slug_accepts_url_friendly_names() {
        assert!(Slug::new("pfas-profile_2").is_ok());
        assert_eq!(Slug::new("Has Space"), Err(TextError::InvalidCharacters));
        assert_eq!(Slug::new(""), Err(TextError::Empty));
        assert_eq!(
            Slug::new("a".repeat(Slug::MAX_LEN + 1)),
            Err(TextError::TooLong(Slug::MAX_LEN))
        );
    }

    #[test]
    fn order_parse_rejects_zero_negative_and_text() {
        assert_eq!(Order::parse("3").unwrap(), Order::new(3).unwrap());
        assert_eq!(Order::parse(" 1 ").unwrap().get(), 1);
        assert_eq!(Order::parse("0"), Err(OrderError::NotPositive(0)));
        assert_eq!(Order::parse("-2"), Err(OrderError::NotPositive(-2)));
        assert!(matches!(Order::parse("two"), Err(OrderError::NotAnInteger(_))));
        assert!(matches!(Order::parse(""), Err(OrderError::NotAnInteger(_))));
    }

    #[test]
    fn order_deserialize_rejects_zero() {
        assert!(serde_json::from_str::<Order>("0").is_err());
        assert_eq!(serde_json::from_str::<Order>("4").unwrap().get(), 4);
    }
}
