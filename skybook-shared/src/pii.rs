use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// A wrapper for sensitive data that masks its value in Debug output and can be customized for Serialization.
#[derive(Clone, Deserialize)]
pub struct Masked<T>(pub T);

impl<T> Masked<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn into_inner(self) -> T {
        self.0
    }

    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl<T: fmt::Display> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T: fmt::Display> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // Persistence needs the real value (the inner data is already ciphertext by
        // the time it reaches a serializer); this wrapper exists to prevent accidental
        // leakage through log macros like tracing::info!("{:?}", booking).
        self.0.serialize(serializer)
    }
}

/// Keep only the trailing `visible` characters of a value, e.g. for card display hints.
pub fn mask_tail(value: &str, visible: usize) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= visible {
        return "*".repeat(chars.len());
    }
    let masked = "*".repeat(chars.len() - visible);
    let tail: String = chars[chars.len() - visible..].iter().collect();
    format!("{}{}", masked, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_is_masked() {
        let value = Masked::new("4242424242424242".to_string());
        assert_eq!(format!("{:?}", value), "********");
        assert_eq!(format!("{}", value), "********");
    }

    #[test]
    fn serialization_passes_through() {
        let value = Masked::new("aabb:ccdd".to_string());
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, "\"aabb:ccdd\"");
    }

    #[test]
    fn mask_tail_keeps_suffix() {
        assert_eq!(mask_tail("4242424242424242", 4), "************4242");
        assert_eq!(mask_tail("42", 4), "**");
    }
}
