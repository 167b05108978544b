//! Object name to business name resolution

use once_cell::sync::Lazy;
use regex::Regex;

use super::UploadError;

/// Runs of characters treated as one separator when matching names
static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s_-]+").unwrap());

const SEPARATOR_CLASS: &str = r"[\s_-]+";
const LOGO_SUFFIX: &str = "-logo";

/// Which business column an upload lands in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageVariant {
    /// Appended to the image list
    Image,
    /// Replaces the logo
    Logo,
}

impl std::fmt::Display for ImageVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageVariant::Image => write!(f, "image"),
            ImageVariant::Logo => write!(f, "logo"),
        }
    }
}

/// An uploaded object name broken into its parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadName {
    /// Full object name as received
    pub object: String,
    /// Name without extension, underscores turned into `-`
    pub display_name: String,
    pub variant: ImageVariant,
    /// Business name to look up
    pub key: String,
}

impl UploadName {
    pub fn parse(object: &str) -> Result<Self, UploadError> {
        let file = object.rsplit('/').next().unwrap_or(object);
        let stem = match file.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.contains(char::is_whitespace) => stem,
            _ => file,
        };
        let display_name = stem.replace('_', "-");

        let lower = display_name.to_lowercase();
        let (variant, key) = if lower.ends_with(LOGO_SUFFIX) {
            let cut = display_name.len() - LOGO_SUFFIX.len();
            (ImageVariant::Logo, &display_name[..cut])
        } else {
            (ImageVariant::Image, display_name.as_str())
        };
        let key = key
            .trim_matches(|c: char| c == '-' || c.is_whitespace())
            .to_string();

        if key.is_empty() {
            return Err(UploadError::InvalidName {
                object: object.to_string(),
            });
        }

        Ok(Self {
            object: object.to_string(),
            display_name,
            variant,
            key,
        })
    }

    /// Case-insensitive pattern matching the whole key, any separator run matching any other
    pub fn pattern(&self) -> String {
        name_pattern(&self.key)
    }
}

pub fn name_pattern(key: &str) -> String {
    let parts: Vec<String> = SEPARATORS
        .split(key.trim())
        .filter(|part| !part.is_empty())
        .map(regex::escape)
        .collect();
    format!("(?i)^{}$", parts.join(SEPARATOR_CLASS))
}

/// Lowercased name with separator runs collapsed to one space
pub fn normalize(name: &str) -> String {
    SEPARATORS
        .replace_all(name.trim(), " ")
        .trim()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logo_upload_resolves_to_business_key() {
        let name = UploadName::parse("Joe's Diner_logo.png").unwrap();
        assert_eq!(name.display_name, "Joe's Diner-logo");
        assert_eq!(name.variant, ImageVariant::Logo);
        assert_eq!(name.key, "Joe's Diner");
    }

    #[test]
    fn test_plain_upload_is_an_image() {
        let name = UploadName::parse("uploads/Ann_s_Cafe.JPG").unwrap();
        assert_eq!(name.display_name, "Ann-s-Cafe");
        assert_eq!(name.variant, ImageVariant::Image);
        assert_eq!(name.key, "Ann-s-Cafe");

        let logo = UploadName::parse("Cafe-LOGO.png").unwrap();
        assert_eq!(logo.variant, ImageVariant::Logo);
        assert_eq!(logo.key, "Cafe");
    }

    #[test]
    fn test_name_without_business_is_rejected() {
        assert!(matches!(
            UploadName::parse("_logo.png"),
            Err(UploadError::InvalidName { .. })
        ));
        assert!(UploadName::parse("  -logo").is_err());
    }

    #[test]
    fn test_pattern_treats_separators_alike() {
        let regex = Regex::new(&name_pattern("Joe's Diner")).unwrap();
        assert!(regex.is_match("joe's diner"));
        assert!(regex.is_match("Joe's_Diner"));
        assert!(regex.is_match("JOE'S  -  DINER"));
        assert!(!regex.is_match("Joe's Diner 2"));
        assert!(!regex.is_match("Joes Diner"));

        let dotted = Regex::new(&name_pattern("A.B (x)")).unwrap();
        assert!(dotted.is_match("a.b (X)"));
        assert!(!dotted.is_match("aXb (x)"));
    }

    #[test]
    fn test_normalize_collapses_separators() {
        assert_eq!(normalize(" Joe's_Diner "), "joe's diner");
        assert_eq!(normalize("Joe's - Diner"), normalize("joe's diner"));
    }
}
