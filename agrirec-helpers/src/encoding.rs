use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors raised when translating labels through a [`LabelEncoder`].
#[derive(Debug, Clone, PartialEq)]
pub enum EncodingError {
    /// The index is outside `0..len()`.
    IndexOutOfRange(usize),
}

impl Display for EncodingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            EncodingError::IndexOutOfRange(idx) => write!(f, "class index {} out of range", idx),
        }
    }
}

impl Error for EncodingError {}

/// Bidirectional mapping between string labels and class indices.
///
/// Classes are kept sorted and unique, so fitting the same label set in any
/// order always yields the same indices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde_crate::Serialize, serde_crate::Deserialize),
    serde(crate = "serde_crate")
)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Learns the class set from an iterator of labels.
    pub fn fit<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut classes: Vec<String> = labels.into_iter().map(|l| l.as_ref().to_string()).collect();
        classes.sort();
        classes.dedup();
        Self { classes }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.encode(label).is_some()
    }

    pub fn encode(&self, label: &str) -> Option<usize> {
        self.classes.binary_search_by(|c| c.as_str().cmp(label)).ok()
    }

    pub fn decode(&self, index: usize) -> Option<&str> {
        self.classes.get(index).map(String::as_str)
    }

    pub fn try_decode(&self, index: usize) -> Result<&str, EncodingError> {
        self.decode(index).ok_or(EncodingError::IndexOutOfRange(index))
    }

    /// True when the classes are strictly ascending, which lookups rely on.
    /// Encoders built with [`LabelEncoder::fit`] always are; deserialized ones
    /// should be checked.
    pub fn is_canonical(&self) -> bool {
        self.classes.windows(2).all(|w| w[0] < w[1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_sorts_and_dedups() {
        let enc = LabelEncoder::fit(["rice", "maize", "rice", "apple"]);
        assert_eq!(enc.classes(), &["apple", "maize", "rice"]);
        assert!(enc.is_canonical());
        assert_eq!(enc.len(), 3);
    }

    #[test]
    fn test_encode_decode() {
        let enc = LabelEncoder::fit(vec!["Urea".to_string(), "DAP".to_string()]);
        assert_eq!(enc.encode("DAP"), Some(0));
        assert_eq!(enc.encode("Urea"), Some(1));
        assert_eq!(enc.encode("urea"), None);
        assert_eq!(enc.decode(1), Some("Urea"));
        assert_eq!(enc.decode(2), None);
    }

    #[test]
    fn test_try_decode_reports_errors() {
        let enc = LabelEncoder::fit(["Sandy", "Clayey"]);
        assert_eq!(enc.try_decode(5), Err(EncodingError::IndexOutOfRange(5)));
        assert_eq!(enc.try_decode(0), Ok("Clayey"));
    }
}
