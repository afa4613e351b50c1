use crate::error::FormatError;
use encoding_rs::Encoding;

/// Text codec for a managed file.
///
/// Only single-byte code pages and UTF-8 are accepted: the adapters work
/// line by line on decoded text and re-encode on save, which UTF-16 does not
/// survive with the encoder used here.
#[derive(Debug, Clone, Copy)]
pub struct Codec {
    encoding: &'static Encoding,
}

impl Codec {
    /// Resolve a label such as `utf-8`, `windows-1251`, `cp1252` or the
    /// launcher's historical `win1251` spelling.
    pub fn for_label(label: &str) -> Result<Self, FormatError> {
        let normalized = normalize_label(label);
        let encoding = Encoding::for_label(normalized.as_bytes())
            .ok_or_else(|| FormatError::UnknownEncoding(label.to_string()))?;

        if encoding == encoding_rs::UTF_16LE
            || encoding == encoding_rs::UTF_16BE
            || encoding == encoding_rs::REPLACEMENT
        {
            return Err(FormatError::UnknownEncoding(label.to_string()));
        }

        Ok(Self { encoding })
    }

    pub fn name(&self) -> &'static str {
        self.encoding.name()
    }

    /// Decode without BOM handling so a UTF-8 BOM stays in the text as
    /// U+FEFF and is written back unchanged.
    pub fn decode(&self, bytes: &[u8]) -> String {
        let (text, had_errors) = self.encoding.decode_without_bom_handling(bytes);
        if had_errors {
            tracing::warn!(
                "Malformed {} sequences replaced while decoding",
                self.encoding.name()
            );
        }
        text.into_owned()
    }

    pub fn encode(&self, text: &str) -> Result<Vec<u8>, FormatError> {
        let (bytes, _, had_errors) = self.encoding.encode(text);
        if had_errors {
            return Err(FormatError::Unencodable {
                encoding: self.encoding.name().to_string(),
            });
        }
        Ok(bytes.into_owned())
    }
}

fn normalize_label(label: &str) -> String {
    let label = label.trim().to_ascii_lowercase();
    match label.strip_prefix("win") {
        Some(digits) if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) => {
            format!("windows-{}", digits)
        }
        _ => label,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        assert_eq!(Codec::for_label("win1251").unwrap().name(), "windows-1251");
        assert_eq!(Codec::for_label("WIN1252").unwrap().name(), "windows-1252");
        assert_eq!(Codec::for_label("cp1251").unwrap().name(), "windows-1251");
        assert_eq!(Codec::for_label(" utf-8 ").unwrap().name(), "UTF-8");
        assert_eq!(Codec::for_label("utf8").unwrap().name(), "UTF-8");
    }

    #[test]
    fn test_rejects_unknown_and_utf16() {
        assert!(matches!(
            Codec::for_label("klingon"),
            Err(FormatError::UnknownEncoding(_))
        ));
        assert!(Codec::for_label("utf-16le").is_err());
        assert!(Codec::for_label("").is_err());
    }

    #[test]
    fn test_utf8_bom_survives() {
        let codec = Codec::for_label("utf-8").unwrap();
        let bytes = b"\xef\xbb\xbf[General]\n";

        let text = codec.decode(bytes);
        assert!(text.starts_with('\u{feff}'));
        assert_eq!(codec.encode(&text).unwrap(), bytes.to_vec());
    }

    #[test]
    fn test_unencodable_character() {
        let codec = Codec::for_label("windows-1252").unwrap();
        assert!(matches!(
            codec.encode("日本"),
            Err(FormatError::Unencodable { .. })
        ));
        assert_eq!(codec.encode("café").unwrap(), b"caf\xe9".to_vec());
    }
}
