use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

/// Parsed lnurl-pay metadata: an ordered list of `[mime type, content]` pairs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: Vec<(String, String)>,
}

/// Image embedded in the metadata, still base64 encoded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataImage {
    pub extension: String,
    pub data_base64: String,
}

impl MetadataImage {
    pub fn bytes(&self) -> Option<Vec<u8>> {
        STANDARD.decode(&self.data_base64).ok()
    }

    pub fn mime_type(&self) -> String {
        format!("image/{}", self.extension)
    }
}

impl Metadata {
    /// Parse leniently: malformed metadata yields no entries, entries that are
    /// not string pairs are skipped
    pub fn parse(encoded: &str) -> Self {
        let raw: Vec<Value> = match serde_json::from_str(encoded) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Unparseable lnurl-pay metadata");
                return Self::default();
            }
        };

        let entries = raw
            .iter()
            .filter_map(|entry| {
                let pair = entry.as_array()?;
                let kind = pair.first()?.as_str()?;
                let content = pair.get(1)?.as_str()?;
                Some((kind.to_string(), content.to_string()))
            })
            .collect();

        Self { entries }
    }

    fn find(&self, kind: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == kind)
            .map(|(_, v)| v.as_str())
    }

    /// Short description (`text/plain`)
    pub fn description(&self) -> &str {
        self.find("text/plain").unwrap_or_default()
    }

    pub fn long_description(&self) -> Option<&str> {
        self.find("text/long-desc")
    }

    /// Lightning address or email identifying the payee (LUD-16)
    pub fn identifier(&self) -> Option<&str> {
        self.find("text/identifier").or_else(|| self.find("text/email"))
    }

    pub fn image(&self) -> Option<MetadataImage> {
        self.entries.iter().find_map(|(kind, content)| {
            let extension = kind
                .strip_prefix("image/")?
                .strip_suffix(";base64")?;
            matches!(extension, "png" | "jpeg").then(|| MetadataImage {
                extension: extension.to_string(),
                data_base64: content.clone(),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_description_and_identifier() {
        let metadata = Metadata::parse(
            r#"[["text/plain","A cup of coffee"],["text/identifier","barista@shop.example"],["text/long-desc","Freshly brewed"]]"#,
        );

        assert_eq!(metadata.description(), "A cup of coffee");
        assert_eq!(metadata.identifier(), Some("barista@shop.example"));
        assert_eq!(metadata.long_description(), Some("Freshly brewed"));
        assert!(metadata.image().is_none());
    }

    #[test]
    fn test_image_extraction() {
        let metadata = Metadata::parse(
            r#"[["text/plain","pic"],["image/jpeg;base64","/9j/4AAQ"],["image/png;base64","iVBORw0K"]]"#,
        );

        let image = metadata.image().unwrap();
        assert_eq!(image.extension, "jpeg");
        assert_eq!(image.mime_type(), "image/jpeg");
        assert_eq!(image.bytes().unwrap(), vec![0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10]);
    }

    #[test]
    fn test_malformed_metadata_is_empty() {
        let metadata = Metadata::parse("not json");
        assert_eq!(metadata.description(), "");
        assert!(metadata.image().is_none());

        let metadata = Metadata::parse(r#"[["text/plain"], 5, ["text/plain", "ok"]]"#);
        assert_eq!(metadata.description(), "ok");
    }
}
