use std::fmt;

use shared::domain::HostedImageUrl;
use url::Url;

use crate::error::SettingsError;

/// Pre-parsed share-intent endpoint plus the text that accompanies every share.
#[derive(Debug, Clone)]
pub struct ShareTemplate {
    base: Url,
    text: String,
}

impl ShareTemplate {
    pub fn new(base: &str, text: impl Into<String>) -> Result<Self, SettingsError> {
        let base = Url::parse(base).map_err(|source| SettingsError::InvalidUrl {
            field: "share_intent_url",
            value: base.to_string(),
            source,
        })?;
        Ok(Self {
            base,
            text: text.into(),
        })
    }

    pub fn intent_for(&self, image_url: &HostedImageUrl) -> ShareIntent {
        let mut url = self.base.clone();
        url.query_pairs_mut()
            .clear()
            .append_pair("text", &self.text)
            .append_pair("url", image_url.as_str());
        ShareIntent { url }
    }
}

/// External URL that opens the share provider's compose view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareIntent {
    url: Url,
}

impl ShareIntent {
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl fmt::Display for ShareIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_carries_encoded_text_and_image_url() {
        let template =
            ShareTemplate::new("https://twitter.com/intent/tweet", "My card & more").expect("template");
        let image = HostedImageUrl::parse("https://cdn.example/a b.png?x=1").expect("url");

        let intent = template.intent_for(&image);
        assert!(intent.as_str().starts_with("https://twitter.com/intent/tweet?text="));
        assert!(!intent.as_str().contains("a b.png"));

        let pairs: Vec<(String, String)> = intent
            .url()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("text".to_string(), "My card & more".to_string()),
                ("url".to_string(), "https://cdn.example/a b.png?x=1".to_string()),
            ]
        );
    }

    #[test]
    fn rejects_relative_share_endpoint() {
        let err = ShareTemplate::new("intent/share", "hi").expect_err("must fail");
        assert!(matches!(
            err,
            SettingsError::InvalidUrl {
                field: "share_intent_url",
                ..
            }
        ));
    }
}
