use serde::{Deserialize, Serialize};

use crate::domain::CurrentPoem;

pub const CURRENT_POEM_PATH: &str = "current_poem";
pub const POEM_COUNT_PATH: &str = "poem_count";
pub const LAST_UPDATE_DATE_PATH: &str = "last_update_date";
pub const DAILY_POEM_PATH: &str = "daily_poem";

/// Body of the current-poem query. Some deployments return a bare string, others a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CurrentPoemResponse {
    Record {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(alias = "text")]
        poem: String,
    },
    Plain(String),
}

impl From<CurrentPoemResponse> for CurrentPoem {
    fn from(value: CurrentPoemResponse) -> Self {
        match value {
            CurrentPoemResponse::Record { title, poem } => CurrentPoem { title, text: poem },
            CurrentPoemResponse::Plain(text) => CurrentPoem { title: None, text },
        }
    }
}

pub type PoemCountResponse = u64;
pub type LastUpdateDateResponse = i64;
pub type DailyPoemResponse = String;

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(raw: &str) -> CurrentPoem {
        serde_json::from_str::<CurrentPoemResponse>(raw)
            .expect("decode")
            .into()
    }

    #[test]
    fn decodes_titled_record() {
        let poem = decode(r#"{"title":"Dawn","poem":"Line one\nLine two"}"#);
        assert_eq!(poem.title.as_deref(), Some("Dawn"));
        assert_eq!(poem.text, "Line one\nLine two");
    }

    #[test]
    fn accepts_text_alias_without_title() {
        let poem = decode(r#"{"text":"untitled"}"#);
        assert_eq!(poem.title, None);
        assert_eq!(poem.text, "untitled");
    }

    #[test]
    fn decodes_bare_string() {
        let poem = decode(r#""just a poem""#);
        assert_eq!(poem.title, None);
        assert_eq!(poem.text, "just a poem");
    }

    #[test]
    fn rejects_record_without_body() {
        assert!(serde_json::from_str::<CurrentPoemResponse>(r#"{"title":"Dawn"}"#).is_err());
    }

    #[test]
    fn negative_count_is_malformed() {
        assert!(serde_json::from_str::<PoemCountResponse>("-3").is_err());
    }
}
