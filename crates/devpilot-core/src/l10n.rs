//! Localized strings used by the conversation core.
//!
//! Only the strings the core itself writes into a conversation live here;
//! editor chrome is localized by the host.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// UI and answer locale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    English,
    Chinese,
}

impl Locale {
    /// Language tag sent to the backend (`X-B3-Language`).
    pub fn language_tag(&self) -> &'static str {
        match self {
            Locale::English => "en-US",
            Locale::Chinese => "zh-CN",
        }
    }

    /// Language name used in prompts ("Please response in ...").
    pub fn answer_language(&self) -> &'static str {
        match self {
            Locale::English => "English",
            Locale::Chinese => "Chinese",
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.answer_language())
    }
}

impl FromStr for Locale {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "en" | "en-us" | "english" => Ok(Locale::English),
            "cn" | "zh" | "zh-cn" | "chinese" => Ok(Locale::Chinese),
            other => Err(CoreError::UnknownLocale(other.to_string())),
        }
    }
}

/// Keys of strings the core writes into a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextKey {
    LoginFail,
    ChatLogin,
    LoginSuccess,
    OperationExplain,
    OperationFix,
    OperationComment,
    OperationTest,
    OperationPerformance,
    OperationReview,
    OperationCommentMethod,
    OperationCommit,
}

/// Look up a localized string.
pub fn text(locale: Locale, key: TextKey) -> &'static str {
    match locale {
        Locale::English => match key {
            TextKey::LoginFail => "DevPilot: Not login or login expired",
            TextKey::ChatLogin => "I am going to login...",
            TextKey::LoginSuccess => "Login success",
            TextKey::OperationExplain => "Explain this",
            TextKey::OperationFix => "Fix this",
            TextKey::OperationComment => "Generate Comments",
            TextKey::OperationTest => "Generate Tests",
            TextKey::OperationPerformance => "Check performance",
            TextKey::OperationReview => "Code review",
            TextKey::OperationCommentMethod => "Comment this method",
            TextKey::OperationCommit => "Generate commit message",
        },
        Locale::Chinese => match key {
            TextKey::LoginFail => "DevPilot: 未登录或者登录过期",
            TextKey::ChatLogin => "准备重新登录...",
            TextKey::LoginSuccess => "登录成功",
            TextKey::OperationExplain => "解释代码",
            TextKey::OperationFix => "修复代码",
            TextKey::OperationComment => "生成注释",
            TextKey::OperationTest => "生成单测",
            TextKey::OperationPerformance => "性能检查",
            TextKey::OperationReview => "代码审查",
            TextKey::OperationCommentMethod => "方法注释",
            TextKey::OperationCommit => "生成提交信息",
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locale_parse() {
        assert_eq!("en".parse::<Locale>().unwrap(), Locale::English);
        assert_eq!("zh-CN".parse::<Locale>().unwrap(), Locale::Chinese);
        assert_eq!("Chinese".parse::<Locale>().unwrap(), Locale::Chinese);
        assert!("fr".parse::<Locale>().is_err());
    }

    #[test]
    fn test_text_lookup() {
        assert_eq!(
            text(Locale::English, TextKey::LoginFail),
            "DevPilot: Not login or login expired"
        );
        assert_ne!(
            text(Locale::Chinese, TextKey::LoginFail),
            text(Locale::English, TextKey::LoginFail)
        );
    }
}
