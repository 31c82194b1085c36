use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 連携可能なソーシャルメディアプラットフォーム
///
/// DB には小文字の文字列（`instagram` など）で保存される。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Instagram,
    Facebook,
    Twitter,
    Linkedin,
    Tiktok,
}

impl Platform {
    pub const ALL: [Platform; 5] = [
        Platform::Instagram,
        Platform::Facebook,
        Platform::Twitter,
        Platform::Linkedin,
        Platform::Tiktok,
    ];

    /// DB・URL パスで使用する識別子
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Instagram => "instagram",
            Self::Facebook => "facebook",
            Self::Twitter => "twitter",
            Self::Linkedin => "linkedin",
            Self::Tiktok => "tiktok",
        }
    }

    /// ユーザー向けメッセージで使用する表示名
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Instagram => "Instagram",
            Self::Facebook => "Facebook",
            Self::Twitter => "Twitter",
            Self::Linkedin => "LinkedIn",
            Self::Tiktok => "TikTok",
        }
    }

    /// SPA 側のコールバックパス（`/auth/<platform>/callback`）
    pub fn callback_path(&self) -> String {
        format!("/auth/{}/callback", self.as_str())
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 未知のプラットフォーム識別子
#[derive(Debug, thiserror::Error)]
#[error("unknown platform: {0}")]
pub struct UnknownPlatform(pub String);

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownPlatform(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_platforms() {
        for platform in Platform::ALL {
            assert_eq!(platform.as_str().parse::<Platform>().unwrap(), platform);
        }
    }

    #[test]
    fn test_parse_rejects_unknown_and_mixed_case() {
        assert!("myspace".parse::<Platform>().is_err());
        assert!("Instagram".parse::<Platform>().is_err());
    }

    #[test]
    fn test_callback_path() {
        assert_eq!(Platform::Linkedin.callback_path(), "/auth/linkedin/callback");
    }

    #[test]
    fn test_serde_uses_lowercase() {
        let json = serde_json::to_string(&Platform::Twitter).unwrap();
        assert_eq!(json, "\"twitter\"");
    }
}
