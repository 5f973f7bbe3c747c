//! Authentication header construction

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// LinearB API key header
pub const API_KEY_HEADER: &str = "x-api-key";

/// How Jira requests authenticate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JiraAuthType {
    /// Personal Access Token as Bearer (Jira Server/DC)
    #[default]
    Bearer,
    /// Basic Auth with email:token (Jira Cloud)
    Basic,
}

impl From<&str> for JiraAuthType {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "basic" => JiraAuthType::Basic,
            _ => JiraAuthType::Bearer,
        }
    }
}

/// Credentials for one provider
#[derive(Debug, Clone)]
pub enum ApiAuth {
    /// Key sent verbatim in a named header
    ApiKey { header: String, key: String },
    Bearer(String),
    Basic { email: String, token: String },
}

impl ApiAuth {
    pub fn linearb(key: impl Into<String>) -> Self {
        ApiAuth::ApiKey {
            header: API_KEY_HEADER.to_string(),
            key: key.into(),
        }
    }

    pub fn jira(auth_type: JiraAuthType, token: impl Into<String>, email: Option<&str>) -> Result<Self> {
        let token = token.into();
        match auth_type {
            JiraAuthType::Bearer => Ok(ApiAuth::Bearer(token)),
            JiraAuthType::Basic => {
                let email = email
                    .filter(|e| !e.trim().is_empty())
                    .ok_or_else(|| Error::config("Email required for Basic auth"))?;
                Ok(ApiAuth::Basic {
                    email: email.to_string(),
                    token,
                })
            }
        }
    }

    /// JSON accept/content-type headers plus the credential header
    pub fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

        match self {
            ApiAuth::ApiKey { header: name, key } => {
                let name = HeaderName::from_bytes(name.as_bytes())
                    .map_err(|e| Error::config(format!("Invalid header name: {}", e)))?;
                headers.insert(name, sensitive(key)?);
            }
            ApiAuth::Bearer(token) => {
                headers.insert(header::AUTHORIZATION, sensitive(&format!("Bearer {}", token))?);
            }
            ApiAuth::Basic { email, token } => {
                let encoded = BASE64.encode(format!("{}:{}", email, token));
                headers.insert(header::AUTHORIZATION, sensitive(&format!("Basic {}", encoded))?);
            }
        }

        Ok(headers)
    }
}

fn sensitive(value: &str) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(value)
        .map_err(|e| Error::config(format!("Invalid credential header: {}", e)))?;
    value.set_sensitive(true);
    Ok(value)
}

/// Mask a secret for display: first 6 and last 4 characters
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() > 10 {
        let head: String = chars[..6].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    } else {
        "***".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linearb_headers() {
        let headers = ApiAuth::linearb("lb-key").headers().unwrap();
        assert_eq!(headers.get("x-api-key").unwrap(), "lb-key");
        assert_eq!(headers.get(header::ACCEPT).unwrap(), "application/json");
    }

    #[test]
    fn test_bearer_headers() {
        let auth = ApiAuth::jira(JiraAuthType::Bearer, "pat-123", None).unwrap();
        let headers = auth.headers().unwrap();
        assert_eq!(headers.get(header::AUTHORIZATION).unwrap(), "Bearer pat-123");
    }

    #[test]
    fn test_basic_headers() {
        let auth = ApiAuth::jira(JiraAuthType::Basic, "token", Some("dev@example.com")).unwrap();
        let headers = auth.headers().unwrap();
        let expected = format!("Basic {}", BASE64.encode("dev@example.com:token"));
        assert_eq!(headers.get(header::AUTHORIZATION).unwrap(), expected.as_str());
    }

    #[test]
    fn test_basic_requires_email() {
        assert!(ApiAuth::jira(JiraAuthType::Basic, "token", None).is_err());
        assert!(ApiAuth::jira(JiraAuthType::Basic, "token", Some("  ")).is_err());
    }

    #[test]
    fn test_jira_auth_type_from_str() {
        assert_eq!(JiraAuthType::from("basic"), JiraAuthType::Basic);
        assert_eq!(JiraAuthType::from("BASIC"), JiraAuthType::Basic);
        assert_eq!(JiraAuthType::from("bearer"), JiraAuthType::Bearer);
        assert_eq!(JiraAuthType::from("unknown"), JiraAuthType::Bearer);
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("abcdef123456wxyz"), "abcdef...wxyz");
        assert_eq!(mask_secret("short"), "***");
    }
}
