//! Translation backend client and bearer-token provider.
//!
//! The backend is an Azure-Translator-shaped REST API: `translate` accepts
//! an array of `{"text": ...}` items with `to`/optional `from` query
//! parameters, `languages` lists the supported set, and a separate auth
//! endpoint exchanges the subscription key for a short-lived bearer token.
//!
//! Translation failures never escape to callers: any network error,
//! non-success status or malformed response degrades to the original,
//! untranslated text and is logged at error level. Masking of protected
//! spans happens inside `get_translation`, so callers always receive text
//! with mentions and inline code intact.

use crate::config::Config;
use crate::masking::MaskedText;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, error};

/// A `(language, text)` pair, one side of a [`Translation`].
#[derive(Debug, Clone, PartialEq)]
pub struct LocalText {
    pub language: String,
    pub text: String,
}

/// Which direction a translation ran, relative to the guild's home locale.
///
/// Either side of a pair can originate a message, so the record has to say
/// which side holds the author's original words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationKind {
    HomeToForeign,
    ForeignToHome,
}

/// The result of one translation call: both language variants plus the
/// code blocks lifted out before the call. The code artifact renders with
/// the translated side, never the original.
#[derive(Debug, Clone)]
pub struct Translation {
    pub original: LocalText,
    pub translated: LocalText,
    pub kind: TranslationKind,
    pub code_blocks: Vec<String>,
}

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    translations: Option<Vec<TranslatedText>>,
    #[serde(rename = "detectedLanguage")]
    detected_language: Option<DetectedLanguage>,
}

#[derive(Debug, Deserialize)]
struct TranslatedText {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DetectedLanguage {
    language: String,
    #[allow(dead_code)]
    score: Option<f32>,
}

/// Display metadata for one supported language.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LanguageDetails {
    pub name: Option<String>,
    #[serde(rename = "nativeName")]
    pub native_name: Option<String>,
    #[serde(rename = "dir")]
    pub direction: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SupportedLanguagesResponse {
    #[serde(default)]
    translation: BTreeMap<String, LanguageDetails>,
}

/// Holds the current bearer token for the translation backend.
///
/// The token is refreshed on a fixed schedule by a job the application
/// starts (see `scheduler`); the client just reads whatever is current at
/// call time.
#[derive(Debug, Default)]
pub struct TokenProvider {
    token: RwLock<Option<String>>,
}

impl TokenProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn current(&self) -> Option<String> {
        self.token.read().expect("token lock poisoned").clone()
    }

    /// Exchange the subscription key for a fresh bearer token. On failure
    /// the previous token stays in place.
    pub async fn refresh(&self, http: &reqwest::Client, config: &Config) -> Result<()> {
        debug!("Starting translation token refresh");
        let response = http
            .post(&config.translator_auth_endpoint)
            .header("Ocp-Apim-Subscription-Key", &config.translator_key)
            .body("")
            .send()
            .await
            .context("Failed to reach the token endpoint")?;

        if !response.status().is_success() {
            bail!("Token endpoint returned {}", response.status());
        }

        let token = response
            .text()
            .await
            .context("Failed to read the token response")?;
        *self.token.write().expect("token lock poisoned") = Some(token);
        debug!("Finished translation token refresh");
        Ok(())
    }

    #[cfg(test)]
    pub fn set_for_tests(&self, token: &str) {
        *self.token.write().expect("token lock poisoned") = Some(token.to_string());
    }
}

/// Client for the translation REST backend.
#[derive(Clone)]
pub struct TranslationClient {
    http: reqwest::Client,
    config: Arc<Config>,
    tokens: Arc<TokenProvider>,
}

impl TranslationClient {
    pub fn new(http: reqwest::Client, config: Arc<Config>, tokens: Arc<TokenProvider>) -> Self {
        Self {
            http,
            config,
            tokens,
        }
    }

    /// Translate `text` into `to`, auto-detecting the source language when
    /// `from` is `None`.
    ///
    /// Protected spans are masked before the call and restored after it.
    /// This never fails: when the backend call goes wrong in any way the
    /// returned translation carries the original text on both sides.
    pub async fn get_translation(
        &self,
        from: Option<&str>,
        to: &str,
        text: &str,
        kind: TranslationKind,
    ) -> Translation {
        debug!(
            from = from.unwrap_or("auto"),
            to, "Translating message text"
        );

        let masked = MaskedText::mask(text);
        let mut source_language = from.map(str::to_string);

        let translated_text = match self.call_translate(from, to, masked.text()).await {
            Ok((detected, translated)) => {
                if source_language.is_none() {
                    source_language = detected;
                }
                masked.unmask(&translated)
            }
            Err(err) => {
                error!("Unable to translate message: {err:#}");
                masked.restore_original()
            }
        };

        debug!("Finished translating");
        Translation {
            original: LocalText {
                language: source_language.unwrap_or_else(|| "unknown".to_string()),
                text: text.to_string(),
            },
            translated: LocalText {
                language: to.to_string(),
                text: translated_text,
            },
            kind,
            code_blocks: masked.code_blocks(),
        }
    }

    async fn call_translate(
        &self,
        from: Option<&str>,
        to: &str,
        text: &str,
    ) -> Result<(Option<String>, String)> {
        let mut url = format!(
            "{}/translate?api-version=3.0&to={}",
            self.config.translator_endpoint.trim_end_matches('/'),
            to
        );
        if let Some(from) = from.filter(|f| !f.trim().is_empty()) {
            url.push_str(&format!("&from={from}"));
        }

        let mut request = self.http.post(&url).json(&[TranslateRequest { text }]);
        if let Some(token) = self.tokens.current() {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .context("Failed to send translation request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {e}>"));
            bail!("Unable to translate. Service returned {status}: {body}");
        }

        let items: Vec<TranslateResponse> = response
            .json()
            .await
            .context("Response is not a valid translation")?;

        let first = items
            .into_iter()
            .next()
            .context("No translations were returned")?;
        let translated = first
            .translations
            .unwrap_or_default()
            .into_iter()
            .next()
            .and_then(|t| t.text)
            .context("No translations were returned")?;
        let detected = first.detected_language.map(|d| d.language);

        Ok((detected, translated))
    }

    /// The backend's supported language set with display metadata, keyed
    /// by language code. Failures come back as an empty map so callers can
    /// treat "unknown" as "unsupported".
    pub async fn supported_languages(&self) -> BTreeMap<String, LanguageDetails> {
        match self.fetch_supported_languages().await {
            Ok(languages) => languages,
            Err(err) => {
                error!("Unable to determine the supported language set: {err:#}");
                BTreeMap::new()
            }
        }
    }

    async fn fetch_supported_languages(&self) -> Result<BTreeMap<String, LanguageDetails>> {
        let url = format!(
            "{}/languages?api-version=3.0&scope=translation",
            self.config.translator_endpoint.trim_end_matches('/')
        );
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .context("Failed to reach the languages endpoint")?;

        if !response.status().is_success() {
            bail!("Languages endpoint returned {}", response.status());
        }

        let body: SupportedLanguagesResponse = response
            .json()
            .await
            .context("Languages response is malformed")?;
        Ok(body.translation)
    }

    /// Whether the backend can translate to and from `lang`. Codes match
    /// case-insensitively.
    pub async fn is_supported(&self, lang: &str) -> bool {
        self.supported_languages()
            .await
            .keys()
            .any(|code| code.eq_ignore_ascii_case(lang))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(endpoint: &str) -> TranslationClient {
        let config = Arc::new(Config {
            translator_key: "test-subscription-key".to_string(),
            translator_endpoint: endpoint.to_string(),
            translator_auth_endpoint: format!("{endpoint}/sts/v1.0/issueToken"),
            idle_timeout_minutes: 240,
        });
        let tokens = TokenProvider::new();
        tokens.set_for_tests("test-bearer-token");
        TranslationClient::new(reqwest::Client::new(), config, tokens)
    }

    fn translate_body(text: &str, detected: Option<&str>) -> serde_json::Value {
        let mut item = serde_json::json!({
            "translations": [{ "text": text, "to": "fr" }]
        });
        if let Some(language) = detected {
            item["detectedLanguage"] = serde_json::json!({ "language": language, "score": 0.98 });
        }
        serde_json::json!([item])
    }

    // ==================== Translation Tests ====================

    #[tokio::test]
    async fn test_get_translation_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/translate"))
            .and(query_param("to", "fr"))
            .and(query_param("from", "en"))
            .respond_with(ResponseTemplate::new(200).set_body_json(translate_body("Bonjour", None)))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let translation = client
            .get_translation(Some("en"), "fr", "Hello", TranslationKind::HomeToForeign)
            .await;

        assert_eq!(translation.original.language, "en");
        assert_eq!(translation.original.text, "Hello");
        assert_eq!(translation.translated.language, "fr");
        assert_eq!(translation.translated.text, "Bonjour");
        assert_eq!(translation.kind, TranslationKind::HomeToForeign);
    }

    #[tokio::test]
    async fn test_get_translation_detects_source_language() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/translate"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(translate_body("Hello", Some("es"))),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let translation = client
            .get_translation(None, "en", "Hola", TranslationKind::ForeignToHome)
            .await;

        assert_eq!(translation.original.language, "es");
    }

    #[tokio::test]
    async fn test_get_translation_falls_back_on_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/translate"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let translation = client
            .get_translation(Some("en"), "fr", "Hello there", TranslationKind::HomeToForeign)
            .await;

        assert_eq!(translation.translated.text, "Hello there");
        assert_eq!(translation.original.text, "Hello there");
    }

    #[tokio::test]
    async fn test_get_translation_falls_back_on_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/translate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let translation = client
            .get_translation(Some("en"), "fr", "Hello", TranslationKind::HomeToForeign)
            .await;

        assert_eq!(translation.translated.text, "Hello");
    }

    #[tokio::test]
    async fn test_get_translation_restores_masked_spans() {
        let server = MockServer::start().await;
        // echo the request text back so placeholders survive "translation"
        Mock::given(method("POST"))
            .and(path("/translate"))
            .respond_with(move |req: &wiremock::Request| {
                let body: Vec<serde_json::Value> =
                    serde_json::from_slice(&req.body).expect("request body is json");
                let text = body[0]["text"].as_str().unwrap().to_string();
                ResponseTemplate::new(200).set_body_json(serde_json::json!([
                    { "translations": [{ "text": text, "to": "fr" }] }
                ]))
            })
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let translation = client
            .get_translation(
                Some("en"),
                "fr",
                "Check `x=1` <@123456789012345678> done",
                TranslationKind::HomeToForeign,
            )
            .await;

        assert!(translation.translated.text.contains("`x=1`"));
        assert!(translation
            .translated
            .text
            .contains("<@123456789012345678>"));
    }

    #[tokio::test]
    async fn test_get_translation_lifts_code_blocks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/translate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(translate_body("traduit", None)))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let translation = client
            .get_translation(
                Some("en"),
                "fr",
                "see ```let x = 1;``` above",
                TranslationKind::HomeToForeign,
            )
            .await;

        assert_eq!(translation.code_blocks, vec!["```let x = 1;```".to_string()]);
        assert!(!translation.translated.text.contains("let x = 1;"));
    }

    // ==================== Supported Language Tests ====================

    #[tokio::test]
    async fn test_supported_languages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/languages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "translation": {
                    "en": { "name": "English", "nativeName": "English", "dir": "ltr" },
                    "fr": { "name": "French", "nativeName": "Français", "dir": "ltr" }
                }
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let languages = client.supported_languages().await;
        assert_eq!(languages.len(), 2);
        assert_eq!(
            languages["fr"].native_name.as_deref(),
            Some("Français")
        );
        assert!(client.is_supported("fr").await);
        assert!(client.is_supported("FR").await);
        assert!(!client.is_supported("xx").await);
    }

    #[tokio::test]
    async fn test_supported_languages_empty_on_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/languages"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        assert!(client.supported_languages().await.is_empty());
        assert!(!client.is_supported("fr").await);
    }

    // ==================== Token Provider Tests ====================

    #[tokio::test]
    async fn test_token_refresh_stores_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sts/v1.0/issueToken"))
            .and(wiremock::matchers::header(
                "Ocp-Apim-Subscription-Key",
                "test-subscription-key",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_string("fresh-token"))
            .mount(&server)
            .await;

        let config = Config {
            translator_key: "test-subscription-key".to_string(),
            translator_endpoint: server.uri(),
            translator_auth_endpoint: format!("{}/sts/v1.0/issueToken", server.uri()),
            idle_timeout_minutes: 240,
        };
        let tokens = TokenProvider::new();
        tokens
            .refresh(&reqwest::Client::new(), &config)
            .await
            .expect("refresh should succeed");

        assert_eq!(tokens.current().as_deref(), Some("fresh-token"));
    }

    #[tokio::test]
    async fn test_token_refresh_keeps_previous_token_on_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sts/v1.0/issueToken"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let config = Config {
            translator_key: "bad-key".to_string(),
            translator_endpoint: server.uri(),
            translator_auth_endpoint: format!("{}/sts/v1.0/issueToken", server.uri()),
            idle_timeout_minutes: 240,
        };
        let tokens = TokenProvider::new();
        tokens.set_for_tests("old-token");

        let result = tokens.refresh(&reqwest::Client::new(), &config).await;
        assert!(result.is_err());
        assert_eq!(tokens.current().as_deref(), Some("old-token"));
    }
}
