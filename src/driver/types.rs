//! Tipos de dados do protocolo W3C WebDriver.
//!
//! Todas as respostas do driver chegam envelopadas em `{"value": ...}`;
//! os erros usam o mesmo envelope com `error` e `message`.

use serde::{Deserialize, Serialize};

/// Chave fixa que identifica uma referência de elemento no protocolo W3C.
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Envelope comum de todas as respostas do driver.
#[derive(Debug, Clone, Deserialize)]
pub struct WireResponse<T> {
    pub value: T,
}

/// Corpo de erro W3C.
#[derive(Debug, Clone, Deserialize)]
pub struct W3cError {
    /// Código textual do erro (ex.: "no such element").
    pub error: String,
    #[serde(default)]
    pub message: String,
}

/// Corpo da requisição `POST /session`.
#[derive(Debug, Clone, Serialize)]
pub struct NewSessionRequest {
    pub capabilities: Capabilities,
}

#[derive(Debug, Clone, Serialize)]
pub struct Capabilities {
    #[serde(rename = "alwaysMatch")]
    pub always_match: AlwaysMatch,
}

/// Capacidades exigidas do navegador.
#[derive(Debug, Clone, Serialize)]
pub struct AlwaysMatch {
    #[serde(rename = "browserName")]
    pub browser_name: String,
    /// Argumentos de linha de comando repassados ao Chrome.
    #[serde(rename = "goog:chromeOptions")]
    pub chrome_options: ChromeOptions,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChromeOptions {
    pub args: Vec<String>,
}

/// Valor devolvido por `POST /session`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewSessionValue {
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

/// Referência a um elemento do documento remoto, como o driver a serializa.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementRef {
    #[serde(rename = "element-6066-11e4-a52e-4f735466cecf")]
    pub id: String,
}

/// Corpo da requisição `POST /session/{id}/elements`.
#[derive(Debug, Clone, Serialize)]
pub struct FindRequest {
    pub using: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UrlRequest {
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendKeysRequest {
    pub text: String,
}

/// Corpo da requisição `POST /session/{id}/execute/sync`.
#[derive(Debug, Clone, Serialize)]
pub struct ScriptRequest {
    pub script: String,
    pub args: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeoutsRequest {
    #[serde(rename = "pageLoad")]
    pub page_load: u64,
    pub implicit: u64,
}
