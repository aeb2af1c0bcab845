//! Tipos de erro para o driver de automação do navegador.
//!
//! Define [`DriverError`] com variantes para erros do protocolo WebDriver,
//! perda de sessão e erros de rede. Usa `thiserror` para derivar `Display` e
//! `Error` a partir dos atributos `#[error(...)]`.

use thiserror::Error;

/// Erros que podem ocorrer ao conversar com o driver do navegador.
///
/// A classificação importa para o executor de passos:
/// - [`is_fatal`](DriverError::is_fatal): a sessão não serve mais, a execução inteira para
/// - [`is_transient`](DriverError::is_transient): o elemento mudou ou ainda não está pronto, vale repetir
/// - o resto encerra apenas o passo atual
#[derive(Debug, Error)]
pub enum DriverError {
    /// Erro devolvido pelo driver no formato W3C (`{"value": {"error", "message"}}`).
    #[error("webdriver error `{code}` (status {status}): {message}")]
    Protocol {
        status: u16,
        code: String,
        message: String,
    },

    /// O elemento foi recriado entre a busca e a ação.
    #[error("stale element reference: {0}")]
    StaleElement(String),

    /// A sessão do navegador ou a autenticação não são mais válidas.
    #[error("session lost: {0}")]
    SessionLost(String),

    /// Falha de rede subjacente (driver fora do ar, conexão recusada).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Resposta do driver com formato inesperado.
    #[error("malformed driver response: {0}")]
    Malformed(String),
}

/// Códigos W3C que indicam que a mesma ação pode funcionar em uma nova tentativa.
const TRANSIENT_CODES: &[&str] = &[
    "no such element",
    "element not interactable",
    "element click intercepted",
    "stale element reference",
];

impl DriverError {
    /// Constrói o erro a partir do corpo W3C, separando os casos especiais.
    pub fn from_w3c(status: u16, code: &str, message: &str) -> Self {
        match code {
            "invalid session id" | "session not created" => {
                DriverError::SessionLost(format!("{code}: {message}"))
            }
            "stale element reference" => DriverError::StaleElement(message.to_string()),
            _ => DriverError::Protocol {
                status,
                code: code.to_string(),
                message: message.to_string(),
            },
        }
    }

    /// A sessão não pode mais ser usada.
    ///
    /// Um timeout de requisição derruba só a operação; o driver continua lá.
    pub fn is_fatal(&self) -> bool {
        match self {
            DriverError::SessionLost(_) => true,
            DriverError::Network(e) => !e.is_timeout(),
            _ => false,
        }
    }

    /// O documento remoto ainda está mudando; repetir a busca pode resolver.
    pub fn is_transient(&self) -> bool {
        match self {
            DriverError::StaleElement(_) => true,
            DriverError::Network(e) => e.is_timeout(),
            DriverError::Protocol { code, .. } => TRANSIENT_CODES.contains(&code.as_str()),
            _ => false,
        }
    }
}
