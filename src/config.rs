//! Configuração do ticketera carregada a partir de `ticketera.toml`.
//!
//! A struct [`TicketeraConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! As variáveis de ambiente `TICKETERA_EMAIL`, `TICKETERA_PASSWORD` e
//! `GOOGLE_SHEETS_TOKEN` têm precedência sobre o arquivo.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::error::TicketeraError;
use crate::executor::Budgets;
use crate::vocabulary::Vocabulary;

pub const DEFAULT_CONFIG_FILE: &str = "ticketera.toml";

/// Configuração de nível superior carregada de `ticketera.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct TicketeraConfig {
    /// URL base da aplicação de ponto de venda.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Endpoint do servidor WebDriver (chromedriver).
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// Executa o navegador sem interface visível.
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Retentativas por etapa antes de marcar o registro como erro.
    #[serde(default = "default_stage_retries")]
    pub stage_retries: u32,

    /// Diretório onde as capturas de tela de falhas são gravadas.
    #[serde(default = "default_screenshot_dir")]
    pub screenshot_dir: PathBuf,

    #[serde(default)]
    pub timeouts: Timeouts,

    #[serde(default)]
    pub sheets: SheetsConfig,

    #[serde(default)]
    pub credentials: CredentialsConfig,

    #[serde(default)]
    pub vocabulary: Vocabulary,
}

/// Limites de espera, todos em milissegundos.
#[derive(Debug, Clone, Deserialize)]
pub struct Timeouts {
    #[serde(default = "default_headless_ms")]
    pub headless_ms: u64,
    #[serde(default = "default_visible_ms")]
    pub visible_ms: u64,
    #[serde(default = "default_poll_ms")]
    pub poll_ms: u64,
    /// Espera curta do classificador após uma submissão.
    #[serde(default = "default_classify_ms")]
    pub classify_ms: u64,
    /// Espera pelo número do ticket após o pagamento.
    #[serde(default = "default_confirmation_ms")]
    pub confirmation_ms: u64,
    /// Espera pelo carregamento de telas inteiras (login, venda).
    #[serde(default = "default_navigation_ms")]
    pub navigation_ms: u64,
}

/// Acesso à planilha Google Sheets com os registros.
#[derive(Debug, Clone, Deserialize)]
pub struct SheetsConfig {
    #[serde(default = "default_sheets_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub spreadsheet_id: String,
    /// Aba a processar; sem valor, usa a aba padrão do modo.
    #[serde(default)]
    pub worksheet: Option<String>,
    /// Token OAuth com escopo de escrita na planilha.
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Credenciais resolvidas para o login.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

// URL padrão do ponto de venda.
fn default_base_url() -> String {
    "https://pos.buenalive.com".to_string()
}

// chromedriver escuta na porta 9515 por padrão.
fn default_webdriver_url() -> String {
    "http://localhost:9515".to_string()
}

fn default_headless() -> bool {
    true
}

fn default_stage_retries() -> u32 {
    2
}

fn default_screenshot_dir() -> PathBuf {
    PathBuf::from("screenshots")
}

fn default_headless_ms() -> u64 {
    3000
}

fn default_visible_ms() -> u64 {
    5000
}

fn default_poll_ms() -> u64 {
    250
}

fn default_classify_ms() -> u64 {
    2000
}

fn default_confirmation_ms() -> u64 {
    10_000
}

fn default_navigation_ms() -> u64 {
    10_000
}

fn default_sheets_api_base() -> String {
    "https://sheets.googleapis.com/v4".to_string()
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            headless_ms: default_headless_ms(),
            visible_ms: default_visible_ms(),
            poll_ms: default_poll_ms(),
            classify_ms: default_classify_ms(),
            confirmation_ms: default_confirmation_ms(),
            navigation_ms: default_navigation_ms(),
        }
    }
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            api_base: default_sheets_api_base(),
            spreadsheet_id: String::new(),
            worksheet: None,
            token: String::new(),
        }
    }
}

impl Default for TicketeraConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            webdriver_url: default_webdriver_url(),
            headless: default_headless(),
            stage_retries: default_stage_retries(),
            screenshot_dir: default_screenshot_dir(),
            timeouts: Timeouts::default(),
            sheets: SheetsConfig::default(),
            credentials: CredentialsConfig::default(),
            vocabulary: Vocabulary::default(),
        }
    }
}

impl Timeouts {
    pub fn budgets(&self) -> Budgets {
        Budgets {
            headless: Duration::from_millis(self.headless_ms),
            visible: Duration::from_millis(self.visible_ms),
            poll: Duration::from_millis(self.poll_ms),
        }
    }

    pub fn classify(&self) -> Duration {
        Duration::from_millis(self.classify_ms)
    }

    pub fn confirmation(&self) -> Duration {
        Duration::from_millis(self.confirmation_ms)
    }

    pub fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }
}

impl TicketeraConfig {
    /// Carrega a configuração de `path`, ou de `ticketera.toml` no diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let explicit = path.is_some();
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));

        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            toml::from_str::<TicketeraConfig>(&contents)
                .with_context(|| format!("parsing {}", path.display()))?
        } else if explicit {
            bail!("config file not found: {}", path.display());
        } else {
            Self::default()
        };

        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Variáveis de ambiente têm precedência sobre o arquivo de configuração.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.is_empty());
        if let Some(email) = non_empty("TICKETERA_EMAIL") {
            self.credentials.email = email;
        }
        if let Some(password) = non_empty("TICKETERA_PASSWORD") {
            self.credentials.password = password;
        }
        if let Some(token) = non_empty("GOOGLE_SHEETS_TOKEN") {
            self.sheets.token = token;
        }
    }

    /// Credenciais de login; ausentes é erro de configuração.
    pub fn credentials(&self) -> Result<Credentials, TicketeraError> {
        if self.credentials.email.is_empty() || self.credentials.password.is_empty() {
            return Err(TicketeraError::NoCredentials);
        }
        Ok(Credentials {
            email: self.credentials.email.clone(),
            password: self.credentials.password.clone(),
        })
    }

    /// Verifica a consistência da configuração sem acessar a rede.
    pub fn validate(&self) -> Result<(), TicketeraError> {
        for (name, url) in [
            ("base_url", &self.base_url),
            ("webdriver_url", &self.webdriver_url),
            ("sheets.api_base", &self.sheets.api_base),
        ] {
            reqwest::Url::parse(url)
                .map_err(|e| TicketeraError::Config(format!("{name} is not a valid URL: {e}")))?;
        }
        if self.timeouts.poll_ms == 0 {
            return Err(TicketeraError::Config("timeouts.poll_ms must be positive".into()));
        }
        if self.timeouts.headless_ms < self.timeouts.poll_ms
            || self.timeouts.visible_ms < self.timeouts.poll_ms
        {
            return Err(TicketeraError::Config(
                "step budgets must be at least one poll interval".into(),
            ));
        }
        if !self
            .vocabulary
            .document_types
            .contains(&self.vocabulary.default_document_type)
        {
            return Err(TicketeraError::Config(format!(
                "default document type '{}' is not a known document type",
                self.vocabulary.default_document_type
            )));
        }
        Ok(())
    }
}
