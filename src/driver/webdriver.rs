use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use super::error::DriverError;
use super::types::{
    AlwaysMatch, Capabilities, ChromeOptions, ELEMENT_KEY, ElementRef, FindRequest,
    NewSessionRequest, NewSessionValue, ScriptRequest, SendKeysRequest, TimeoutsRequest,
    UrlRequest, W3cError, WireResponse,
};
use super::{Browser, ClickStyle, ElementId, ElementQuery};

const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";

/// Flags that keep a long batch run lean; headless adds its own pair.
const CHROME_ARGS: &[&str] = &[
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--disable-extensions",
    "--disable-plugins",
    "--disable-background-timer-throttling",
    "--disable-renderer-backgrounding",
    "--disable-backgrounding-occluded-windows",
    "--disable-client-side-phishing-detection",
    "--disable-default-apps",
    "--no-first-run",
    "--disable-ipc-flooding-protection",
];

/// W3C WebDriver client bound to one browser session.
pub struct WebDriverClient {
    client: Client,
    base_url: String,
    session_id: String,
}

impl WebDriverClient {
    /// Start a new Chrome session on the driver at `base_url`.
    pub async fn connect(
        base_url: Option<&str>,
        headless: bool,
        page_load_ms: u64,
    ) -> Result<Self, DriverError> {
        let base_url = base_url
            .unwrap_or(DEFAULT_WEBDRIVER_URL)
            .trim_end_matches('/')
            .to_string();
        let client = http_client()?;

        let mut args: Vec<String> = CHROME_ARGS.iter().map(|a| a.to_string()).collect();
        if headless {
            args.push("--headless=new".into());
            args.push("--window-size=1920,1080".into());
        }
        let req = NewSessionRequest {
            capabilities: Capabilities {
                always_match: AlwaysMatch {
                    browser_name: "chrome".into(),
                    chrome_options: ChromeOptions { args },
                },
            },
        };

        let response = client
            .post(format!("{base_url}/session"))
            .json(&req)
            .send()
            .await?;
        let value: NewSessionValue = decode(response).await.map_err(|e| match e {
            DriverError::Protocol { code, message, .. } => {
                DriverError::SessionLost(format!("could not start browser: {code}: {message}"))
            }
            other => other,
        })?;
        debug!(session = %value.session_id, headless, "webdriver session started");

        let driver = Self {
            client,
            base_url,
            session_id: value.session_id,
        };
        driver
            .command::<Value>(
                Method::POST,
                "/timeouts",
                Some(json!(TimeoutsRequest {
                    page_load: page_load_ms,
                    implicit: 0,
                })),
            )
            .await?;
        Ok(driver)
    }

    /// Attach to an already running session.
    #[cfg(test)]
    pub fn with_session(base_url: &str, session_id: &str) -> Result<Self, DriverError> {
        Ok(Self {
            client: http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            session_id: session_id.to_string(),
        })
    }

    #[cfg(test)]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Close the browser session.
    pub async fn quit(self) -> Result<(), DriverError> {
        self.command::<Value>(Method::DELETE, "", None).await?;
        Ok(())
    }

    async fn command<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, DriverError> {
        let url = format!("{}/session/{}{path}", self.base_url, self.session_id);
        debug!(%method, path, "webdriver command");
        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await?;
        decode(response).await
    }

    async fn execute(&self, script: &str, element: &ElementId) -> Result<Value, DriverError> {
        let req = ScriptRequest {
            script: script.to_string(),
            args: vec![element_arg(element)],
        };
        self.command(Method::POST, "/execute/sync", Some(json!(req)))
            .await
    }
}

fn http_client() -> Result<Client, DriverError> {
    let client = Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(60))
        .build()?;
    Ok(client)
}

fn element_arg(element: &ElementId) -> Value {
    json!({ ELEMENT_KEY: element.0 })
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, DriverError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(match serde_json::from_str::<WireResponse<W3cError>>(&body) {
            Ok(err) => DriverError::from_w3c(status.as_u16(), &err.value.error, &err.value.message),
            Err(_) => DriverError::Protocol {
                status: status.as_u16(),
                code: "unknown error".into(),
                message: body,
            },
        });
    }

    let parsed: WireResponse<T> =
        serde_json::from_str(&body).map_err(|e| DriverError::Malformed(e.to_string()))?;
    Ok(parsed.value)
}

impl Browser for WebDriverClient {
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        let req = UrlRequest {
            url: url.to_string(),
        };
        self.command::<Value>(Method::POST, "/url", Some(json!(req)))
            .await?;
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String, DriverError> {
        self.command(Method::GET, "/url", None).await
    }

    async fn find_all(&mut self, query: &ElementQuery) -> Result<Vec<ElementId>, DriverError> {
        let req = FindRequest {
            using: "xpath".into(),
            value: query.to_xpath(),
        };
        let found: Vec<ElementRef> = self
            .command(Method::POST, "/elements", Some(json!(req)))
            .await?;
        Ok(found.into_iter().map(|e| ElementId(e.id)).collect())
    }

    async fn text(&mut self, element: &ElementId) -> Result<String, DriverError> {
        self.command(Method::GET, &format!("/element/{}/text", element.0), None)
            .await
    }

    async fn attribute(
        &mut self,
        element: &ElementId,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        self.command(
            Method::GET,
            &format!("/element/{}/attribute/{name}", element.0),
            None,
        )
        .await
    }

    async fn click(&mut self, element: &ElementId, style: ClickStyle) -> Result<(), DriverError> {
        match style {
            ClickStyle::Script => {
                self.execute("arguments[0].click();", element).await?;
            }
            ClickStyle::Native => {
                self.execute("arguments[0].scrollIntoView({block: 'center'});", element)
                    .await?;
                self.command::<Value>(
                    Method::POST,
                    &format!("/element/{}/click", element.0),
                    Some(json!({})),
                )
                .await?;
            }
        }
        Ok(())
    }

    async fn type_text(&mut self, element: &ElementId, text: &str) -> Result<(), DriverError> {
        self.command::<Value>(
            Method::POST,
            &format!("/element/{}/clear", element.0),
            Some(json!({})),
        )
        .await?;
        let req = SendKeysRequest {
            text: text.to_string(),
        };
        self.command::<Value>(
            Method::POST,
            &format!("/element/{}/value", element.0),
            Some(json!(req)),
        )
        .await?;
        Ok(())
    }

    async fn page_excerpt(&mut self, max_chars: usize) -> Result<String, DriverError> {
        let req = ScriptRequest {
            script: "return document.body ? document.body.innerText : '';".into(),
            args: Vec::new(),
        };
        let text: Option<String> = self
            .command(Method::POST, "/execute/sync", Some(json!(req)))
            .await?;
        Ok(text.unwrap_or_default().chars().take(max_chars).collect())
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, DriverError> {
        let encoded: String = self.command(Method::GET, "/screenshot", None).await?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| DriverError::Malformed(format!("screenshot is not base64: {e}")))
    }
}
