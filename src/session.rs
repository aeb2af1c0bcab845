//! The authenticated handle on the remote point of sale.
//!
//! A [`Session`] owns the browser for the whole run. It logs in, lists the
//! events open for issuance, and navigates back to the chosen event's sale
//! screen whenever a record leaves the UI in an unknown state.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::Credentials;
use crate::driver::Browser;
use crate::error::SessionLost;
use crate::executor::{Action, StepExecutor, StepOutcome};
use crate::locator::{LocatorStrategy, Resolution, fold, resolve};
use crate::targets;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventSummary {
    pub id: String,
    pub name: String,
}

pub struct Session<B: Browser> {
    browser: B,
    base_url: String,
    executor: StepExecutor,
    navigation: Duration,
    event: Option<EventSummary>,
}

impl<B: Browser> Session<B> {
    pub fn new(browser: B, base_url: &str, executor: StepExecutor, navigation: Duration) -> Self {
        Self {
            browser,
            base_url: base_url.trim_end_matches('/').to_string(),
            executor,
            navigation,
            event: None,
        }
    }

    pub fn browser(&mut self) -> &mut B {
        &mut self.browser
    }

    pub fn into_browser(self) -> B {
        self.browser
    }

    pub fn event(&self) -> Option<&EventSummary> {
        self.event.as_ref()
    }

    pub async fn login(&mut self, credentials: &Credentials) -> Result<(), SessionLost> {
        info!(base_url = %self.base_url, "logging in");
        self.browser.navigate(&format!("{}/", self.base_url)).await?;

        self.require(
            &targets::username_input(),
            Action::TypeText(credentials.email.clone()),
        )
        .await?;
        self.require(
            &targets::password_input(),
            Action::TypeText(credentials.password.clone()),
        )
        .await?;
        self.require(&targets::login_button(), Action::Click).await?;
        self.require(&targets::backoffice_entry(), Action::Click)
            .await
            .map_err(|e| SessionLost::new(format!("login rejected: {}", e.reason)))?;
        self.require(&targets::dashboard(), Action::WaitForPresence)
            .await?;

        info!("logged in");
        Ok(())
    }

    /// Events listed on the dashboard, in display order.
    pub async fn list_events(&mut self) -> Result<Vec<EventSummary>, SessionLost> {
        let names = self.browser.find_all(&targets::event_names()).await?;
        let links = self.browser.find_all(&targets::event_issue_links()).await?;

        let mut events = Vec::new();
        for (name, link) in names.iter().zip(&links) {
            let name = self.browser.text(name).await?;
            let Some(href) = self.browser.attribute(link, "href").await? else {
                continue;
            };
            match parse_event_id(&href) {
                Some(id) => events.push(EventSummary { id, name }),
                None => debug!(%href, "event link without id"),
            }
        }
        debug!(count = events.len(), "events listed");
        Ok(events)
    }

    /// Select `event` and open its sale screen.
    pub async fn open_sale(&mut self, event: EventSummary) -> Result<(), SessionLost> {
        info!(event = %event.name, id = %event.id, "opening sale screen");
        self.event = Some(event);
        self.reset().await
    }

    pub fn sale_url(&self) -> Option<String> {
        self.event
            .as_ref()
            .map(|event| format!("{}/events/{}/sale", self.base_url, event.id))
    }

    /// Navigate back to the sale screen and wait for it to render.
    ///
    /// Landing on the login screen means the authentication expired.
    pub async fn reset(&mut self) -> Result<(), SessionLost> {
        let url = self
            .sale_url()
            .ok_or_else(|| SessionLost::new("no event selected"))?;
        debug!(%url, "recovery navigation");
        self.browser.navigate(&url).await?;

        if let Resolution::Found { .. } = resolve(&mut self.browser, &targets::username_input()).await? {
            return Err(SessionLost::new("authentication expired: login screen shown"));
        }
        self.require(&targets::sale_form_ready(), Action::WaitForPresence)
            .await
    }

    async fn require(&mut self, target: &LocatorStrategy, action: Action) -> Result<(), SessionLost> {
        let outcome = self
            .executor
            .perform_within(&mut self.browser, target, &action, self.navigation)
            .await?;
        match outcome {
            StepOutcome::Succeeded { .. } => Ok(()),
            StepOutcome::Transient { target, .. } => Err(SessionLost::new(format!(
                "{target} did not appear within {}ms",
                self.navigation.as_millis()
            ))),
            StepOutcome::Terminal { target, detail } => {
                Err(SessionLost::new(format!("{target}: {detail}")))
            }
        }
    }
}

impl<B: Browser> Session<B> {
    /// Whether the underlying browser still answers.
    pub async fn is_alive(&mut self) -> bool {
        !matches!(self.browser.current_url().await, Err(e) if e.is_fatal())
    }
}

/// Extract `<id>` from an `.../events/<id>/...` link.
pub fn parse_event_id(href: &str) -> Option<String> {
    let rest = href.split("/events/").nth(1)?;
    let id = rest.split(['/', '?', '#']).next()?;
    (!id.is_empty()).then(|| id.to_string())
}

/// Find an event by id, or by name ignoring case and accents.
pub fn find_event<'a>(events: &'a [EventSummary], wanted: &str) -> Option<&'a EventSummary> {
    let wanted = wanted.trim();
    if let Some(event) = events.iter().find(|e| e.id == wanted) {
        return Some(event);
    }
    let folded = fold(wanted);
    if let Some(event) = events.iter().find(|e| fold(&e.name) == folded) {
        return Some(event);
    }
    let mut partial = events
        .iter()
        .filter(|e| !folded.is_empty() && fold(&e.name).contains(&folded));
    match (partial.next(), partial.next()) {
        (Some(event), None) => Some(event),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::fake::{FakeBrowser, FakePage};
    use crate::executor::Mode;
    use crate::executor::tests::fast_budgets;
    use crate::testing::{BASE_URL, EVENT_ID, FakeSite};

    const CARD: &str = "block overflow-hidden rounded bg-white shadow";

    fn session(browser: FakeBrowser) -> Session<FakeBrowser> {
        Session::new(
            browser,
            BASE_URL,
            StepExecutor::new(Mode::Headless, fast_budgets()),
            Duration::from_millis(20),
        )
    }

    fn credentials() -> Credentials {
        Credentials {
            email: "ops@example.com".into(),
            password: "secret".into(),
        }
    }

    fn portal(accept: bool) -> FakeBrowser {
        let mut browser = FakePage::new("about:blank").into_browser();
        browser.on_navigate(|page| {
            if page.url == format!("{BASE_URL}/") {
                page.clear();
                page.add_ephemeral(None, "username", "input", &[("id", "username")], "");
                page.add_ephemeral(None, "password", "input", &[("id", "password")], "");
                page.add_ephemeral(None, "login", "button", &[("type", "submit")], "Ingresar");
            }
        });
        browser.on_click("login", move |page| {
            if !accept {
                return;
            }
            page.clear();
            page.add_ephemeral(None, "backoffice", "h2", &[], "Backoffice");
        });
        browser.on_click("backoffice", |page| {
            page.clear();
            let main = page.add_ephemeral(None, "main", "main", &[], "");
            for (i, (id, name)) in [("7", "Festival de Verano"), ("12", "Noche de Gala")]
                .iter()
                .enumerate()
            {
                let card = page.add(Some(main), &format!("card-{i}"), "li", &[("class", CARD)], "");
                page.add(
                    Some(card),
                    &format!("name-{i}"),
                    "a",
                    &[("class", "font-semibold text-lg")],
                    name,
                );
                let href = format!("{BASE_URL}/events/{id}/stock");
                page.add(Some(card), &format!("issue-{i}"), "a", &[("href", href.as_str())], "Emitir stock");
            }
        });
        browser
    }

    #[test]
    fn event_id_from_link() {
        assert_eq!(
            parse_event_id("https://pos.example/events/42/stock"),
            Some("42".into())
        );
        assert_eq!(parse_event_id("/events/abc?x=1"), Some("abc".into()));
        assert_eq!(parse_event_id("/events/"), None);
        assert_eq!(parse_event_id("/dashboard"), None);
    }

    #[test]
    fn find_event_by_id_or_name() {
        let events = vec![
            EventSummary {
                id: "7".into(),
                name: "Festival de Verano".into(),
            },
            EventSummary {
                id: "12".into(),
                name: "Noche de Gala".into(),
            },
        ];
        assert_eq!(find_event(&events, "12").unwrap().name, "Noche de Gala");
        assert_eq!(find_event(&events, "festival de verano").unwrap().id, "7");
        assert_eq!(find_event(&events, "GALA").unwrap().id, "12");
        assert!(find_event(&events, "de").is_none());
        assert!(find_event(&events, "Teatro").is_none());
    }

    #[tokio::test]
    async fn login_and_list_events() {
        let mut session = session(portal(true));
        session.login(&credentials()).await.unwrap();

        let page = &session.browser().page;
        assert_eq!(page.value_of("username"), Some("ops@example.com"));
        assert_eq!(page.value_of("password"), Some("secret"));

        let events = session.list_events().await.unwrap();
        assert_eq!(
            events,
            vec![
                EventSummary {
                    id: "7".into(),
                    name: "Festival de Verano".into()
                },
                EventSummary {
                    id: "12".into(),
                    name: "Noche de Gala".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn rejected_login_is_fatal() {
        let mut session = session(portal(false));
        let err = session.login(&credentials()).await.unwrap_err();
        assert!(err.reason.starts_with("login rejected"), "{}", err.reason);
    }

    #[tokio::test]
    async fn open_sale_waits_for_the_form() {
        let site = FakeSite::new();
        let mut session = session(site.browser());
        session
            .open_sale(EventSummary {
                id: EVENT_ID.into(),
                name: "Festival de Verano".into(),
            })
            .await
            .unwrap();
        assert_eq!(session.sale_url(), Some(FakeSite::sale_url()));
        assert_eq!(session.browser().page.navigations, vec![FakeSite::sale_url()]);
    }

    #[tokio::test]
    async fn reset_on_login_screen_is_session_lost() {
        let mut browser = FakePage::new("about:blank").into_browser();
        browser.on_navigate(|page| {
            page.clear();
            page.add_ephemeral(None, "username", "input", &[("id", "username")], "");
        });
        let mut session = session(browser);
        let err = session
            .open_sale(EventSummary {
                id: "7".into(),
                name: "x".into(),
            })
            .await
            .unwrap_err();
        assert!(err.reason.contains("login screen"));
    }

    #[tokio::test]
    async fn reset_without_event_is_refused() {
        let mut session = session(FakeSite::new().browser());
        assert!(session.reset().await.is_err());
        assert!(session.is_alive().await);

        session.browser().page.session_lost = true;
        assert!(!session.is_alive().await);
    }
}
