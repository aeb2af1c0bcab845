//! A scripted stand-in for the remote point-of-sale site, built on the fake browser.
//!
//! Screens appear and disappear through click hooks the way the real sale
//! flow does: sale form, attendees, checkout, payment, confirmation.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use crate::driver::fake::{FakeBrowser, FakePage};

pub const BASE_URL: &str = "https://pos.example";
pub const EVENT_ID: &str = "7";

const FUNCTIONS: [&str; 2] = ["Función 20:00 hs", "Función 23:30 hs"];
const SECTORS: [&str; 3] = ["Campo Águila", "Platea Preferencial", "Platea Baja"];
const TARIFFS: [&str; 2] = ["ENTRADAS GENERALES - Fase 1", "Cortesía RRPP"];
const DOCUMENT_TYPES: [&str; 3] = ["DNI", "Pasaporte", "Otro"];

#[derive(Debug, Clone, Default)]
pub struct SiteState {
    pub function: Option<String>,
    pub sector: Option<String>,
    pub tariff: Option<String>,
    pub document_type: Option<String>,
    pub email: Option<String>,
    pub courtesy_selected: bool,
    /// (document number, ticket) per successful payment.
    pub issued: Vec<(String, String)>,
    pub reservations: u32,
    duplicates: HashSet<String>,
    courtesy_available: bool,
    rejection: Option<String>,
    lose_session_at_reservation: Option<u32>,
}

#[derive(Clone)]
pub struct FakeSite {
    state: Rc<RefCell<SiteState>>,
}

impl FakeSite {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(SiteState {
                courtesy_available: true,
                ..SiteState::default()
            })),
        }
    }

    pub fn with_duplicate(self, document: &str) -> Self {
        self.state.borrow_mut().duplicates.insert(document.to_string());
        self
    }

    pub fn without_courtesy(self) -> Self {
        self.state.borrow_mut().courtesy_available = false;
        self
    }

    /// Every reservation is refused with `banner`.
    pub fn rejecting(self, banner: &str) -> Self {
        self.state.borrow_mut().rejection = Some(banner.to_string());
        self
    }

    /// The browser session dies on the `n`-th reservation (1-based).
    pub fn losing_session_at_reservation(self, n: u32) -> Self {
        self.state.borrow_mut().lose_session_at_reservation = Some(n);
        self
    }

    pub fn state(&self) -> SiteState {
        self.state.borrow().clone()
    }

    pub fn sale_url() -> String {
        format!("{BASE_URL}/events/{EVENT_ID}/sale")
    }

    /// A browser sitting on the sale screen with the whole flow wired up.
    pub fn browser(&self) -> FakeBrowser {
        let mut page = FakePage::new(&Self::sale_url());
        build_sale_form(&mut page);
        let mut browser = page.into_browser();
        self.wire(&mut browser);
        browser
    }

    fn wire(&self, browser: &mut FakeBrowser) {
        browser.on_navigate(|page| {
            if page.url.ends_with("/sale") {
                page.clear();
                build_sale_form(page);
            }
        });

        browser.on_click("fn-button", |page| {
            open_list(page, "sale-form", "fn-list", "fn-opt", &FUNCTIONS);
        });
        browser.on_click("sector-button", |page| {
            open_list(page, "sale-form", "sector-list", "sector-opt", &SECTORS);
        });
        browser.on_click("doc-button", |page| {
            open_list(page, "holders", "doc-list", "doc-opt", &DOCUMENT_TYPES);
        });

        for (i, label) in FUNCTIONS.iter().enumerate() {
            let state = Rc::clone(&self.state);
            browser.on_click(&format!("fn-opt-{i}"), move |page| {
                state.borrow_mut().function = Some(label.to_string());
                page.remove("fn-list");
            });
        }
        for (i, label) in SECTORS.iter().enumerate() {
            let state = Rc::clone(&self.state);
            browser.on_click(&format!("sector-opt-{i}"), move |page| {
                state.borrow_mut().sector = Some(label.to_string());
                page.remove("sector-list");
            });
        }
        for (i, label) in DOCUMENT_TYPES.iter().enumerate() {
            let state = Rc::clone(&self.state);
            browser.on_click(&format!("doc-opt-{i}"), move |page| {
                state.borrow_mut().document_type = Some(label.to_string());
                page.remove("doc-list");
            });
        }
        for (i, label) in TARIFFS.iter().enumerate() {
            let state = Rc::clone(&self.state);
            browser.on_click(&format!("tariff-opt-{i}"), move |_| {
                state.borrow_mut().tariff = Some(label.to_string());
            });
        }

        browser.on_click("continue-1", |page| {
            page.remove("continue-1");
            let section = page.add_ephemeral(None, "attendees", "section", &[], "");
            page.add(
                Some(section),
                "load-attendees",
                "button",
                &[("type", "button")],
                "Cargar asistentes",
            );
            page.add(
                Some(section),
                "skip-attendees",
                "button",
                &[("type", "submit"), ("class", "bg-primary-600")],
                "Omitir",
            );
        });

        browser.on_click("load-attendees", |page| {
            let Some(section) = page.index_of("attendees") else {
                return;
            };
            let holders = page.add(Some(section), "holders", "div", &[], "");
            page.add(
                Some(holders),
                "doc-button",
                "button",
                &[("id", "headlessui-listbox-button-4"), ("class", "relative rounded")],
                "Tipo de documento",
            );
            for (key, field) in [
                ("first-name", "firstName"),
                ("last-name", "lastName"),
                ("doc-number", "documentNumber"),
            ] {
                let id = format!("holders.0.{field}");
                page.add(Some(holders), key, "input", &[("id", id.as_str())], "");
            }
            page.add(
                Some(holders),
                "save-attendees",
                "button",
                &[("type", "submit")],
                "Guardar asistentes",
            );
        });

        browser.on_click("save-attendees", open_checkout);
        browser.on_click("skip-attendees", open_checkout);

        browser.on_click("quentro", |page| {
            let Some(checkout) = page.index_of("checkout") else {
                return;
            };
            page.add(
                Some(checkout),
                "email-delivery",
                "button",
                &[("class", "group flex")],
                "Enviar por email",
            );
        });

        browser.on_click("email-delivery", |page| {
            let Some(checkout) = page.index_of("checkout") else {
                return;
            };
            page.add(Some(checkout), "email", "input", &[("id", "email")], "");
            page.add(
                Some(checkout),
                "continue-2",
                "button",
                &[("type", "submit"), ("class", "self-end")],
                "Continuar",
            );
            page.add(
                Some(checkout),
                "reserve",
                "button",
                &[("class", "bg-primary-600 text-base")],
                "Reservar entradas",
            );
        });

        let state = Rc::clone(&self.state);
        browser.on_click("continue-2", move |page| {
            state.borrow_mut().email = page.value_of("email").map(str::to_string);
        });

        let state = Rc::clone(&self.state);
        browser.on_click("reserve", move |page| {
            let mut state = state.borrow_mut();
            state.reservations += 1;
            if state.lose_session_at_reservation == Some(state.reservations) {
                page.session_lost = true;
                return;
            }
            let Some(checkout) = page.index_of("checkout") else {
                return;
            };
            if let Some(banner) = &state.rejection {
                page.add(Some(checkout), "alert", "div", &[("role", "alert")], banner);
                return;
            }
            let document = page.value_of("doc-number").unwrap_or_default();
            if state.duplicates.contains(document) {
                page.add(
                    Some(checkout),
                    "alert",
                    "div",
                    &[("role", "alert")],
                    "errors.duplicatedDocuments",
                );
                return;
            }
            let group = page.add(Some(checkout), "payments", "div", &[("role", "radiogroup")], "");
            if state.courtesy_available {
                page.add(Some(group), "radio-courtesy", "div", &[("role", "radio")], "Cortesía");
            }
            page.add(Some(group), "radio-card", "div", &[("role", "radio")], "Tarjeta");
            page.add(Some(checkout), "pay", "button", &[("type", "submit")], "Pagar");
        });

        let state = Rc::clone(&self.state);
        browser.on_click("radio-courtesy", move |_| {
            state.borrow_mut().courtesy_selected = true;
        });

        let state = Rc::clone(&self.state);
        browser.on_click("pay", move |page| {
            let mut state = state.borrow_mut();
            let ticket = format!("#{}", 1001 + state.issued.len());
            let document = page.value_of("doc-number").unwrap_or_default().to_string();
            state.issued.push((document, ticket.clone()));

            page.remove("checkout");
            let done = page.add_ephemeral(None, "confirmation", "div", &[], "");
            page.add(
                Some(done),
                "ticket",
                "p",
                &[("class", "text-sm text-gray-500")],
                &format!("Orden {ticket}"),
            );
            page.add(Some(done), "another-sale", "button", &[], "Realizar otra venta");
        });

        browser.on_click("another-sale", |page| {
            page.clear();
            build_sale_form(page);
        });
    }
}

fn build_sale_form(page: &mut FakePage) {
    let form = page.add_ephemeral(None, "sale-form", "form", &[], "");
    page.add(
        Some(form),
        "fn-button",
        "button",
        &[("id", "headlessui-listbox-button-1"), ("class", "relative cursor-default")],
        "Función",
    );
    page.add(
        Some(form),
        "sector-button",
        "button",
        &[("id", "headlessui-listbox-button-2"), ("class", "relative rounded")],
        "Sector",
    );
    page.add(
        Some(form),
        "tariff-input",
        "input",
        &[("id", "headlessui-combobox-input-3"), ("role", "combobox")],
        "",
    );
    let list = page.add(Some(form), "tariff-list", "ul", &[("role", "listbox")], "");
    for (i, label) in TARIFFS.iter().enumerate() {
        let id = format!("headlessui-combobox-option-{i}");
        page.add(Some(list), &format!("tariff-opt-{i}"), "li", &[("id", id.as_str())], label);
    }
    page.add(
        Some(form),
        "quantity",
        "input",
        &[("id", "quantity"), ("type", "number")],
        "",
    );
    page.add(
        Some(form),
        "continue-1",
        "button",
        &[("type", "submit"), ("class", "self-end bg-primary-600")],
        "Continuar",
    );
}

fn open_list(page: &mut FakePage, parent: &str, list: &str, prefix: &str, labels: &[&str]) {
    let Some(parent) = page.index_of(parent) else {
        return;
    };
    let ul = page.add(Some(parent), list, "ul", &[("role", "listbox")], "");
    for (i, label) in labels.iter().enumerate() {
        let id = format!("headlessui-listbox-option-{prefix}-{i}");
        page.add(Some(ul), &format!("{prefix}-{i}"), "li", &[("id", id.as_str())], label);
    }
}

fn open_checkout(page: &mut FakePage) {
    page.remove("sale-form");
    page.remove("attendees");
    let checkout = page.add_ephemeral(None, "checkout", "div", &[], "");
    page.add(
        Some(checkout),
        "quentro",
        "button",
        &[("class", "group flex")],
        "Quentro",
    );
}
