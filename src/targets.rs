//! Semantic targets of the remote point-of-sale UI.
//!
//! The sale screen is built from headless listbox/combobox widgets whose ids
//! are regenerated on every render; predicates lean on stable id fragments,
//! classes, visible text and widget order instead.

use crate::driver::ElementQuery;
use crate::locator::{LocatorStrategy, MatchRule};

const DASHBOARD_CARD_CLASS: &str = "block overflow-hidden rounded bg-white";

fn listbox_buttons() -> ElementQuery {
    ElementQuery::tag("button").attr_contains("id", "headlessui-listbox-button")
}

fn listbox_options() -> ElementQuery {
    ElementQuery::tag("li").attr_contains("id", "headlessui-listbox-option")
}

fn combobox_options() -> ElementQuery {
    ElementQuery::tag("li").attr_contains("id", "headlessui-combobox-option")
}

fn button_with_text(text: &str) -> ElementQuery {
    ElementQuery::tag("button").text_contains(text)
}

fn submit_with_text(text: &str) -> ElementQuery {
    button_with_text(text).attr("type", "submit")
}

/// Exact label, then fuzzy label, then each alias fuzzily.
fn labelled_option(
    name: &str,
    candidates: ElementQuery,
    label: &str,
    aliases: &[String],
) -> LocatorStrategy {
    let mut strategy = LocatorStrategy::new(format!("{name} '{label}'"))
        .labelled(candidates.clone(), label, MatchRule::Exact)
        .labelled(candidates.clone(), label, MatchRule::Fuzzy);
    for alias in aliases {
        strategy = strategy.labelled(candidates.clone(), alias, MatchRule::Fuzzy);
    }
    strategy
}

// --- login and dashboard ---

pub fn username_input() -> LocatorStrategy {
    LocatorStrategy::new("username input")
        .unique(ElementQuery::tag("input").attr("id", "username"))
        .unique(ElementQuery::tag("input").attr("type", "email"))
}

pub fn password_input() -> LocatorStrategy {
    LocatorStrategy::new("password input")
        .unique(ElementQuery::tag("input").attr("id", "password"))
        .unique(ElementQuery::tag("input").attr("type", "password"))
}

pub fn login_button() -> LocatorStrategy {
    LocatorStrategy::new("login button").unique(submit_with_text("Ingresar"))
}

pub fn backoffice_entry() -> LocatorStrategy {
    LocatorStrategy::new("backoffice entry")
        .unique(ElementQuery::tag("h2").own_text_contains("Backoffice"))
}

pub fn dashboard() -> LocatorStrategy {
    LocatorStrategy::new("dashboard")
        .nth(ElementQuery::tag("li").class(DASHBOARD_CARD_CLASS), 0)
        .nth(ElementQuery::tag("main"), 0)
}

/// Event title anchors, one per dashboard card.
pub fn event_names() -> ElementQuery {
    ElementQuery::tag("a")
        .class("font-semibold")
        .within(ElementQuery::tag("li").class(DASHBOARD_CARD_CLASS))
}

/// "Emitir stock" links, one per dashboard card, in the same order as [`event_names`].
pub fn event_issue_links() -> ElementQuery {
    ElementQuery::tag("a")
        .text_contains("Emitir stock")
        .within(ElementQuery::tag("li").class(DASHBOARD_CARD_CLASS))
}

/// Any control proving the sale screen rendered.
pub fn sale_form_ready() -> LocatorStrategy {
    LocatorStrategy::new("sale form")
        .nth(listbox_buttons(), 0)
        .nth(ElementQuery::tag("form"), 0)
        .nth(ElementQuery::tag("input"), 0)
}

// --- sale screen: function, sector, tariff, quantity ---

pub fn function_selector() -> LocatorStrategy {
    LocatorStrategy::new("function selector")
        .nth(listbox_buttons().class("cursor-default"), 0)
        .nth(listbox_buttons(), 0)
}

pub fn sector_selector() -> LocatorStrategy {
    LocatorStrategy::new("sector selector").nth(listbox_buttons(), 1)
}

pub fn document_type_selector() -> LocatorStrategy {
    LocatorStrategy::new("document type selector").nth(listbox_buttons(), 2)
}

pub fn listbox_option(name: &str, label: &str, aliases: &[String]) -> LocatorStrategy {
    labelled_option(name, listbox_options(), label, aliases)
}

pub fn first_listbox_option() -> LocatorStrategy {
    LocatorStrategy::new("first listbox option").nth(listbox_options(), 0)
}

pub fn tariff_input() -> LocatorStrategy {
    LocatorStrategy::new("tariff selector")
        .unique(ElementQuery::tag("input").attr_contains("id", "headlessui-combobox-input"))
        .unique(ElementQuery::tag("input").attr("role", "combobox"))
}

pub fn tariff_option(label: &str, aliases: &[String]) -> LocatorStrategy {
    labelled_option("tariff option", combobox_options(), label, aliases)
}

pub fn quantity_input() -> LocatorStrategy {
    LocatorStrategy::new("quantity input")
        .unique(ElementQuery::tag("input").attr("id", "quantity"))
        .unique(ElementQuery::tag("input").attr("name", "quantity"))
        .unique(ElementQuery::tag("input").attr("type", "number"))
}

pub fn continue_button() -> LocatorStrategy {
    LocatorStrategy::new("continue button")
        .unique(submit_with_text("Continuar").class("self-end"))
        .unique(button_with_text("Continuar").class("bg-primary-600"))
}

// --- attendees ---

pub fn load_attendees_button() -> LocatorStrategy {
    LocatorStrategy::new("load attendees button").unique(button_with_text("Cargar asistentes"))
}

/// Input of the first attendee holder; `field` is `firstName`, `lastName` or `documentNumber`.
pub fn holder_input(field: &str) -> LocatorStrategy {
    let id = format!("holders.0.{field}");
    LocatorStrategy::new(format!("attendee {field} input"))
        .unique(ElementQuery::tag("input").attr("id", &id))
        .unique(ElementQuery::tag("input").attr("name", &id))
}

pub fn save_attendees_button() -> LocatorStrategy {
    LocatorStrategy::new("save attendees button").unique(submit_with_text("Guardar asistentes"))
}

pub fn skip_prompt() -> LocatorStrategy {
    LocatorStrategy::new("skip prompt")
        .unique(submit_with_text("Omitir"))
        .unique(button_with_text("Omitir").class("bg-primary-600"))
}

pub fn skip_small() -> LocatorStrategy {
    LocatorStrategy::new("small skip prompt").unique(button_with_text("Omitir").class("text-xs"))
}

// --- delivery, reservation, payment ---

pub fn delivery_channel() -> LocatorStrategy {
    LocatorStrategy::new("delivery channel").unique(button_with_text("Quentro").class("group"))
}

pub fn email_delivery() -> LocatorStrategy {
    LocatorStrategy::new("send by email option")
        .unique(button_with_text("Enviar por email").class("group"))
}

pub fn email_input() -> LocatorStrategy {
    LocatorStrategy::new("email input")
        .unique(ElementQuery::tag("input").attr("id", "email"))
        .unique(ElementQuery::tag("input").attr("name", "email"))
}

pub fn reserve_button() -> LocatorStrategy {
    LocatorStrategy::new("reserve button")
        .unique(button_with_text("Reservar entradas"))
        .unique(
            ElementQuery::tag("button")
                .class("bg-primary-600")
                .class("text-base"),
        )
}

/// Rendered once a reservation is accepted.
pub fn payment_options() -> LocatorStrategy {
    LocatorStrategy::new("payment options").unique(ElementQuery::tag("div").attr("role", "radiogroup"))
}

/// Courtesy toggle: a styled `role="radio"` div, not a native input.
pub fn courtesy_toggle() -> LocatorStrategy {
    let radios = ElementQuery::tag("div")
        .attr("role", "radio")
        .within(ElementQuery::tag("div").attr("role", "radiogroup"));
    LocatorStrategy::new("courtesy toggle")
        .labelled(radios.clone(), "Cortesía", MatchRule::Exact)
        .labelled(radios, "cortesia", MatchRule::Fuzzy)
}

pub fn pay_button() -> LocatorStrategy {
    LocatorStrategy::new("pay button")
        .unique(submit_with_text("Pagar"))
        .unique(button_with_text("Confirmar").class("bg-primary-600"))
        .unique(button_with_text("Finalizar").class("bg-primary-600"))
}

pub fn duplicate_banner() -> LocatorStrategy {
    LocatorStrategy::new("duplicate document banner").nth(
        ElementQuery::tag("div")
            .attr("role", "alert")
            .text_contains("duplicatedDocuments"),
        0,
    )
}

pub fn error_banner() -> LocatorStrategy {
    LocatorStrategy::new("error banner").nth(ElementQuery::tag("div").attr("role", "alert"), 0)
}

// --- confirmation ---

pub fn ticket_number() -> LocatorStrategy {
    LocatorStrategy::new("ticket number")
        .unique(
            ElementQuery::tag("p")
                .class("text-gray-500")
                .own_text_contains("#"),
        )
        .unique(ElementQuery::tag("span").own_text_contains("#"))
        .unique(ElementQuery::tag("div").own_text_contains("#"))
        .nth(ElementQuery::any().class("text-sm").own_text_contains("#"), 0)
}

pub fn another_sale_button() -> LocatorStrategy {
    LocatorStrategy::new("another sale button").unique(button_with_text("Realizar otra venta"))
}
