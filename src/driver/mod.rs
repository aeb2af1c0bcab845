//! Browser automation capability the pipeline depends on.
//!
//! The core only needs navigation, element queries, click/type dispatch and a
//! visual snapshot; [`WebDriverClient`] provides them over the W3C protocol.

pub mod error;
#[cfg(test)]
pub mod fake;
pub mod query;
pub mod types;
pub mod webdriver;

pub use error::DriverError;
pub use query::ElementQuery;
pub use webdriver::WebDriverClient;

/// Opaque handle to an element of the remote document.
///
/// Handles go stale whenever the remote UI re-renders; callers re-resolve
/// instead of caching them across polls.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementId(pub String);

/// How a click is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickStyle {
    /// Scroll the element into view, then a native pointer click.
    Native,
    /// `element.click()` from script; ignores overlays and viewport.
    Script,
}

/// Capability set of a browser automation driver.
pub trait Browser {
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError>;

    async fn current_url(&mut self) -> Result<String, DriverError>;

    /// All elements matching `query`, in document order.
    async fn find_all(&mut self, query: &ElementQuery) -> Result<Vec<ElementId>, DriverError>;

    /// Rendered text of an element.
    async fn text(&mut self, element: &ElementId) -> Result<String, DriverError>;

    async fn attribute(
        &mut self,
        element: &ElementId,
        name: &str,
    ) -> Result<Option<String>, DriverError>;

    async fn click(&mut self, element: &ElementId, style: ClickStyle) -> Result<(), DriverError>;

    /// Clears the control, then types `text` into it.
    async fn type_text(&mut self, element: &ElementId, text: &str) -> Result<(), DriverError>;

    /// Leading `max_chars` characters of the visible page text, for diagnostics.
    async fn page_excerpt(&mut self, max_chars: usize) -> Result<String, DriverError>;

    /// PNG bytes of the current viewport.
    async fn screenshot(&mut self) -> Result<Vec<u8>, DriverError>;
}
