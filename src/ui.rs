//! Interface de terminal do ticketera: barra de progresso e saída colorida.
//!
//! Usa as crates `indicatif` para a barra de progresso e `console` para
//! estilização com cores. O [`BatchProgress`] consome o canal de eventos do
//! lote e acompanha visualmente a emissão no terminal.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::config::TicketeraConfig;
use crate::events::{BatchEvent, Event};
use crate::orchestrator::{Counters, RunEnd};
use crate::session::EventSummary;
use crate::state_machine::ProcessingResult;

/// Indicador visual de progresso para a execução de um lote no terminal.
///
/// Exibe uma barra com um passo por registro e linhas coloridas para
/// emitidas (verde), puladas (amarelo) e erros (vermelho).
pub struct BatchProgress {
    // Barra de progresso do indicatif.
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
    dim: Style,
}

impl BatchProgress {
    /// Cria a barra; o tamanho é definido quando o lote começa.
    pub fn new() -> Self {
        let pb = ProgressBar::new(0);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .map(|s| s.progress_chars("=> "))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            dim: Style::new().dim(),
        }
    }

    /// Consome eventos até o canal fechar.
    pub async fn consume(self, mut rx: UnboundedReceiver<Event>) {
        while let Some(event) = rx.recv().await {
            self.handle(&event);
        }
        self.pb.finish_and_clear();
    }

    /// Atualiza a barra e imprime as linhas relevantes de um evento.
    pub fn handle(&self, event: &Event) {
        match &event.event {
            BatchEvent::RunStarted { total, .. } => {
                self.pb.set_length(*total as u64);
                self.pb.println(format!("{}", self.dim.apply_to(event)));
            }
            BatchEvent::RecordStarted { row, name, .. } => {
                self.pb.set_message(format!("row {row}: {name}"));
            }
            BatchEvent::StageEntered { row, stage } => {
                self.pb.set_message(format!("row {row}: {stage}"));
            }
            BatchEvent::StageRetry {
                row,
                stage,
                attempt,
                max,
                reason,
            } => {
                self.pb.println(format!(
                    "  {} row {row}: retry {attempt}/{max} of {stage}: {reason}",
                    self.yellow.apply_to("↻")
                ));
            }
            BatchEvent::RecordFinished { result, .. } => {
                self.pb.inc(1);
                self.pb.println(format!("  {} {}", self.symbol(result), event.event));
            }
            BatchEvent::RunFinished { counters, end, .. } => {
                self.pb.finish_and_clear();
                self.print_summary(counters, end);
            }
        }
    }

    fn symbol(&self, result: &ProcessingResult) -> String {
        match result {
            ProcessingResult::Issued { .. } => self.green.apply_to("✓").to_string(),
            ProcessingResult::Skipped(_) => self.yellow.apply_to("⊘").to_string(),
            ProcessingResult::Error { .. } => self.red.apply_to("✗").to_string(),
        }
    }

    fn print_summary(&self, counters: &Counters, end: &RunEnd) {
        let end_style = match end {
            RunEnd::Completed => &self.green,
            RunEnd::Cancelled => &self.yellow,
            RunEnd::SessionLost(_) => &self.red,
        };
        println!();
        println!("{}", end_style.apply_to(format!("─── Run {end} ───")));
        println!("  issued:  {}", self.green.apply_to(counters.issued));
        println!("  skipped: {}", self.yellow.apply_to(counters.skipped));
        println!("  errors:  {}", self.red.apply_to(counters.errors));
        println!("  total:   {}/{}", counters.processed(), counters.total);
    }
}

impl Default for BatchProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Imprime a lista de eventos disponíveis para emissão.
pub fn print_events(events: &[EventSummary]) {
    if events.is_empty() {
        println!("no events available for issuance");
        return;
    }
    let dim = Style::new().dim();
    for event in events {
        println!("  {:>6}  {}", dim.apply_to(&event.id), event.name);
    }
}

/// Imprime a configuração resolvida, sem segredos.
pub fn print_config(config: &TicketeraConfig) {
    let green = Style::new().green().bold();
    let set = |value: &str| if value.is_empty() { "(unset)" } else { "(set)" };

    println!("{}", green.apply_to("─── Configuration ───"));
    println!("  base_url:       {}", config.base_url);
    println!("  webdriver_url:  {}", config.webdriver_url);
    println!("  headless:       {}", config.headless);
    println!("  stage_retries:  {}", config.stage_retries);
    println!("  screenshot_dir: {}", config.screenshot_dir.display());
    println!(
        "  timeouts:       headless {}ms, visible {}ms, poll {}ms, classify {}ms, confirmation {}ms, navigation {}ms",
        config.timeouts.headless_ms,
        config.timeouts.visible_ms,
        config.timeouts.poll_ms,
        config.timeouts.classify_ms,
        config.timeouts.confirmation_ms,
        config.timeouts.navigation_ms,
    );
    println!("  spreadsheet:    {}", config.sheets.spreadsheet_id);
    println!(
        "  worksheet:      {}",
        config.sheets.worksheet.as_deref().unwrap_or("(per mode)")
    );
    println!("  sheets token:   {}", set(&config.sheets.token));
    println!("  login email:    {}", config.credentials.email);
    println!("  login password: {}", set(&config.credentials.password));
    println!(
        "  document types: {}",
        config.vocabulary.document_types.join(", ")
    );
}
