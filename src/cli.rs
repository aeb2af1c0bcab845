//! Interface de linha de comando do ticketera baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (events, run, check)
//! e flags globais (--config, --verbose, --headless/--visible, --retries).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::state_machine::TicketKind;

/// Ticketera: emissão de entradas em lote no ponto de venda remoto.
#[derive(Debug, Parser)]
#[command(name = "ticketera", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho do arquivo de configuração (padrão: ./ticketera.toml).
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Roda o navegador sem janela, sobrescrevendo a configuração.
    #[arg(long, global = true, default_value_t = false, conflicts_with = "visible")]
    pub headless: bool,

    /// Mostra a janela do navegador em vez de rodar em modo headless.
    #[arg(long, global = true, default_value_t = false)]
    pub visible: bool,

    /// Número máximo de retentativas por etapa.
    #[arg(long, global = true)]
    pub retries: Option<u32>,
}

impl Cli {
    /// Modo headless pedido na linha de comando, se houver.
    pub fn headless_override(&self) -> Option<bool> {
        match (self.headless, self.visible) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Faz login e lista os eventos disponíveis para emissão.
    Events,

    /// Emite as entradas da planilha para um evento.
    Run {
        /// Id ou nome do evento.
        #[arg(long, short)]
        event: String,

        /// Tipo de entrada emitida.
        #[arg(long, value_enum, default_value_t = TicketKind::Nominated)]
        mode: TicketKind,

        /// Aba da planilha; sem valor, usa a aba padrão do modo.
        #[arg(long)]
        worksheet: Option<String>,

        /// Id da planilha, sobrescrevendo a configuração.
        #[arg(long)]
        spreadsheet: Option<String>,
    },

    /// Valida a configuração e mostra os valores resolvidos, sem acessar a rede.
    Check,
}
