//! Interface de linha de comando do HERALD baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (create, schedule,
//! list, approve, reject, status, retry, post-now, run, sweep, activity)
//! e flags globais (--config, --verbose).

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::record::{Importance, NewPost, PostStatus};

/// HERALD — Publicação resiliente guiada por navegador.
#[derive(Debug, Parser)]
#[command(name = "herald", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho do arquivo de configuração (padrão: herald.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Conteúdo de uma nova publicação.
#[derive(Debug, Args)]
pub struct PostArgs {
    /// Texto da publicação.
    pub body: String,

    /// Imagem ou vídeo anexado; pode ser repetido.
    #[arg(long)]
    pub media: Vec<PathBuf>,

    /// Documento anexado (PDF, PPTX...). Exclusivo com --media.
    #[arg(long)]
    pub document: Option<PathBuf>,

    /// Link acrescentado ao fim do texto.
    #[arg(long)]
    pub link: Option<String>,

    /// Importância; high e critical exigem aprovação.
    #[arg(long, value_enum, default_value_t = Importance::Normal)]
    pub importance: Importance,
}

impl PostArgs {
    pub fn into_post(self, scheduled_at: Option<DateTime<Utc>>) -> NewPost {
        NewPost {
            body: self.body,
            media: self.media,
            document: self.document,
            link: self.link,
            scheduled_at,
            importance: self.importance,
        }
    }
}

/// Filtro de status aceito por `list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusFilter {
    Pending,
    Approved,
    Posted,
    Failed,
    Rejected,
    All,
}

impl StatusFilter {
    pub fn status(self) -> Option<PostStatus> {
        match self {
            StatusFilter::Pending => Some(PostStatus::Pending),
            StatusFilter::Approved => Some(PostStatus::Approved),
            StatusFilter::Posted => Some(PostStatus::Posted),
            StatusFilter::Failed => Some(PostStatus::Failed),
            StatusFilter::Rejected => Some(PostStatus::Rejected),
            StatusFilter::All => None,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Cria uma publicação, agendada para agora ou para --at.
    Create {
        #[command(flatten)]
        post: PostArgs,

        /// Horário de publicação (RFC 3339, ex. 2026-10-20T09:00:00Z).
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// Cria uma publicação no próximo horário comercial.
    Schedule {
        #[command(flatten)]
        post: PostArgs,
    },

    /// Lista publicações por status.
    List {
        #[arg(value_enum, default_value_t = StatusFilter::All)]
        status: StatusFilter,
    },

    /// Aprova uma publicação pendente.
    Approve {
        /// Id completo ou prefixo único.
        id: String,
    },

    /// Rejeita uma publicação pendente.
    Reject {
        id: String,

        /// Motivo registrado na publicação.
        #[arg(long, default_value = "rejected by operator")]
        reason: String,
    },

    /// Mostra o detalhe de uma publicação.
    Status { id: String },

    /// Recoloca na fila uma publicação que falhou.
    Retry { id: String },

    /// Publica imediatamente, ignorando o agendamento.
    PostNow {
        id: String,

        /// Executa o navegador sem janela.
        #[arg(long)]
        headless: bool,
    },

    /// Publica as publicações vencidas, uma de cada vez.
    Run {
        /// Número máximo de tentativas nesta execução.
        #[arg(long)]
        limit: Option<usize>,

        #[arg(long)]
        headless: bool,
    },

    /// Trata pedidos de aprovação com prazo vencido.
    Sweep,

    /// Mostra a atividade recente.
    Activity {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}
