//! Interface de terminal do HERALD: spinners e saída colorida.
//!
//! Usa as crates `indicatif` para spinners de progresso e `console` para
//! estilização com cores. O [`PublishProgress`] acompanha visualmente
//! uma tentativa de publicação no terminal.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::compose::{ComposeReport, ComposeState};
use crate::publisher::PublishOutcome;
use crate::record::{ApprovalRequest, AuditEntry, PostStatus, PublishRecord, SweepReport};

/// Indicador visual de progresso para uma tentativa de publicação.
///
/// Exibe um spinner com o estado atual do fluxo de composição e mensagens
/// coloridas para sucesso (verde), falha (vermelho) e pulo (amarelo).
pub struct PublishProgress {
    // Barra de progresso/spinner do indicatif.
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
}

impl PublishProgress {
    /// Inicia o spinner com uma descrição curta da publicação.
    pub fn start(description: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("IDLE: {description}"));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Devolve um observador que atualiza o spinner a cada estado do fluxo.
    pub fn observer(&self) -> impl Fn(ComposeState) + Send + Sync + 'static {
        let pb = self.pb.clone();
        move |state| pb.set_message(format!("{state}"))
    }

    /// Finaliza o spinner e exibe o resultado da tentativa.
    pub fn complete(&self, outcome: &PublishOutcome) {
        self.pb.finish_and_clear();
        match outcome {
            PublishOutcome::Published { record_id, .. } => {
                println!("  {} Published {}", self.green.apply_to("✓"), short(record_id));
            }
            PublishOutcome::Failed { record_id, error } => {
                println!(
                    "  {} Post {} failed: {error}",
                    self.red.apply_to("✗"),
                    short(record_id)
                );
                if let Some(bundle) = error.bundle() {
                    println!("    diagnostics: {}", bundle.display());
                }
            }
            PublishOutcome::RateLimited { published, limit } => {
                println!(
                    "  {} Daily limit reached ({published}/{limit}), skipping",
                    self.yellow.apply_to("↷")
                );
            }
            PublishOutcome::NothingDue => {
                println!("  {} Nothing due", self.yellow.apply_to("↷"));
            }
        }
    }

    /// Finaliza o spinner após uma falha fatal de sessão.
    pub fn abort(&self, message: &str) {
        self.pb.finish_and_clear();
        println!("  {} {message}", self.red.apply_to("✗"));
    }
}

/// Imprime o relatório da composição formatado em JSON com estilo colorido.
pub fn print_report(report: &ComposeReport) {
    let style = if report.final_state == ComposeState::Confirmed {
        Style::new().green().bold()
    } else {
        Style::new().red().bold()
    };
    println!();
    println!("{}", style.apply_to("─── Compose Report ───"));
    println!("{}", serde_json::to_string_pretty(report).unwrap_or_default());
}

// Cor associada a cada status de registro.
fn status_style(status: PostStatus) -> Style {
    match status {
        PostStatus::Posted => Style::new().green(),
        PostStatus::Approved => Style::new().cyan(),
        PostStatus::Pending => Style::new().yellow(),
        PostStatus::Failed | PostStatus::Rejected => Style::new().red(),
    }
}

fn short(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Imprime uma tabela compacta de registros.
pub fn print_records(records: &[PublishRecord]) {
    if records.is_empty() {
        println!("No posts.");
        return;
    }
    let dim = Style::new().dim();
    for record in records {
        println!(
            "{}  {} {:<8} {}  {}",
            record.short_id(),
            status_style(record.status).apply_to(format!("{:<9}", record.status.to_string())),
            record.importance.to_string(),
            dim.apply_to(record.scheduled_at.format("%Y-%m-%d %H:%M")),
            record.preview(60)
        );
    }
}

/// Imprime o detalhe de um registro e do pedido de aprovação associado.
pub fn print_record(record: &PublishRecord, approval: Option<&ApprovalRequest>) {
    let bold = Style::new().bold();
    println!("{} {}", bold.apply_to("Post"), record.id);
    println!("  status:     {}", status_style(record.status).apply_to(record.status));
    println!("  importance: {}", record.importance);
    println!("  scheduled:  {}", record.scheduled_at.to_rfc3339());
    println!("  retries:    {}/{}", record.retry_count, record.max_retries);
    if let Some(link) = &record.link {
        println!("  link:       {link}");
    }
    for media in &record.media {
        println!("  media:      {}", media.display());
    }
    if let Some(document) = &record.document {
        println!("  document:   {}", document.display());
    }
    if let Some(posted_at) = record.posted_at {
        println!("  posted:     {}", posted_at.to_rfc3339());
    }
    if let Some(error) = &record.error_message {
        println!("  error:      {}", Style::new().red().apply_to(error));
    }
    if record.can_retry() {
        println!("  retry with: herald retry {}", record.short_id());
    }
    if let Some(approval) = approval {
        let decision = approval
            .decision
            .map(|d| format!("{d:?}").to_lowercase())
            .unwrap_or_else(|| "open".into());
        println!(
            "  approval:   {decision} (deadline {})",
            approval.deadline.to_rfc3339()
        );
    }
    println!();
    println!("{}", record.body);
}

/// Imprime as entradas mais recentes do log de atividade.
pub fn print_activity(entries: &[AuditEntry]) {
    if entries.is_empty() {
        println!("No activity yet.");
        return;
    }
    let dim = Style::new().dim();
    for entry in entries {
        println!(
            "{}  {}  {:<13} {}",
            dim.apply_to(entry.at.format("%Y-%m-%d %H:%M:%S")),
            short(&entry.record_id),
            entry.action.to_string(),
            entry.detail
        );
    }
}

/// Resume o resultado da varredura de prazos de aprovação.
pub fn print_sweep(report: &SweepReport) {
    let yellow = Style::new().yellow();
    for id in &report.auto_approved {
        println!("  {} auto-approved {}", yellow.apply_to("!"), short(id));
    }
    for id in &report.overdue {
        println!(
            "  {} {} is past its approval deadline (auto-approval is off)",
            yellow.apply_to("!"),
            short(id)
        );
    }
    if report.auto_approved.is_empty() && report.overdue.is_empty() {
        println!("No overdue approvals.");
    }
}
