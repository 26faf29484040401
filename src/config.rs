//! Configuração do HERALD carregada a partir de `herald.toml`.
//!
//! A struct [`HeraldConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! As variáveis `HERALD_EMAIL`, `HERALD_PASSWORD` e `HERALD_HEADLESS` têm
//! precedência sobre o arquivo.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::cascade::CascadeTiming;
use crate::error::HeraldError;
use crate::session::Credentials;
use crate::surface::SurfaceProfile;

/// Configuração de nível superior carregada de `herald.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct HeraldConfig {
    /// Diretório do armazenamento de registros e dos diagnósticos.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Perfil persistente do navegador, reutilizado entre execuções.
    #[serde(default = "default_profile_dir")]
    pub profile_dir: PathBuf,

    /// Limite diário de publicações.
    #[serde(default = "default_max_daily_posts")]
    pub max_daily_posts: u32,

    /// Máximo de retentativas explícitas por registro.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_max_body_chars")]
    pub max_body_chars: usize,

    /// Prazo, em horas, para uma decisão de aprovação.
    #[serde(default = "default_approval_window_hours")]
    pub approval_window_hours: i64,

    /// Aprova automaticamente pedidos vencidos. Desligado por padrão;
    /// exige opt-in explícito do operador.
    #[serde(default)]
    pub auto_approve_on_deadline: bool,

    /// Capacidade do log de atividade recente.
    #[serde(default = "default_activity_capacity")]
    pub activity_capacity: usize,

    #[serde(default)]
    pub headless: bool,

    /// Pausa em milissegundos entre ações do navegador.
    #[serde(default = "default_slow_mo_ms")]
    pub slow_mo_ms: u64,

    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub password: String,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub surface: SurfaceProfile,
}

// Valor padrão para o diretório de dados: ".herald".
fn default_data_dir() -> PathBuf {
    PathBuf::from(".herald")
}

fn default_profile_dir() -> PathBuf {
    PathBuf::from(".herald/profile")
}

fn default_max_daily_posts() -> u32 {
    25
}

// Valor padrão para retentativas máximas: 2.
fn default_max_retries() -> u32 {
    2
}

fn default_max_body_chars() -> usize {
    3000
}

fn default_approval_window_hours() -> i64 {
    24
}

fn default_activity_capacity() -> usize {
    200
}

fn default_slow_mo_ms() -> u64 {
    120
}

impl Default for HeraldConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            profile_dir: default_profile_dir(),
            max_daily_posts: default_max_daily_posts(),
            max_retries: default_max_retries(),
            max_body_chars: default_max_body_chars(),
            approval_window_hours: default_approval_window_hours(),
            auto_approve_on_deadline: false,
            activity_capacity: default_activity_capacity(),
            headless: false,
            slow_mo_ms: default_slow_mo_ms(),
            email: String::new(),
            password: String::new(),
            timing: TimingConfig::default(),
            surface: SurfaceProfile::default(),
        }
    }
}

impl HeraldConfig {
    /// Carrega a configuração de `path`, ou de `herald.toml` no diretório
    /// atual. Usa valores padrão se o arquivo não existir.
    pub fn load(path: Option<&Path>) -> Result<Self, HeraldError> {
        let path = path.unwrap_or(Path::new("herald.toml"));
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<HeraldConfig>(&contents)?
        } else {
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Aplica as variáveis de ambiente por cima dos valores do arquivo.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(email) = var("HERALD_EMAIL").filter(|v| !v.is_empty()) {
            self.email = email;
        }
        if let Some(password) = var("HERALD_PASSWORD").filter(|v| !v.is_empty()) {
            self.password = password;
        }
        if let Some(headless) = var("HERALD_HEADLESS") {
            self.headless = matches!(headless.to_lowercase().as_str(), "1" | "true" | "yes");
        }
    }

    /// Rejeita perfis sem localizador para uma affordance obrigatória.
    /// Ausência é erro de configuração, nunca transitório.
    pub fn validate(&self) -> Result<(), HeraldError> {
        let missing = self.surface.missing_affordances();
        if !missing.is_empty() {
            return Err(HeraldError::Config(format!(
                "surface profile has no locator for: {}",
                missing.join(", ")
            )));
        }
        if self.max_body_chars == 0 {
            return Err(HeraldError::Config("max_body_chars must be positive".into()));
        }
        Ok(())
    }

    pub fn credentials(&self) -> Option<Credentials> {
        if self.email.is_empty() || self.password.is_empty() {
            return None;
        }
        Some(Credentials {
            email: self.email.clone(),
            password: self.password.clone(),
        })
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("records.json")
    }

    pub fn diagnostics_dir(&self) -> PathBuf {
        self.data_dir.join("diagnostics")
    }
}

/// Tempos limite do motor de publicação.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub strategy_timeout_ms: u64,
    pub oracle_timeout_ms: u64,
    pub poll_interval_ms: u64,
    /// Pausa entre passos de uma mesma estratégia.
    pub settle_ms: u64,
    /// Tempo extra por caractere quando o texto é digitado tecla a tecla.
    pub typing_ms_per_char: u64,

    pub sign_in_timeout_secs: u64,
    pub sign_in_poll_ms: u64,
    pub verification_timeout_secs: u64,
    pub verification_poll_ms: u64,

    pub overlay_wait_secs: u64,
    pub submit_confirm_secs: u64,

    pub media_upload_secs: u64,
    pub document_upload_secs: u64,
    /// Quanto esperar pelo campo de título depois do upload do documento.
    pub title_appear_secs: u64,

    pub indicator_appear_secs: u64,
    pub text_processing_secs: u64,
    pub media_processing_secs: u64,
    pub document_processing_secs: u64,
    pub text_grace_secs: u64,
    pub media_grace_secs: u64,
    pub document_grace_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            strategy_timeout_ms: 5_000,
            oracle_timeout_ms: 8_000,
            poll_interval_ms: 500,
            settle_ms: 800,
            typing_ms_per_char: 40,
            sign_in_timeout_secs: 60,
            sign_in_poll_ms: 1_000,
            verification_timeout_secs: 300,
            verification_poll_ms: 3_000,
            overlay_wait_secs: 5,
            submit_confirm_secs: 10,
            media_upload_secs: 60,
            document_upload_secs: 120,
            title_appear_secs: 15,
            indicator_appear_secs: 15,
            text_processing_secs: 10,
            media_processing_secs: 30,
            document_processing_secs: 120,
            text_grace_secs: 3,
            media_grace_secs: 4,
            document_grace_secs: 8,
        }
    }
}

impl TimingConfig {
    pub fn cascade(&self) -> CascadeTiming {
        CascadeTiming {
            strategy_timeout: Duration::from_millis(self.strategy_timeout_ms),
            oracle_timeout: Duration::from_millis(self.oracle_timeout_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    /// Limite para digitar `chars` caracteres: o timeout normal de uma
    /// estratégia mais o custo por tecla.
    pub fn typing_budget(&self, chars: usize) -> Duration {
        let per_char = self.typing_ms_per_char.saturating_mul(chars as u64);
        Duration::from_millis(self.strategy_timeout_ms.saturating_add(per_char))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = HeraldConfig::default();
        assert_eq!(config.max_daily_posts, 25);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.max_body_chars, 3000);
        assert_eq!(config.approval_window_hours, 24);
        assert!(!config.auto_approve_on_deadline);
        assert!(!config.headless);
        assert_eq!(config.timing.verification_timeout_secs, 300);
        assert!(config.credentials().is_none());
    }

    #[test]
    fn typing_budget_grows_with_length() {
        let timing = TimingConfig::default();
        assert_eq!(timing.typing_budget(0), Duration::from_secs(5));
        assert_eq!(timing.typing_budget(2_500), Duration::from_secs(105));
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            max_daily_posts = 10
            auto_approve_on_deadline = true

            [timing]
            document_processing_secs = 90

            [surface]
            submit_texts = ["Publish"]
        "#;
        let config: HeraldConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.max_daily_posts, 10);
        assert!(config.auto_approve_on_deadline);
        assert_eq!(config.timing.document_processing_secs, 90);
        assert_eq!(config.timing.text_grace_secs, 3);
        assert_eq!(config.surface.submit_texts, vec!["Publish".to_string()]);
        assert_eq!(config.max_retries, 2);
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = HeraldConfig {
            email: "file@example.com".into(),
            ..Default::default()
        };
        config.apply_env(|key| match key {
            "HERALD_EMAIL" => Some("env@example.com".into()),
            "HERALD_PASSWORD" => Some("secret".into()),
            "HERALD_HEADLESS" => Some("true".into()),
            _ => None,
        });
        assert!(config.headless);
        let creds = config.credentials().unwrap();
        assert_eq!(creds.email, "env@example.com");
        assert_eq!(creds.password, "secret");
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let mut config = HeraldConfig {
            email: "file@example.com".into(),
            ..Default::default()
        };
        config.apply_env(|key| (key == "HERALD_EMAIL").then(String::new));
        assert_eq!(config.email, "file@example.com");
    }

    #[test]
    fn missing_affordance_is_a_config_error() {
        let mut config = HeraldConfig::default();
        config.surface.dialog_selectors.clear();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, HeraldError::Config(_)));
        assert!(err.to_string().contains("compose dialog"));
    }

    #[test]
    fn load_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = HeraldConfig::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.max_retries, 2);
    }

    #[test]
    fn load_reads_given_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("herald.toml");
        std::fs::write(&path, "max_retries = 4\ndata_dir = \"/var/lib/herald\"\n").unwrap();
        let config = HeraldConfig::load(Some(&path)).unwrap();
        assert_eq!(config.max_retries, 4);
        assert_eq!(config.store_path(), PathBuf::from("/var/lib/herald/records.json"));
    }
}
