//! Authenticated browsing session against the target surface.
//!
//! One [`SessionManager`] owns at most one live surface, bound to one profile
//! directory. It is never shared between concurrent runs; publish attempts
//! reuse it sequentially.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{Instant, sleep};
use tracing::{info, warn};

use crate::config::TimingConfig;
use crate::error::PublishError;
use crate::surface::{Surface, SurfaceError, SurfaceProfile};

/// Starts a fresh surface, e.g. a browser on a persistent profile.
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self) -> Result<Arc<dyn Surface>, SurfaceError>;
}

#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SessionTiming {
    pub sign_in_timeout: Duration,
    pub sign_in_poll: Duration,
    pub verification_timeout: Duration,
    pub verification_poll: Duration,
}

impl From<&TimingConfig> for SessionTiming {
    fn from(t: &TimingConfig) -> Self {
        Self {
            sign_in_timeout: Duration::from_secs(t.sign_in_timeout_secs),
            sign_in_poll: Duration::from_millis(t.sign_in_poll_ms),
            verification_timeout: Duration::from_secs(t.verification_timeout_secs),
            verification_poll: Duration::from_millis(t.verification_poll_ms),
        }
    }
}

pub struct SessionManager {
    launcher: Box<dyn Launcher>,
    profile: SurfaceProfile,
    credentials: Option<Credentials>,
    timing: SessionTiming,
    live: Option<Arc<dyn Surface>>,
}

fn auth(message: impl Into<String>) -> PublishError {
    PublishError::AuthenticationFailure(message.into())
}

impl SessionManager {
    pub fn new(
        launcher: Box<dyn Launcher>,
        profile: SurfaceProfile,
        credentials: Option<Credentials>,
        timing: SessionTiming,
    ) -> Self {
        Self {
            launcher,
            profile,
            credentials,
            timing,
            live: None,
        }
    }

    pub fn is_live(&self) -> bool {
        self.live.is_some()
    }

    /// Returns the live session, establishing it on first use.
    ///
    /// Every failure here is session-class (fatal): the caller must not treat
    /// it as a content problem or retry it automatically.
    pub async fn acquire(&mut self) -> Result<Arc<dyn Surface>, PublishError> {
        if let Some(surface) = &self.live {
            return Ok(Arc::clone(surface));
        }

        let surface = self
            .launcher
            .launch()
            .await
            .map_err(|e| auth(format!("cannot start browser: {e}")))?;

        surface
            .navigate(&self.profile.landing_url)
            .await
            .map_err(|e| auth(format!("cannot reach landing view: {e}")))?;
        let url = current_url(surface.as_ref()).await?;

        if self.profile.is_challenge(&url) {
            self.await_verification(surface.as_ref()).await?;
        } else if self.profile.needs_login(&url) || !self.profile.is_landing(&url) {
            self.sign_in(surface.as_ref(), &url).await?;
        } else {
            info!("reusing signed-in profile");
        }

        let url = current_url(surface.as_ref()).await?;
        if !self.profile.is_landing(&url) {
            return Err(auth(format!("not on landing view after sign-in: {url}")));
        }

        self.live = Some(Arc::clone(&surface));
        Ok(surface)
    }

    /// Drops the live session, closing the browser.
    pub fn release(&mut self) {
        if self.live.take().is_some() {
            info!("session released");
        }
    }

    async fn sign_in(&self, surface: &dyn Surface, url: &str) -> Result<(), PublishError> {
        let Some(credentials) = &self.credentials else {
            return Err(auth(
                "sign-in required but no credentials configured (set HERALD_EMAIL and HERALD_PASSWORD)",
            ));
        };
        info!("signing in");

        if !self.profile.needs_login(url) {
            surface
                .navigate(&self.profile.login_url)
                .await
                .map_err(|e| auth(format!("cannot reach sign-in page: {e}")))?;
        }

        let p = &self.profile;
        submit_form(surface, p, credentials)
            .await
            .map_err(|e| auth(format!("sign-in form not usable: {e}")))?;

        let deadline = Instant::now() + self.timing.sign_in_timeout;
        while Instant::now() < deadline {
            let url = current_url(surface).await?;
            if p.is_challenge(&url) {
                return self.await_verification(surface).await;
            }
            if p.is_landing(&url) {
                info!("signed in");
                return Ok(());
            }
            sleep(self.timing.sign_in_poll).await;
        }
        Err(auth(format!(
            "sign-in did not reach the landing view within {}s",
            self.timing.sign_in_timeout.as_secs()
        )))
    }

    /// Blocks while an out-of-band verification challenge is pending.
    async fn await_verification(&self, surface: &dyn Surface) -> Result<(), PublishError> {
        warn!(
            ceiling_secs = self.timing.verification_timeout.as_secs(),
            "verification challenge, complete it in the browser window"
        );
        let deadline = Instant::now() + self.timing.verification_timeout;
        while Instant::now() < deadline {
            sleep(self.timing.verification_poll).await;
            let url = current_url(surface).await?;
            if self.profile.is_landing(&url) {
                info!("verification cleared");
                return Ok(());
            }
        }
        Err(PublishError::VerificationTimeout {
            waited_secs: self.timing.verification_timeout.as_secs(),
        })
    }
}

async fn submit_form(
    surface: &dyn Surface,
    profile: &SurfaceProfile,
    credentials: &Credentials,
) -> Result<(), SurfaceError> {
    surface.fill(&profile.username_selector, &credentials.email).await?;
    surface.fill(&profile.password_selector, &credentials.password).await?;
    surface.click(&profile.sign_in_selector).await
}

async fn current_url(surface: &dyn Surface) -> Result<String, PublishError> {
    surface
        .current_url()
        .await
        .map_err(|e| auth(format!("cannot read current URL: {e}")))
}
