//! Serve command handler.

use clap::Args;
use llamaserve_core::{AppConfig, AppResult, ConfigOverrides};
use llamaserve_server::{AppState, GenerationSettings};
use std::sync::Arc;
use std::time::Instant;

/// Load the model and serve `GET /` and `POST /llama`
#[derive(Args, Debug)]
pub struct ServeCommand {
    /// Address to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(long)]
    pub port: Option<u16>,

    /// Override the maximum number of generated tokens
    #[arg(long)]
    pub max_new_tokens: Option<u32>,

    /// Override the sampling temperature
    #[arg(long)]
    pub temperature: Option<f32>,
}

impl ServeCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing serve command");
        tracing::debug!("Serve options: {:?}", self);

        let mut config = config.clone().with_overrides(ConfigOverrides {
            host: self.host.clone(),
            port: self.port,
            ..Default::default()
        });
        if let Some(max_new_tokens) = self.max_new_tokens {
            config.llm.max_new_tokens = max_new_tokens;
        }
        if let Some(temperature) = self.temperature {
            config.llm.temperature = temperature;
        }
        config.validate()?;

        let llm_settings = config.resolved_llm();
        let start = Instant::now();
        let llm = llamaserve_llm::create_client(&llm_settings)?;
        tracing::info!(
            "Model ready: {} via {} in {:.2}s",
            llm.model_name(),
            llm.provider_name(),
            start.elapsed().as_secs_f64()
        );

        let prompt_path = config.prompt_file.as_deref().map(|p| config.resolve_path(p));
        let prompt = llamaserve_prompt::resolve_prompt(prompt_path.as_deref())?;
        tracing::debug!("Using prompt '{}'", prompt.id);

        if let Some(theme) = &config.docs_theme {
            tracing::info!("API docs theme: {}", theme);
        }

        let state = AppState::new(llm)
            .with_prompt(prompt)
            .with_generation(GenerationSettings::from(&config.llm));

        llamaserve_server::serve(Arc::new(state), &config.server.bind_address()).await
    }
}
