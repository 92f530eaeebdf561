// Entry point for `cargo run -p web-server`: serves the form with settings
// from `config.toml` and the environment.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let settings = configuration::load_settings(None)?;
    let _guard = configuration::init_tracing(&settings.logging)?;

    let state = web_server::AppState::from_settings(settings).await?;
    web_server::run_server(state).await
}
