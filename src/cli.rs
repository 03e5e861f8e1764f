use clap::Parser;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "grok-search")]
#[command(about = "Web research through an OpenAI-compatible Grok endpoint", long_about = None)]
pub struct Args {
    /// Search query / research task
    #[arg(long)]
    pub query: String,

    /// Path to config JSON file
    #[arg(long)]
    pub config: Option<String>,

    /// Override base URL
    #[arg(long)]
    pub base_url: Option<String>,

    /// Override API key
    #[arg(long)]
    pub api_key: Option<String>,

    /// Override model
    #[arg(long)]
    pub model: Option<String>,

    /// Override timeout (seconds)
    #[arg(long)]
    pub timeout_seconds: Option<f64>,

    /// Extra JSON object merged into the request body
    #[arg(long)]
    pub extra_body_json: Option<String>,

    /// Extra JSON object merged into the request headers
    #[arg(long)]
    pub extra_headers_json: Option<String>,
}
