use reflect_agent::config::AgentConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let question = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if question.trim().is_empty() {
        eprintln!("Usage: reflect-agent <question>");
        eprintln!("  LLM_PROVIDER=ollama|aws LLM_MODEL=<model> reflect-agent \"What is ...?\"");
        std::process::exit(2);
    }

    let provider = std::env::var("LLM_PROVIDER").unwrap_or_else(|_| "ollama".to_string());
    let model = std::env::var("LLM_MODEL").unwrap_or_else(|_| "llama3.2".to_string());
    let memory = std::env::var("AGENT_MEMORY").ok();

    let config = AgentConfig::from_env()?;

    eprintln!("🔎 Reflect Agent v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {} ({})", model, provider);
    eprintln!("   Max iterations: {}", config.max_iterations);
    eprintln!("   Servers: {}\n", config.registry.servers.keys().cloned().collect::<Vec<_>>().join(", "));

    let answer =
        reflect_agent::ask(&config, &model, &provider, &question, memory.as_deref()).await?;
    println!("{answer}");

    Ok(())
}
