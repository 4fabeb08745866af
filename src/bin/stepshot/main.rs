use anyhow::{Context, Result, anyhow};
use clap::Parser;
use dotenvy::dotenv;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use stepshot::auth::EnvAuthenticator;
use stepshot::{
    ArtifactWriter, Brain, BrowserSession, Engine, EngineConfig, LaunchSettings, Offline, Planner,
    planner,
};

/// Run a browser task and capture every meaningful UI state.
#[derive(Debug, Parser)]
#[command(name = "stepshot", version)]
struct Args {
    /// Natural-language task, e.g. "create a project in linear".
    #[arg(long)]
    task: String,
    /// Starting URL. Taken from the task text when omitted.
    #[arg(long)]
    url: Option<String>,
    #[arg(long)]
    headless: bool,
    /// Never attempt to log in.
    #[arg(long)]
    no_auth: bool,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    password: Option<String>,
    /// Output directory. Defaults to dataset/<host>/<task-slug>.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn slug(text: &str) -> String {
    let mut out = String::new();
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').chars().take(80).collect()
}

fn default_out_dir(task: &str, url: Option<&str>) -> PathBuf {
    let app = url
        .and_then(|u| url::Url::parse(u).ok())
        .and_then(|u| u.host_str().map(slug))
        .unwrap_or_else(|| "manual-navigation".to_string());
    PathBuf::from("dataset").join(app).join(slug(task))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("stepshot=info")),
        )
        .init();

    let args = Args::parse();
    let start_url = args.url.clone().or_else(|| planner::explicit_url(&args.task));
    let out_dir = args
        .out
        .clone()
        .unwrap_or_else(|| default_out_dir(&args.task, start_url.as_deref()));

    let mut config = EngineConfig::from_env();
    config.skip_auth = args.no_auth;

    let settings = LaunchSettings {
        headless: args.headless,
        profile_dir: dirs::data_local_dir().map(|d| d.join("stepshot").join("profile")),
    };
    info!("Launching Chrome...");
    let mut session = tokio::task::spawn_blocking(move || BrowserSession::launch(&settings))
        .await
        .map_err(|e| anyhow!("Browser launch panicked: {}", e))??;

    let brain = Brain::from_env(config.planner_model.clone(), tokio::runtime::Handle::current());
    match &brain {
        Some(b) => info!(model = b.model(), "LLM planner ready"),
        None => warn!("OPENAI_API_KEY not set; using the heuristic planner only"),
    }
    if let Some(b) = &brain {
        config.planner_provider.get_or_insert_with(|| "openai".to_string());
        config.planner_model.get_or_insert_with(|| b.model().to_string());
    }

    let authenticator = EnvAuthenticator {
        email: args.email.clone(),
        password: args.password.clone(),
        interactive: true,
    };
    let artifacts = ArtifactWriter::new(&out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;
    let task = args.task.clone();

    let summary = tokio::task::spawn_blocking(move || {
        let planner: &dyn Planner = match &brain {
            Some(b) => b,
            None => &Offline,
        };
        Engine::new(&mut session, planner, config, artifacts, task)
            .with_authenticator(&authenticator)
            .run(start_url.as_deref())
    })
    .await
    .map_err(|e| anyhow!("Engine panicked: {}", e))??;

    info!(
        steps = summary.total_steps,
        captures = summary.captures,
        layers = summary.layers,
        "✅ Run finished"
    );
    println!("{}", out_dir.join("run_summary.json").display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug() {
        assert_eq!(slug("Create a project in Linear!"), "create-a-project-in-linear");
        assert_eq!(slug("  --  "), "");
    }

    #[test]
    fn test_default_out_dir() {
        let dir = default_out_dir("search npm", Some("https://www.npmjs.com/"));
        assert_eq!(dir, PathBuf::from("dataset/www-npmjs-com/search-npm"));
        let dir = default_out_dir("do a thing", None);
        assert_eq!(dir, PathBuf::from("dataset/manual-navigation/do-a-thing"));
    }
}
