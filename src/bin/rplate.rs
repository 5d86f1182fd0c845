use anyhow::{Context, Result, bail};
use rplate::{
    batch::Batch,
    cli::Cli,
    input::read_url_list,
    output::JsonFile,
    session::{
        Session,
        chrome::{ChromeSession, LaunchOpts},
    },
    signals,
    sites::zomato,
};
use std::io::{self, BufRead};
use tracing::{error, info, warn};
use url::Url;

#[tokio::main]
async fn main() -> Result<()> {
    // a missing .env file is fine, everything can also come from the command line
    let _ = dotenvy::dotenv();
    let cli = Cli::parse_args();
    cli.init_logger()?;

    let urls = read_url_list(&cli.input)?;
    if urls.is_empty() {
        bail!("No URLs to scrape in {}", cli.input.display());
    }
    info!(count = urls.len(), input = %cli.input.display(), "Loaded URL list");

    let mut session = ChromeSession::launch(&LaunchOpts {
        headless: cli.headless,
        user_agent: Some(cli.user_agent.clone()),
        ..Default::default()
    })
    .await
    .context("Failed to launch browser")?;

    if let Some(login_url) = &cli.login_url {
        login(&mut session, login_url).await?;
    }

    let shutdown = signals::listen().await?;
    let opts = cli.scrape_opts();
    let mut sink = JsonFile::new(&cli.output);
    let summary = Batch::new(zomato::profile(), &opts)
        .run(&mut session, &urls, &mut sink, Some(shutdown))
        .await;

    if let Err(e) = session.close().await {
        warn!(err = %e, "Failed to close browser");
    }

    let summary = summary?;
    for f in &summary.failed {
        error!(url = %f.url, err = %f.error, "Not scraped");
    }
    info!(
        output = %sink.path().display(),
        succeeded = summary.succeeded,
        failed = summary.failed.len(),
        "Done"
    );
    Ok(())
}

/// Open the login page and wait for the operator to log in by hand
async fn login(session: &mut ChromeSession, url: &Url) -> Result<()> {
    session
        .navigate(url)
        .await
        .with_context(|| format!("Failed to open login page {url}"))?;
    eprintln!("Log in in the browser window, then press Enter to start scraping...");
    tokio::task::spawn_blocking(|| io::stdin().lock().read_line(&mut String::new()))
        .await?
        .context("Failed to read from stdin")?;
    info!("Login confirmed, starting batch");
    Ok(())
}
