use crate::scrape::ScrapeOpts;
use anyhow::{Error, Result};
use clap::{Parser, ValueEnum};
use clap_verbosity_flag::{InfoLevel, Verbosity, log::LevelFilter};
use std::{io, path::PathBuf, time::Duration};
use tracing_subscriber::filter::LevelFilter as TFilter;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

#[derive(Debug, Clone, Default, ValueEnum)]
pub enum LogFormat {
    Normal,
    Compact,
    Pretty,
    #[default]
    Json,
}

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log level verbosity
    #[command(flatten)]
    pub verbosity: Verbosity<InfoLevel>,

    /// Which log formatter to use
    // env will pick up the value if the field name is given as the key in uppercase
    #[arg(short = 'f', long, env, default_value_t, value_enum)]
    pub log_format: LogFormat,

    /// File with one restaurant order page URL per line
    #[arg(short, long, env = "RPLATE_INPUT")]
    pub input: PathBuf,

    /// Where to write the JSON results
    #[arg(short, long, env = "RPLATE_OUTPUT", default_value = "restaurants.json")]
    pub output: PathBuf,

    /// Max number of review pages to click through per restaurant
    #[arg(long, env = "RPLATE_MAX_PAGES", default_value_t = 50)]
    pub max_pages: usize,

    /// How long to wait for a page to render
    #[arg(long, env = "RPLATE_LOAD_TIMEOUT", default_value = "10s", value_parser = humantime::parse_duration)]
    pub load_timeout: Duration,

    /// How long to wait for more content after scrolling
    #[arg(long, env = "RPLATE_SETTLE_TIMEOUT", default_value = "2s", value_parser = humantime::parse_duration)]
    pub settle_timeout: Duration,

    /// Time between two checks while waiting
    #[arg(long, env = "RPLATE_POLL_INTERVAL", default_value = "250ms", value_parser = humantime::parse_duration)]
    pub poll_interval: Duration,

    /// Pixels per scroll step
    #[arg(long, env = "RPLATE_SCROLL_STEP", default_value_t = 800)]
    pub scroll_step: i64,

    /// Max scroll steps when loading the menu
    #[arg(long, env = "RPLATE_MAX_MENU_SCROLLS", default_value_t = 10)]
    pub max_menu_scrolls: usize,

    /// Max scroll steps on each review page
    #[arg(long, env = "RPLATE_MAX_REVIEW_SCROLLS", default_value_t = 5)]
    pub max_review_scrolls: usize,

    /// Menu items with shorter names are dropped
    #[arg(long, env = "RPLATE_MIN_NAME_LEN", default_value_t = 2)]
    pub min_name_len: usize,

    /// Leave modals and overlays on the order page alone
    #[arg(long, env = "RPLATE_KEEP_OVERLAYS")]
    pub keep_overlays: bool,

    /// Run the browser without a window
    #[arg(long, env = "RPLATE_HEADLESS")]
    pub headless: bool,

    /// Open this page first and wait for Enter, so you can log in
    #[arg(long, env = "RPLATE_LOGIN_URL")]
    pub login_url: Option<Url>,

    /// User agent for the browser
    #[arg(
        long,
        env = "RPLATE_USER_AGENT",
        default_value = "Mozilla/5.0 (Windows NT 10.0; Win64; x64)"
    )]
    pub user_agent: String,
}

impl Cli {
    /// Wrapper for clap::Parser::try_parse_from
    pub fn try_parse_opts<I, T>(itr: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::try_parse_from(itr).map_err(Error::from)
    }

    // this thin wrapper makes it possible to do the parsing without importing clap::Parser at the
    // call site
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn scrape_opts(&self) -> ScrapeOpts {
        ScrapeOpts {
            load_timeout: self.load_timeout,
            settle_timeout: self.settle_timeout,
            poll_interval: self.poll_interval,
            scroll_step: self.scroll_step,
            max_menu_scrolls: self.max_menu_scrolls,
            max_review_scrolls: self.max_review_scrolls,
            max_pages: self.max_pages,
            min_name_len: self.min_name_len,
            clear_overlays: !self.keep_overlays,
        }
    }

    /// Maps clap_verbosity_flag::LevelFilter values to tracing_subscriber::filter::LevelFilter
    /// values
    fn tracing_level_filter(&self) -> TFilter {
        match self.verbosity.log_level_filter() {
            LevelFilter::Off => TFilter::OFF,
            LevelFilter::Error => TFilter::ERROR,
            LevelFilter::Warn => TFilter::WARN,
            LevelFilter::Info => TFilter::INFO,
            LevelFilter::Debug => TFilter::DEBUG,
            LevelFilter::Trace => TFilter::TRACE,
        }
    }

    pub fn init_logger(&self) -> Result<()> {
        let layer = match self.log_format {
            LogFormat::Json => fmt::layer().json().with_writer(io::stderr).boxed(),
            LogFormat::Pretty => fmt::layer().pretty().with_writer(io::stderr).boxed(),
            LogFormat::Compact => fmt::layer()
                .without_time()
                .compact()
                .with_writer(io::stderr)
                .boxed(),
            LogFormat::Normal => fmt::layer().with_writer(io::stderr).boxed(),
        };
        tracing_subscriber::registry()
            .with(
                EnvFilter::builder()
                    .with_default_directive(self.tracing_level_filter().into())
                    .from_env()?,
            )
            .with(layer)
            .init();
        Ok(())
    }
}
