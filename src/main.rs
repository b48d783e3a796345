use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use eyre::Result;
use ratatui::{Terminal, backend::CrosstermBackend};
use std::{
    fs::OpenOptions,
    io::{Stdout, stdout},
    path::Path,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::time;
use tracing_subscriber::EnvFilter;

use gas_tracker::config::Cli;
use gas_tracker::data::Chain;
use gas_tracker::price::CoinGeckoClient;
use gas_tracker::rpc::{AlchemyClient, ChainEndpoints};
use gas_tracker::store::GasStore;
use gas_tracker::ui::Dashboard;

type CrosstermTerminal = Terminal<CrosstermBackend<Stdout>>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_file)?;

    let mut endpoints = ChainEndpoints::alchemy(&cli.api_key)?;
    for (chain, url) in [
        (Chain::Ethereum, &cli.ethereum_url),
        (Chain::Polygon, &cli.polygon_url),
        (Chain::Arbitrum, &cli.arbitrum_url),
    ] {
        if let Some(url) = url {
            endpoints = endpoints.with_override(chain, url.clone());
        }
    }
    let fees = AlchemyClient::new(endpoints, cli.http_timeout())?;
    let prices = CoinGeckoClient::new(cli.price_url.clone(), cli.price_asset.clone(), cli.http_timeout())?;
    let store = Arc::new(GasStore::new(Arc::new(fees), Arc::new(prices), cli.poll_settings()));
    store.set_mode(cli.mode);

    println!("Starting gas tracker...");
    println!("Logging to {}", cli.log_file.display());
    println!("Press 'q' to quit");

    // Backfill takes a few round trips; draw while it runs.
    let init = tokio::spawn({
        let store = Arc::clone(&store);
        async move {
            if let Err(e) = store.initialize().await {
                tracing::warn!("initialize skipped: {}", e);
            }
        }
    });

    let mut terminal = setup_terminal()?;
    let mut dashboard = Dashboard::new();
    let result = run(&mut terminal, &mut dashboard, &store).await;
    cleanup_terminal(&mut terminal)?;

    init.abort();
    store.shutdown().await;
    result?;
    println!("Goodbye!");
    Ok(())
}

async fn run(
    terminal: &mut CrosstermTerminal,
    dashboard: &mut Dashboard,
    store: &GasStore,
) -> Result<()> {
    loop {
        let state = store.snapshot();
        terminal.draw(|frame| dashboard.render(frame, &state))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if let Some(mode) = dashboard.handle_key(key.code, state.mode) {
                        store.set_mode(mode);
                    }
                }
            }
        }

        if dashboard.should_quit {
            return Ok(());
        }

        time::sleep(Duration::from_millis(100)).await;
    }
}

fn init_tracing(path: &Path) -> Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn setup_terminal() -> Result<CrosstermTerminal> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn cleanup_terminal(terminal: &mut CrosstermTerminal) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}
