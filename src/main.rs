use color_eyre::Result;
use ip_tracker_tui::{
    api::{GeoClient, TimezoneClient},
    app::App,
    config::Config,
    coordinator::LocationCoordinator,
    events::EventHandler,
    logging,
    map::{MapWidget, TileLayer},
    ui,
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{io, sync::Arc};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Instrumentation and safety
    let _log_guard = logging::initialize_logging();
    install_panic_hook();
    color_eyre::install()?;

    let config = Config::load();
    let geo = Arc::new(GeoClient::new(&config.api)?);
    let timezone = Arc::new(TimezoneClient::new(&config.api)?);

    // Ready terminal and state
    let mut terminal = setup_terminal()?;
    let mut events = EventHandler::new(config.ui.tick_rate_ms);
    let coordinator = LocationCoordinator::new(
        geo,
        timezone,
        MapWidget::new(TileLayer::from_config(&config.map)),
        config.home(),
        events.tx.clone(),
    );
    let mut app = App::new(coordinator);
    app.mount();

    // Main loop
    while !app.should_quit {
        terminal.draw(|f| ui::render(f, &app))?;

        match events.next().await {
            Some(event) => app.handle_event(event),
            None => break,
        }
    }

    info!("Shutting down.");
    restore_terminal(terminal)?;
    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    crossterm::terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, crossterm::terminal::EnterAlternateScreen, crossterm::cursor::Hide)?;
    Ok(Terminal::new(CrosstermBackend::new(stdout))?)
}

fn restore_terminal(mut terminal: Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    crossterm::terminal::disable_raw_mode()?;
    crossterm::execute!(terminal.backend_mut(), crossterm::terminal::LeaveAlternateScreen, crossterm::cursor::Show)?;
    Ok(())
}

fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        // Force terminal cleanup!
        crossterm::terminal::disable_raw_mode().ok();
        crossterm::execute!(std::io::stdout(), crossterm::terminal::LeaveAlternateScreen, crossterm::cursor::Show).ok();
        original_hook(panic_info);
    }));
}
