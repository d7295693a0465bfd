mod app;
mod config;
mod gemini;
mod handler;
mod history;
mod tui;
mod ui;

use anyhow::Result;

use app::App;
use config::Config;
use history::HistoryStore;

#[tokio::main]
async fn main() -> Result<()> {
    tui::install_panic_hook();

    let config = Config::load().unwrap_or_else(|_| Config::new());
    let store = HistoryStore::open()?;
    let mut app = App::new(config, store);

    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(&mut app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(&mut app, event),
            None => break,
        }

        app.poll_reply().await;
    }

    tui::restore()?;
    Ok(())
}
