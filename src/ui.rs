//! TUI rendering for the IP tracker.
//!
//! Draws the search box, the four result fields, the map canvas and a status
//! line from the current [`App`] state. Nothing here mutates state.

use crate::app::App;
use crate::map::MapHandle;
use ratatui::{
    prelude::*,
    widgets::{canvas::*, *}, // Imports Points, Circle, Map, etc.
};

const ACCENT: Color = Color::Rgb(60, 60, 200);

/// Renders one frame: header with search box, result fields, map, status.
///
/// # Arguments
///
/// * `f` - The ratatui frame to draw into (from `terminal.draw()`).
/// * `app` - Current application state.
pub fn render(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Title
            Constraint::Length(3), // Search box
            Constraint::Length(4), // Result fields
            Constraint::Min(5),    // Map
            Constraint::Length(1), // Status
        ])
        .split(f.size());

    let title = Paragraph::new(" IP Address Tracker ")
        .style(Style::default().add_modifier(Modifier::BOLD))
        .alignment(Alignment::Center);
    f.render_widget(title, chunks[0]);

    render_search_box(f, app, chunks[1]);
    render_result_fields(f, app, chunks[2]);

    match app.coordinator.map().handle() {
        Some(handle) => render_map(f, handle, chunks[3]),
        None => {
            let placeholder = Paragraph::new("Map not initialized")
                .alignment(Alignment::Center)
                .style(Style::default().fg(Color::DarkGray))
                .block(Block::bordered());
            f.render_widget(placeholder, chunks[3]);
        }
    }

    render_status_bar(f, app, chunks[4]);
}

fn render_search_box(f: &mut Frame, app: &App, area: Rect) {
    let loading = app.coordinator.is_loading();

    let text = if app.input.is_empty() {
        Line::from(Span::styled(
            "Search for any IP address or domain",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Line::from(app.input.as_str())
    };

    // Spinner stands in for the disabled submit button.
    let button = if loading {
        let frames = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
        format!(" {} Loading... ", frames[app.tick_count % frames.len()])
    } else {
        " ⏎ Search ".to_string()
    };

    let input = Paragraph::new(text).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(if loading { Color::DarkGray } else { ACCENT }))
            .title(block::Title::from(button).alignment(Alignment::Right)),
    );
    f.render_widget(input, area);

    if !loading {
        let cursor_x = area.x + 1 + app.input.chars().count() as u16;
        if cursor_x < area.right().saturating_sub(1) {
            f.set_cursor(cursor_x, area.y + 1);
        }
    }
}

fn render_result_fields(f: &mut Frame, app: &App, area: Rect) {
    let display = app.coordinator.display();
    let fields = [
        ("IP ADDRESS", display.ip),
        ("LOCATION", display.location),
        ("TIMEZONE", display.timezone),
        ("ISP", display.isp),
    ];

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 4); 4])
        .split(area);

    for ((label, value), column) in fields.into_iter().zip(columns.iter()) {
        let content = vec![
            Line::from(Span::styled(
                label,
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                value,
                Style::default().add_modifier(Modifier::BOLD),
            )),
        ];
        let p = Paragraph::new(content)
            .block(Block::default().borders(Borders::ALL).padding(Padding::horizontal(1)))
            .wrap(Wrap { trim: true });
        f.render_widget(p, *column);
    }
}

fn render_map(f: &mut Frame, handle: &MapHandle, area: Rect) {
    let viewport = handle.viewport();
    let tile = handle.center_tile();
    let layer = handle.base_layer();

    // Coastlines stand in for raster tiles, which a terminal cannot show.
    let tiles = if layer.has_key() {
        format!(" tile {}/{}/{} ", tile.z, tile.x, tile.y)
    } else {
        " tiles unavailable: no map key ".to_string()
    };

    let canvas = Canvas::default()
        .block(
            Block::bordered()
                .title(format!(" Map · {} · zoom {} ", handle.center(), handle.zoom()))
                .title(block::Title::from(tiles).alignment(Alignment::Right)),
        )
        .marker(symbols::Marker::Braille)
        .x_bounds(viewport.x_bounds)
        .y_bounds(viewport.y_bounds)
        .paint(|ctx| {
            ctx.draw(&Map {
                color: Color::Rgb(80, 80, 80),
                resolution: MapResolution::High,
            });
            ctx.layer();

            if let Some(marker) = handle.marker() {
                let at = marker.position();
                ctx.print(
                    at.lon,
                    at.lat,
                    Line::from(Span::styled(
                        "▼",
                        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                    )),
                );
            }
        });

    f.render_widget(canvas, area);
}

fn render_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let help = Span::styled(
        " Enter search │ PgUp/PgDn zoom │ Esc quit ",
        Style::default().fg(Color::DarkGray),
    );

    let status = if let Some(err) = app.coordinator.last_error() {
        Span::styled(format!(" {} ", err), Style::default().fg(Color::Red))
    } else if let Some(at) = app.coordinator.last_success() {
        Span::styled(
            format!(" Updated {} ", at.format("%H:%M:%S")),
            Style::default().fg(Color::Green),
        )
    } else {
        Span::raw("")
    };

    f.render_widget(Paragraph::new(Line::from(vec![help, status])), area);
}
