use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ess_analytics::{distinct_values, export, DashboardSnapshot, SessionFilter};
use ess_core::charts::{ChartKind, ChartSpec, Metric};
use ess_core::{normalize_all, SessionRecord, SessionRow};
use ess_store::{
    resolve_config, SessionCache, SessionStore, StoreError, DEFAULT_CACHE_TTL,
};
use futures_util::StreamExt;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span, Text},
    widgets::{Axis, BarChart, Block, Borders, Chart, Dataset, GraphType, Paragraph, Wrap},
    Terminal,
};
use std::error::Error;
use std::io;
use std::path::Path;
use std::time::Duration;
use tokio::time::interval;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const EXPORT_PATH: &str = "session_export.csv";
const STALENESS_POLL_SECS: u64 = 15;
const MAX_BARS: usize = 6;
const BAR_LABEL_WIDTH: usize = 8;

/// Loads the table through the TTL cache, reconnecting lazily. The mongodb
/// client is created once and reused for the process lifetime.
struct Loader {
    cache: SessionCache,
    store: Option<SessionStore>,
}

impl Loader {
    fn new(cache: SessionCache) -> Self {
        Self { cache, store: None }
    }

    fn is_stale(&self) -> bool {
        self.cache.get().is_none()
    }

    async fn load(&mut self, force: bool) -> Result<Vec<SessionRecord>, StoreError> {
        if force {
            self.cache.invalidate();
        }
        if let Some(records) = self.cache.get() {
            return Ok(records.to_vec());
        }

        let store = match self.store.take() {
            Some(store) => store,
            None => {
                let config = resolve_config()?;
                SessionStore::connect(&config).await?
            }
        };
        let fetched = store.fetch_all().await;
        self.store = Some(store);
        let records = fetched?;
        self.cache.put(records.clone());
        Ok(records)
    }
}

#[derive(Clone, Debug)]
struct LoadFailure {
    message: String,
    remediation: String,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Focus {
    Devices,
    SessionTypes,
    DateRange,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum DateField {
    Start,
    End,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Action {
    None,
    Quit,
    Reload,
}

struct App {
    table: Vec<SessionRow>,
    filter: SessionFilter,
    view: Vec<SessionRow>,
    snapshot: DashboardSnapshot,
    device_options: Vec<String>,
    type_options: Vec<String>,
    focus: Focus,
    device_cursor: usize,
    type_cursor: usize,
    date_field: DateField,
    status_note: Option<String>,
    failure: Option<LoadFailure>,
    loaded_once: bool,
}

impl App {
    fn new() -> Self {
        let filter = SessionFilter::permissive(&[]);
        Self {
            table: Vec::new(),
            view: Vec::new(),
            snapshot: DashboardSnapshot::build(&[]),
            filter,
            device_options: Vec::new(),
            type_options: Vec::new(),
            focus: Focus::Devices,
            device_cursor: 0,
            type_cursor: 0,
            date_field: DateField::Start,
            status_note: None,
            failure: None,
            loaded_once: false,
        }
    }

    fn apply_load(&mut self, result: Result<Vec<SessionRecord>, StoreError>) {
        match result {
            Ok(records) => {
                self.failure = None;
                self.set_table(&records);
            }
            Err(err) => {
                warn!(error = %err, "session load failed");
                self.failure = Some(LoadFailure {
                    message: err.to_string(),
                    remediation: err.remediation_text(),
                });
            }
        }
    }

    fn set_table(&mut self, records: &[SessionRecord]) {
        self.table = normalize_all(records);
        self.device_options = distinct_values(&self.table, ess_core::CategoricalField::Device)
            .into_iter()
            .collect();
        self.type_options = distinct_values(&self.table, ess_core::CategoricalField::SessionType)
            .into_iter()
            .collect();
        if !self.loaded_once {
            self.filter = SessionFilter::permissive(&self.table);
            self.loaded_once = true;
        }
        self.device_cursor = self.device_cursor.min(self.device_options.len().saturating_sub(1));
        self.type_cursor = self.type_cursor.min(self.type_options.len().saturating_sub(1));
        self.recompute();
    }

    /// One synchronous re-render: derive the view, rebuild the snapshot.
    fn recompute(&mut self) {
        self.view = self.filter.apply(&self.table);
        self.snapshot = DashboardSnapshot::build(&self.view);
    }

    fn move_cursor(&mut self, delta: i64) {
        match self.focus {
            Focus::Devices => {
                self.device_cursor = step(self.device_cursor, delta, self.device_options.len());
            }
            Focus::SessionTypes => {
                self.type_cursor = step(self.type_cursor, delta, self.type_options.len());
            }
            Focus::DateRange => {
                self.date_field = match self.date_field {
                    DateField::Start => DateField::End,
                    DateField::End => DateField::Start,
                };
            }
        }
    }

    fn toggle_selected(&mut self) {
        let (options, cursor, selected) = match self.focus {
            Focus::Devices => (
                &self.device_options,
                self.device_cursor,
                &mut self.filter.devices,
            ),
            Focus::SessionTypes => (
                &self.type_options,
                self.type_cursor,
                &mut self.filter.session_types,
            ),
            Focus::DateRange => return,
        };
        if let Some(value) = options.get(cursor) {
            if !selected.remove(value) {
                selected.insert(value.clone());
            }
        }
        self.recompute();
    }

    fn select_all(&mut self, all: bool) {
        match self.focus {
            Focus::Devices => {
                self.filter.devices = if all {
                    self.device_options.iter().cloned().collect()
                } else {
                    Default::default()
                };
            }
            Focus::SessionTypes => {
                self.filter.session_types = if all {
                    self.type_options.iter().cloned().collect()
                } else {
                    Default::default()
                };
            }
            Focus::DateRange => return,
        }
        self.recompute();
    }

    fn shift_date(&mut self, forward: bool) {
        if self.focus != Focus::DateRange {
            return;
        }
        let field = match self.date_field {
            DateField::Start => &mut self.filter.start_date,
            DateField::End => &mut self.filter.end_date,
        };
        let shifted = if forward { field.succ_opt() } else { field.pred_opt() };
        if let Some(date) = shifted {
            *field = date;
        }
        self.recompute();
    }

    fn export_view(&mut self) {
        match export::write_csv_file(&self.view, Path::new(EXPORT_PATH)) {
            Ok(()) => {
                info!(rows = self.view.len(), path = EXPORT_PATH, "exported filtered view");
                self.status_note = Some(format!(
                    "exported {} rows to {EXPORT_PATH}",
                    self.view.len()
                ));
            }
            Err(err) => {
                warn!(error = %err, "csv export failed");
                self.status_note = Some(format!("export failed: {err}"));
            }
        }
    }
}

fn step(cursor: usize, delta: i64, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let max = len - 1;
    if delta < 0 {
        cursor.saturating_sub(delta.unsigned_abs() as usize)
    } else {
        (cursor + delta as usize).min(max)
    }
}

fn cache_ttl() -> Duration {
    match std::env::var("ESS_CACHE_TTL_SECS") {
        Ok(raw) => match raw.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => Duration::from_secs(secs),
            _ => DEFAULT_CACHE_TTL,
        },
        Err(_) => DEFAULT_CACHE_TTL,
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_enabled = matches!(
        std::env::var("ESS_LOG_STDOUT").ok().as_deref(),
        Some("1") | Some("true") | Some("TRUE") | Some("yes") | Some("YES")
    );
    if stdout_enabled {
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    } else {
        // The alternate screen owns stdout; logs would tear the frame.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::sink)
            .try_init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_logging();

    let mut loader = Loader::new(SessionCache::new(cache_ttl()));
    let mut app = App::new();
    app.apply_load(loader.load(false).await);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    let mut events = EventStream::new();
    let mut staleness_ticker = interval(Duration::from_secs(STALENESS_POLL_SECS));
    let mut reload_requested = false;
    let mut force_reload = false;

    loop {
        if reload_requested {
            reload_requested = false;
            app.apply_load(loader.load(force_reload).await);
            force_reload = false;
        }

        terminal.draw(|frame| render_ui(frame, &app))?;

        tokio::select! {
            _ = staleness_ticker.tick() => {
                if app.failure.is_none() && loader.is_stale() && app.loaded_once {
                    reload_requested = true;
                }
            }
            maybe_event = events.next() => {
                if let Some(Ok(event)) = maybe_event {
                    match handle_input(event, &mut app) {
                        Action::Quit => break,
                        Action::Reload => {
                            reload_requested = true;
                            force_reload = true;
                        }
                        Action::None => {}
                    }
                }
            }
        }
    }

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn handle_input(event: Event, app: &mut App) -> Action {
    let Event::Key(KeyEvent { code, kind, .. }) = event else {
        return Action::None;
    };
    if kind != KeyEventKind::Press {
        return Action::None;
    }
    match code {
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        KeyCode::Char('r') => Action::Reload,
        KeyCode::Char('e') => {
            if app.failure.is_none() {
                app.export_view();
            }
            Action::None
        }
        KeyCode::Tab => {
            app.focus = match app.focus {
                Focus::Devices => Focus::SessionTypes,
                Focus::SessionTypes => Focus::DateRange,
                Focus::DateRange => Focus::Devices,
            };
            Action::None
        }
        KeyCode::Up => {
            app.move_cursor(-1);
            Action::None
        }
        KeyCode::Down => {
            app.move_cursor(1);
            Action::None
        }
        KeyCode::Left => {
            app.shift_date(false);
            Action::None
        }
        KeyCode::Right => {
            app.shift_date(true);
            Action::None
        }
        KeyCode::Char(' ') => {
            app.toggle_selected();
            Action::None
        }
        KeyCode::Char('a') => {
            app.select_all(true);
            Action::None
        }
        KeyCode::Char('n') => {
            app.select_all(false);
            Action::None
        }
        _ => Action::None,
    }
}

#[derive(Clone, Copy)]
struct ScopeTheme {
    bg: Color,
    surface: Color,
    border: Color,
    title: Color,
    text: Color,
    muted: Color,
    accent: Color,
    ok: Color,
    warn: Color,
    critical: Color,
}

fn scope_theme() -> ScopeTheme {
    ScopeTheme {
        bg: Color::Rgb(13, 17, 23),
        surface: Color::Rgb(22, 27, 34),
        border: Color::Rgb(68, 76, 86),
        title: Color::Rgb(201, 209, 217),
        text: Color::Rgb(230, 237, 243),
        muted: Color::Rgb(139, 148, 158),
        accent: Color::Rgb(88, 166, 255),
        ok: Color::Rgb(63, 185, 80),
        warn: Color::Rgb(210, 153, 34),
        critical: Color::Rgb(248, 81, 73),
    }
}

fn render_ui(frame: &mut ratatui::Frame, app: &App) {
    let size = frame.size();
    let theme = scope_theme();

    // Either the full dashboard renders or the full error panel does.
    if let Some(failure) = &app.failure {
        render_error_panel(frame, failure, theme, size);
        return;
    }

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(8),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(1),
        ])
        .split(size);

    frame.render_widget(render_header(app, theme), layout[0]);
    render_filter_bar(frame, app, theme, layout[1]);
    render_metric_row(frame, app.snapshot.primary_metrics(), theme, layout[2]);
    render_metric_row(frame, app.snapshot.advanced_metrics(), theme, layout[3]);
    render_chart_grid(frame, app, theme, layout[4]);
    frame.render_widget(render_footer(theme), layout[5]);
}

fn render_header(app: &App, theme: ScopeTheme) -> Paragraph<'static> {
    let span_text = format!(
        "{} → {}",
        app.filter.start_date, app.filter.end_date
    );
    let status = app
        .status_note
        .clone()
        .unwrap_or_else(|| "ready".to_string());
    let line = format!(
        "Sessions: {}/{} in view | Dates: {span_text} | {status}",
        app.view.len(),
        app.table.len()
    );
    Paragraph::new(Line::from(Span::styled(
        line,
        Style::default().fg(theme.text),
    )))
    .style(Style::default().bg(theme.bg))
    .block(titled_block("Ecommerce Session Scope", theme))
}

fn render_footer(theme: ScopeTheme) -> Paragraph<'static> {
    Paragraph::new(Line::from(Span::styled(
        "Tab panel | Up/Down move | Space toggle | a all | n none | Left/Right date | e export | r reload | q quit",
        Style::default().fg(theme.muted),
    )))
}

fn titled_block(title: &str, theme: ScopeTheme) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.border))
        .style(Style::default().bg(theme.bg))
        .title(Span::styled(
            title.to_string(),
            Style::default()
                .fg(theme.title)
                .add_modifier(Modifier::BOLD),
        ))
}

fn focus_block(title: &str, focused: bool, theme: ScopeTheme) -> Block<'static> {
    let border = if focused { theme.accent } else { theme.border };
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .style(Style::default().bg(theme.bg))
        .title(Span::styled(
            title.to_string(),
            Style::default()
                .fg(theme.title)
                .add_modifier(Modifier::BOLD),
        ))
}

fn render_filter_bar(frame: &mut ratatui::Frame, app: &App, theme: ScopeTheme, area: Rect) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(30),
            Constraint::Percentage(35),
            Constraint::Percentage(35),
        ])
        .split(area);

    let start_marker = if app.date_field == DateField::Start { ">" } else { " " };
    let end_marker = if app.date_field == DateField::End { ">" } else { " " };
    let date_lines = vec![
        Line::from(Span::styled(
            format!("{start_marker} from {}", app.filter.start_date),
            Style::default().fg(theme.text),
        )),
        Line::from(Span::styled(
            format!("{end_marker} to   {}", app.filter.end_date),
            Style::default().fg(theme.text),
        )),
    ];
    frame.render_widget(
        Paragraph::new(Text::from(date_lines)).block(focus_block(
            "Date Range",
            app.focus == Focus::DateRange,
            theme,
        )),
        columns[0],
    );

    render_multi_select(
        frame,
        "Device Type",
        &app.device_options,
        &app.filter.devices,
        app.device_cursor,
        app.focus == Focus::Devices,
        theme,
        columns[1],
    );
    render_multi_select(
        frame,
        "Session Type",
        &app.type_options,
        &app.filter.session_types,
        app.type_cursor,
        app.focus == Focus::SessionTypes,
        theme,
        columns[2],
    );
}

#[allow(clippy::too_many_arguments)]
fn render_multi_select(
    frame: &mut ratatui::Frame,
    title: &str,
    options: &[String],
    selected: &std::collections::BTreeSet<String>,
    cursor: usize,
    focused: bool,
    theme: ScopeTheme,
    area: Rect,
) {
    let visible = area.height.saturating_sub(2) as usize;
    let first = cursor.saturating_sub(visible.saturating_sub(1));
    let lines: Vec<Line<'static>> = options
        .iter()
        .enumerate()
        .skip(first)
        .take(visible.max(1))
        .map(|(index, option)| {
            let mark = if selected.contains(option) { "[x]" } else { "[ ]" };
            let pointer = if focused && index == cursor { ">" } else { " " };
            let style = if focused && index == cursor {
                Style::default().fg(theme.accent)
            } else if selected.contains(option) {
                Style::default().fg(theme.text)
            } else {
                Style::default().fg(theme.muted)
            };
            Line::from(Span::styled(format!("{pointer}{mark} {option}"), style))
        })
        .collect();

    let body = if lines.is_empty() {
        vec![Line::from(Span::styled(
            "no values",
            Style::default().fg(theme.muted),
        ))]
    } else {
        lines
    };
    frame.render_widget(
        Paragraph::new(Text::from(body)).block(focus_block(title, focused, theme)),
        area,
    );
}

fn render_metric_row(frame: &mut ratatui::Frame, metrics: &[Metric], theme: ScopeTheme, area: Rect) {
    if metrics.is_empty() {
        return;
    }
    let share = (100 / metrics.len().max(1)) as u16;
    let constraints: Vec<Constraint> = metrics.iter().map(|_| Constraint::Percentage(share)).collect();
    let tiles = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints)
        .split(area);
    for (metric, tile) in metrics.iter().zip(tiles.iter()) {
        let line = Line::from(vec![
            Span::styled(
                metric.formatted.clone(),
                Style::default().fg(theme.ok).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!("  {}", metric.label),
                Style::default().fg(theme.muted),
            ),
        ]);
        frame.render_widget(
            Paragraph::new(line).block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(theme.border)),
            ),
            *tile,
        );
    }
}

fn render_chart_grid(frame: &mut ratatui::Frame, app: &App, theme: ScopeTheme, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);
    let charts = &app.snapshot.charts;
    for (row_index, row_area) in rows.iter().enumerate() {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(33),
                Constraint::Percentage(34),
                Constraint::Percentage(33),
            ])
            .split(*row_area);
        for (col_index, column) in columns.iter().enumerate() {
            if let Some(chart) = charts.get(row_index * 3 + col_index) {
                render_chart(frame, chart, theme, *column);
            }
        }
    }
}

fn render_chart(frame: &mut ratatui::Frame, chart: &ChartSpec, theme: ScopeTheme, area: Rect) {
    if chart.is_empty() {
        frame.render_widget(
            Paragraph::new(Line::from(Span::styled(
                "no data for current filters",
                Style::default().fg(theme.muted),
            )))
            .wrap(Wrap { trim: true })
            .block(titled_block(&chart.title, theme)),
            area,
        );
        return;
    }
    match chart.kind {
        ChartKind::Pie => render_breakdown(frame, chart, theme, area),
        ChartKind::Bar => render_bars(frame, chart, theme, area),
        ChartKind::Line => render_line(frame, chart, theme, area),
    }
}

/// Pie distributions render as a percentage breakdown list; the terminal has
/// no arcs to offer.
fn render_breakdown(frame: &mut ratatui::Frame, chart: &ChartSpec, theme: ScopeTheme, area: Rect) {
    let total: f64 = chart.series.iter().map(|point| point.value).sum();
    let palette = [theme.accent, theme.ok, theme.warn, theme.critical, theme.muted];
    let visible = area.height.saturating_sub(2) as usize;
    let lines: Vec<Line<'static>> = chart
        .series
        .iter()
        .take(visible.max(1))
        .enumerate()
        .map(|(index, point)| {
            let share = if total > 0.0 {
                point.value / total * 100.0
            } else {
                0.0
            };
            Line::from(vec![
                Span::styled("■ ", Style::default().fg(palette[index % palette.len()])),
                Span::styled(
                    format!("{:<12}", truncated(&point.label, 12)),
                    Style::default().fg(theme.text),
                ),
                Span::styled(
                    format!("{share:>5.1}% ({})", point.value as u64),
                    Style::default().fg(theme.muted),
                ),
            ])
        })
        .collect();
    frame.render_widget(
        Paragraph::new(Text::from(lines)).block(titled_block(&chart.title, theme)),
        area,
    );
}

fn render_bars(frame: &mut ratatui::Frame, chart: &ChartSpec, theme: ScopeTheme, area: Rect) {
    let labels: Vec<String> = chart
        .series
        .iter()
        .take(MAX_BARS)
        .map(|point| truncated(&point.label, BAR_LABEL_WIDTH))
        .collect();
    let data: Vec<(&str, u64)> = chart
        .series
        .iter()
        .take(MAX_BARS)
        .zip(&labels)
        .map(|(point, label)| (label.as_str(), point.value.max(0.0).round() as u64))
        .collect();
    let widget = BarChart::default()
        .block(titled_block(&chart.title, theme))
        .data(&data)
        .bar_width(BAR_LABEL_WIDTH as u16)
        .bar_gap(1)
        .bar_style(Style::default().fg(theme.accent))
        .value_style(Style::default().fg(theme.text))
        .label_style(Style::default().fg(theme.muted));
    frame.render_widget(widget, area);
}

fn render_line(frame: &mut ratatui::Frame, chart: &ChartSpec, theme: ScopeTheme, area: Rect) {
    let points: Vec<(f64, f64)> = chart
        .series
        .iter()
        .enumerate()
        .map(|(index, point)| (index as f64, point.value))
        .collect();
    let max_y = points
        .iter()
        .map(|(_, value)| *value)
        .fold(1.0_f64, f64::max);
    let max_x = (points.len().saturating_sub(1)).max(1) as f64;
    let first_label = chart
        .series
        .first()
        .map(|point| point.label.clone())
        .unwrap_or_default();
    let last_label = chart
        .series
        .last()
        .map(|point| point.label.clone())
        .unwrap_or_default();

    let datasets = vec![Dataset::default()
        .name("sessions")
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(theme.accent))
        .data(&points)];
    let widget = Chart::new(datasets)
        .block(titled_block(&chart.title, theme))
        .x_axis(
            Axis::default()
                .style(Style::default().fg(theme.muted))
                .bounds([0.0, max_x])
                .labels(vec![
                    Span::styled(first_label, Style::default().fg(theme.muted)),
                    Span::styled(last_label, Style::default().fg(theme.muted)),
                ]),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(theme.muted))
                .bounds([0.0, max_y])
                .labels(vec![
                    Span::styled("0", Style::default().fg(theme.muted)),
                    Span::styled(format!("{max_y:.0}"), Style::default().fg(theme.muted)),
                ]),
        );
    frame.render_widget(widget, area);
}

fn render_error_panel(
    frame: &mut ratatui::Frame,
    failure: &LoadFailure,
    theme: ScopeTheme,
    area: Rect,
) {
    let mut lines = vec![
        Line::from(Span::styled(
            "Could not load session data",
            Style::default()
                .fg(theme.critical)
                .add_modifier(Modifier::BOLD),
        )),
        Line::default(),
        Line::from(Span::styled(
            failure.message.clone(),
            Style::default().fg(theme.text),
        )),
        Line::default(),
    ];
    for remediation_line in failure.remediation.lines() {
        lines.push(Line::from(Span::styled(
            remediation_line.to_string(),
            Style::default().fg(theme.muted),
        )));
    }
    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        "r retry | q quit",
        Style::default().fg(theme.warn),
    )));

    frame.render_widget(
        Paragraph::new(Text::from(lines))
            .wrap(Wrap { trim: false })
            .style(Style::default().bg(theme.surface))
            .block(titled_block("Ecommerce Session Scope", theme)),
        area,
    );
}

fn truncated(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let kept: String = text.chars().take(max.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use ess_core::{DeviceInfo, SessionTags};

    fn record(id: &str, day: u32, device: &str, session_type: &str) -> SessionRecord {
        let stamp = Utc
            .with_ymd_and_hms(2026, 3, day, 10, 0, 0)
            .single()
            .expect("valid timestamp");
        SessionRecord {
            id: id.to_string(),
            start_time: stamp,
            last_activity: stamp,
            device_info: Some(DeviceInfo {
                device: Some(device.to_string()),
                browser: None,
            }),
            session_metadata: None,
            session_tags: Some(SessionTags {
                session_type: Some(session_type.to_string()),
                segment: None,
                category: None,
            }),
        }
    }

    #[test]
    fn successful_load_builds_a_permissive_view() {
        let mut app = App::new();
        app.apply_load(Ok(vec![
            record("a", 1, "mobile", "converted"),
            record("b", 2, "desktop", "bounced"),
        ]));
        assert!(app.failure.is_none());
        assert_eq!(app.view.len(), 2);
        assert_eq!(app.device_options, vec!["desktop", "mobile"]);
    }

    #[test]
    fn failed_load_keeps_the_error_panel_state() {
        let mut app = App::new();
        app.apply_load(Err(StoreError::Config {
            reason: "no secret".to_string(),
        }));
        let failure = app.failure.as_ref().expect("failure recorded");
        assert!(failure.message.contains("no secret"));
        assert!(failure.remediation.contains("ESS_CONNECTION_STRING"));
    }

    #[test]
    fn toggling_a_device_narrows_the_view() {
        let mut app = App::new();
        app.apply_load(Ok(vec![
            record("a", 1, "mobile", "converted"),
            record("b", 2, "desktop", "bounced"),
        ]));
        app.focus = Focus::Devices;
        app.device_cursor = 0; // "desktop" sorts first
        app.toggle_selected();
        assert_eq!(app.view.len(), 1);
        assert_eq!(app.view[0].device, "mobile");
    }

    #[test]
    fn select_none_empties_the_view() {
        let mut app = App::new();
        app.apply_load(Ok(vec![record("a", 1, "mobile", "converted")]));
        app.focus = Focus::SessionTypes;
        app.select_all(false);
        assert!(app.view.is_empty());
        assert_eq!(app.snapshot.metrics[0].formatted, "0");
    }

    #[test]
    fn reload_after_failure_recovers() {
        let mut app = App::new();
        app.apply_load(Err(StoreError::Config {
            reason: "down".to_string(),
        }));
        app.apply_load(Ok(vec![record("a", 1, "mobile", "converted")]));
        assert!(app.failure.is_none());
        assert_eq!(app.view.len(), 1);
    }

    #[test]
    fn date_shift_only_applies_when_focused() {
        let mut app = App::new();
        app.apply_load(Ok(vec![record("a", 1, "mobile", "converted")]));
        let before = app.filter.start_date;
        app.focus = Focus::Devices;
        app.shift_date(true);
        assert_eq!(app.filter.start_date, before);

        app.focus = Focus::DateRange;
        app.shift_date(true);
        assert_eq!(app.filter.start_date, before.succ_opt().expect("next day"));
    }

    #[test]
    fn truncated_labels_keep_within_width() {
        assert_eq!(truncated("desktop", 8), "desktop");
        assert_eq!(truncated("cart_abandoned", 8), "cart_ab…");
    }
}
