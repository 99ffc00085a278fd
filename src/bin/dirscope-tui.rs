use anyhow::Context;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyModifiers,
    MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use dirscope::config::Config;
use dirscope::navigator::{DirectoryPicker, DrillDownNavigator, NavStatus, RenderModel, RenderSurface};
use dirscope::units::format_size;
use dirscope::DirectoryEntry;
use ratatui::backend::CrosstermBackend;
use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Layout, Rect as UiRect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Widget};
use ratatui::{Frame, Terminal};
use std::io::{self, stdout};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const SIZE_COLUMN: u16 = 11;
const PERCENT_COLUMN: u16 = 7;

/// The path input acts as the directory chooser.
struct PathInput<'a>(&'a str);

impl DirectoryPicker for PathInput<'_> {
    fn prompt_for_directory(&mut self) -> Option<PathBuf> {
        let trimmed = self.0.trim();
        (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
    }
}

#[derive(Default)]
struct ModelSlot {
    model: Option<RenderModel>,
}

impl RenderSurface for ModelSlot {
    fn render(&mut self, model: &RenderModel) {
        self.model = Some(model.clone());
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum InputMode {
    Normal,
    Path,
    Filter,
}

#[derive(Clone, Copy)]
struct CrumbHit {
    index: usize,
    x0: u16,
    x1: u16,
    y: u16,
}

#[derive(Default)]
struct UiLayoutState {
    path_input_area: Option<UiRect>,
    filter_input_area: Option<UiRect>,
    list_inner_area: Option<UiRect>,
    list_offset: usize,
    crumbs: Vec<CrumbHit>,
}

struct App {
    navigator: DrillDownNavigator,
    view: ModelSlot,
    path_input: String,
    filter_input: String,
    mode: InputMode,
    selected: usize,
    ui_layout: UiLayoutState,
    should_quit: bool,
}

impl App {
    fn new(config: &Config, start_path: Option<PathBuf>) -> Self {
        let mut navigator = DrillDownNavigator::from_config(config);
        let mut mode = InputMode::Path;
        let mut path_input = String::from(".");
        if let Some(path) = start_path {
            path_input = path.display().to_string();
            navigator.select_root(path);
            mode = InputMode::Normal;
        }

        let mut view = ModelSlot::default();
        navigator.present(&mut view);

        Self {
            navigator,
            view,
            path_input,
            filter_input: String::new(),
            mode,
            selected: 0,
            ui_layout: UiLayoutState::default(),
            should_quit: false,
        }
    }

    fn model(&self) -> Option<&RenderModel> {
        self.view.model.as_ref()
    }

    fn entries(&self) -> &[DirectoryEntry] {
        self.model().map(|m| m.entries.as_slice()).unwrap_or(&[])
    }

    fn refresh(&mut self) {
        self.navigator.present(&mut self.view);
        if let Some(model) = self.view.model.as_ref() {
            self.filter_input.clone_from(&model.filter);
        }
        let count = self.entries().len();
        if self.selected >= count {
            self.selected = count.saturating_sub(1);
        }
    }

    fn after_navigation(&mut self, launched: bool) {
        if launched {
            self.selected = 0;
            self.filter_input.clear();
            if let Some(path) = self.navigator.current_path() {
                self.path_input = path.display().to_string();
            }
        }
        self.refresh();
    }

    fn poll_scan_updates(&mut self) {
        if self.navigator.poll() {
            self.refresh();
        }
    }

    fn start_scan(&mut self) {
        let launched = self.navigator.browse(&mut PathInput(&self.path_input));
        self.after_navigation(launched);
    }

    fn open_selected(&mut self) {
        let launched = self.navigator.open_entry_at(self.selected);
        self.after_navigation(launched);
    }

    fn go_back(&mut self) {
        let launched = self.navigator.back();
        self.after_navigation(launched);
    }

    fn go_home(&mut self) {
        let launched = self.navigator.home();
        self.after_navigation(launched);
    }

    fn rescan(&mut self) {
        let launched = self.navigator.rescan();
        self.after_navigation(launched);
    }

    fn open_breadcrumb(&mut self, index: usize) {
        let launched = self.navigator.open_breadcrumb(index);
        self.after_navigation(launched);
    }

    fn apply_filter(&mut self) {
        self.navigator.set_filter(self.filter_input.clone());
        self.selected = 0;
        self.refresh();
    }

    fn move_selection(&mut self, delta: isize) {
        let count = self.entries().len();
        if count == 0 {
            self.selected = 0;
            return;
        }
        let next = self.selected as isize + delta;
        self.selected = next.clamp(0, count as isize - 1) as usize;
    }

    fn on_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && matches!(key.code, KeyCode::Char('c')) {
            self.should_quit = true;
            return;
        }

        match self.mode {
            InputMode::Path => {
                match key.code {
                    KeyCode::Enter => {
                        self.mode = InputMode::Normal;
                        self.start_scan();
                    }
                    KeyCode::Esc => self.mode = InputMode::Normal,
                    KeyCode::Backspace => {
                        self.path_input.pop();
                    }
                    KeyCode::Char(ch) => self.path_input.push(ch),
                    _ => {}
                }
                return;
            }
            InputMode::Filter => {
                match key.code {
                    KeyCode::Enter | KeyCode::Esc => self.mode = InputMode::Normal,
                    KeyCode::Backspace => {
                        self.filter_input.pop();
                        self.apply_filter();
                    }
                    KeyCode::Char(ch) => {
                        self.filter_input.push(ch);
                        self.apply_filter();
                    }
                    _ => {}
                }
                return;
            }
            InputMode::Normal => {}
        }

        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('/') => self.mode = InputMode::Path,
            KeyCode::Char('f') => self.mode = InputMode::Filter,
            KeyCode::Char('r') => self.rescan(),
            KeyCode::Char('g') | KeyCode::Home => self.go_home(),
            KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
            KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
            KeyCode::Enter | KeyCode::Right | KeyCode::Char('l') => self.open_selected(),
            KeyCode::Backspace | KeyCode::Left | KeyCode::Char('h') | KeyCode::Char('u') => {
                self.go_back()
            }
            KeyCode::Esc => {
                self.filter_input.clear();
                self.apply_filter();
            }
            _ => {}
        }
    }

    fn on_mouse(&mut self, event: MouseEvent) {
        match event.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                if let Some(area) = self.ui_layout.path_input_area {
                    if point_in_rect(area, event.column, event.row) {
                        self.mode = InputMode::Path;
                        return;
                    }
                }
                if let Some(area) = self.ui_layout.filter_input_area {
                    if point_in_rect(area, event.column, event.row) {
                        self.mode = InputMode::Filter;
                        return;
                    }
                }

                let crumb = self
                    .ui_layout
                    .crumbs
                    .iter()
                    .find(|hit| hit.y == event.row && event.column >= hit.x0 && event.column <= hit.x1)
                    .copied();
                if let Some(hit) = crumb {
                    self.open_breadcrumb(hit.index);
                    return;
                }

                if let Some(index) = self.row_at(event.column, event.row) {
                    self.selected = index;
                    self.open_selected();
                }
            }
            MouseEventKind::Down(MouseButton::Right) | MouseEventKind::Down(MouseButton::Middle) => {
                self.go_back();
            }
            MouseEventKind::ScrollUp => self.move_selection(-1),
            MouseEventKind::ScrollDown => self.move_selection(1),
            _ => {}
        }
    }

    fn row_at(&self, x: u16, y: u16) -> Option<usize> {
        let area = self.ui_layout.list_inner_area?;
        if !point_in_rect(area, x, y) {
            return None;
        }
        let index = self.ui_layout.list_offset + (y - area.y) as usize;
        (index < self.entries().len()).then_some(index)
    }
}

fn point_in_rect(rect: UiRect, x: u16, y: u16) -> bool {
    x >= rect.x
        && x < rect.x.saturating_add(rect.width)
        && y >= rect.y
        && y < rect.y.saturating_add(rect.height)
}

fn truncate_label(label: &str, width: usize) -> String {
    if label.chars().count() <= width {
        return label.to_string();
    }
    let mut out: String = label.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn bar_color(percentage: f64, is_dir: bool) -> Color {
    let ratio = (percentage / 100.0).clamp(0.0, 1.0) as f32;
    if is_dir {
        let r = (35.0 + ratio * 65.0) as u8;
        let g = (95.0 + ratio * 95.0) as u8;
        let b = (145.0 + ratio * 85.0) as u8;
        Color::Rgb(r, g, b)
    } else {
        let r = (55.0 + ratio * 120.0) as u8;
        let g = (85.0 + ratio * 95.0) as u8;
        let b = (95.0 + ratio * 70.0) as u8;
        Color::Rgb(r, g, b)
    }
}

/// Ranked rows: name, size, a proportional bar and the percentage.
struct EntryListWidget<'a> {
    entries: &'a [DirectoryEntry],
    selected: usize,
    offset: usize,
}

impl Widget for EntryListWidget<'_> {
    fn render(self, area: UiRect, buf: &mut Buffer) {
        let fixed = SIZE_COLUMN + PERCENT_COLUMN + 2;
        if area.height == 0 || area.width < fixed + 8 {
            return;
        }

        let remaining = area.width.saturating_sub(fixed);
        let name_width = (remaining / 2).max(8).min(remaining);
        let bar_width = remaining.saturating_sub(name_width);

        let visible = self
            .entries
            .iter()
            .enumerate()
            .skip(self.offset)
            .take(area.height as usize);

        for (row, (index, entry)) in visible.enumerate() {
            let y = area.y + row as u16;
            let is_selected = index == self.selected;
            let row_style = if is_selected {
                Style::default().bg(Color::Rgb(52, 58, 70)).fg(Color::White)
            } else {
                Style::default().fg(Color::White)
            };
            for x in area.x..area.x.saturating_add(area.width) {
                buf[(x, y)].set_char(' ').set_style(row_style);
            }

            let icon = if entry.is_dir { '▸' } else { ' ' };
            let name = truncate_label(&format!("{} {}", icon, entry.name()), name_width as usize);
            let name_style = if entry.is_dir {
                row_style.add_modifier(Modifier::BOLD)
            } else {
                row_style
            };
            buf.set_stringn(area.x, y, &name, name_width as usize, name_style);

            let size_text = format!("{:>width$}", format_size(entry.size_bytes), width = SIZE_COLUMN as usize);
            let size_x = area.x + name_width;
            buf.set_stringn(size_x, y, &size_text, SIZE_COLUMN as usize, row_style);

            let bar_x = size_x + SIZE_COLUMN + 1;
            let filled = ((entry.percentage / 100.0) * bar_width as f64).round() as u16;
            let color = bar_color(entry.percentage, entry.is_dir);
            for i in 0..bar_width {
                let (ch, style) = if i < filled {
                    ('█', row_style.fg(color))
                } else {
                    ('░', row_style.fg(Color::Rgb(70, 70, 76)))
                };
                buf[(bar_x + i, y)].set_char(ch).set_style(style);
            }

            let pct_text = format!("{:>6.1}%", entry.percentage);
            buf.set_stringn(bar_x + bar_width + 1, y, &pct_text, PERCENT_COLUMN as usize, row_style);
        }
    }
}

fn status_color(status: &NavStatus) -> Color {
    match status {
        NavStatus::Error(_) => Color::Red,
        NavStatus::Empty => Color::Yellow,
        NavStatus::Scanning => Color::Cyan,
        _ => Color::White,
    }
}

fn draw_ui(frame: &mut Frame, app: &mut App) {
    let Some(model) = app.model().cloned() else {
        return;
    };

    let root = frame.area();
    let split = Layout::horizontal([Constraint::Length(42), Constraint::Min(30)]).split(root);
    let left = split[0];
    let right = split[1];

    let left_block = Block::default().title(" dirscope ").borders(Borders::ALL);
    let left_inner = left_block.inner(left);
    frame.render_widget(left_block, left);

    let left_rows = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Length(5),
        Constraint::Min(6),
        Constraint::Length(7),
    ])
    .split(left_inner);

    let input_block = |title: &'static str, active: bool| {
        let title = if active { format!(" {} (typing) ", title) } else { format!(" {} ", title) };
        Block::default().title(title).borders(Borders::ALL)
    };
    let input_style = |active: bool| {
        if active {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::White)
        }
    };

    let path_active = app.mode == InputMode::Path;
    let path_block = input_block("Path", path_active);
    let path_inner = path_block.inner(left_rows[0]);
    frame.render_widget(path_block, left_rows[0]);
    frame.render_widget(
        Paragraph::new(app.path_input.as_str()).style(input_style(path_active)),
        path_inner,
    );
    app.ui_layout.path_input_area = Some(path_inner);

    let filter_active = app.mode == InputMode::Filter;
    let filter_block = input_block("Filter", filter_active);
    let filter_inner = filter_block.inner(left_rows[1]);
    frame.render_widget(filter_block, left_rows[1]);
    frame.render_widget(
        Paragraph::new(app.filter_input.as_str()).style(input_style(filter_active)),
        filter_inner,
    );
    app.ui_layout.filter_input_area = Some(filter_inner);

    frame.render_widget(
        Paragraph::new(model.status_line())
            .style(Style::default().fg(status_color(&model.status)))
            .wrap(ratatui::widgets::Wrap { trim: true })
            .block(Block::default().title(" Status ").borders(Borders::ALL)),
        left_rows[2],
    );

    let mut summary = vec![Line::from(vec![
        Span::styled("Total: ", Style::default().fg(Color::Gray)),
        Span::raw(format_size(model.total_size)),
    ])];
    summary.push(Line::from(vec![
        Span::styled("Depth: ", Style::default().fg(Color::Gray)),
        Span::raw(model.history_depth.to_string()),
    ]));
    if model.hidden_count > 0 {
        summary.push(Line::from(format!("{} more items not shown", model.hidden_count)));
    }
    if let Some(entry) = model.entries.get(app.selected) {
        summary.push(Line::from(vec![
            Span::styled("Selected: ", Style::default().fg(Color::Gray)),
            Span::raw(entry.path.display().to_string()),
        ]));
        summary.push(Line::from(vec![
            Span::styled("Type: ", Style::default().fg(Color::Gray)),
            Span::raw(if entry.is_dir { "directory" } else { "file" }),
        ]));
    }
    frame.render_widget(
        Paragraph::new(summary)
            .wrap(ratatui::widgets::Wrap { trim: false })
            .block(Block::default().title(" Summary ").borders(Borders::ALL)),
        left_rows[3],
    );

    let help_lines = vec![
        Line::from("Enter/l/click: open   h/u/⌫: back"),
        Line::from("g: home   r: rescan   f: filter"),
        Line::from("/: edit path   right click: back"),
        Line::from("j/k: move   q: quit"),
        Line::from("Files open in the file manager"),
    ];
    frame.render_widget(
        Paragraph::new(help_lines).block(Block::default().title(" Controls ").borders(Borders::ALL)),
        left_rows[4],
    );

    let right_rows = Layout::vertical([Constraint::Length(3), Constraint::Min(3)]).split(right);

    let crumb_block = Block::default().title(" Location ").borders(Borders::ALL);
    let crumb_inner = crumb_block.inner(right_rows[0]);
    frame.render_widget(crumb_block, right_rows[0]);

    app.ui_layout.crumbs.clear();
    let mut spans = Vec::new();
    let mut x = crumb_inner.x;
    let last = model.breadcrumbs.len().saturating_sub(1);
    for (index, crumb) in model.breadcrumbs.iter().enumerate() {
        if index > 0 {
            spans.push(Span::styled(" › ", Style::default().fg(Color::Gray)));
            x = x.saturating_add(3);
        }
        let width = crumb.label.chars().count() as u16;
        app.ui_layout.crumbs.push(CrumbHit {
            index,
            x0: x,
            x1: x.saturating_add(width.saturating_sub(1)),
            y: crumb_inner.y,
        });
        let style = if index == last {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::UNDERLINED)
        };
        spans.push(Span::styled(crumb.label.clone(), style));
        x = x.saturating_add(width);
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), crumb_inner);

    let list_block = Block::default()
        .title(" Largest items (click a folder to open it) ")
        .borders(Borders::ALL);
    let list_inner = list_block.inner(right_rows[1]);
    frame.render_widget(list_block, right_rows[1]);
    app.ui_layout.list_inner_area = Some(list_inner);

    let height = list_inner.height as usize;
    if height > 0 {
        if app.selected < app.ui_layout.list_offset {
            app.ui_layout.list_offset = app.selected;
        } else if app.selected >= app.ui_layout.list_offset + height {
            app.ui_layout.list_offset = app.selected + 1 - height;
        }
    }

    if model.status == NavStatus::Displaying && !model.entries.is_empty() {
        frame.render_widget(
            EntryListWidget {
                entries: &model.entries,
                selected: app.selected,
                offset: app.ui_layout.list_offset,
            },
            list_inner,
        );
    } else {
        let message = match &model.status {
            NavStatus::Displaying => "No items match the filter".to_string(),
            _ => model.status_line(),
        };
        frame.render_widget(
            Paragraph::new(message).style(Style::default().fg(Color::Gray)),
            list_inner,
        );
    }
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>, mut app: App) -> io::Result<()> {
    loop {
        app.poll_scan_updates();

        terminal.draw(|frame| {
            draw_ui(frame, &mut app);
        })?;

        if app.should_quit {
            break;
        }

        if event::poll(Duration::from_millis(50))? {
            match event::read()? {
                Event::Key(key) => app.on_key(key),
                Event::Mouse(mouse) => app.on_mouse(mouse),
                Event::Resize(_, _) => {}
                Event::FocusGained | Event::FocusLost | Event::Paste(_) => {}
            }
        }
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    // The terminal is ours; only log when asked to.
    if std::env::var_os("RUST_LOG").is_some() {
        tracing_subscriber::fmt()
            .with_writer(io::stderr)
            .with_ansi(false)
            .with_env_filter(EnvFilter::from_default_env())
            .init();
    }

    let config = Config::load().context("failed to load configuration")?;
    let start_path = std::env::args().nth(1).map(PathBuf::from);
    let app = App::new(&config, start_path);

    enable_raw_mode()?;
    crossterm::execute!(stdout(), EnterAlternateScreen, EnableMouseCapture)?;

    let backend = CrosstermBackend::new(stdout());
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let app_result = run_app(&mut terminal, app);

    disable_raw_mode()?;
    crossterm::execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    app_result.context("terminal UI failed")
}
