use std::io;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use glv_graph::render::lock;
use glv_graph::{
    DefaultFormatter, Fragment, SearchDirection, SearchNavigator, SearchOutcome, SearchQuery,
    SharedContent,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame, Terminal,
};
use tracing::{debug, warn};

/// Text typed after `/` or `?`
struct SearchInput {
    direction: SearchDirection,
    text: String,
}

/// Main TUI application
pub struct App {
    content: SharedContent,
    navigator: SearchNavigator,
    formatter: DefaultFormatter,
    ignore_case: bool,
    input: Option<SearchInput>,
    last_query: Option<SearchQuery>,
    message: Option<String>,
    should_quit: bool,
}

impl App {
    pub fn new(content: SharedContent, formatter: DefaultFormatter, ignore_case: bool) -> Self {
        Self {
            content,
            navigator: SearchNavigator::new(),
            formatter,
            ignore_case,
            input: None,
            last_query: None,
            message: None,
            should_quit: false,
        }
    }

    pub fn run<B: Backend>(mut self, terminal: &mut Terminal<B>) -> Result<()> {
        while !self.should_quit {
            let height = terminal.size()?.height.saturating_sub(1).max(1) as usize;
            let lines = self.visible_lines(height)?;
            let status = self.status_line();
            terminal.draw(|frame| draw(frame, lines, status))?;

            self.collect_search();
            self.handle_events()?;
        }
        self.navigator.cancel()?;
        Ok(())
    }

    fn visible_lines(&mut self, height: usize) -> Result<Vec<Line<'static>>> {
        let mut content = lock(&self.content);
        content.resize(height);
        let top = content.viewport().top;

        let mut lines = Vec::with_capacity(height);
        for n in top..top + height {
            match content.get_line(n, &self.formatter)? {
                Some(fragments) => {
                    let spans: Vec<Span<'static>> = fragments.into_iter().map(span).collect();
                    lines.push(Line::from(spans));
                }
                None => break,
            }
        }
        Ok(lines)
    }

    fn status_line(&self) -> String {
        if let Some(input) = &self.input {
            let prompt = match input.direction {
                SearchDirection::Forward => '/',
                SearchDirection::Backward => '?',
            };
            return format!("{}{}", prompt, input.text);
        }

        let content = lock(&self.content);
        let total = content.line_count();
        let position = format!(
            "{}/{} {:>3.0}%",
            content.cursor() + 1,
            total,
            content.viewport().progress(total)
        );
        match content.status().or(self.message.as_deref()) {
            Some(text) => format!(" {} | {}", text, position),
            None => format!(" {}", position),
        }
    }

    fn collect_search(&mut self) {
        match self.navigator.poll() {
            Ok(Some(SearchOutcome::NotFound)) => {
                self.message = Some("Pattern not found".to_string());
            }
            Ok(Some(outcome)) => debug!(?outcome, "search collected"),
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "search failed");
                self.message = Some(e.to_string());
            }
        }
    }

    fn handle_events(&mut self) -> Result<()> {
        if !event::poll(Duration::from_millis(100))? {
            return Ok(());
        }
        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                return Ok(());
            }
            if self.input.is_some() {
                self.handle_input_key(key)?;
            } else {
                self.handle_normal_key(key)?;
            }
        }
        Ok(())
    }

    fn handle_input_key(&mut self, key: KeyEvent) -> Result<()> {
        let Some(input) = self.input.as_mut() else {
            return Ok(());
        };
        match key.code {
            KeyCode::Esc => self.input = None,
            KeyCode::Backspace => {
                input.text.pop();
            }
            KeyCode::Char(c) => input.text.push(c),
            KeyCode::Enter => {
                if let Some(input) = self.input.take() {
                    if !input.text.is_empty() {
                        let query = SearchQuery::new(input.text, input.direction)
                            .ignore_case(self.ignore_case);
                        self.start_search(query)?;
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> Result<()> {
        self.message = None;
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('/') => self.begin_input(SearchDirection::Forward),
            KeyCode::Char('?') => self.begin_input(SearchDirection::Backward),
            KeyCode::Char('n') => self.repeat_search(false)?,
            KeyCode::Char('N') => self.repeat_search(true)?,
            KeyCode::Esc => {
                self.navigator.cancel()?;
            }
            code => {
                let mut content = lock(&self.content);
                match code {
                    KeyCode::Char('j') | KeyCode::Down => content.move_cursor_down(),
                    KeyCode::Char('k') | KeyCode::Up => content.move_cursor_up(),
                    KeyCode::Char('f') if ctrl => content.page_down(),
                    KeyCode::Char('b') if ctrl => content.page_up(),
                    KeyCode::PageDown | KeyCode::Char(' ') => content.page_down(),
                    KeyCode::PageUp => content.page_up(),
                    KeyCode::Char('g') | KeyCode::Home => content.goto_first(),
                    KeyCode::Char('G') | KeyCode::End => content.goto_last(),
                    KeyCode::Char('h') | KeyCode::Left => {
                        content.go_to_parent();
                    }
                    KeyCode::Char('l') | KeyCode::Right => {
                        let cursor = content.cursor();
                        content.go_to_link(cursor)?;
                    }
                    KeyCode::Enter | KeyCode::Tab => {
                        let cursor = content.cursor();
                        content.toggle_fold(cursor)?;
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn begin_input(&mut self, direction: SearchDirection) {
        self.input = Some(SearchInput {
            direction,
            text: String::new(),
        });
    }

    fn repeat_search(&mut self, reverse: bool) -> Result<()> {
        let Some(mut query) = self.last_query.clone() else {
            self.message = Some("No previous search".to_string());
            return Ok(());
        };
        if reverse {
            query.direction = match query.direction {
                SearchDirection::Forward => SearchDirection::Backward,
                SearchDirection::Backward => SearchDirection::Forward,
            };
        }
        self.navigator.apply_search(&self.content, query)?;
        Ok(())
    }

    fn start_search(&mut self, query: SearchQuery) -> Result<()> {
        self.last_query = Some(query.clone());
        self.navigator.apply_search(&self.content, query)?;
        Ok(())
    }
}

fn draw(frame: &mut Frame, lines: Vec<Line<'static>>, status: String) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(frame.area());

    frame.render_widget(Paragraph::new(lines), chunks[0]);
    frame.render_widget(
        Paragraph::new(status).style(Style::default().bg(Color::DarkGray).fg(Color::White)),
        chunks[1],
    );
}

fn span(fragment: Fragment) -> Span<'static> {
    let mut style = Style::default().fg(color(fragment.style.fg));
    if fragment.style.bold {
        style = style.add_modifier(Modifier::BOLD);
    }
    if fragment.style.reverse {
        style = style.add_modifier(Modifier::REVERSED);
    }
    Span::styled(fragment.text, style)
}

fn color(color: glv_graph::Color) -> Color {
    match color {
        glv_graph::Color::Default => Color::Reset,
        glv_graph::Color::Red => Color::Red,
        glv_graph::Color::Green => Color::Green,
        glv_graph::Color::Yellow => Color::Yellow,
        glv_graph::Color::Blue => Color::Blue,
        glv_graph::Color::Magenta => Color::Magenta,
        glv_graph::Color::Cyan => Color::Cyan,
        glv_graph::Color::White => Color::White,
    }
}

pub fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

pub fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Run the viewer until the user quits
pub fn run_tui(
    content: SharedContent,
    formatter: DefaultFormatter,
    ignore_case: bool,
) -> Result<()> {
    let mut terminal = setup_terminal()?;

    let app = App::new(content, formatter, ignore_case);
    let res = app.run(&mut terminal);

    restore_terminal(&mut terminal)?;
    res
}
