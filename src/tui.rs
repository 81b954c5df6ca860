use crate::auth::Authorizer;
use crate::drive::{FileListing, ListingRow};
use crate::session::{Session, TaskEvent};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::{Backend, CrosstermBackend},
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
};
use std::collections::VecDeque;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

const TICK: Duration = Duration::from_millis(200);

/// What the user asked for; carried out by `TuiApp` against the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Quit,
    List,
    Upload(PathBuf),
    Download { file_id: String, dir: PathBuf },
    SelectCredentials(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Upload,
    Download,
    Credentials,
}

impl PromptKind {
    fn title(&self) -> &'static str {
        match self {
            PromptKind::Upload => "Upload file (path)",
            PromptKind::Download => "Download to directory (empty for current)",
            PromptKind::Credentials => "OAuth client JSON (path)",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub kind: PromptKind,
    pub buffer: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialog {
    pub title: String,
    pub message: String,
    pub is_error: bool,
}

impl Dialog {
    fn info(title: &str, message: String) -> Self {
        Dialog {
            title: title.to_string(),
            message,
            is_error: false,
        }
    }

    fn error(message: String) -> Self {
        Dialog {
            title: "Error".to_string(),
            message,
            is_error: true,
        }
    }
}

/// Screen state, independent of the terminal
#[derive(Debug, Default)]
pub struct TuiState {
    pub listing: Option<FileListing>,
    pub selected_index: usize,
    pub status: String,
    pub prompt: Option<Prompt>,
    /// Pending dialogs, shown one at a time in arrival order
    dialogs: VecDeque<Dialog>,
}

impl TuiState {
    pub fn new() -> Self {
        TuiState {
            status: "Press 'c' to select a credentials file, 'l' to list files.".to_string(),
            ..Default::default()
        }
    }

    fn file_count(&self) -> usize {
        self.listing.as_ref().map_or(0, |l| l.files.len())
    }

    pub fn selected_file_id(&self) -> Option<&str> {
        self.listing
            .as_ref()?
            .files
            .get(self.selected_index)
            .map(|f| f.id.as_str())
    }

    /// The dialog currently on screen
    pub fn dialog(&self) -> Option<&Dialog> {
        self.dialogs.front()
    }

    fn push_dialog(&mut self, dialog: Dialog) {
        self.dialogs.push_back(dialog);
    }

    fn dismiss_dialog(&mut self) -> Option<Dialog> {
        self.dialogs.pop_front()
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Option<Action> {
        if !self.dialogs.is_empty() {
            if matches!(
                key.code,
                KeyCode::Enter | KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char(' ')
            ) {
                self.dismiss_dialog();
            }
            return None;
        }

        if let Some(prompt) = self.prompt.as_mut() {
            match key.code {
                KeyCode::Esc => self.prompt = None,
                KeyCode::Backspace => {
                    prompt.buffer.pop();
                }
                KeyCode::Char(c) => prompt.buffer.push(c),
                KeyCode::Enter => {
                    if let Some(prompt) = self.prompt.take() {
                        return self.submit(prompt);
                    }
                }
                _ => {}
            }
            return None;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Some(Action::Quit),
            KeyCode::Char('l') => {
                self.status = "Listing files...".to_string();
                return Some(Action::List);
            }
            KeyCode::Char('u') => self.open_prompt(PromptKind::Upload),
            KeyCode::Char('c') => self.open_prompt(PromptKind::Credentials),
            KeyCode::Char('d') => {
                if self.selected_file_id().is_some() {
                    self.open_prompt(PromptKind::Download);
                } else {
                    self.status = "No file selected. Press 'l' to list files.".to_string();
                }
            }
            KeyCode::Char('j') | KeyCode::Down => {
                let count = self.file_count();
                if count > 0 {
                    self.selected_index = (self.selected_index + 1) % count;
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                let count = self.file_count();
                if count > 0 {
                    self.selected_index = if self.selected_index == 0 {
                        count - 1
                    } else {
                        self.selected_index - 1
                    };
                }
            }
            _ => {}
        }
        None
    }

    fn open_prompt(&mut self, kind: PromptKind) {
        self.prompt = Some(Prompt {
            kind,
            buffer: String::new(),
        });
    }

    fn submit(&mut self, prompt: Prompt) -> Option<Action> {
        let input = prompt.buffer.trim();
        match prompt.kind {
            PromptKind::Upload => {
                if input.is_empty() {
                    return None;
                }
                let path = PathBuf::from(input);
                if !path.is_file() {
                    self.push_dialog(Dialog::error(format!("Not a file: {}", path.display())));
                    return None;
                }
                self.status = format!("Uploading {}...", path.display());
                Some(Action::Upload(path))
            }
            PromptKind::Download => {
                let file_id = self.selected_file_id()?.to_string();
                let dir = if input.is_empty() {
                    PathBuf::from(".")
                } else {
                    PathBuf::from(input)
                };
                self.status = format!("Downloading {}...", file_id);
                Some(Action::Download { file_id, dir })
            }
            PromptKind::Credentials => {
                if input.is_empty() {
                    return None;
                }
                let path = PathBuf::from(input);
                if !path.is_file() {
                    self.push_dialog(Dialog::error(format!(
                        "Credentials file not found: {}",
                        path.display()
                    )));
                    return None;
                }
                self.status = format!("Credentials file selected: {}", path.display());
                Some(Action::SelectCredentials(path))
            }
        }
    }

    pub fn apply_event(&mut self, event: TaskEvent) {
        match event {
            TaskEvent::ListingReady(listing) => {
                self.status = match (listing.files.len(), listing.has_more) {
                    (0, _) => "No files found.".to_string(),
                    (n, true) => format!("{} files (more available)", n),
                    (n, false) => format!("{} files", n),
                };
                self.selected_index = 0;
                self.listing = Some(listing);
            }
            TaskEvent::ListingFailed { message } => {
                self.status = format!("Error listing files: {}", message);
            }
            TaskEvent::UploadCompleted { file_id, .. } => {
                self.status = format!("File uploaded: {}", file_id);
            }
            TaskEvent::UploadFailed { path, message } => {
                self.status = format!("Error uploading {}: {}", path.display(), message);
            }
            TaskEvent::DownloadCompleted { path } => {
                self.status = format!("Downloaded {}", path.display());
                self.push_dialog(Dialog::info(
                    "Download",
                    format!("File downloaded successfully! {}", path.display()),
                ));
            }
            TaskEvent::DownloadFailed { message, .. } => {
                self.status = "Download failed".to_string();
                self.push_dialog(Dialog::error(format!(
                    "Error downloading file: {}",
                    message
                )));
            }
            TaskEvent::ConsentRequested { url } => {
                self.push_dialog(Dialog::info(
                    "Authorization",
                    format!(
                        "Please visit this URL to authorize this application:\n\n{}",
                        url
                    ),
                ));
            }
        }
    }
}

pub struct TuiApp<A: Authorizer + 'static> {
    session: Session<A>,
    events: UnboundedReceiver<TaskEvent>,
    state: TuiState,
}

impl<A: Authorizer + 'static> TuiApp<A> {
    pub fn new(session: Session<A>, events: UnboundedReceiver<TaskEvent>) -> Self {
        TuiApp {
            session,
            events,
            state: TuiState::new(),
        }
    }

    /// Blocks until the user quits; call from a blocking thread.
    pub fn run(&mut self) -> io::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.main_loop(&mut terminal);

        // Restore the terminal even when the loop failed
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn main_loop<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        loop {
            while let Ok(task_event) = self.events.try_recv() {
                self.state.apply_event(task_event);
            }

            terminal.draw(|f| ui(f, &self.state))?;

            if !event::poll(TICK)? {
                continue;
            }

            if let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press
                && let Some(action) = self.state.handle_key(key)
            {
                if action == Action::Quit {
                    break;
                }
                self.perform(action);
            }
        }

        Ok(())
    }

    fn perform(&mut self, action: Action) {
        tracing::debug!("Action: {:?}", action);
        match action {
            Action::Quit => {}
            Action::List => {
                self.session.spawn_list();
            }
            Action::Upload(path) => {
                self.session.spawn_upload(path);
            }
            Action::Download { file_id, dir } => {
                self.session.spawn_download(file_id, dir);
            }
            Action::SelectCredentials(path) => self.session.select_credentials(path),
        }
    }
}

fn ui(f: &mut Frame, state: &TuiState) {
    let chunks = Layout::vertical([
        Constraint::Length(3), // Title
        Constraint::Min(5),    // File list
        Constraint::Length(3), // Status
        Constraint::Length(3), // Help bar
    ])
    .split(f.area());

    let title = Paragraph::new("Google Drive Manager")
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Cyan));
    f.render_widget(title, chunks[0]);

    let rows = state
        .listing
        .as_ref()
        .map(FileListing::rows)
        .unwrap_or_default();
    let items: Vec<ListItem> = rows
        .iter()
        .map(|row| match row {
            ListingRow::NoFiles => {
                ListItem::new(row.to_string()).style(Style::default().fg(Color::DarkGray))
            }
            ListingRow::File { .. } => ListItem::new(row.to_string()),
        })
        .collect();

    let list_title = match &state.listing {
        Some(listing) if listing.has_more => format!("Files (first {})", listing.files.len()),
        Some(listing) => format!("Files ({})", listing.files.len()),
        None => "Files".to_string(),
    };
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(list_title))
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .add_modifier(Modifier::BOLD),
        );

    let mut list_state = ListState::default();
    if state.file_count() > 0 {
        list_state.select(Some(state.selected_index));
    }
    f.render_stateful_widget(list, chunks[1], &mut list_state);

    let status = Paragraph::new(state.status.as_str())
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .style(Style::default().fg(Color::Yellow));
    f.render_widget(status, chunks[2]);

    let help = Paragraph::new(
        "q:Quit | j/k:Down/Up | l:List | u:Upload | d:Download | c:Credentials file",
    )
    .block(Block::default().borders(Borders::ALL).title("Help"))
    .alignment(Alignment::Center)
    .style(Style::default().fg(Color::Gray));
    f.render_widget(help, chunks[3]);

    if let Some(prompt) = &state.prompt {
        let area = centered(f.area(), 60, 3);
        f.render_widget(Clear, area);
        let input = Paragraph::new(format!("{}_", prompt.buffer)).block(
            Block::default()
                .borders(Borders::ALL)
                .title(prompt.kind.title()),
        );
        f.render_widget(input, area);
    }

    if let Some(dialog) = state.dialog() {
        let area = centered(f.area(), 70, 9);
        f.render_widget(Clear, area);
        let color = if dialog.is_error { Color::Red } else { Color::Green };
        let body = Paragraph::new(format!("{}\n\n[Enter] OK", dialog.message))
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(dialog.title.as_str())
                    .border_style(Style::default().fg(color)),
            );
        f.render_widget(body, area);
    }
}

fn centered(area: Rect, percent_x: u16, height: u16) -> Rect {
    let width = (u32::from(area.width) * u32::from(percent_x.min(100)) / 100) as u16;
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width.saturating_sub(width)) / 2,
        y: area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    }
}
