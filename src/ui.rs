use crate::client::AppSnapshot;
use color_eyre::eyre::{
    Result,
    eyre,
};
use crossterm::{
    event::{
        self,
        Event,
        KeyCode,
        KeyEventKind,
        KeyModifiers,
    },
    terminal::{
        disable_raw_mode,
        enable_raw_mode,
    },
};
use doors_client::{
    bindings::{
        Action,
        BindingTable,
    },
    dispatch::PendingAction,
    view::Screen,
};
use ratatui::{
    prelude::*,
    widgets::*,
};
use std::{
    io::stdout,
    sync::{
        Arc,
        atomic::{
            AtomicBool,
            Ordering,
        },
    },
    thread,
    time::Duration,
};
use tokio::sync::mpsc;
use tracing::warn;

const INPUT_POLL: Duration = Duration::from_millis(100);

pub enum UserEvent {
    Action(Action),
    /// The user approved the transaction shown in the signing prompt.
    Sign(PendingAction),
    Decline(PendingAction),
    ConfirmRestart,
    DeclineRestart,
    Quit,
    Redraw,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
enum Mode {
    #[default]
    Normal,
    Sign(PendingAction),
    ConfirmRestart,
    QuitModal,
}

#[derive(Default)]
pub struct UiState {
    mode: Mode,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
    bindings: BindingTable,
    selected_door: u64,
}

impl UiState {
    pub fn request_signature(&mut self, action: PendingAction) {
        self.mode = Mode::Sign(action);
    }

    pub fn confirm_restart(&mut self) {
        self.mode = Mode::ConfirmRestart;
    }

    pub fn selected_door(&self) -> u64 {
        self.selected_door
    }

    pub fn bindings(&self) -> &BindingTable {
        &self.bindings
    }

    fn select_prev(&mut self) {
        self.selected_door = self.selected_door.saturating_sub(1);
    }

    fn select_next(&mut self, door_count: u64) {
        if self.selected_door + 1 < door_count {
            self.selected_door += 1;
        }
    }
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(
        std::io::stdout(),
        crossterm::terminal::EnterAlternateScreen,
        crossterm::event::EnableMouseCapture
    )?;
    // One persistent Terminal keeps buffers across draws
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(
        std::io::stdout(),
        crossterm::event::DisableMouseCapture,
        crossterm::terminal::LeaveAlternateScreen
    )?;
    Ok(())
}

pub fn draw(state: &mut UiState, snap: &AppSnapshot) -> Result<()> {
    let door_count = snap.view.door_count();
    if door_count == 0 {
        state.selected_door = 0;
    } else {
        state.selected_door = state.selected_door.min(door_count - 1);
    }
    if let Some(mut term) = state.terminal.take() {
        term.draw(|f| ui(f, state, snap))?;
        state.terminal = Some(term);
    }
    Ok(())
}

/// Key events read on a dedicated thread. Reading can be paused while
/// something else owns the terminal, e.g. a password prompt.
pub struct InputEventReceiver {
    rx: mpsc::UnboundedReceiver<Event>,
    paused: Arc<AtomicBool>,
}

impl InputEventReceiver {
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
        // let an in-progress poll run out before the caller reads stdin
        thread::sleep(INPUT_POLL);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }
}

pub fn input_event_stream() -> InputEventReceiver {
    let (tx, rx) = mpsc::unbounded_channel();
    let paused = Arc::new(AtomicBool::new(false));
    let reader_paused = paused.clone();
    thread::spawn(move || {
        while !tx.is_closed() {
            if reader_paused.load(Ordering::SeqCst) {
                thread::sleep(INPUT_POLL / 2);
                continue;
            }
            match event::poll(INPUT_POLL) {
                Ok(true) => {
                    if reader_paused.load(Ordering::SeqCst) {
                        continue;
                    }
                    match event::read() {
                        Ok(ev) => {
                            if tx.send(ev).is_err() {
                                break;
                            }
                        }
                        Err(err) => {
                            warn!(%err, "reading terminal input failed");
                            break;
                        }
                    }
                }
                Ok(false) => {}
                Err(err) => {
                    warn!(%err, "polling terminal input failed");
                    break;
                }
            }
        }
    });
    InputEventReceiver { rx, paused }
}

pub async fn next_raw_event(input: &mut InputEventReceiver) -> Result<Event> {
    input
        .rx
        .recv()
        .await
        .ok_or_else(|| eyre!("terminal input stream closed"))
}

pub fn interpret_event(
    state: &mut UiState,
    event: Event,
    snap: &AppSnapshot,
) -> Option<UserEvent> {
    let k = match event {
        Event::Key(k) => k,
        Event::Resize(..) => return Some(UserEvent::Redraw),
        _ => return None,
    };
    if k.kind != KeyEventKind::Press {
        return None;
    }
    // raw mode swallows SIGINT
    if k.modifiers.contains(KeyModifiers::CONTROL) && k.code == KeyCode::Char('c') {
        return Some(UserEvent::Quit);
    }

    match state.mode {
        Mode::Sign(action) => match k.code {
            KeyCode::Char('y') | KeyCode::Enter => {
                state.mode = Mode::Normal;
                Some(UserEvent::Sign(action))
            }
            KeyCode::Char('n') | KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Decline(action))
            }
            _ => None,
        },
        Mode::ConfirmRestart => match k.code {
            KeyCode::Char('y') | KeyCode::Enter => {
                state.mode = Mode::Normal;
                Some(UserEvent::ConfirmRestart)
            }
            KeyCode::Char('n') | KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::DeclineRestart)
            }
            _ => None,
        },
        Mode::QuitModal => match k.code {
            KeyCode::Char('y') | KeyCode::Char('q') | KeyCode::Enter => {
                Some(UserEvent::Quit)
            }
            KeyCode::Char('n') | KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::Normal => {
            let action = state.bindings.action_for(k.code, &snap.affordances)?;
            match action {
                Action::Quit => {
                    state.mode = Mode::QuitModal;
                    Some(UserEvent::Redraw)
                }
                Action::SelectPrev => {
                    state.select_prev();
                    Some(UserEvent::Redraw)
                }
                Action::SelectNext => {
                    state.select_next(snap.view.door_count());
                    Some(UserEvent::Redraw)
                }
                other => Some(UserEvent::Action(other)),
            }
        }
    }
}

fn ui(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    f.render_widget(Clear, f.area());
    let owner_rows = if snap.view.owner_panel.is_some() { 3 } else { 0 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),          // session
            Constraint::Length(7),          // game
            Constraint::Length(5),          // doors
            Constraint::Length(owner_rows), // house
            Constraint::Min(4),             // status/errors
            Constraint::Length(3),          // help
        ])
        .split(f.area());

    draw_session(f, chunks[0], snap);
    draw_game(f, chunks[1], snap);
    draw_doors(f, chunks[2], state, snap);
    if owner_rows > 0 {
        draw_owner(f, chunks[3], snap);
    }
    draw_status(f, chunks[4], snap);
    draw_help(f, chunks[5], state, snap);
    draw_modals(f, state, snap);
}

fn draw_session(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let account = match snap.account.as_deref() {
        Some(account) if snap.owner => format!("{} (owner)", short_hex(account)),
        Some(account) => short_hex(account),
        None => "not connected".to_string(),
    };
    let text = format!(
        "Network: {} | Account: {} | Wager: {} | Contract: {}",
        snap.network, account, snap.wager, snap.revision
    );
    let widget =
        Paragraph::new(text).block(Block::default().borders(Borders::ALL).title("Session"));
    f.render_widget(widget, area);
}

fn draw_game(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let view = &snap.view;
    let mut lines = vec![
        Line::from(format!("Stage:      {}", view.stage)),
        Line::from(format!("Multiplier: {}", view.multiplier)),
        Line::from(format!("Winnings:   {}", view.winnings)),
    ];
    match view.screen {
        Screen::Idle if snap.account.is_none() => {
            lines.push(Line::from("Connect a wallet to play."));
        }
        Screen::Idle => {
            lines.push(Line::from(format!(
                "No active game. Start one for {}.",
                snap.wager
            )));
        }
        Screen::Active if view.claim_visible => {
            lines.push(Line::from(Span::styled(
                "Winnings can be claimed: cash out now or keep going.",
                Style::default().fg(Color::Yellow),
            )));
        }
        Screen::Active => {
            lines.push(Line::from("Pick a door. A trap ends the round."));
        }
    }
    let title = match view.screen {
        Screen::Idle => "Game",
        Screen::Active => "Game (active)",
    };
    let widget = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(widget, area);
}

fn draw_doors(f: &mut Frame, area: Rect, state: &UiState, snap: &AppSnapshot) {
    let block = Block::default().borders(Borders::ALL).title("Doors");
    let doors = &snap.view.doors;
    if doors.is_empty() {
        f.render_widget(block, area);
        return;
    }
    let inner = block.inner(area);
    f.render_widget(block, area);

    let cells = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(vec![Constraint::Ratio(1, doors.len() as u32); doors.len()])
        .split(inner);
    let busy = snap.pending.is_some();
    for (door, cell) in doors.iter().zip(cells.iter()) {
        let style = if busy {
            Style::default().fg(Color::DarkGray)
        } else if door.index == state.selected_door {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        let widget = Paragraph::new(format!("{}", door.index + 1))
            .alignment(Alignment::Center)
            .style(style)
            .block(Block::default().borders(Borders::ALL).border_style(style));
        f.render_widget(widget, *cell);
    }
}

fn draw_owner(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let balance = snap
        .view
        .owner_panel
        .as_ref()
        .map(|panel| panel.house_balance.as_str())
        .unwrap_or("-");
    let widget = Paragraph::new(format!("House balance: {balance}"))
        .block(Block::default().borders(Borders::ALL).title("Owner"));
    f.render_widget(widget, area);
}

fn draw_status(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let status_widget = if snap.errors.is_empty() {
        let mut lines: Vec<Line> = Vec::new();
        if let Some(pending) = snap.pending {
            lines.push(Line::from(format!("Waiting for {pending} to confirm...")));
        }
        if snap.status.trim().is_empty() {
            lines.push(Line::from("Ready"));
        } else {
            for line in snap.status.lines() {
                lines.push(Line::from(line.to_string()));
            }
        }
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Status"))
            .style(Style::default().fg(Color::Green))
    } else {
        let lines: Vec<Line> = snap
            .errors
            .iter()
            .rev()
            .map(|e| Line::from(e.clone()))
            .collect();
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Errors"))
            .style(Style::default().fg(Color::Red))
    };
    f.render_widget(status_widget, area);
}

fn draw_help(f: &mut Frame, area: Rect, state: &UiState, snap: &AppSnapshot) {
    let help = Paragraph::new(state.bindings.help(&snap.affordances))
        .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help, area);
}

fn draw_modals(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    let (title, body) = match state.mode {
        Mode::Normal => return,
        Mode::Sign(action) => {
            let detail = match action {
                PendingAction::Start | PendingAction::Restart => {
                    format!("\nPayment: {}", snap.wager)
                }
                _ => String::new(),
            };
            (
                "Sign transaction",
                format!(
                    "Account {} wants to {action}.{detail}\n\ny/Enter=approve n/Esc=reject",
                    snap.account.as_deref().map(short_hex).unwrap_or_default()
                ),
            )
        }
        Mode::ConfirmRestart => (
            "Game already active",
            "A game is already active for this account.\nReset it and start a new one?\n\n\
             y/Enter=confirm n/Esc=cancel"
                .to_string(),
        ),
        Mode::QuitModal => ("Quit", "Quit the game? y/n".to_string()),
    };
    let area = centered_rect(50, 30, f.area());
    let block = Block::default().borders(Borders::ALL).title(title);
    let p = Paragraph::new(body).wrap(Wrap { trim: false });
    f.render_widget(Clear, area);
    f.render_widget(block.clone(), area);
    f.render_widget(p, block.inner(area));
}

fn short_hex(account: &str) -> String {
    if account.len() <= 14 {
        return account.to_string();
    }
    format!("{}..{}", &account[..8], &account[account.len() - 4..])
}

fn centered_rect(w_percent: u16, h_percent: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h_percent) / 2),
            Constraint::Percentage(h_percent),
            Constraint::Percentage((100 - h_percent) / 2),
        ])
        .split(r);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(popup_layout[1]);

    horizontal[1]
}
