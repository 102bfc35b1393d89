use std::io::{stdout, Stdout, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{poll, read, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{cursor, execute, queue, style, terminal};
use snake::{Coords, Direction, GridInt, Renderer, RunState, Snapshot};

const SNAKE_BODY_CHAR: char = '█';
const FOOD_CHAR: char = 'O';
const BONUS_CHAR: char = '$';
const DEAD_SNAKE_CHAR: char = 'X';

/// Cells taken by the border on each axis.
pub const BORDER: GridInt = 2;
pub const STATUS_LINES: GridInt = 1;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Input {
    Turn(Direction),
    Quit,
    Other,
}

/// Owns the terminal mode and shows full-screen messages.
pub struct TermManager {
    width: GridInt,
    height: GridInt,
    stdout: Stdout,
}

impl TermManager {
    pub fn new() -> Result<Self> {
        let (width, height) = terminal::size().context("Error reading terminal size")?;
        Ok(TermManager { width, height, stdout: stdout() })
    }

    pub fn setup(&mut self) -> Result<()> {
        execute!(self.stdout, EnterAlternateScreen).context("Error entering alt screen")?;
        terminal::enable_raw_mode().context("Error enabling raw mode")?;
        execute!(self.stdout, cursor::Hide, cursor::DisableBlinking).context("Error hiding cursor")?;
        Ok(())
    }

    pub fn restore(&mut self) -> Result<()> {
        terminal::disable_raw_mode().context("Error disabling raw mode")?;
        execute!(self.stdout, cursor::Show, cursor::EnableBlinking).context("Error showing cursor")?;
        execute!(self.stdout, LeaveAlternateScreen).context("Error leaving alt screen")?;
        Ok(())
    }

    pub fn terminal_size(&self) -> Coords {
        (self.width, self.height)
    }

    pub fn read_key_blocking(&self) -> Result<KeyEvent> {
        loop {
            if let Event::Key(ev) = read().context("Error reading key")? {
                return Ok(ev);
            }
        }
    }

    pub fn show_message(&mut self, lines: &[&str]) -> Result<()> {
        let msg_height = (lines.len() + 2) as GridInt;
        let msg_width = (lines.iter().map(|x| x.chars().count()).max().unwrap_or(0) + 2) as GridInt;
        let center = (self.width / 2, self.height / 2);
        let top_left = (
            center.0.saturating_sub(msg_width / 2),
            center.1.saturating_sub(msg_height / 2),
        );

        // Print the top and bottom empty lines
        for y in [top_left.1, top_left.1 + msg_height - 1].iter() {
            for x_diff in 0..msg_width {
                print_at(&mut self.stdout, (top_left.0 + x_diff, *y), ' ')?;
            }
        }

        // Print the message lines
        for (i, line) in lines.iter().enumerate() {
            let padded_line = format!("{line: ^width$}", line = line, width = msg_width as usize);
            let y = top_left.1 + i as GridInt + 1;
            for (x_diff, ch) in padded_line.chars().enumerate() {
                print_at(&mut self.stdout, (top_left.0 + x_diff as GridInt, y), ch)?;
            }
        }

        self.stdout.flush().context("Error flushing")
    }
}

/// Draws game snapshots inside a border, with a status line below it.
pub struct TermRenderer {
    stdout: Stdout,
    frame: u64,
}

impl TermRenderer {
    pub fn new() -> Self {
        TermRenderer { stdout: stdout(), frame: 0 }
    }

    fn draw_borders(&mut self, width: GridInt, height: GridInt) -> Result<()> {
        let end_x = width - 1;
        let end_y = height - 1;

        for x in 0..width {
            let ch = if x == 0 || x == width - 1 {'+'} else {'-'};
            print_at(&mut self.stdout, (x, 0), ch)?;
            print_at(&mut self.stdout, (x, end_y), ch)?;
        }

        for y in 1..height - 1 {
            print_at(&mut self.stdout, (0, y), '|')?;
            print_at(&mut self.stdout, (end_x, y), '|')?;
        }

        Ok(())
    }

    fn draw_cell(&mut self, cell: Coords, ch: char) -> Result<()> {
        print_at(&mut self.stdout, (cell.0 + 1, cell.1 + 1), ch)
    }
}

impl Renderer for TermRenderer {
    fn render(&mut self, snapshot: &Snapshot) -> Result<()> {
        self.frame += 1;

        queue!(self.stdout, terminal::Clear(ClearType::All))?;
        self.draw_borders(snapshot.grid_width + BORDER, snapshot.grid_height + BORDER)?;

        self.draw_cell(snapshot.food, FOOD_CHAR)?;
        if let Some(bonus) = snapshot.bonus_food {
            if bonus_visible(self.frame, snapshot.bonus_remaining_secs) {
                self.draw_cell(bonus, BONUS_CHAR)?;
            }
        }

        let body_char = if snapshot.alive {SNAKE_BODY_CHAR} else {DEAD_SNAKE_CHAR};
        for cell in &snapshot.body {
            self.draw_cell(*cell, body_char)?;
        }
        let head_char = if snapshot.alive {head_char(snapshot.direction)} else {DEAD_SNAKE_CHAR};
        self.draw_cell(snapshot.head_cell, head_char)?;

        let status = status_line(snapshot);
        queue!(
            self.stdout,
            cursor::MoveTo(0, snapshot.grid_height + BORDER),
            style::Print(status)
        )?;

        self.stdout.flush().context("Error flushing frame")
    }
}

pub fn head_char(direction: Direction) -> char {
    match direction {
        Direction::Up => '^',
        Direction::Down => 'v',
        Direction::Left => '<',
        Direction::Right => '>',
    }
}

/// The bonus blinks faster as its countdown runs out.
pub fn bonus_visible(frame: u64, remaining_secs: u32) -> bool {
    let period = 2 * u64::from(remaining_secs.max(1));
    (frame / period) % 2 == 0
}

pub fn status_line(snapshot: &Snapshot) -> String {
    let mut line = format!(
        "Score: {}  Speed: {:.2}  TPS: {}",
        snapshot.score, snapshot.speed, snapshot.ticks_per_second
    );
    if snapshot.bonus_food.is_some() {
        line.push_str(&format!("  Bonus: {}s", snapshot.bonus_remaining_secs));
    }
    if snapshot.run_state != RunState::Running {
        line.push_str("  (stopping)");
    }
    line
}

/// Waits up to `timeout` for a key press and maps it to a game input.
pub fn poll_input(timeout: Duration) -> Result<Option<Input>> {
    if !poll(timeout).context("Error polling input")? {
        return Ok(None);
    }

    match read().context("Error reading input")? {
        Event::Key(ev) => Ok(Some(map_key(&ev))),
        _ => Ok(None),
    }
}

pub fn map_key(ev: &KeyEvent) -> Input {
    match ev {
        ev if is_ctrl_c(ev) => Input::Quit,
        KeyEvent { code, modifiers: _ } => match code {
            KeyCode::Char('w') | KeyCode::Up => Input::Turn(Direction::Up),
            KeyCode::Char('a') | KeyCode::Left => Input::Turn(Direction::Left),
            KeyCode::Char('s') | KeyCode::Down => Input::Turn(Direction::Down),
            KeyCode::Char('d') | KeyCode::Right => Input::Turn(Direction::Right),
            KeyCode::Esc | KeyCode::Char('q') => Input::Quit,
            _ => Input::Other,
        }
    }
}

pub fn is_ctrl_c(ev: &KeyEvent) -> bool {
    matches!(ev, KeyEvent { code: KeyCode::Char('c'), modifiers: KeyModifiers::CONTROL })
}

fn print_at(stdout: &mut Stdout, pos: Coords, ch: char) -> Result<()> {
    queue!(stdout, cursor::MoveTo(pos.0, pos.1), style::Print(ch))?;
    Ok(())
}
