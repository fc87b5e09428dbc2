use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use std::io::{self, Stdout};
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;

use ik_app::{AppContext, InventoryViewModel, TapOutcome, WidgetRoute, WidgetView, DUPLICATE_CODE_MESSAGE};
use ik_core::{apply_edit, fields_filled, parse_new_item, InventoryItem, UserRequest, INVALID_FORM_MESSAGE};
use ik_utils::format_currency;

const TICK_RATE: Duration = Duration::from_millis(200);

/// Widget instance shown in the list header.
pub const HEADER_WIDGET_ID: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Login,
    List,
    Add,
    Details,
    Edit,
}

#[derive(Debug, Default, Clone)]
struct TextInput {
    content: String,
    cursor: usize,
}

impl TextInput {
    fn from(content: String) -> Self {
        let cursor = content.chars().count();
        Self { content, cursor }
    }

    fn byte_index(&self) -> usize {
        self.content
            .char_indices()
            .nth(self.cursor)
            .map_or(self.content.len(), |(index, _)| index)
    }

    fn insert(&mut self, c: char) {
        let index = self.byte_index();
        self.content.insert(index, c);
        self.cursor += 1;
    }

    fn delete_back(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let index = self.byte_index();
            self.content.remove(index);
        }
    }

    fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    fn move_right(&mut self) {
        if self.cursor < self.content.chars().count() {
            self.cursor += 1;
        }
    }

    fn reset(&mut self) {
        self.content.clear();
        self.cursor = 0;
    }
}

/// A stack of labelled inputs with one focused field.
#[derive(Debug, Clone, Default)]
struct Form {
    labels: Vec<&'static str>,
    fields: Vec<TextInput>,
    focus: usize,
}

impl Form {
    fn new(labels: &[&'static str]) -> Self {
        Self {
            labels: labels.to_vec(),
            fields: vec![TextInput::default(); labels.len()],
            focus: 0,
        }
    }

    fn value(&self, index: usize) -> &str {
        self.fields[index].content.as_str()
    }

    fn values(&self) -> Vec<&str> {
        self.fields.iter().map(|field| field.content.as_str()).collect()
    }

    fn focused(&mut self) -> &mut TextInput {
        &mut self.fields[self.focus]
    }

    fn next(&mut self) {
        self.focus = (self.focus + 1) % self.fields.len();
    }

    fn prev(&mut self) {
        self.focus = if self.focus == 0 {
            self.fields.len() - 1
        } else {
            self.focus - 1
        };
    }

    fn reset(&mut self) {
        for field in &mut self.fields {
            field.reset();
        }
        self.focus = 0;
    }
}

#[derive(Debug)]
struct App {
    screen: Screen,
    items: Vec<InventoryItem>,
    list_state: ListState,
    selected: Option<InventoryItem>,
    login: Form,
    password_valid: Option<bool>,
    can_submit_login: bool,
    add_form: Form,
    edit_form: Form,
    confirm_delete: bool,
    widget: Option<WidgetView>,
    status: Option<String>,
    show_help: bool,
}

impl App {
    fn new() -> Self {
        let mut list_state = ListState::default();
        list_state.select(Some(0));
        Self {
            screen: Screen::Login,
            items: Vec::new(),
            list_state,
            selected: None,
            login: Form::new(&["Email", "Password"]),
            password_valid: None,
            can_submit_login: false,
            add_form: Form::new(&["Code", "Name", "Price", "Quantity"]),
            edit_form: Form::new(&["Name", "Price", "Quantity"]),
            confirm_delete: false,
            widget: None,
            status: None,
            show_help: false,
        }
    }

    fn current_item(&self) -> Option<&InventoryItem> {
        self.list_state.selected().and_then(|i| self.items.get(i))
    }

    fn select_next(&mut self) {
        let len = self.items.len();
        let i = match self.list_state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.list_state.select(Some(i));
    }

    fn select_prev(&mut self) {
        let len = self.items.len();
        let i = match self.list_state.selected() {
            Some(0) | None => len.saturating_sub(1),
            Some(i) => i - 1,
        };
        self.list_state.select(Some(i));
    }
}

pub fn run(ctx: &AppContext) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to initialize runtime")?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    tracing::info!(backend = ctx.inventory.backend(), "terminal ui started");
    let mut app = App::new();
    enter_list(ctx, &runtime, &mut app);

    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|frame| render_app(frame, &app))?;

        let timeout = TICK_RATE.saturating_sub(last_tick.elapsed());
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && handle_key(ctx, &runtime, &mut app, key)? {
                    break;
                }
            }
        }

        if last_tick.elapsed() >= TICK_RATE {
            last_tick = Instant::now();
        }
    }

    restore_terminal(terminal)?;
    Ok(())
}

/// Show the list, or the login screen when the session flag is not set.
fn enter_list(ctx: &AppContext, runtime: &Runtime, app: &mut App) {
    if !ctx.session.is_logged_in() {
        app.screen = Screen::Login;
        return;
    }
    app.screen = Screen::List;
    runtime.block_on(ctx.inventory.load());
    sync_items(&ctx.inventory, app);
    app.widget = Some(ctx.widget.render(HEADER_WIDGET_ID));
}

fn sync_items(inventory: &InventoryViewModel, app: &mut App) {
    app.items = inventory.current_items();
    match app.list_state.selected() {
        Some(i) if i < app.items.len() => {}
        _ => app.list_state.select(Some(0)),
    }
}

fn handle_key(ctx: &AppContext, runtime: &Runtime, app: &mut App, key: KeyEvent) -> Result<bool> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Ok(true);
    }
    match app.screen {
        Screen::Login => handle_login_input(ctx, runtime, app, key),
        Screen::List => handle_list_input(ctx, runtime, app, key),
        Screen::Add => handle_add_input(ctx, runtime, app, key),
        Screen::Details => handle_details_input(ctx, runtime, app, key),
        Screen::Edit => handle_edit_input(ctx, runtime, app, key),
    }
}

fn edit_text(input: &mut TextInput, key: KeyEvent) {
    match key.code {
        KeyCode::Char(c) => input.insert(c),
        KeyCode::Backspace => input.delete_back(),
        KeyCode::Left => input.move_left(),
        KeyCode::Right => input.move_right(),
        _ => {}
    }
}

fn handle_login_input(ctx: &AppContext, runtime: &Runtime, app: &mut App, key: KeyEvent) -> Result<bool> {
    let register = key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('r');
    if register || key.code == KeyCode::Enter {
        if !app.can_submit_login {
            return Ok(false);
        }
        let email = app.login.value(0).to_string();
        let password = app.login.value(1).to_string();
        let response = if register {
            runtime.block_on(ctx.login.register(UserRequest::new(email, password)))
        } else {
            runtime.block_on(ctx.login.login(&email, &password))
        };
        app.status = Some(response.message);
        if response.is_successful {
            app.login.reset();
            app.password_valid = None;
            app.can_submit_login = false;
            enter_list(ctx, runtime, app);
        }
        return Ok(false);
    }

    match key.code {
        KeyCode::Esc => return Ok(true),
        KeyCode::Tab | KeyCode::Down => app.login.next(),
        KeyCode::BackTab | KeyCode::Up => app.login.prev(),
        _ => {
            edit_text(app.login.focused(), key);
            if app.login.focus == 1 {
                app.password_valid = Some(ctx.login.validate_password(app.login.value(1)));
            }
            app.can_submit_login = ctx
                .login
                .check_fields_completion(app.login.value(0), app.login.value(1));
        }
    }
    Ok(false)
}

fn handle_list_input(ctx: &AppContext, runtime: &Runtime, app: &mut App, key: KeyEvent) -> Result<bool> {
    match key.code {
        KeyCode::Char('q') => return Ok(true),
        KeyCode::Char('?') => app.show_help = !app.show_help,
        KeyCode::Char('j') | KeyCode::Down => app.select_next(),
        KeyCode::Char('k') | KeyCode::Up => app.select_prev(),
        KeyCode::Char('r') => enter_list(ctx, runtime, app),
        KeyCode::Char('a') => {
            app.add_form.reset();
            app.screen = Screen::Add;
        }
        KeyCode::Enter => {
            if let Some(item) = app.current_item().cloned() {
                open_details(ctx, runtime, app, item.key());
            }
        }
        KeyCode::Char('w') => match ctx.widget.tap_toggle(HEADER_WIDGET_ID) {
            TapOutcome::Rendered(view) => app.widget = Some(view),
            TapOutcome::Route(WidgetRoute::Login) => app.screen = Screen::Login,
            TapOutcome::Route(WidgetRoute::Inventory) => {}
        },
        KeyCode::Char('o') => {
            ctx.logout().context("failed to sign out")?;
            app.items.clear();
            app.widget = None;
            app.status = Some("Signed out".into());
            app.screen = Screen::Login;
        }
        _ => {}
    }
    Ok(false)
}

fn open_details(ctx: &AppContext, runtime: &Runtime, app: &mut App, key: i64) {
    match runtime.block_on(ctx.inventory.get_by_id(key)) {
        Some(item) => {
            app.selected = Some(item);
            app.confirm_delete = false;
            app.screen = Screen::Details;
        }
        None => app.status = Some("Error: item not found".into()),
    }
}

fn handle_add_input(ctx: &AppContext, runtime: &Runtime, app: &mut App, key: KeyEvent) -> Result<bool> {
    match key.code {
        KeyCode::Esc => enter_list(ctx, runtime, app),
        KeyCode::Tab | KeyCode::Down => app.add_form.next(),
        KeyCode::BackTab | KeyCode::Up => app.add_form.prev(),
        KeyCode::Enter => {
            if !fields_filled(&app.add_form.values()) {
                return Ok(false);
            }
            let item = match parse_new_item(
                app.add_form.value(0),
                app.add_form.value(1),
                app.add_form.value(2),
                app.add_form.value(3),
            ) {
                Ok(item) => item,
                Err(_) => {
                    app.status = Some(INVALID_FORM_MESSAGE.into());
                    return Ok(false);
                }
            };
            if runtime.block_on(ctx.inventory.save(item)) {
                app.status = Some("Item saved".into());
                enter_list(ctx, runtime, app);
            } else {
                app.status = Some(DUPLICATE_CODE_MESSAGE.into());
            }
        }
        _ => edit_text(app.add_form.focused(), key),
    }
    Ok(false)
}

fn handle_details_input(ctx: &AppContext, runtime: &Runtime, app: &mut App, key: KeyEvent) -> Result<bool> {
    let Some(item) = app.selected.clone() else {
        enter_list(ctx, runtime, app);
        return Ok(false);
    };

    if app.confirm_delete {
        match key.code {
            KeyCode::Char('y') | KeyCode::Enter => {
                app.confirm_delete = false;
                runtime.block_on(ctx.inventory.delete(item.clone()));
                app.status = Some(format!("{} deleted", item.name));
                app.selected = None;
                enter_list(ctx, runtime, app);
            }
            KeyCode::Char('n') | KeyCode::Esc => app.confirm_delete = false,
            _ => {}
        }
        return Ok(false);
    }

    match key.code {
        KeyCode::Esc | KeyCode::Char('b') => enter_list(ctx, runtime, app),
        KeyCode::Char('d') => app.confirm_delete = true,
        KeyCode::Char('e') => {
            app.edit_form = Form::new(&["Name", "Price", "Quantity"]);
            app.edit_form.fields = vec![
                TextInput::from(item.name.clone()),
                TextInput::from(item.price.to_string()),
                TextInput::from(item.quantity.to_string()),
            ];
            app.screen = Screen::Edit;
        }
        _ => {}
    }
    Ok(false)
}

fn handle_edit_input(ctx: &AppContext, runtime: &Runtime, app: &mut App, key: KeyEvent) -> Result<bool> {
    let Some(item) = app.selected.clone() else {
        enter_list(ctx, runtime, app);
        return Ok(false);
    };
    match key.code {
        KeyCode::Esc => app.screen = Screen::Details,
        KeyCode::Tab | KeyCode::Down => app.edit_form.next(),
        KeyCode::BackTab | KeyCode::Up => app.edit_form.prev(),
        KeyCode::Enter => {
            let edited = match apply_edit(
                &item,
                app.edit_form.value(0),
                app.edit_form.value(1),
                app.edit_form.value(2),
            ) {
                Ok(edited) => edited,
                Err(err) => {
                    app.status = Some(err.to_string());
                    return Ok(false);
                }
            };
            if !runtime.block_on(ctx.inventory.update(edited)) {
                app.status = Some("Error: item could not be updated".into());
                return Ok(false);
            }
            app.status = Some("Item updated".into());
            app.selected = None;
            enter_list(ctx, runtime, app);
        }
        _ => edit_text(app.edit_form.focused(), key),
    }
    Ok(false)
}

fn render_app(frame: &mut Frame, app: &App) {
    let size = frame.size();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(0), Constraint::Length(3)].as_ref())
        .split(size);

    render_header(frame, chunks[0], app);

    match app.screen {
        Screen::Login => render_login(frame, chunks[1], app),
        Screen::List => render_list(frame, chunks[1], app),
        Screen::Add => render_form(frame, chunks[1], "Add item", &app.add_form),
        Screen::Details => render_details(frame, chunks[1], app),
        Screen::Edit => render_form(frame, chunks[1], "Edit item", &app.edit_form),
    }

    render_guide_bar(frame, chunks[2], app);

    if app.confirm_delete {
        render_confirm_popup(frame, size, app);
    }

    if app.show_help {
        render_help_popup(frame, size, &help_text(app));
    }
}

fn render_header(frame: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(28)])
        .split(area);

    let status = app.status.clone().unwrap_or_default();
    let title = Paragraph::new(vec![
        Line::from(Span::styled(screen_title(app.screen), Style::default().add_modifier(Modifier::BOLD))),
        Line::from(Span::styled(status, Style::default().fg(Color::Yellow))),
    ])
    .block(Block::default().borders(Borders::ALL).title("InvKeeper"));
    frame.render_widget(title, chunks[0]);

    if let Some(widget) = &app.widget {
        let icon = match widget.toggle {
            ik_app::ToggleIcon::Show => "w: show",
            ik_app::ToggleIcon::Hide => "w: hide",
        };
        let card = Paragraph::new(vec![
            Line::from(widget.balance.clone()),
            Line::from(Span::styled(icon, Style::default().fg(Color::DarkGray))),
        ])
        .block(Block::default().borders(Borders::ALL).title("Inventory value"))
        .style(Style::default().fg(Color::Cyan));
        frame.render_widget(card, chunks[1]);
    }
}

fn screen_title(screen: Screen) -> &'static str {
    match screen {
        Screen::Login => "Sign in",
        Screen::List => "Inventory",
        Screen::Add => "Add item",
        Screen::Details => "Item details",
        Screen::Edit => "Edit item",
    }
}

fn render_login(frame: &mut Frame, area: Rect, app: &App) {
    let popup = centered_rect(60, 60, area);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Length(3), Constraint::Min(0)])
        .split(popup);

    let email = Paragraph::new(app.login.value(0))
        .block(field_block("Email", app.login.focus == 0));
    frame.render_widget(email, chunks[0]);

    let masked: String = "*".repeat(app.login.fields[1].content.chars().count());
    let password_title = match app.password_valid {
        Some(false) => "Password (6 to 10 characters)",
        _ => "Password",
    };
    let password = Paragraph::new(masked).block(field_block(password_title, app.login.focus == 1));
    frame.render_widget(password, chunks[1]);

    let hint = if app.can_submit_login {
        "enter: sign in   ctrl+r: register"
    } else {
        "fill in both fields to continue"
    };
    frame.render_widget(
        Paragraph::new(hint).style(Style::default().fg(Color::DarkGray)),
        chunks[2],
    );

    let focused = &app.login.fields[app.login.focus];
    let target = chunks[app.login.focus];
    frame.set_cursor(target.x + 1 + (focused.cursor as u16).min(target.width.saturating_sub(2)), target.y + 1);
}

fn field_block(title: &str, focused: bool) -> Block<'_> {
    let style = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    Block::default().borders(Borders::ALL).title(title).border_style(style)
}

fn render_list(frame: &mut Frame, area: Rect, app: &App) {
    let rows = app
        .items
        .iter()
        .map(|item| {
            ListItem::new(Line::from(vec![
                Span::styled(format!("Id: {:<6}", item.code), Style::default().fg(Color::Blue)),
                Span::raw(format!("{:<24}", item.name)),
                Span::styled(format_currency(u128::from(item.price)), Style::default().fg(Color::Green)),
            ]))
        })
        .collect::<Vec<_>>();

    let title = if app.items.is_empty() {
        "Items (empty)".to_string()
    } else {
        format!("Items ({})", app.items.len())
    };
    let list = List::new(rows)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().bg(Color::DarkGray));
    frame.render_stateful_widget(list, area, &mut app.list_state.clone());
}

fn render_details(frame: &mut Frame, area: Rect, app: &App) {
    let Some(item) = &app.selected else {
        return;
    };
    let total = InventoryViewModel::product_total(item.price, item.quantity);
    let lines = vec![
        Line::from(vec![Span::styled("Code: ", Style::default().fg(Color::Blue)), Span::raw(item.code.to_string())]),
        Line::from(vec![Span::styled("Name: ", Style::default().fg(Color::Blue)), Span::raw(item.name.clone())]),
        Line::from(vec![Span::styled("Price: ", Style::default().fg(Color::Blue)), Span::raw(format_currency(u128::from(item.price)))]),
        Line::from(vec![Span::styled("Quantity: ", Style::default().fg(Color::Blue)), Span::raw(item.quantity.to_string())]),
        Line::from(vec![Span::styled("Total: ", Style::default().fg(Color::Blue)), Span::raw(format_currency(total))]),
    ];
    let details = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(item.name.clone()))
        .wrap(Wrap { trim: true });
    frame.render_widget(details, area);
}

fn render_form(frame: &mut Frame, area: Rect, title: &str, form: &Form) {
    let block = Block::default().borders(Borders::ALL).title(title.to_string());
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut constraints = vec![Constraint::Length(3); form.fields.len()];
    constraints.push(Constraint::Min(0));
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(inner);

    for (index, (label, field)) in form.labels.iter().zip(form.fields.iter()).enumerate() {
        let widget = Paragraph::new(field.content.as_str()).block(field_block(label, index == form.focus));
        frame.render_widget(widget, chunks[index]);
    }

    let target = chunks[form.focus];
    let cursor = form.fields[form.focus].cursor as u16;
    frame.set_cursor(target.x + 1 + cursor.min(target.width.saturating_sub(2)), target.y + 1);
}

fn render_confirm_popup(frame: &mut Frame, area: Rect, app: &App) {
    let popup_area = centered_rect(50, 20, area);
    frame.render_widget(Clear, popup_area);
    let name = app.selected.as_ref().map(|item| item.name.as_str()).unwrap_or_default();
    let text = format!("Delete {name}? y: yes   n: no");
    let popup = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title("Confirm delete"))
        .wrap(Wrap { trim: true })
        .style(Style::default().fg(Color::Red));
    frame.render_widget(popup, popup_area);
}

fn render_guide_bar(frame: &mut Frame, area: Rect, app: &App) {
    let hints = get_key_hints(app)
        .into_iter()
        .flat_map(|(key, action)| {
            vec![
                Span::styled(format!(" {key} "), Style::default().fg(Color::Black).bg(Color::Gray)),
                Span::raw(format!(" {action}  ")),
            ]
        })
        .collect::<Vec<_>>();
    let bar = Paragraph::new(Line::from(hints)).block(Block::default().borders(Borders::ALL));
    frame.render_widget(bar, area);
}

fn get_key_hints(app: &App) -> Vec<(&'static str, &'static str)> {
    match app.screen {
        Screen::Login => vec![("tab", "next field"), ("enter", "sign in"), ("ctrl+r", "register"), ("esc", "quit")],
        Screen::List => vec![("enter", "details"), ("a", "add"), ("w", "widget"), ("o", "sign out"), ("q", "quit")],
        Screen::Add | Screen::Edit => vec![("tab", "next field"), ("enter", "save"), ("esc", "back")],
        Screen::Details => vec![("e", "edit"), ("d", "delete"), ("esc", "back")],
    }
}

fn render_help_popup(frame: &mut Frame, area: Rect, content: &str) {
    let popup_area = centered_rect(60, 50, area);
    frame.render_widget(Clear, popup_area);
    let popup = Paragraph::new(content.to_string())
        .block(Block::default().borders(Borders::ALL).title("Help"))
        .wrap(Wrap { trim: true });
    frame.render_widget(popup, popup_area);
}

fn help_text(app: &App) -> String {
    match app.screen {
        Screen::List => {
            "j/k: move\nenter: details\na: add item\nr: refresh\nw: show/hide value\no: sign out\nq: quit".into()
        }
        _ => get_key_hints(app)
            .into_iter()
            .map(|(key, action)| format!("{key}: {action}"))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ]
            .as_ref(),
        )
        .split(r);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ]
            .as_ref(),
        )
        .split(popup_layout[1])[1]
}

fn restore_terminal(mut terminal: Terminal<ratatui::backend::CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}
