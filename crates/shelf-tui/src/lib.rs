use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, Utc};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Tabs, Wrap};
use ratatui::{Frame, Terminal};
use std::io::{self, Stdout};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use shelf_core::{
    describe_due, filter_tasks, validate, CatalogView, CategoryFilter, DraftField, DraftProduct,
    Priority, Product, ProductIds, Project, ProjectFilter, StockStatus, Task,
    TaskFilter, ValidationErrors,
};
use shelf_fetch::{CatalogSource, DummyJsonSource};
use shelf_store::LocalStore;
use shelf_utils::{capitalize, format_price, truncate};

const TICK_RATE: Duration = Duration::from_millis(200);
const LOAD_ERROR: &str = "Failed to load products. Please try again later.";
const LABEL_WIDTH: usize = 17;

/// Everything the dashboard needs to start.
#[derive(Debug, Clone)]
pub struct TuiSettings {
    /// Catalog API base URL.
    pub api_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Local store directory for tasks and projects.
    pub store_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
    Products,
    Tasks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputMode {
    None,
    Search,
    AddProduct,
    AddTask,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum LoadState {
    Loading,
    Ready,
    Failed(String),
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
        let at = self.byte_index();
        self.content.insert(at, c);
        self.cursor += 1;
    }

    fn delete_back(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let at = self.byte_index();
            self.content.remove(at);
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

    fn move_home(&mut self) {
        self.cursor = 0;
    }

    fn move_end(&mut self) {
        self.cursor = self.content.chars().count();
    }

    fn reset(&mut self) {
        self.content.clear();
        self.cursor = 0;
    }

    /// Apply an editing key. Returns whether the content changed.
    fn handle(&mut self, key: KeyEvent) -> bool {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('a') => self.move_home(),
                KeyCode::Char('e') => self.move_end(),
                _ => {}
            }
            return false;
        }
        match key.code {
            KeyCode::Char(c) => {
                self.insert(c);
                true
            }
            KeyCode::Backspace => {
                let before = self.content.len();
                self.delete_back();
                before != self.content.len()
            }
            KeyCode::Left => {
                self.move_left();
                false
            }
            KeyCode::Right => {
                self.move_right();
                false
            }
            KeyCode::Home => {
                self.move_home();
                false
            }
            KeyCode::End => {
                self.move_end();
                false
            }
            _ => false,
        }
    }
}

/// State of the add-product popup.
#[derive(Debug, Default, Clone)]
struct ProductForm {
    focus: usize,
    title: TextInput,
    price: TextInput,
    stock: TextInput,
    brand: TextInput,
    thumbnail: TextInput,
    description: TextInput,
    category_index: usize,
    errors: ValidationErrors,
}

impl ProductForm {
    fn new() -> Self {
        Self {
            price: TextInput::from("0".into()),
            stock: TextInput::from("0".into()),
            ..Self::default()
        }
    }

    fn focused(&self) -> DraftField {
        DraftField::ALL
            .get(self.focus)
            .copied()
            .unwrap_or(DraftField::Title)
    }

    fn focus_next(&mut self) {
        self.focus = (self.focus + 1) % DraftField::ALL.len();
    }

    fn focus_prev(&mut self) {
        self.focus = (self.focus + DraftField::ALL.len() - 1) % DraftField::ALL.len();
    }

    fn input(&self, field: DraftField) -> Option<&TextInput> {
        match field {
            DraftField::Title => Some(&self.title),
            DraftField::Price => Some(&self.price),
            DraftField::Stock => Some(&self.stock),
            DraftField::Brand => Some(&self.brand),
            DraftField::Thumbnail => Some(&self.thumbnail),
            DraftField::Description => Some(&self.description),
            DraftField::Category => None,
        }
    }

    fn input_mut(&mut self, field: DraftField) -> Option<&mut TextInput> {
        match field {
            DraftField::Title => Some(&mut self.title),
            DraftField::Price => Some(&mut self.price),
            DraftField::Stock => Some(&mut self.stock),
            DraftField::Brand => Some(&mut self.brand),
            DraftField::Thumbnail => Some(&mut self.thumbnail),
            DraftField::Description => Some(&mut self.description),
            DraftField::Category => None,
        }
    }

    fn cycle_category(&mut self, count: usize, forward: bool) {
        if count == 0 {
            return;
        }
        self.category_index = if forward {
            (self.category_index + 1) % count
        } else {
            (self.category_index + count - 1) % count
        };
        self.errors.clear(DraftField::Category);
    }

    /// Snapshot the inputs as a draft. Unparseable numbers read as zero.
    fn draft(&self, categories: &[String]) -> DraftProduct {
        DraftProduct {
            title: self.title.content.clone(),
            price: self.price.content.trim().parse().unwrap_or(0.0),
            category: categories
                .get(self.category_index)
                .cloned()
                .unwrap_or_default(),
            stock: self.stock.content.trim().parse().unwrap_or(0),
            thumbnail: self.thumbnail.content.clone(),
            description: Some(self.description.content.clone()),
            brand: Some(self.brand.content.clone()),
        }
    }
}

#[derive(Debug)]
struct App {
    tab: Tab,
    catalog: CatalogView,
    ids: ProductIds,
    load: LoadState,
    product_state: ListState,
    input_mode: InputMode,
    search_input: TextInput,
    form: ProductForm,
    tasks: Vec<Task>,
    projects: Vec<Project>,
    task_filter: TaskFilter,
    task_state: ListState,
    task_input: TextInput,
    today: NaiveDate,
    status: Option<String>,
    show_help: bool,
}

impl App {
    fn new(today: NaiveDate) -> Self {
        Self {
            tab: Tab::Products,
            catalog: CatalogView::default(),
            ids: ProductIds::default(),
            load: LoadState::Loading,
            product_state: ListState::default(),
            input_mode: InputMode::None,
            search_input: TextInput::default(),
            form: ProductForm::new(),
            tasks: Vec::new(),
            projects: Vec::new(),
            task_filter: TaskFilter::default(),
            task_state: ListState::default(),
            task_input: TextInput::default(),
            today,
            status: None,
            show_help: false,
        }
    }

    fn set_products(&mut self, products: Vec<Product>) {
        self.ids.observe(&products);
        self.catalog.replace_products(products);
        self.load = LoadState::Ready;
        self.reset_product_selection();
    }

    fn reset_product_selection(&mut self) {
        let selected = if self.catalog.visible().is_empty() {
            None
        } else {
            Some(0)
        };
        self.product_state.select(selected);
    }

    fn selected_product(&self) -> Option<&Product> {
        self.product_state
            .selected()
            .and_then(|index| self.catalog.visible().get(index))
    }

    fn category_options(&self) -> Vec<CategoryFilter> {
        let mut options = vec![CategoryFilter::All];
        options.extend(
            self.catalog
                .categories()
                .iter()
                .cloned()
                .map(CategoryFilter::Only),
        );
        options
    }

    fn cycle_category(&mut self, forward: bool) {
        let options = self.category_options();
        let count = options.len();
        let current = options
            .iter()
            .position(|option| option == &self.catalog.spec().category)
            .unwrap_or(0);
        let next = if forward {
            (current + 1) % count
        } else {
            (current + count - 1) % count
        };
        let choice = options.get(next).cloned().unwrap_or_default();
        self.catalog.set_category(choice);
        self.reset_product_selection();
    }

    fn cycle_sort_field(&mut self) {
        self.catalog
            .update(|spec| spec.sort_field = spec.sort_field.next());
        self.reset_product_selection();
    }

    fn toggle_sort_order(&mut self) {
        self.catalog
            .update(|spec| spec.sort_order = spec.sort_order.toggled());
        self.reset_product_selection();
    }

    fn sync_search(&mut self) {
        self.catalog.set_search_text(self.search_input.content.clone());
        self.reset_product_selection();
    }

    fn reload_tasks(&mut self, store: &LocalStore) {
        self.tasks = store.load_tasks();
        self.projects = store.load_projects();
        self.clamp_task_selection();
    }

    /// Filtered tasks, open ones first.
    fn visible_tasks(&self) -> Vec<&Task> {
        let filtered = filter_tasks(&self.tasks, &self.task_filter, self.today);
        let (mut pending, completed): (Vec<&Task>, Vec<&Task>) =
            filtered.into_iter().partition(|task| !task.completed);
        pending.extend(completed);
        pending
    }

    fn selected_task(&self) -> Option<&Task> {
        self.task_state
            .selected()
            .and_then(|index| self.visible_tasks().get(index).copied())
    }

    fn clamp_task_selection(&mut self) {
        let len = self.visible_tasks().len();
        match self.task_state.selected() {
            _ if len == 0 => self.task_state.select(None),
            Some(index) if index >= len => self.task_state.select(Some(len - 1)),
            None => self.task_state.select(Some(0)),
            Some(_) => {}
        }
    }

    fn cycle_project(&mut self, forward: bool) {
        let mut options = vec![ProjectFilter::All];
        options.extend(self.projects.iter().map(|project| ProjectFilter::Only(project.id)));
        let count = options.len();
        let current = options
            .iter()
            .position(|option| *option == self.task_filter.project)
            .unwrap_or(0);
        let next = if forward {
            (current + 1) % count
        } else {
            (current + count - 1) % count
        };
        self.task_filter.project = options.get(next).copied().unwrap_or_default();
        self.task_state.select(None);
        self.clamp_task_selection();
    }

    fn project_name(&self, filter: ProjectFilter) -> String {
        match filter {
            ProjectFilter::All => "All Tasks".into(),
            ProjectFilter::Only(id) => self
                .projects
                .iter()
                .find(|project| project.id == id)
                .map_or_else(|| "Unknown".into(), |project| project.name.clone()),
        }
    }

    fn next_tab(&mut self) {
        self.tab = match self.tab {
            Tab::Products => Tab::Tasks,
            Tab::Tasks => Tab::Products,
        };
    }
}

/// Catalog source, async runtime, and task store driving one dashboard run.
struct Session<S> {
    source: S,
    runtime: tokio::runtime::Runtime,
    store: LocalStore,
}

impl<S: CatalogSource> Session<S> {
    /// Run the two-step catalog fetch. A failure leaves the current collection untouched.
    fn load_catalog(&self, app: &mut App) {
        match self.runtime.block_on(self.source.fetch_all()) {
            Ok(products) => {
                let count = products.len();
                app.set_products(products);
                app.status = Some(format!("Loaded {count} products"));
            }
            Err(err) => {
                tracing::error!(source = self.source.name(), %err, "catalog load failed");
                app.load = LoadState::Failed(LOAD_ERROR.into());
            }
        }
    }
}

pub fn run(settings: TuiSettings) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to initialize runtime")?;
    let source = DummyJsonSource::with_timeout(settings.api_url.clone(), settings.timeout)
        .context("failed to build catalog client")?;
    let session = Session {
        source,
        runtime,
        store: LocalStore::new(settings.store_path),
    };

    let mut app = App::new(Local::now().date_naive());
    app.reload_tasks(&session.store);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    terminal.draw(|frame| render_app(frame, &app))?;
    session.load_catalog(&mut app);

    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|frame| render_app(frame, &app))?;

        let timeout = TICK_RATE.saturating_sub(last_tick.elapsed());
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && handle_key(&session, &mut app, key) {
                    break;
                }
            }
        }

        if last_tick.elapsed() >= TICK_RATE {
            last_tick = Instant::now();
            app.today = Local::now().date_naive();
        }
    }

    restore_terminal(terminal)?;
    Ok(())
}

fn handle_key<S: CatalogSource>(session: &Session<S>, app: &mut App, key: KeyEvent) -> bool {
    match app.input_mode {
        InputMode::Search => {
            handle_search_input(app, key);
            return false;
        }
        InputMode::AddProduct => {
            handle_form_input(app, key);
            return false;
        }
        InputMode::AddTask => {
            handle_task_input(&session.store, app, key);
            return false;
        }
        InputMode::None => {}
    }

    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('u') => {
                handle_list_move(app, Move::PageUp);
                return false;
            }
            KeyCode::Char('d') => {
                handle_list_move(app, Move::PageDown);
                return false;
            }
            KeyCode::Char('c') => return true,
            _ => {}
        }
    }

    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Char('?') => app.show_help = !app.show_help,
        KeyCode::Right | KeyCode::Left | KeyCode::Tab | KeyCode::BackTab => app.next_tab(),
        KeyCode::Char('j') | KeyCode::Down => handle_list_move(app, Move::Down),
        KeyCode::Char('k') | KeyCode::Up => handle_list_move(app, Move::Up),
        KeyCode::PageDown => handle_list_move(app, Move::PageDown),
        KeyCode::PageUp => handle_list_move(app, Move::PageUp),
        KeyCode::Home | KeyCode::Char('g') => handle_list_move(app, Move::First),
        KeyCode::End | KeyCode::Char('G') => handle_list_move(app, Move::Last),
        _ => match app.tab {
            Tab::Products => handle_products_key(session, app, key),
            Tab::Tasks => handle_tasks_key(&session.store, app, key),
        },
    }
    false
}

fn handle_products_key<S: CatalogSource>(session: &Session<S>, app: &mut App, key: KeyEvent) {
    if let LoadState::Failed(_) = app.load {
        if key.code == KeyCode::Char('r') {
            app.load = LoadState::Loading;
            session.load_catalog(app);
        }
        return;
    }
    match key.code {
        KeyCode::Char('/') => {
            app.input_mode = InputMode::Search;
            app.search_input = TextInput::from(app.catalog.spec().search_text.clone());
        }
        KeyCode::Esc => {
            app.search_input.reset();
            app.sync_search();
        }
        KeyCode::Char('l') => app.cycle_category(true),
        KeyCode::Char('h') => app.cycle_category(false),
        KeyCode::Char('s') => app.cycle_sort_field(),
        KeyCode::Char('o') => app.toggle_sort_order(),
        KeyCode::Char('a') => open_product_form(app),
        _ => {}
    }
}

fn handle_tasks_key(store: &LocalStore, app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('l') => app.cycle_project(true),
        KeyCode::Char('h') => app.cycle_project(false),
        KeyCode::Char('p') => {
            app.task_filter.priority = app.task_filter.priority.next();
            app.clamp_task_selection();
        }
        KeyCode::Char('f') => {
            app.task_filter.status = app.task_filter.status.next();
            app.clamp_task_selection();
        }
        KeyCode::Char('n') => {
            app.task_input.reset();
            app.input_mode = InputMode::AddTask;
        }
        KeyCode::Char(' ') => {
            if let Some(id) = app.selected_task().map(|task| task.id) {
                if let Some(completed) = store.toggle_task(id) {
                    app.status = Some(if completed {
                        "Task completed".into()
                    } else {
                        "Task reopened".into()
                    });
                }
                app.reload_tasks(store);
            }
        }
        KeyCode::Char('x') => {
            if let Some(id) = app.selected_task().map(|task| task.id) {
                if store.remove_task(id) {
                    app.status = Some("Task removed".into());
                }
                app.reload_tasks(store);
            }
        }
        _ => {}
    }
}

fn handle_search_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::None;
            app.search_input.reset();
            app.sync_search();
        }
        KeyCode::Enter => app.input_mode = InputMode::None,
        _ => {
            if app.search_input.handle(key) {
                app.sync_search();
            }
        }
    }
}

fn open_product_form(app: &mut App) {
    app.form = ProductForm::new();
    app.input_mode = InputMode::AddProduct;
}

fn close_product_form(app: &mut App) {
    app.form = ProductForm::new();
    app.input_mode = InputMode::None;
}

fn handle_form_input(app: &mut App, key: KeyEvent) {
    let field = app.form.focused();
    match key.code {
        KeyCode::Esc => {
            close_product_form(app);
            app.status = Some("Add product cancelled".into());
        }
        KeyCode::Enter => submit_product(app),
        KeyCode::Tab | KeyCode::Down => app.form.focus_next(),
        KeyCode::BackTab | KeyCode::Up => app.form.focus_prev(),
        KeyCode::Left | KeyCode::Right if field == DraftField::Category => {
            let count = app.catalog.categories().len();
            app.form.cycle_category(count, key.code == KeyCode::Right);
        }
        _ => {
            let changed = app
                .form
                .input_mut(field)
                .is_some_and(|input| input.handle(key));
            if changed {
                app.form.errors.clear(field);
            }
        }
    }
}

fn submit_product(app: &mut App) {
    if app.catalog.categories().is_empty() {
        app.status = Some("No categories available; load the catalog first".into());
        return;
    }
    let draft = app.form.draft(app.catalog.categories());
    match validate(&draft, &app.ids) {
        Ok(product) => {
            let title = product.title.clone();
            if let Err(err) = app.catalog.prepend(product) {
                app.status = Some(err.to_string());
                return;
            }
            tracing::info!(%title, "product added");
            close_product_form(app);
            app.reset_product_selection();
            app.status = Some(format!("Added {title}"));
        }
        Err(errors) => {
            tracing::debug!(%errors, "product draft rejected");
            app.form.errors = errors;
        }
    }
}

fn handle_task_input(store: &LocalStore, app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::None;
            app.task_input.reset();
        }
        KeyCode::Enter => {
            match Task::new(app.task_input.content.clone(), Priority::Medium, Utc::now()) {
                Ok(mut task) => {
                    if let ProjectFilter::Only(id) = app.task_filter.project {
                        task.project_id = Some(id);
                    }
                    store.add_task(task);
                    app.reload_tasks(store);
                    app.status = Some("Task added".into());
                }
                Err(err) => app.status = Some(err.to_string()),
            }
            app.input_mode = InputMode::None;
            app.task_input.reset();
        }
        _ => {
            app.task_input.handle(key);
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Move {
    Up,
    Down,
    PageUp,
    PageDown,
    First,
    Last,
}

fn handle_list_move(app: &mut App, movement: Move) {
    match app.tab {
        Tab::Products => {
            let len = app.catalog.visible().len();
            move_list(&mut app.product_state, len, movement);
        }
        Tab::Tasks => {
            let len = app.visible_tasks().len();
            move_list(&mut app.task_state, len, movement);
        }
    }
}

fn move_list(state: &mut ListState, len: usize, movement: Move) {
    if len == 0 {
        state.select(None);
        return;
    }
    let current = state.selected().unwrap_or(0);
    let next = match movement {
        Move::Down => {
            if current + 1 >= len {
                0
            } else {
                current + 1
            }
        }
        Move::Up => {
            if current == 0 {
                len - 1
            } else {
                current - 1
            }
        }
        Move::PageDown => (current + 5).min(len - 1),
        Move::PageUp => current.saturating_sub(5),
        Move::First => 0,
        Move::Last => len - 1,
    };
    state.select(Some(next));
}

fn render_app(frame: &mut Frame, app: &App) {
    let size = frame.size();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0), Constraint::Length(3)].as_ref())
        .split(size);

    let titles = ["Products", "Tasks"]
        .iter()
        .map(|title| Line::from(Span::styled(*title, Style::default())))
        .collect::<Vec<_>>();
    let tabs = Tabs::new(titles)
        .select(match app.tab {
            Tab::Products => 0,
            Tab::Tasks => 1,
        })
        .block(Block::default().borders(Borders::ALL).title("Shelfview"))
        .highlight_style(Style::default().add_modifier(Modifier::BOLD));
    frame.render_widget(tabs, chunks[0]);

    match app.tab {
        Tab::Products => render_products(frame, chunks[1], app),
        Tab::Tasks => render_tasks(frame, chunks[1], app),
    }

    render_guide_bar(frame, chunks[2], app);

    match app.input_mode {
        InputMode::Search => render_input_popup(frame, size, "Search Products", &app.search_input),
        InputMode::AddProduct => render_product_form(frame, size, app),
        InputMode::AddTask => render_input_popup(frame, size, "New Task", &app.task_input),
        InputMode::None => {}
    }

    if app.show_help {
        render_help_popup(frame, size, help_text(app));
    }
}

fn render_products(frame: &mut Frame, area: Rect, app: &App) {
    match &app.load {
        LoadState::Loading => {
            let loading = Paragraph::new("\nLoading products…")
                .alignment(Alignment::Center)
                .block(Block::default().borders(Borders::ALL).title("Products"));
            frame.render_widget(loading, area);
            return;
        }
        LoadState::Failed(message) => {
            let lines = vec![
                Line::from(""),
                Line::from(Span::styled(
                    "Something went wrong",
                    Style::default().add_modifier(Modifier::BOLD).fg(Color::Red),
                )),
                Line::from(message.as_str()),
                Line::from(""),
                Line::from("Press r to try again"),
            ];
            let error = Paragraph::new(lines)
                .alignment(Alignment::Center)
                .block(Block::default().borders(Borders::ALL).title("Products"));
            frame.render_widget(error, area);
            return;
        }
        LoadState::Ready => {}
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Length(3), Constraint::Min(0)].as_ref())
        .split(area);

    let spec = app.catalog.spec();
    let category_label = match &spec.category {
        CategoryFilter::All => "All Categories".to_string(),
        CategoryFilter::Only(label) => capitalize(label),
    };
    let filters = Paragraph::new(Line::from(vec![
        Span::styled("Search: ", Style::default().fg(Color::DarkGray)),
        Span::raw(if spec.search_text.is_empty() {
            "-".to_string()
        } else {
            spec.search_text.clone()
        }),
        Span::styled("   Category: ", Style::default().fg(Color::DarkGray)),
        Span::raw(category_label),
        Span::styled("   Sort: ", Style::default().fg(Color::DarkGray)),
        Span::raw(format!("{} ({})", spec.sort_field.label(), spec.sort_order.label())),
    ]))
    .block(Block::default().borders(Borders::ALL).title("Filters & Sorting"));
    frame.render_widget(filters, chunks[0]);

    let summary = Paragraph::new(summary_line(app))
        .block(Block::default().borders(Borders::ALL).title(heading(&spec.category)));
    frame.render_widget(summary, chunks[1]);

    let list_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)].as_ref())
        .split(chunks[2]);

    let items = app
        .catalog
        .visible()
        .iter()
        .map(|product| {
            let mut spans = vec![
                Span::raw(truncate(&product.title, 28)),
                Span::raw("  "),
                Span::styled(format_price(product.price), Style::default().fg(Color::Green)),
            ];
            if let Some(badge) = product.discount_badge() {
                spans.push(Span::styled(format!(" {badge}"), Style::default().fg(Color::Red)));
            }
            ListItem::new(Line::from(spans))
        })
        .collect::<Vec<_>>();
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("Products"))
        .highlight_style(Style::default().bg(Color::DarkGray));
    frame.render_stateful_widget(list, list_chunks[0], &mut app.product_state.clone());

    let detail = match app.selected_product() {
        Some(product) => Paragraph::new(product_detail(product))
            .block(Block::default().borders(Borders::ALL).title("Details"))
            .wrap(Wrap { trim: true }),
        None => Paragraph::new("No products found")
            .block(Block::default().borders(Borders::ALL).title("Details")),
    };
    frame.render_widget(detail, list_chunks[1]);
}

fn heading(category: &CategoryFilter) -> String {
    match category {
        CategoryFilter::All => "All Products".into(),
        CategoryFilter::Only(label) => format!("{} Products", capitalize(label)),
    }
}

fn summary_line(app: &App) -> Line<'static> {
    let stats = app.catalog.stats();
    let mut showing = format!(
        "Showing {} of {} products",
        stats.visible_products, stats.total_products
    );
    let search = &app.catalog.spec().search_text;
    if !search.is_empty() {
        showing.push_str(&format!(" for \"{search}\""));
    }
    Line::from(vec![
        Span::raw(showing),
        Span::styled("   Categories: ", Style::default().fg(Color::DarkGray)),
        Span::raw(stats.category_count.to_string()),
        Span::styled("   Total Value: ", Style::default().fg(Color::DarkGray)),
        Span::raw(format_price(stats.total_value)),
    ])
}

fn product_detail(product: &Product) -> Vec<Line<'static>> {
    let stock_color = match product.stock_status() {
        StockStatus::OutOfStock => Color::Red,
        StockStatus::LowStock => Color::Yellow,
        StockStatus::InStock => Color::Green,
    };
    let mut price = format_price(product.price);
    if let Some(badge) = product.discount_badge() {
        price.push_str(&format!("  {badge}"));
    }
    let mut lines = vec![
        Line::from(Span::styled(
            product.title.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(format!("Category: {}", capitalize(&product.category))),
    ];
    if !product.brand.is_empty() {
        lines.push(Line::from(format!("Brand: {}", product.brand)));
    }
    lines.push(Line::from(format!("Price: {price}")));
    lines.push(Line::from(format!("Rating: {:.1}", product.rating)));
    lines.push(Line::from(vec![
        Span::raw(format!("Stock: {}  ", product.stock)),
        Span::styled(product.stock_status().label(), Style::default().fg(stock_color)),
    ]));
    if !product.description.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(product.description.clone()));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        product.thumbnail.clone(),
        Style::default().fg(Color::DarkGray),
    )));
    lines
}

fn render_tasks(frame: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(30), Constraint::Percentage(70)].as_ref())
        .split(area);

    let total: usize = app.projects.iter().map(|project| project.task_count).sum();
    let mut sidebar = vec![Line::from(Span::styled(
        "Projects",
        Style::default().add_modifier(Modifier::BOLD),
    ))];
    let mut entries = vec![(ProjectFilter::All, total)];
    entries.extend(
        app.projects
            .iter()
            .map(|project| (ProjectFilter::Only(project.id), project.task_count)),
    );
    for (filter, count) in entries {
        let style = if filter == app.task_filter.project {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        };
        sidebar.push(Line::from(Span::styled(
            format!("{} ({count})", app.project_name(filter)),
            style,
        )));
    }
    sidebar.push(Line::from(""));
    sidebar.push(Line::from(format!("Priority: {}", app.task_filter.priority.label())));
    sidebar.push(Line::from(format!("Status: {}", app.task_filter.status.label())));
    let sidebar = Paragraph::new(sidebar)
        .block(Block::default().borders(Borders::ALL).title("Filters"))
        .wrap(Wrap { trim: true });
    frame.render_widget(sidebar, chunks[0]);

    let visible = app.visible_tasks();
    let pending = visible.iter().filter(|task| !task.completed).count();
    let completed = visible.len() - pending;
    let items = visible
        .iter()
        .map(|task| ListItem::new(task_line(app, task)))
        .collect::<Vec<_>>();
    let title = format!("Active Tasks ({pending}) · Completed ({completed})");
    let list = if items.is_empty() {
        List::new(vec![ListItem::new(
            "No tasks found. Press n to create one or adjust the filters.",
        )])
    } else {
        List::new(items)
    }
    .block(Block::default().borders(Borders::ALL).title(title))
    .highlight_style(Style::default().bg(Color::DarkGray));
    frame.render_stateful_widget(list, chunks[1], &mut app.task_state.clone());
}

fn task_line(app: &App, task: &Task) -> Line<'static> {
    let marker = if task.completed { "[x] " } else { "[ ] " };
    let priority_color = match task.priority {
        Priority::High => Color::Red,
        Priority::Medium => Color::Yellow,
        Priority::Low => Color::Green,
    };
    let mut spans = vec![
        Span::raw(marker),
        Span::raw(task.title.clone()),
        Span::styled(format!("  {}", task.priority.label()), Style::default().fg(priority_color)),
    ];
    if let Some(due) = task.due_date {
        let style = if task.is_overdue(app.today) {
            Style::default().fg(Color::Red)
        } else if task.is_due_today(app.today) {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(format!("  {}", describe_due(due, app.today)), style));
    }
    if let Some(project) = task
        .project_id
        .and_then(|id| app.projects.iter().find(|project| project.id == id))
    {
        spans.push(Span::styled(
            format!("  #{}", project.name),
            Style::default().fg(Color::Blue),
        ));
    }
    Line::from(spans)
}

fn render_product_form(frame: &mut Frame, area: Rect, app: &App) {
    let popup_area = centered_rect(70, 80, area);
    frame.render_widget(Clear, popup_area);

    let categories = app.catalog.categories();
    let focused = app.form.focused();
    let mut lines = Vec::new();
    let mut cursor = None;
    for field in DraftField::ALL {
        let label_style = if field == focused {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        let value = match app.form.input(field) {
            Some(input) => {
                if field == focused {
                    let row = u16::try_from(lines.len()).unwrap_or(u16::MAX);
                    let column = u16::try_from(LABEL_WIDTH + input.cursor).unwrap_or(u16::MAX);
                    cursor = Some((column, row));
                }
                input.content.clone()
            }
            None => match categories.get(app.form.category_index) {
                Some(category) => format!("< {} >", capitalize(category)),
                None => "(no categories available)".into(),
            },
        };
        lines.push(Line::from(vec![
            Span::styled(format!("{:<width$}", field.label(), width = LABEL_WIDTH), label_style),
            Span::raw(value),
        ]));
        if let Some(message) = app.form.errors.get(field) {
            lines.push(Line::from(Span::styled(
                format!("{:<width$}{message}", "", width = LABEL_WIDTH),
                Style::default().fg(Color::Red),
            )));
        }
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Enter: Add Product | Tab: Next Field | ←/→: Category | Esc: Cancel",
        Style::default().fg(Color::DarkGray),
    )));

    let form = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Add New Product"));
    frame.render_widget(form, popup_area);

    if let Some((column, row)) = cursor {
        let cx = (popup_area.x + 1)
            .saturating_add(column)
            .min(popup_area.right().saturating_sub(2));
        let cy = (popup_area.y + 1)
            .saturating_add(row)
            .min(popup_area.bottom().saturating_sub(2));
        frame.set_cursor(cx, cy);
    }
}

fn render_input_popup(frame: &mut Frame, area: Rect, title: &str, input_data: &TextInput) {
    let popup_area = centered_rect(60, 20, area);
    frame.render_widget(Clear, popup_area);
    let block = Block::default().borders(Borders::ALL).title(title.to_string());
    let input_widget = Paragraph::new(input_data.content.as_str())
        .block(block)
        .style(Style::default().fg(Color::Yellow));
    frame.render_widget(input_widget, popup_area);

    let offset = u16::try_from(input_data.cursor).unwrap_or(u16::MAX);
    let cx = popup_area.x + 1 + offset.min(popup_area.width.saturating_sub(2));
    frame.set_cursor(cx, popup_area.y + 1);
}

fn render_guide_bar(frame: &mut Frame, area: Rect, app: &App) {
    let hints = get_key_hints(app);
    let mut spans: Vec<Span> = hints
        .iter()
        .flat_map(|(key, desc)| {
            vec![
                Span::styled(
                    format!(" [{key}] "),
                    Style::default().add_modifier(Modifier::BOLD).fg(Color::Cyan),
                ),
                Span::raw(format!("{desc}  ")),
            ]
        })
        .collect();
    if let Some(status) = &app.status {
        spans.push(Span::styled(format!("  {status}"), Style::default().fg(Color::Yellow)));
    }

    let guide = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).title("Guide"));
    frame.render_widget(guide, area);
}

fn get_key_hints(app: &App) -> Vec<(&'static str, &'static str)> {
    match app.input_mode {
        InputMode::Search => return vec![("Enter", "Done"), ("Esc", "Clear")],
        InputMode::AddProduct => {
            return vec![
                ("Enter", "Add"),
                ("Tab", "Next"),
                ("←/→", "Category"),
                ("Esc", "Cancel"),
            ]
        }
        InputMode::AddTask => return vec![("Enter", "Save"), ("Esc", "Cancel")],
        InputMode::None => {}
    }
    if app.show_help {
        return vec![("?", "Close Help")];
    }

    let mut hints = vec![("q", "Quit"), ("?", "Help"), ("←/→", "Tabs")];
    match app.tab {
        Tab::Products => {
            if let LoadState::Failed(_) = app.load {
                hints.push(("r", "Retry"));
            } else {
                hints.extend_from_slice(&[
                    ("↑/↓", "Nav"),
                    ("/", "Search"),
                    ("h/l", "Category"),
                    ("s", "Sort"),
                    ("o", "Order"),
                    ("a", "Add"),
                ]);
            }
        }
        Tab::Tasks => {
            hints.extend_from_slice(&[
                ("↑/↓", "Nav"),
                ("h/l", "Project"),
                ("p", "Priority"),
                ("f", "Status"),
                ("Space", "Toggle"),
                ("n", "New"),
                ("x", "Remove"),
            ]);
        }
    }
    hints
}

fn render_help_popup(frame: &mut Frame, area: Rect, content: &str) {
    let popup_area = centered_rect(70, 40, area);
    frame.render_widget(Clear, popup_area);
    let block = Block::default().borders(Borders::ALL).title("Help");
    let help = Paragraph::new(content).block(block).wrap(Wrap { trim: true });
    frame.render_widget(help, popup_area);
}

fn help_text(app: &App) -> &'static str {
    match app.tab {
        Tab::Products => {
            "/: search titles\n\
             esc: clear search\n\
             h/l: previous/next category\n\
             s: cycle sort field\n\
             o: toggle sort order\n\
             a: add product\n\
             r: retry after a failed load\n\
             left/right: switch tabs\n\
             q: quit"
        }
        Tab::Tasks => {
            "h/l: previous/next project\n\
             p: cycle priority filter\n\
             f: cycle status filter\n\
             space: toggle completion\n\
             n: new task\n\
             x: remove task\n\
             left/right: switch tabs\n\
             q: quit"
        }
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

fn restore_terminal(
    mut terminal: Terminal<ratatui::backend::CrosstermBackend<Stdout>>,
) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;
    use shelf_fetch::{FetchError, FetchResult};
    use tempfile::TempDir;

    struct StubSource {
        products: Option<Vec<Product>>,
    }

    impl CatalogSource for StubSource {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn fetch_all(&self) -> FetchResult<Vec<Product>> {
            self.products
                .clone()
                .ok_or_else(|| FetchError::Transport("connection refused".into()))
        }
    }

    fn product(id: u64, title: &str, category: &str, price: f64) -> Product {
        Product {
            id,
            title: title.into(),
            description: String::new(),
            price,
            discount_percentage: 0.0,
            rating: 4.5,
            stock: 12,
            brand: String::new(),
            category: category.into(),
            thumbnail: format!("https://cdn.example.com/{id}.png"),
            images: Vec::new(),
        }
    }

    fn session(products: Option<Vec<Product>>) -> (TempDir, Session<StubSource>) {
        let temp = TempDir::new().expect("temp dir");
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");
        let session = Session {
            source: StubSource { products },
            runtime,
            store: LocalStore::new(temp.path().join("store")),
        };
        (temp, session)
    }

    fn loaded_app(session: &Session<StubSource>) -> App {
        let mut app = App::new(NaiveDate::from_ymd_opt(2026, 3, 10).expect("date"));
        session.load_catalog(&mut app);
        app
    }

    fn catalog() -> Vec<Product> {
        vec![
            product(1, "Smartphone Case", "accessories", 5.0),
            product(2, "Laptop", "electronics", 999.99),
        ]
    }

    fn press(session: &Session<StubSource>, app: &mut App, code: KeyCode) {
        handle_key(session, app, KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn type_text(session: &Session<StubSource>, app: &mut App, text: &str) {
        for c in text.chars() {
            press(session, app, KeyCode::Char(c));
        }
    }

    fn render(app: &App) -> String {
        let backend = TestBackend::new(100, 30);
        let mut terminal = Terminal::new(backend).expect("terminal");
        terminal
            .draw(|frame| render_app(frame, app))
            .expect("render");
        buffer_to_string(terminal.backend().buffer())
    }

    fn buffer_to_string(buffer: &ratatui::buffer::Buffer) -> String {
        let mut lines = Vec::new();
        for y in 0..buffer.area.height {
            let mut line = String::new();
            for x in 0..buffer.area.width {
                let cell = buffer.get(x, y);
                line.push_str(cell.symbol());
            }
            lines.push(line.trim_end().to_string());
        }
        lines.join("\n")
    }

    #[test]
    fn products_screen_shows_summary() {
        let (_temp, session) = session(Some(catalog()));
        let app = loaded_app(&session);
        let screen = render(&app);
        assert!(screen.contains("Showing 2 of 2 products"));
        assert!(screen.contains("Laptop"));
        assert!(screen.contains("Total Value: $1004.99"));
    }

    #[test]
    fn failed_load_offers_retry_and_keeps_collection() {
        let (_temp, session) = session(None);
        let mut app = loaded_app(&session);
        assert_eq!(app.load, LoadState::Failed(LOAD_ERROR.into()));
        assert!(app.catalog.products().is_empty());
        let screen = render(&app);
        assert!(screen.contains("Something went wrong"));
        assert!(screen.contains("Press r to try again"));

        press(&session, &mut app, KeyCode::Char('r'));
        assert!(matches!(app.load, LoadState::Failed(_)));
    }

    #[test]
    fn search_typing_filters_live() {
        let (_temp, session) = session(Some(catalog()));
        let mut app = loaded_app(&session);
        press(&session, &mut app, KeyCode::Char('/'));
        type_text(&session, &mut app, "PHONE");
        assert_eq!(app.catalog.visible().len(), 1);
        assert_eq!(app.catalog.spec().search_text, "PHONE");

        press(&session, &mut app, KeyCode::Enter);
        assert_eq!(app.input_mode, InputMode::None);
        assert!(render(&app).contains("Showing 1 of 2 products for \"PHONE\""));

        press(&session, &mut app, KeyCode::Esc);
        assert_eq!(app.catalog.visible().len(), 2);
    }

    #[test]
    fn category_and_sort_keys_recompute() {
        let (_temp, session) = session(Some(catalog()));
        let mut app = loaded_app(&session);
        press(&session, &mut app, KeyCode::Char('l'));
        assert_eq!(app.catalog.spec().category, CategoryFilter::parse("accessories"));
        assert_eq!(app.catalog.visible().len(), 1);

        press(&session, &mut app, KeyCode::Char('h'));
        assert_eq!(app.catalog.spec().category, CategoryFilter::All);

        press(&session, &mut app, KeyCode::Char('s'));
        press(&session, &mut app, KeyCode::Char('o'));
        assert_eq!(app.selected_product().map(|product| product.id), Some(2));
    }

    #[test]
    fn invalid_form_reports_errors_and_clears_on_edit() {
        let (_temp, session) = session(Some(catalog()));
        let mut app = loaded_app(&session);
        press(&session, &mut app, KeyCode::Char('a'));
        assert_eq!(app.input_mode, InputMode::AddProduct);

        press(&session, &mut app, KeyCode::Enter);
        assert!(app.form.errors.contains(DraftField::Title));
        assert!(app.form.errors.contains(DraftField::Price));
        assert!(app.form.errors.contains(DraftField::Thumbnail));
        assert!(!app.form.errors.contains(DraftField::Category));
        assert!(render(&app).contains("Title is required"));

        type_text(&session, &mut app, "M");
        assert!(!app.form.errors.contains(DraftField::Title));
        assert!(app.form.errors.contains(DraftField::Price));
    }

    #[test]
    fn valid_form_prepends_product() {
        let (_temp, session) = session(Some(catalog()));
        let mut app = loaded_app(&session);
        press(&session, &mut app, KeyCode::Char('a'));
        type_text(&session, &mut app, "Mouse");
        press(&session, &mut app, KeyCode::Tab);
        press(&session, &mut app, KeyCode::Backspace);
        type_text(&session, &mut app, "9.99");
        press(&session, &mut app, KeyCode::Tab);
        press(&session, &mut app, KeyCode::Tab);
        press(&session, &mut app, KeyCode::Right);
        press(&session, &mut app, KeyCode::Tab);
        press(&session, &mut app, KeyCode::Tab);
        type_text(&session, &mut app, "http://x/y.png");
        press(&session, &mut app, KeyCode::Enter);

        assert_eq!(app.input_mode, InputMode::None);
        let added = &app.catalog.products()[0];
        assert_eq!(added.title, "Mouse");
        assert_eq!(added.category, "electronics");
        assert_eq!(added.id, 3);
        assert_eq!(added.images, vec!["http://x/y.png".to_string()]);
        assert_eq!(app.status.as_deref(), Some("Added Mouse"));
    }

    #[test]
    fn form_submission_disabled_without_categories() {
        let (_temp, session) = session(Some(Vec::new()));
        let mut app = loaded_app(&session);
        press(&session, &mut app, KeyCode::Char('a'));
        press(&session, &mut app, KeyCode::Enter);
        assert_eq!(app.input_mode, InputMode::AddProduct);
        assert!(app.form.errors.is_empty());
        assert!(app.catalog.products().is_empty());
    }

    #[test]
    fn tasks_tab_adds_and_toggles() {
        let (_temp, session) = session(Some(catalog()));
        let mut app = loaded_app(&session);
        press(&session, &mut app, KeyCode::Right);
        assert_eq!(app.tab, Tab::Tasks);

        press(&session, &mut app, KeyCode::Char('n'));
        type_text(&session, &mut app, "Restock shelves");
        press(&session, &mut app, KeyCode::Enter);
        assert_eq!(app.tasks.len(), 1);
        assert_eq!(session.store.load_tasks().len(), 1);

        press(&session, &mut app, KeyCode::Char(' '));
        assert!(app.tasks[0].completed);
        assert!(render(&app).contains("Completed (1)"));

        press(&session, &mut app, KeyCode::Char('x'));
        assert!(app.tasks.is_empty());
    }

    #[test]
    fn help_lists_one_binding_per_line() {
        let mut app = App::new(NaiveDate::from_ymd_opt(2026, 3, 10).expect("date"));
        for tab in [Tab::Products, Tab::Tasks] {
            app.tab = tab;
            let text = help_text(&app);
            assert!(text.ends_with("q: quit"));
            for line in text.lines() {
                assert_eq!(line, line.trim_start());
                assert!(line.contains(": "), "{line}");
            }
        }
    }

    #[test]
    fn text_input_handles_multibyte_characters() {
        let mut input = TextInput::from("café".into());
        input.move_left();
        input.insert('x');
        assert_eq!(input.content, "cafxé");
        input.move_end();
        input.delete_back();
        assert_eq!(input.content, "cafx");
    }
}
