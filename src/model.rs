use arboard::Clipboard;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, error, trace};

use crate::domain::{GridConfig, GridError, HELP_TEXT, Message};
use crate::filter::{self, FilterStore};
use crate::record::{FieldValue, Record};
use crate::render::Renderer;
use crate::schema::{self, ColumnDef};
use crate::sort::{SortDirection, SortState};
use crate::ui::{
    BORDER_HEIGHT, BORDER_WIDTH, COLUMN_SPACING, GRID_HEADER_HEIGHT, STATUS_LINE_HEIGHT,
};

#[derive(Debug, PartialEq)]
pub enum Status {
    Ready,
    Quitting,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Mode {
    Grid,
    FilterPanel,
    Detail,
    Popup,
}

/// Cursor and window state of the main grid. `cursor_row` is relative to
/// the window, `offset_row` is the absolute index of the first windowed
/// row. Rows have variable height, so the window length is whatever fits
/// into the grid height.
struct GridView {
    cursor_row: usize,
    cursor_column: usize,
    offset_row: usize,
    window_len: usize,
    width: usize,
    height: usize,
}

impl GridView {
    fn empty() -> Self {
        GridView {
            cursor_row: 0,
            cursor_column: 0,
            offset_row: 0,
            window_len: 0,
            width: 0,
            height: 0,
        }
    }
}

/// One distinct value of a column, as offered by the filter panel.
#[derive(Debug, Clone)]
struct PanelValue {
    /// First seen casing, shown to the user.
    display: String,
    /// Lower cased form, what the filter store holds.
    key: String,
    count: usize,
}

struct FilterPanel {
    column_idx: usize,
    values: Vec<PanelValue>,
    cursor_row: usize,
    offset_row: usize,
    height: usize,
}

struct DetailPane {
    view_idx: usize,
    cursor_row: usize,
    offset_row: usize,
    height: usize,
}

pub struct UIColumn {
    pub label: String,
    pub width: usize,
}

pub struct UIRow {
    /// Per column, the wrapped display lines of the cell.
    pub cells: Vec<Vec<String>>,
    pub height: usize,
}

pub struct PanelEntry {
    pub display: String,
    pub count: usize,
    pub checked: bool,
}

pub struct PanelView {
    pub title: String,
    pub entries: Vec<PanelEntry>,
    pub selected: usize,
    pub total_values: usize,
    pub active_values: usize,
}

pub struct DetailView {
    pub title: String,
    pub labels: Vec<String>,
    pub values: Vec<String>,
    pub label_width: usize,
    pub selected_row: usize,
}

pub struct UIData {
    pub title: String,
    pub columns: Vec<UIColumn>,
    pub rows: Vec<UIRow>,
    pub total_rows: usize,
    pub source_rows: usize,
    pub selected_row: usize,
    pub selected_column: usize,
    pub abs_selected_row: usize,
    pub filter_active: bool,
    pub show_popup: bool,
    pub popup_message: String,
    pub panel: Option<PanelView>,
    pub detail: Option<DetailView>,
    pub layout: UILayout,
    pub status_message: String,
    pub last_status_message_update: Instant,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            title: String::new(),
            columns: Vec::new(),
            rows: Vec::new(),
            total_rows: 0,
            source_rows: 0,
            selected_row: 0,
            selected_column: 0,
            abs_selected_row: 0,
            filter_active: false,
            show_popup: false,
            popup_message: String::new(),
            panel: None,
            detail: None,
            layout: UILayout::default(),
            status_message: String::new(),
            last_status_message_update: Instant::now(),
        }
    }
}

#[derive(Default, Clone, Debug)]
pub struct UILayout {
    pub width: usize,
    pub height: usize,
    pub grid_width: usize,
    pub grid_height: usize,
    pub statusline_width: usize,
    pub statusline_height: usize,
}

impl UILayout {
    pub fn from_values(ui_width: usize, ui_height: usize) -> Self {
        let grid_width = ui_width.saturating_sub(BORDER_WIDTH);
        let grid_height = ui_height
            .saturating_sub(BORDER_HEIGHT)
            .saturating_sub(GRID_HEADER_HEIGHT)
            .saturating_sub(STATUS_LINE_HEIGHT);

        let layout = UILayout {
            width: ui_width,
            height: ui_height,
            grid_width,
            grid_height,
            statusline_width: ui_width.saturating_sub(BORDER_WIDTH),
            statusline_height: STATUS_LINE_HEIGHT,
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }
}

pub struct Model {
    config: GridConfig,
    pub status: Status,
    mode: Mode,
    previous_mode: Mode,
    title: String,
    columns: Vec<ColumnDef>,
    renderer: Renderer,
    /// Source records in load order. Immutable for the session.
    records: Vec<Record>,
    /// What the grid shows: records after filtering and ordering.
    view: Vec<Record>,
    filters: FilterStore,
    sort: SortState,
    grid: GridView,
    panel: Option<FilterPanel>,
    detail: Option<DetailPane>,
    histograms: HashMap<String, Vec<PanelValue>>,
    clipboard: Option<Clipboard>,
    uilayout: UILayout,
    uidata: UIData,
    status_message: String,
    last_status_message_update: Instant,
}

impl Model {
    pub fn init(
        config: &GridConfig,
        title: String,
        records: Vec<Record>,
        ui_width: usize,
        ui_height: usize,
    ) -> Self {
        let mut model = Self {
            config: config.clone(),
            status: Status::Ready,
            mode: Mode::Grid,
            previous_mode: Mode::Grid,
            title,
            columns: schema::default_columns(),
            renderer: Renderer::new(schema::default_render_rules()),
            records,
            view: Vec::new(),
            filters: FilterStore::new(),
            sort: SortState::new(),
            grid: GridView::empty(),
            panel: None,
            detail: None,
            histograms: HashMap::new(),
            clipboard: None,
            uilayout: UILayout::from_values(ui_width, ui_height),
            uidata: UIData::empty(),
            status_message: String::new(),
            last_status_message_update: Instant::now(),
        };
        model.set_status_message(format!("Loaded {} records", model.records.len()));
        model.rebuild_view();
        model
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), GridError> {
        let Some(msg) = message else { return Ok(()) };
        match self.mode {
            Mode::Grid => match msg {
                Message::Quit => self.quit(),
                Message::MoveUp => self.move_grid_selection_up(1),
                Message::MoveDown => self.move_grid_selection_down(1),
                Message::MoveLeft => self.move_grid_selection_left(),
                Message::MoveRight => self.move_grid_selection_right(),
                Message::MovePageUp => {
                    self.move_grid_selection_up(std::cmp::max(self.grid.window_len, 1))
                }
                Message::MovePageDown => {
                    self.move_grid_selection_down(std::cmp::max(self.grid.window_len, 1))
                }
                Message::MoveBeginning => self.move_grid_selection_beginning(),
                Message::MoveEnd => self.move_grid_selection_end(),
                Message::ToggleSort => self.toggle_sort(),
                Message::OpenFilter => self.open_filter_panel(),
                Message::CopyCell => self.copy_grid_cell(),
                Message::CopyRow => self.copy_grid_row(),
                Message::Enter => self.open_detail_view(),
                Message::Help => self.show_help(),
                Message::Resize(width, height) => self.ui_resize(width as usize, height as usize),
                _ => (),
            },
            Mode::FilterPanel => match msg {
                Message::Quit => self.quit(),
                Message::MoveUp => self.move_panel_selection_up(1),
                Message::MoveDown => self.move_panel_selection_down(1),
                Message::MovePageUp => self.move_panel_selection_up(10),
                Message::MovePageDown => self.move_panel_selection_down(10),
                Message::MoveLeft => self.panel_switch_column(-1),
                Message::MoveRight => self.panel_switch_column(1),
                Message::ToggleValue => self.toggle_panel_value(),
                Message::SelectAll => self.panel_select_all(),
                Message::SelectNone => self.panel_select_none(),
                Message::ClearField => self.panel_clear_field(),
                Message::Enter | Message::Exit => self.close_filter_panel(),
                Message::Help => self.show_help(),
                Message::Resize(width, height) => self.ui_resize(width as usize, height as usize),
                _ => (),
            },
            Mode::Detail => match msg {
                Message::Quit => self.quit(),
                Message::MoveUp => self.move_detail_selection_up(1),
                Message::MoveDown => self.move_detail_selection_down(1),
                Message::MovePageUp => self.move_detail_selection_up(10),
                Message::MovePageDown => self.move_detail_selection_down(10),
                Message::MoveLeft => self.previous_record(),
                Message::MoveRight => self.next_record(),
                Message::CopyCell => self.copy_detail_value(),
                Message::Help => self.show_help(),
                Message::Exit => self.close_detail_view(),
                Message::Resize(width, height) => self.ui_resize(width as usize, height as usize),
                _ => (),
            },
            Mode::Popup => match msg {
                Message::Quit => self.quit(),
                Message::Exit | Message::Help => self.close_popup(),
                Message::Resize(width, height) => self.ui_resize(width as usize, height as usize),
                _ => (),
            },
        }
        Ok(())
    }

    fn quit(&mut self) {
        self.status = Status::Quitting;
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.last_status_message_update = Instant::now();
        self.uidata.status_message = self.status_message.clone();
        self.uidata.last_status_message_update = self.last_status_message_update;
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        self.uilayout = UILayout::from_values(width, height);
        match self.mode {
            Mode::Grid => self.update_grid_data(),
            Mode::FilterPanel => {
                self.update_grid_data();
                self.update_panel_view();
            }
            Mode::Detail => {
                self.update_grid_data();
                self.update_detail_data();
            }
            Mode::Popup => {}
        }
    }

    // ------------------------- View assembly ------------------------- //

    /// Run the records through the filter and the active sort directive,
    /// then rebuild the grid window.
    fn rebuild_view(&mut self) {
        let start_time = Instant::now();
        let state = self.filters.snapshot();
        let mut view = filter::apply(&self.records, &state);
        if let Some((field, direction)) = self.sort.directive() {
            Self::order_records(&mut view, field, direction);
        }
        debug!(
            "Rebuilt view: {} of {} records in {}ms",
            view.len(),
            self.records.len(),
            start_time.elapsed().as_millis()
        );
        self.view = view;
        if !self.filters.is_empty() {
            self.set_status_message(format!(
                "Filter matches {} of {} records",
                self.view.len(),
                self.records.len()
            ));
        }
        self.update_grid_data();
    }

    /// Order records by one field. Values that parse as numbers compare
    /// numerically and sort before everything that does not, whichever
    /// direction is active; the rest compares as strings. The sort is
    /// stable, ties keep their filtered order.
    fn order_records(records: &mut [Record], field: &str, direction: SortDirection) {
        records.sort_by(|a, b| {
            let a_value = a.raw(field);
            let b_value = b.raw(field);
            let a_num: Result<f64, _> = a_value.parse();
            let b_num: Result<f64, _> = b_value.parse();

            match (a_num, b_num) {
                (Ok(a_float), Ok(b_float)) => {
                    let ordering = a_float
                        .partial_cmp(&b_float)
                        .unwrap_or(std::cmp::Ordering::Equal);
                    match direction {
                        SortDirection::Ascending => ordering,
                        SortDirection::Descending => ordering.reverse(),
                    }
                }
                (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                (Err(_), Err(_)) => match direction {
                    SortDirection::Ascending => a_value.cmp(&b_value),
                    SortDirection::Descending => b_value.cmp(&a_value),
                },
            }
        });
    }

    fn update_grid_data(&mut self) {
        self.grid.width = self.uilayout.grid_width;
        self.grid.height = self.uilayout.grid_height;

        if self.grid.offset_row >= self.view.len() {
            self.grid.offset_row = self.view.len().saturating_sub(1);
        }

        let visible: Vec<&ColumnDef> = self.columns.iter().filter(|c| !c.is_hidden).collect();
        let widths = Self::resolve_widths(&visible, self.grid.width);

        // Fill the window top down until the height budget is spent. A row
        // taller than the whole budget still gets in, clipped by the ui.
        let mut rows = Vec::new();
        let mut used_height = 0;
        for record in self.view[self.grid.offset_row..].iter() {
            let row = self.build_row(record, &visible, &widths);
            if !rows.is_empty() && used_height + row.height > self.grid.height {
                break;
            }
            used_height += row.height;
            rows.push(row);
            if used_height >= self.grid.height {
                break;
            }
        }
        self.grid.window_len = rows.len();
        self.grid.cursor_row = std::cmp::min(
            self.grid.cursor_row,
            self.grid.window_len.saturating_sub(1),
        );
        self.grid.cursor_column =
            std::cmp::min(self.grid.cursor_column, visible.len().saturating_sub(1));

        trace!(
            "Grid: Cr {}, Cc {}, Or {}, Wl {}, gw: {}, gh: {}, uiw: {}, uih: {}",
            self.grid.cursor_row,
            self.grid.cursor_column,
            self.grid.offset_row,
            self.grid.window_len,
            self.grid.width,
            self.grid.height,
            self.uilayout.width,
            self.uilayout.height
        );

        let directive = self.sort.directive();
        let ui_columns: Vec<UIColumn> = visible
            .iter()
            .zip(&widths)
            .map(|(column, &width)| {
                let label = match directive {
                    Some((field, direction)) if column.field == field => {
                        let marker = match direction {
                            SortDirection::Ascending => "▲",
                            SortDirection::Descending => "▼",
                        };
                        format!("{} {marker}", column.label)
                    }
                    _ => column.label.clone(),
                };
                UIColumn { label, width }
            })
            .collect();

        self.update_uidata_for_grid(ui_columns, rows);
    }

    fn update_uidata_for_grid(&mut self, columns: Vec<UIColumn>, rows: Vec<UIRow>) {
        self.uidata = UIData {
            title: self.title.clone(),
            columns,
            rows,
            total_rows: self.view.len(),
            source_rows: self.records.len(),
            selected_row: self.grid.cursor_row,
            selected_column: self.grid.cursor_column,
            abs_selected_row: self.grid.offset_row + self.grid.cursor_row,
            filter_active: !self.filters.is_empty(),
            show_popup: false,
            popup_message: String::new(),
            panel: None,
            detail: None,
            layout: self.uilayout.clone(),
            status_message: self.status_message.clone(),
            last_status_message_update: self.last_status_message_update,
        };
    }

    fn build_row(&self, record: &Record, visible: &[&ColumnDef], widths: &[usize]) -> UIRow {
        let mut cells = Vec::with_capacity(visible.len());
        let mut height = 1;
        for (column, &width) in visible.iter().zip(widths) {
            let content = self.renderer.render(&column.field, record);
            let lines = if column.is_multiline {
                let mut lines = Self::wrap_text(&content, width);
                lines.truncate(self.config.max_row_height);
                lines
            } else {
                vec![content.lines().next().unwrap_or_default().to_string()]
            };
            height = std::cmp::max(height, lines.len());
            cells.push(lines);
        }
        UIRow { cells, height }
    }

    /// Resolve the "N%" width hints of the schema against the available
    /// grid width. Hints that do not parse share the leftover space.
    fn resolve_widths(columns: &[&ColumnDef], grid_width: usize) -> Vec<usize> {
        let spacing = columns.len().saturating_sub(1) * COLUMN_SPACING;
        let available = grid_width.saturating_sub(spacing);

        let mut widths = Vec::with_capacity(columns.len());
        let mut unresolved = Vec::new();
        let mut used = 0;
        for (idx, column) in columns.iter().enumerate() {
            match column
                .width
                .strip_suffix('%')
                .and_then(|p| p.parse::<usize>().ok())
            {
                Some(percent) => {
                    let width = std::cmp::max(available * percent / 100, 1);
                    used += width;
                    widths.push(width);
                }
                None => {
                    unresolved.push(idx);
                    widths.push(0);
                }
            }
        }
        if !unresolved.is_empty() {
            let share = std::cmp::max(available.saturating_sub(used) / unresolved.len(), 1);
            for idx in unresolved {
                widths[idx] = share;
            }
        }
        widths
    }

    /// Word wrap on character count. Words wider than the line are broken
    /// hard so no line ever exceeds `width`.
    fn wrap_text(text: &str, width: usize) -> Vec<String> {
        if width == 0 {
            return vec![String::new()];
        }
        let mut lines: Vec<String> = Vec::new();
        let mut current = String::new();
        let mut current_len = 0;

        for word in text.split_whitespace() {
            let word_len = word.chars().count();
            if current_len > 0 && current_len + 1 + word_len > width {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if word_len <= width {
                if current_len > 0 {
                    current.push(' ');
                    current_len += 1;
                }
                current.push_str(word);
                current_len += word_len;
            } else {
                for ch in word.chars() {
                    if current_len >= width {
                        lines.push(std::mem::take(&mut current));
                        current_len = 0;
                    }
                    current.push(ch);
                    current_len += 1;
                }
            }
        }
        if current_len > 0 || lines.is_empty() {
            lines.push(current);
        }
        lines
    }

    fn row_height_at(&self, idx: usize) -> usize {
        let visible: Vec<&ColumnDef> = self.columns.iter().filter(|c| !c.is_hidden).collect();
        let widths = Self::resolve_widths(&visible, self.grid.width);
        self.build_row(&self.view[idx], &visible, &widths).height
    }

    // ------------------------- Grid controls ------------------------- //

    fn toggle_sort(&mut self) {
        if let Some(column) = self
            .columns
            .iter()
            .filter(|c| !c.is_hidden)
            .nth(self.grid.cursor_column)
        {
            self.sort.toggle(column);
        }
        self.rebuild_view();
    }

    fn move_grid_selection_beginning(&mut self) {
        self.grid.cursor_row = 0;
        self.grid.offset_row = 0;
        self.update_grid_data();
    }

    fn move_grid_selection_end(&mut self) {
        if self.view.is_empty() {
            return;
        }
        // Walk backwards from the last row until the height budget is
        // spent; that row becomes the top of the window.
        let budget = self.grid.height;
        let mut used = 0;
        let mut first = self.view.len() - 1;
        for idx in (0..self.view.len()).rev() {
            let height = self.row_height_at(idx);
            if used + height > budget && used > 0 {
                break;
            }
            used += height;
            first = idx;
            if used >= budget {
                break;
            }
        }
        self.grid.offset_row = first;
        self.grid.cursor_row = self.view.len() - first - 1;
        self.update_grid_data();
    }

    fn move_grid_selection_up(&mut self, size: usize) {
        let grid = &mut self.grid;
        if grid.cursor_row > 0 {
            grid.cursor_row = grid.cursor_row.saturating_sub(size);
        } else if grid.offset_row > 0 {
            grid.offset_row = grid.offset_row.saturating_sub(size);
        }
        self.update_grid_data();
    }

    fn move_grid_selection_down(&mut self, size: usize) {
        if self.view.is_empty() {
            return;
        }
        let grid = &mut self.grid;
        if grid.offset_row + grid.cursor_row < self.view.len() - 1 {
            if grid.cursor_row + 1 < grid.window_len {
                // Inside the window; the clamp in update_grid_data stops
                // the cursor at the window end.
                grid.cursor_row += size;
            } else {
                grid.offset_row = std::cmp::min(grid.offset_row + size, self.view.len() - 1);
            }
            self.update_grid_data();
        }
    }

    fn move_grid_selection_left(&mut self) {
        if self.grid.cursor_column > 0 {
            self.grid.cursor_column -= 1;
            self.update_grid_data();
        }
    }

    fn move_grid_selection_right(&mut self) {
        let visible_count = self.columns.iter().filter(|c| !c.is_hidden).count();
        if self.grid.cursor_column + 1 < visible_count {
            self.grid.cursor_column += 1;
            self.update_grid_data();
        }
    }

    // ------------------------- Clipboard ----------------------------- //

    fn copy_to_clipboard(&mut self, content: String) {
        trace!("Copying content: {content}");
        if self.clipboard.is_none() {
            match Clipboard::new() {
                Ok(clipboard) => self.clipboard = Some(clipboard),
                Err(e) => {
                    error!("Could not access clipboard: {e}");
                    self.set_status_message("Could not access clipboard");
                    return;
                }
            }
        }
        if let Some(clipboard) = &mut self.clipboard {
            match clipboard.set_text(content) {
                Ok(_) => self.set_status_message("Copied to clipboard"),
                Err(e) => {
                    error!("Could not copy to clipboard: {e}");
                    self.set_status_message("Could not copy to clipboard");
                }
            }
        }
    }

    fn copy_grid_cell(&mut self) {
        if self.view.is_empty() {
            return;
        }
        let row = std::cmp::min(
            self.grid.offset_row + self.grid.cursor_row,
            self.view.len() - 1,
        );
        let Some(column) = self
            .columns
            .iter()
            .filter(|c| !c.is_hidden)
            .nth(self.grid.cursor_column)
        else {
            return;
        };
        let content = self.renderer.render(&column.field, &self.view[row]);
        self.copy_to_clipboard(content);
    }

    fn copy_grid_row(&mut self) {
        if self.view.is_empty() {
            return;
        }
        let row = std::cmp::min(
            self.grid.offset_row + self.grid.cursor_row,
            self.view.len() - 1,
        );
        let record = &self.view[row];
        // All columns go into the copy, hidden ones included.
        let content = self
            .columns
            .iter()
            .map(|c| Self::wrap_cell_content(&self.renderer.render(&c.field, record)))
            .collect::<Vec<String>>()
            .join(",");
        self.copy_to_clipboard(content);
    }

    fn wrap_cell_content(content: &str) -> String {
        let needs_escaping = content.chars().any(|c| c == '"');
        let needs_wrapping = content.chars().any(|c| c == ' ' || c == '\t' || c == ',');
        let mut out = String::from(content);

        if needs_escaping {
            out = out.replace("\"", "\"\"");
        }
        if needs_wrapping {
            out = format!("\"{out}\"");
        }
        out
    }

    // ------------------------- Filter panel -------------------------- //

    fn open_filter_panel(&mut self) {
        let column_idx = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.is_hidden)
            .nth(self.grid.cursor_column)
            .map(|(idx, _)| idx)
            .unwrap_or(0);
        self.previous_mode = self.mode;
        self.mode = Mode::FilterPanel;
        self.panel = Some(FilterPanel {
            column_idx,
            values: Vec::new(),
            cursor_row: 0,
            offset_row: 0,
            height: 0,
        });
        self.refresh_panel_values();
        self.update_panel_view();
    }

    fn close_filter_panel(&mut self) {
        self.panel = None;
        self.previous_mode = Mode::FilterPanel;
        self.mode = Mode::Grid;
        self.update_grid_data();
    }

    /// Count the distinct values of a field over the full source set, text
    /// values and list elements alike. Values differing only in case count
    /// as one, displayed with the casing seen first.
    fn ensure_histogram(&mut self, field: &str) {
        if self.histograms.contains_key(field) {
            return;
        }
        trace!("Calculate histogram for field [{field}]");
        let mut values: Vec<PanelValue> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut bump = |value: &str| {
            let key = value.to_lowercase();
            match index.get(&key) {
                Some(&idx) => values[idx].count += 1,
                None => {
                    index.insert(key.clone(), values.len());
                    values.push(PanelValue {
                        display: value.to_string(),
                        key,
                        count: 1,
                    });
                }
            }
        };
        for record in &self.records {
            match record.get(field) {
                Some(FieldValue::Text(value)) => bump(value),
                Some(FieldValue::List(items)) => {
                    for item in items {
                        bump(item);
                    }
                }
                _ => {}
            }
        }
        values.sort_by(|a, b| b.count.cmp(&a.count).then(a.key.cmp(&b.key)));
        self.histograms.insert(field.to_string(), values);
    }

    fn refresh_panel_values(&mut self) {
        let Some(panel) = &self.panel else { return };
        let field = self.columns[panel.column_idx].field.clone();
        self.ensure_histogram(&field);
        let values = self.histograms[&field].clone();
        if let Some(panel) = &mut self.panel {
            panel.values = values;
            panel.cursor_row = 0;
            panel.offset_row = 0;
        }
    }

    fn update_panel_view(&mut self) {
        let Some(panel) = &mut self.panel else { return };
        panel.height = std::cmp::max(3, self.uilayout.grid_height.saturating_sub(6));

        let total = panel.values.len();
        if panel.offset_row >= total {
            panel.offset_row = total.saturating_sub(1);
        }
        let rbegin = panel.offset_row;
        let rend = std::cmp::min(rbegin + panel.height, total);
        panel.cursor_row = std::cmp::min(panel.cursor_row, (rend - rbegin).saturating_sub(1));

        let column = &self.columns[panel.column_idx];
        let accepted = self.filters.values_for(&column.field);
        let entries: Vec<PanelEntry> = panel.values[rbegin..rend]
            .iter()
            .map(|value| PanelEntry {
                display: value.display.clone(),
                count: value.count,
                checked: accepted.iter().any(|a| a == &value.key),
            })
            .collect();

        self.uidata.panel = Some(PanelView {
            title: format!("Filter [{}]", column.label),
            entries,
            selected: panel.cursor_row,
            total_values: total,
            active_values: accepted.len(),
        });
    }

    fn panel_switch_column(&mut self, step: isize) {
        let total = self.columns.len() as isize;
        let Some(panel) = &mut self.panel else { return };
        // Hidden columns take part here: they are filterable, just not drawn.
        panel.column_idx = (panel.column_idx as isize + step).rem_euclid(total) as usize;
        self.refresh_panel_values();
        self.update_panel_view();
    }

    fn toggle_panel_value(&mut self) {
        let Some(panel) = &self.panel else { return };
        let Some(value) = panel.values.get(panel.offset_row + panel.cursor_row) else {
            return;
        };
        let field = self.columns[panel.column_idx].field.clone();
        let key = value.key.clone();
        let adding = !self.filters.values_for(&field).iter().any(|a| a == &key);
        self.filters.set_value(&field, &key, adding);
        self.rebuild_view();
        self.update_panel_view();
    }

    fn panel_select_all(&mut self) {
        let Some(panel) = &self.panel else { return };
        let field = self.columns[panel.column_idx].field.clone();
        let values: Vec<String> = panel.values.iter().map(|v| v.key.clone()).collect();
        self.filters.bulk_replace(&field, values);
        self.rebuild_view();
        self.update_panel_view();
    }

    fn panel_select_none(&mut self) {
        let Some(panel) = &self.panel else { return };
        let field = self.columns[panel.column_idx].field.clone();
        self.filters.bulk_replace(&field, Vec::new());
        self.rebuild_view();
        self.update_panel_view();
    }

    fn panel_clear_field(&mut self) {
        let Some(panel) = &self.panel else { return };
        let field = self.columns[panel.column_idx].field.clone();
        self.filters.clear_field(&field);
        self.rebuild_view();
        self.update_panel_view();
    }

    fn move_panel_selection_up(&mut self, size: usize) {
        if let Some(panel) = &mut self.panel {
            if panel.cursor_row > 0 {
                panel.cursor_row = panel.cursor_row.saturating_sub(size);
            } else if panel.offset_row > 0 {
                panel.offset_row = panel.offset_row.saturating_sub(size);
            }
        }
        self.update_panel_view();
    }

    fn move_panel_selection_down(&mut self, size: usize) {
        if let Some(panel) = &mut self.panel {
            if panel.values.is_empty() {
                return;
            }
            if panel.cursor_row + panel.offset_row < panel.values.len() - 1 {
                if panel.cursor_row + 1 < panel.height {
                    panel.cursor_row += size;
                } else {
                    panel.offset_row =
                        std::cmp::min(panel.offset_row + size, panel.values.len() - 1);
                }
            }
        }
        self.update_panel_view();
    }

    // ------------------------- Detail view --------------------------- //

    fn open_detail_view(&mut self) {
        if self.view.is_empty() {
            return;
        }
        let view_idx = std::cmp::min(
            self.grid.offset_row + self.grid.cursor_row,
            self.view.len() - 1,
        );
        trace!("Open detail view for record {view_idx}");
        self.previous_mode = self.mode;
        self.mode = Mode::Detail;
        self.detail = Some(DetailPane {
            view_idx,
            cursor_row: 0,
            offset_row: 0,
            height: 0,
        });
        self.update_detail_data();
    }

    fn close_detail_view(&mut self) {
        self.detail = None;
        self.previous_mode = Mode::Detail;
        self.mode = Mode::Grid;
        self.update_grid_data();
    }

    fn update_detail_data(&mut self) {
        if self.view.is_empty() {
            return;
        }
        let Some(pane) = &mut self.detail else { return };
        pane.view_idx = std::cmp::min(pane.view_idx, self.view.len() - 1);
        pane.height = std::cmp::max(3, self.uilayout.grid_height.saturating_sub(4));

        let total = self.columns.len();
        if pane.offset_row >= total {
            pane.offset_row = total.saturating_sub(1);
        }
        let rbegin = pane.offset_row;
        let rend = std::cmp::min(rbegin + pane.height, total);
        pane.cursor_row = std::cmp::min(pane.cursor_row, (rend - rbegin).saturating_sub(1));

        let record = &self.view[pane.view_idx];
        // The detail view lists every field, hidden columns included.
        let labels: Vec<String> = self.columns[rbegin..rend]
            .iter()
            .map(|c| c.label.clone())
            .collect();
        let values: Vec<String> = self.columns[rbegin..rend]
            .iter()
            .map(|c| self.renderer.render(&c.field, record))
            .collect();
        let label_width = labels.iter().map(|l| l.chars().count()).max().unwrap_or(0);

        self.uidata.detail = Some(DetailView {
            title: format!("Record {}/{}", pane.view_idx + 1, self.view.len()),
            labels,
            values,
            label_width,
            selected_row: pane.cursor_row,
        });
    }

    fn previous_record(&mut self) {
        if let Some(pane) = &mut self.detail {
            if pane.view_idx > 0 {
                pane.view_idx -= 1;
            }
        }
        self.update_detail_data();
    }

    fn next_record(&mut self) {
        let total = self.view.len();
        if let Some(pane) = &mut self.detail {
            if pane.view_idx + 1 < total {
                pane.view_idx += 1;
            }
        }
        self.update_detail_data();
    }

    fn move_detail_selection_up(&mut self, size: usize) {
        if let Some(pane) = &mut self.detail {
            if pane.cursor_row > 0 {
                pane.cursor_row = pane.cursor_row.saturating_sub(size);
            } else if pane.offset_row > 0 {
                pane.offset_row = pane.offset_row.saturating_sub(size);
            }
        }
        self.update_detail_data();
    }

    fn move_detail_selection_down(&mut self, size: usize) {
        let total = self.columns.len();
        if let Some(pane) = &mut self.detail {
            if pane.cursor_row + pane.offset_row < total - 1 {
                if pane.cursor_row + 1 < pane.height {
                    pane.cursor_row += size;
                } else {
                    pane.offset_row = std::cmp::min(pane.offset_row + size, total - 1);
                }
            }
        }
        self.update_detail_data();
    }

    fn copy_detail_value(&mut self) {
        let Some(pane) = &self.detail else { return };
        let Some(column) = self.columns.get(pane.offset_row + pane.cursor_row) else {
            return;
        };
        let content = self.renderer.render(&column.field, &self.view[pane.view_idx]);
        self.copy_to_clipboard(content);
    }

    // ------------------------- Help popup ---------------------------- //

    fn show_help(&mut self) {
        self.previous_mode = self.mode;
        self.mode = Mode::Popup;
        self.uidata.popup_message = HELP_TEXT.to_string();
        self.uidata.show_popup = true;
    }

    fn close_popup(&mut self) {
        trace!("Close popup ...");
        self.mode = self.previous_mode;
        self.previous_mode = Mode::Popup;
        self.uidata.show_popup = false;
        // The layout may have changed while the popup was up.
        match self.mode {
            Mode::Grid => self.update_grid_data(),
            Mode::FilterPanel => {
                self.update_grid_data();
                self.update_panel_view();
            }
            Mode::Detail => {
                self.update_grid_data();
                self.update_detail_data();
            }
            Mode::Popup => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(value: &str) -> FieldValue {
        FieldValue::Text(value.to_string())
    }

    fn event(
        event_type: &str,
        severity: &str,
        road: &str,
        description: &str,
        updated: &str,
        districts: &[&str],
    ) -> Record {
        Record::from_pairs(&[
            ("eventType", text(event_type)),
            ("severity", text(severity)),
            ("road", text(road)),
            ("description", text(description)),
            ("lastUpdated", text(updated)),
            (
                "district",
                FieldValue::List(districts.iter().map(|d| d.to_string()).collect()),
            ),
        ])
    }

    fn sample_records() -> Vec<Record> {
        vec![
            event(
                "Incident",
                "Major",
                "Highway 1",
                "Vehicle incident",
                "2026-02-11 08:15",
                &["Lower Mainland"],
            ),
            event(
                "Road Conditions",
                "Minor",
                "Highway 99",
                "Compact snow",
                "2026-02-11 06:40",
                &["Sea to Sky"],
            ),
            event(
                "Closure",
                "Major",
                "Highway 3",
                "Road closed",
                "2026-02-10 22:05",
                &["Kootenay"],
            ),
        ]
    }

    fn test_model() -> Model {
        Model::init(
            &GridConfig::default(),
            "events".to_string(),
            sample_records(),
            80,
            24,
        )
    }

    fn road_cells(model: &Model) -> Vec<String> {
        model
            .get_uidata()
            .rows
            .iter()
            .map(|row| row.cells[2][0].clone())
            .collect()
    }

    #[test]
    fn test_init_shows_all_records() {
        let model = test_model();
        let uidata = model.get_uidata();
        assert_eq!(uidata.total_rows, 3);
        assert_eq!(uidata.source_rows, 3);
        assert_eq!(uidata.rows.len(), 3);
        assert!(!uidata.filter_active);
    }

    #[test]
    fn test_hidden_column_is_not_drawn() {
        let model = test_model();
        let labels: Vec<&str> = model
            .get_uidata()
            .columns
            .iter()
            .map(|c| c.label.as_str())
            .collect();
        assert_eq!(labels.len(), 5);
        assert!(!labels.iter().any(|l| l.contains("District")));
    }

    #[test]
    fn test_render_rule_applied_to_grid_cells() {
        let model = test_model();
        let uidata = model.get_uidata();
        assert_eq!(uidata.rows[0].cells[0][0], "[!] incident");
        // No matcher for "Closure", raw value comes through.
        assert_eq!(uidata.rows[2].cells[0][0], "Closure");
    }

    #[test]
    fn test_toggle_sort_orders_view() {
        let mut model = test_model();
        model.update(Some(Message::ToggleSort)).unwrap();
        assert_eq!(
            road_cells(&model),
            ["Highway 3", "Highway 1", "Highway 99"]
        );
        model.update(Some(Message::ToggleSort)).unwrap();
        assert_eq!(
            road_cells(&model),
            ["Highway 99", "Highway 1", "Highway 3"]
        );
    }

    #[test]
    fn test_sort_marker_in_header() {
        let mut model = test_model();
        model.update(Some(Message::ToggleSort)).unwrap();
        assert_eq!(model.get_uidata().columns[0].label, "Type ▲");
        model.update(Some(Message::ToggleSort)).unwrap();
        assert_eq!(model.get_uidata().columns[0].label, "Type ▼");
    }

    #[test]
    fn test_order_records_numbers_before_text() {
        let mut records = vec![
            Record::from_pairs(&[("severity", text("high"))]),
            Record::from_pairs(&[("severity", text("10"))]),
            Record::from_pairs(&[("severity", text("2"))]),
        ];
        Model::order_records(&mut records, "severity", SortDirection::Ascending);
        let values: Vec<String> = records.iter().map(|r| r.raw("severity")).collect();
        assert_eq!(values, ["2", "10", "high"]);

        Model::order_records(&mut records, "severity", SortDirection::Descending);
        let values: Vec<String> = records.iter().map(|r| r.raw("severity")).collect();
        // Numbers stay in front, reversed among themselves.
        assert_eq!(values, ["10", "2", "high"]);
    }

    #[test]
    fn test_filter_through_panel_messages() {
        let mut model = test_model();
        model.update(Some(Message::OpenFilter)).unwrap();
        // Values sort by count, then value: closure, incident, road conditions.
        model.update(Some(Message::MoveDown)).unwrap();
        model.update(Some(Message::ToggleValue)).unwrap();
        model.update(Some(Message::Exit)).unwrap();

        let uidata = model.get_uidata();
        assert_eq!(uidata.total_rows, 1);
        assert_eq!(uidata.source_rows, 3);
        assert!(uidata.filter_active);
        assert_eq!(uidata.rows[0].cells[0][0], "[!] incident");
    }

    #[test]
    fn test_panel_select_all_and_none() {
        let mut model = test_model();
        model.update(Some(Message::OpenFilter)).unwrap();
        model.update(Some(Message::SelectAll)).unwrap();
        assert!(model.get_uidata().filter_active);
        assert_eq!(model.get_uidata().total_rows, 3);

        model.update(Some(Message::SelectNone)).unwrap();
        assert!(!model.get_uidata().filter_active);
        assert_eq!(model.get_uidata().total_rows, 3);
    }

    #[test]
    fn test_panel_clear_field() {
        let mut model = test_model();
        model.update(Some(Message::OpenFilter)).unwrap();
        model.update(Some(Message::ToggleValue)).unwrap();
        assert_eq!(model.get_uidata().total_rows, 1);

        model.update(Some(Message::ClearField)).unwrap();
        assert!(!model.get_uidata().filter_active);
        assert_eq!(model.get_uidata().total_rows, 3);
    }

    #[test]
    fn test_panel_reaches_hidden_column() {
        let mut model = test_model();
        model.update(Some(Message::OpenFilter)).unwrap();
        // One step left wraps from the first column to the hidden district.
        model.update(Some(Message::MoveLeft)).unwrap();
        let panel = model.get_uidata().panel.as_ref().unwrap();
        assert_eq!(panel.title, "Filter [District]");
        assert_eq!(panel.total_values, 3);

        // kootenay sorts first, toggling it leaves only the Closure record.
        model.update(Some(Message::ToggleValue)).unwrap();
        assert_eq!(model.get_uidata().total_rows, 1);
        assert_eq!(model.get_uidata().rows[0].cells[0][0], "Closure");
    }

    #[test]
    fn test_panel_entries_track_checked_state() {
        let mut model = test_model();
        model.update(Some(Message::OpenFilter)).unwrap();
        model.update(Some(Message::ToggleValue)).unwrap();
        let panel = model.get_uidata().panel.as_ref().unwrap();
        assert!(panel.entries[0].checked);
        assert!(!panel.entries[1].checked);
        assert_eq!(panel.active_values, 1);

        model.update(Some(Message::ToggleValue)).unwrap();
        let panel = model.get_uidata().panel.as_ref().unwrap();
        assert!(!panel.entries[0].checked);
        assert_eq!(panel.active_values, 0);
    }

    #[test]
    fn test_detail_view_walks_records() {
        let mut model = test_model();
        model.update(Some(Message::Enter)).unwrap();
        let detail = model.get_uidata().detail.as_ref().unwrap();
        assert_eq!(detail.title, "Record 1/3");
        assert_eq!(detail.labels.len(), 6);
        assert!(detail.labels.contains(&"District".to_string()));
        assert_eq!(detail.values[0], "[!] incident");

        model.update(Some(Message::MoveRight)).unwrap();
        let detail = model.get_uidata().detail.as_ref().unwrap();
        assert_eq!(detail.title, "Record 2/3");

        model.update(Some(Message::Exit)).unwrap();
        assert!(model.get_uidata().detail.is_none());
    }

    #[test]
    fn test_help_popup_opens_and_closes() {
        let mut model = test_model();
        model.update(Some(Message::Help)).unwrap();
        assert!(model.get_uidata().show_popup);
        assert!(!model.get_uidata().popup_message.is_empty());

        model.update(Some(Message::Exit)).unwrap();
        assert!(!model.get_uidata().show_popup);
    }

    #[test]
    fn test_grid_navigation_scrolls_window() {
        let records: Vec<Record> = (0..10)
            .map(|i| {
                event(
                    "Incident",
                    "Minor",
                    &format!("Highway {i}"),
                    "short",
                    "2026-02-11 08:15",
                    &["Lower Mainland"],
                )
            })
            .collect();
        // 10 terminal rows leave 6 for the grid.
        let mut model = Model::init(&GridConfig::default(), "t".into(), records, 80, 10);
        assert_eq!(model.get_uidata().rows.len(), 6);

        for _ in 0..7 {
            model.update(Some(Message::MoveDown)).unwrap();
        }
        let uidata = model.get_uidata();
        assert_eq!(uidata.abs_selected_row, 7);
        assert_eq!(uidata.selected_row, 5);

        model.update(Some(Message::MoveEnd)).unwrap();
        assert_eq!(model.get_uidata().abs_selected_row, 9);

        model.update(Some(Message::MoveBeginning)).unwrap();
        let uidata = model.get_uidata();
        assert_eq!(uidata.abs_selected_row, 0);
        assert_eq!(uidata.selected_row, 0);
    }

    #[test]
    fn test_empty_source_is_safe_to_navigate() {
        let mut model = Model::init(&GridConfig::default(), "empty".into(), Vec::new(), 80, 24);
        assert_eq!(model.get_uidata().total_rows, 0);
        assert!(model.get_uidata().rows.is_empty());

        model.update(Some(Message::MoveDown)).unwrap();
        model.update(Some(Message::MoveEnd)).unwrap();
        model.update(Some(Message::Enter)).unwrap();
        assert!(model.get_uidata().detail.is_none());
        assert_eq!(model.get_uidata().total_rows, 0);
    }

    #[test]
    fn test_multiline_description_wraps_and_caps() {
        let mut records = sample_records();
        records[0] = event(
            "Incident",
            "Major",
            "Highway 1",
            "A very long description that has to wrap over several lines \
             because it does not fit the description column width at all, \
             and then some more words to overflow even three full lines \
             of wrapped cell text in an eighty column terminal window",
            "2026-02-11 08:15",
            &["Lower Mainland"],
        );
        let model = Model::init(&GridConfig::default(), "t".into(), records, 80, 24);
        let row = &model.get_uidata().rows[0];
        assert_eq!(row.height, 3);
        assert_eq!(row.cells[3].len(), 3);
        // Single line columns stay single line.
        assert_eq!(row.cells[0].len(), 1);
    }

    #[test]
    fn test_wrap_text() {
        assert_eq!(Model::wrap_text("aaaa bb", 4), ["aaaa", "bb"]);
        assert_eq!(Model::wrap_text("a bb ccc", 8), ["a bb ccc"]);
        assert_eq!(Model::wrap_text("abcdefgh", 3), ["abc", "def", "gh"]);
        assert_eq!(Model::wrap_text("", 5), [""]);
    }

    #[test]
    fn test_wrap_cell_content() {
        assert_eq!(Model::wrap_cell_content("plain"), "plain");
        assert_eq!(Model::wrap_cell_content("a,b"), "\"a,b\"");
        assert_eq!(
            Model::wrap_cell_content("say \"hi\" now"),
            "\"say \"\"hi\"\" now\""
        );
    }

    #[test]
    fn test_resolve_widths() {
        let columns = vec![
            ColumnDef::new("A", "a", "50%"),
            ColumnDef::new("B", "b", "25%"),
            ColumnDef::new("C", "c", "wat"),
        ];
        let refs: Vec<&ColumnDef> = columns.iter().collect();
        // 102 wide minus 2 spacers leaves 100 to share.
        let widths = Model::resolve_widths(&refs, 102);
        assert_eq!(widths, [50, 25, 25]);
    }
}
