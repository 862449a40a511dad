use std::time::Duration;

use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style, Stylize};
use ratatui::symbols::border;
use ratatui::text::{Line, Text};
use ratatui::widgets::{Block, Cell, Clear, Padding, Paragraph, Row, Table, Wrap};

use crate::model::{DetailView, PanelView, UIData};

pub const GRID_HEADER_HEIGHT: usize = 1;
pub const STATUS_LINE_HEIGHT: usize = 1;
pub const BORDER_WIDTH: usize = 2;
pub const BORDER_HEIGHT: usize = 2;
pub const COLUMN_SPACING: usize = 1;

/// How long a status message stays up before the line goes quiet again.
const STATUS_MESSAGE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
pub struct TableUI;

impl TableUI {
    pub fn new() -> Self {
        Self
    }

    pub fn draw(&self, uidata: &UIData, frame: &mut Frame) {
        let area = frame.area();

        let title = Line::from(format!(" {} ", uidata.title).bold());
        let instructions = Line::from(vec![
            " Sort ".into(),
            "<S>".blue().bold(),
            " Filter ".into(),
            "<F>".blue().bold(),
            " Detail ".into(),
            "<Enter>".blue().bold(),
            " Help ".into(),
            "<?>".blue().bold(),
            " Quit ".into(),
            "<Q> ".blue().bold(),
        ]);
        let block = Block::bordered()
            .title(title.centered())
            .title_bottom(instructions.centered())
            .border_set(border::THICK);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let [grid_area, status_area] = Layout::vertical([
            Constraint::Min(1),
            Constraint::Length(uidata.layout.statusline_height as u16),
        ])
        .areas(inner);

        self.draw_grid(uidata, frame, grid_area);
        self.draw_status_line(uidata, frame, status_area);

        if let Some(panel) = &uidata.panel {
            self.draw_panel(panel, frame, area);
        }
        if let Some(detail) = &uidata.detail {
            self.draw_detail(detail, frame, area);
        }
        if uidata.show_popup {
            self.draw_help(&uidata.popup_message, frame, area);
        }
    }

    fn draw_grid(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        if uidata.rows.is_empty() {
            let banner = if uidata.source_rows == 0 {
                "No records"
            } else {
                "No records match the filter"
            };
            let paragraph = Paragraph::new(banner)
                .centered()
                .dim()
                .block(Block::new().padding(Padding::top(area.height / 2)));
            frame.render_widget(paragraph, area);
            return;
        }

        let header = Row::new(
            uidata
                .columns
                .iter()
                .map(|column| Cell::from(column.label.clone())),
        )
        .bold()
        .underlined();

        let rows = uidata.rows.iter().enumerate().map(|(row_idx, row)| {
            let cells = row.cells.iter().enumerate().map(|(col_idx, lines)| {
                let text = Text::from(
                    lines
                        .iter()
                        .map(|line| Line::from(line.clone()))
                        .collect::<Vec<Line>>(),
                );
                let mut cell = Cell::from(text);
                if row_idx == uidata.selected_row && col_idx == uidata.selected_column {
                    cell = cell.style(Style::new().add_modifier(Modifier::REVERSED));
                }
                cell
            });
            let mut table_row = Row::new(cells).height(row.height as u16);
            if row_idx == uidata.selected_row {
                table_row = table_row.style(Style::new().bg(Color::DarkGray));
            }
            table_row
        });

        let widths = uidata
            .columns
            .iter()
            .map(|column| Constraint::Length(column.width as u16));
        let table = Table::new(rows, widths)
            .column_spacing(COLUMN_SPACING as u16)
            .header(header);
        frame.render_widget(table, area);
    }

    fn draw_status_line(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let expired = uidata.last_status_message_update.elapsed() > STATUS_MESSAGE_TIMEOUT;
        let left = if expired {
            String::new()
        } else {
            uidata.status_message.clone()
        };

        let position = if uidata.total_rows == 0 {
            String::from("0/0")
        } else {
            format!("{}/{}", uidata.abs_selected_row + 1, uidata.total_rows)
        };
        let right = if uidata.filter_active {
            format!("{position} (of {}) [filtered]", uidata.source_rows)
        } else {
            position
        };

        let width = uidata.layout.statusline_width;
        let used = left.chars().count() + right.chars().count();
        let line = if used < width {
            format!("{left}{}{right}", " ".repeat(width - used))
        } else {
            format!("{left} {right}")
        };
        frame.render_widget(Paragraph::new(line).dim(), area);
    }

    fn draw_panel(&self, panel: &PanelView, frame: &mut Frame, area: Rect) {
        // Size the box to the windowed entries so the selection never
        // scrolls out of the drawn region.
        let height = (panel.entries.len() as u16 + 2).clamp(3, area.height);
        let width = (area.width / 2).max(30).min(area.width);
        let popup_area = centered_box(area, width, height);
        frame.render_widget(Clear, popup_area);

        let summary = format!(
            " {} values, {} selected ",
            panel.total_values, panel.active_values
        );
        let block = Block::bordered()
            .title(Line::from(format!(" {} ", panel.title).bold()).centered())
            .title_bottom(Line::from(summary).centered());
        let entries_area = block.inner(popup_area);
        frame.render_widget(block, popup_area);

        let rows = panel.entries.iter().enumerate().map(|(idx, entry)| {
            let marker = if entry.checked { "[x]" } else { "[ ]" };
            let mut row = Row::new(vec![
                Cell::from(marker),
                Cell::from(entry.display.clone()),
                Cell::from(Line::from(entry.count.to_string()).right_aligned()),
            ]);
            if idx == panel.selected {
                row = row.style(Style::new().add_modifier(Modifier::REVERSED));
            }
            row
        });
        let widths = [
            Constraint::Length(3),
            Constraint::Min(10),
            Constraint::Length(6),
        ];
        frame.render_widget(Table::new(rows, widths).column_spacing(1), entries_area);
    }

    fn draw_detail(&self, detail: &DetailView, frame: &mut Frame, area: Rect) {
        let height = (detail.labels.len() as u16 + 2).clamp(3, area.height);
        let width = (area.width * 7 / 10).max(40).min(area.width);
        let popup_area = centered_box(area, width, height);
        frame.render_widget(Clear, popup_area);

        let block = Block::bordered()
            .title(Line::from(format!(" {} ", detail.title).bold()).centered())
            .title_bottom(Line::from(" <Left>/<Right> records  <Y> copy ").centered());
        let fields_area = block.inner(popup_area);
        frame.render_widget(block, popup_area);

        let rows = detail
            .labels
            .iter()
            .zip(&detail.values)
            .enumerate()
            .map(|(idx, (label, value))| {
                let mut row = Row::new(vec![
                    Cell::from(label.clone().bold()),
                    Cell::from(value.clone()),
                ]);
                if idx == detail.selected_row {
                    row = row.style(Style::new().add_modifier(Modifier::REVERSED));
                }
                row
            });
        let widths = [
            Constraint::Length(detail.label_width as u16),
            Constraint::Min(10),
        ];
        frame.render_widget(Table::new(rows, widths).column_spacing(2), fields_area);
    }

    fn draw_help(&self, message: &str, frame: &mut Frame, area: Rect) {
        let popup_area = centered_rect(area, 60, 80);
        frame.render_widget(Clear, popup_area);
        let block = Block::bordered().title(Line::from(" Help ".bold()).centered());
        let paragraph = Paragraph::new(message)
            .block(block)
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, popup_area);
    }
}

fn centered_rect(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::vertical([
        Constraint::Percentage((100 - percent_y) / 2),
        Constraint::Percentage(percent_y),
        Constraint::Percentage((100 - percent_y) / 2),
    ])
    .split(area);
    Layout::horizontal([
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
    ])
    .split(vertical[1])[1]
}

fn centered_box(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    let x = area.x + (area.width - width) / 2;
    let y = area.y + (area.height - height) / 2;
    Rect::new(x, y, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::GridConfig;
    use crate::model::Model;
    use crate::record::{FieldValue, Record};
    use ratatui::{Terminal, backend::TestBackend};

    fn buffer_content(terminal: &Terminal<TestBackend>) -> String {
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn test_draw_empty_uidata() {
        let ui = TableUI::new();
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        terminal
            .draw(|frame| ui.draw(&UIData::empty(), frame))
            .unwrap();
        assert!(buffer_content(&terminal).contains("No records"));
    }

    #[test]
    fn test_draw_grid_with_records() {
        let record = Record::from_pairs(&[
            ("eventType", FieldValue::Text("Incident".into())),
            ("severity", FieldValue::Text("Major".into())),
            ("road", FieldValue::Text("Highway 1".into())),
            ("description", FieldValue::Text("Slide".into())),
            ("lastUpdated", FieldValue::Text("2026-02-11".into())),
            ("district", FieldValue::List(vec!["Kootenay".into()])),
        ]);
        let model = Model::init(
            &GridConfig::default(),
            "events".into(),
            vec![record],
            80,
            24,
        );

        let ui = TableUI::new();
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        terminal
            .draw(|frame| ui.draw(model.get_uidata(), frame))
            .unwrap();

        let content = buffer_content(&terminal);
        assert!(content.contains("events"));
        assert!(content.contains("Type"));
        assert!(content.contains("Highway 1"));
    }
}
