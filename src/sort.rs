use crate::schema::ColumnDef;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Which column is sorted and in which direction. At most one column is
/// active at a time; the ordering itself happens in the table assembly.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SortState {
    active: Option<(String, SortDirection)>,
}

impl SortState {
    pub fn new() -> Self {
        SortState::default()
    }

    /// React to a sort request on a column: a new column starts ascending,
    /// the active column flips direction. Unsortable columns change
    /// nothing, and once any column has been sorted there is no way back
    /// to the unsorted state.
    pub fn toggle(&mut self, column: &ColumnDef) {
        if !column.sortable {
            return;
        }
        self.active = match &self.active {
            Some((field, SortDirection::Ascending)) if *field == column.field => {
                Some((column.field.clone(), SortDirection::Descending))
            }
            _ => Some((column.field.clone(), SortDirection::Ascending)),
        };
    }

    /// The `(field, direction)` directive to order records by, if any.
    pub fn directive(&self) -> Option<(&str, SortDirection)> {
        self.active
            .as_ref()
            .map(|(field, direction)| (field.as_str(), *direction))
    }
}
