use super::traits::AssignmentFile;
use crate::core::models::assignment::Assignment;
use crate::core::models::ids::EntityId;
use crate::core::models::subset::Subset;
use crate::core::models::system::EntitySystem;
use std::io::{self, BufRead, Write};
use thiserror::Error;

pub const SCORE_COLUMN: &str = "score";

#[derive(Debug, Error)]
pub enum SolutionTableError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Header must end with a '{SCORE_COLUMN}' column")]
    MissingScoreColumn,
    #[error("Invalid value '{value}' in row {row}, column '{column}'")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },
    #[error("Row {row} has {found} fields, expected {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("Unknown entity '{0}'")]
    UnknownEntity(String),
}

/// Solved joint assignments laid out as a table: one column per entity,
/// named after it, plus a trailing score column.
#[derive(Debug, Clone, PartialEq)]
pub struct SolutionTable {
    pub columns: Vec<String>,
    pub rows: Vec<Assignment>,
}

impl SolutionTable {
    /// Labels the columns of `subset` with the system's entity names.
    pub fn new(system: &EntitySystem, subset: &Subset, rows: Vec<Assignment>) -> Self {
        Self {
            columns: subset.iter().map(|id| system.name_of(id)).collect(),
            rows,
        }
    }

    /// Maps column names back to entity IDs.
    pub fn resolve(&self, system: &EntitySystem) -> Result<Vec<EntityId>, SolutionTableError> {
        self.columns
            .iter()
            .map(|name| {
                system
                    .find_entity_by_name(name)
                    .ok_or_else(|| SolutionTableError::UnknownEntity(name.clone()))
            })
            .collect()
    }
}

pub struct SolutionCsv;

impl AssignmentFile for SolutionCsv {
    type Data = SolutionTable;
    type Error = SolutionTableError;

    fn read_from(reader: &mut impl BufRead) -> Result<SolutionTable, SolutionTableError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);
        let header = csv_reader.headers()?.clone();
        let width = match header.iter().last() {
            Some(SCORE_COLUMN) => header.len() - 1,
            _ => return Err(SolutionTableError::MissingScoreColumn),
        };
        let columns: Vec<String> = header.iter().take(width).map(str::to_string).collect();

        let mut rows = Vec::new();
        for (row, record) in csv_reader.records().enumerate() {
            let record = record?;
            if record.len() != width + 1 {
                return Err(SolutionTableError::RowWidth {
                    row,
                    expected: width + 1,
                    found: record.len(),
                });
            }
            let invalid = |column: &str, value: &str| SolutionTableError::InvalidValue {
                row,
                column: column.to_string(),
                value: value.to_string(),
            };
            let states = columns
                .iter()
                .zip(record.iter())
                .map(|(column, value)| value.parse::<usize>().map_err(|_| invalid(column, value)))
                .collect::<Result<Vec<_>, _>>()?;
            let raw_score = &record[width];
            let score = raw_score
                .parse::<f64>()
                .map_err(|_| invalid(SCORE_COLUMN, raw_score))?;
            rows.push(Assignment::new(states, score));
        }
        Ok(SolutionTable { columns, rows })
    }

    fn write_to(table: &SolutionTable, writer: &mut impl Write) -> Result<(), SolutionTableError> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(
            table
                .columns
                .iter()
                .map(String::as_str)
                .chain(std::iter::once(SCORE_COLUMN)),
        )?;
        for row in &table.rows {
            let fields: Vec<String> = row
                .states
                .iter()
                .map(usize::to_string)
                .chain(std::iter::once(row.score.to_string()))
                .collect();
            csv_writer.write_record(&fields)?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}
