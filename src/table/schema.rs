use tracing::debug;

use super::Value;

/// The logical kind of data a table holds. Drives artifact naming, sheet
/// naming and which transform produced the rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    /// One analytics reporting row per (dimension values, metric values).
    Report,
    /// One mailing list per row.
    Lists,
    /// One sent campaign per row.
    Campaigns,
    /// One subscriber per row.
    Members,
    /// Aggregated top-countries table for the analytics report.
    Summary,
    /// Aggregated metric/value dashboard for the marketing data.
    Dashboard,
}

impl Entity {
    /// Lowercase name used in artifact file names and JSON keys.
    pub fn name(&self) -> &'static str {
        match self {
            Entity::Report => "report",
            Entity::Lists => "lists",
            Entity::Campaigns => "campaigns",
            Entity::Members => "members",
            Entity::Summary => "summary",
            Entity::Dashboard => "dashboard",
        }
    }

    /// Capitalized name used for workbook sheets, truncated to the 31-char
    /// sheet name limit.
    pub fn sheet_name(&self) -> String {
        let name = self.name();
        let mut s: String = name
            .char_indices()
            .map(|(i, c)| if i == 0 { c.to_ascii_uppercase() } else { c })
            .collect();
        s.truncate(31);
        s
    }
}

/// Scalar type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Str,
    Int,
    Float,
    Date,
    DateTime,
}

/// A single column: name, scalar kind, and the value substituted when the
/// vendor record is missing the backing field.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub kind: ColumnKind,
    pub default: Value,
}

impl ColumnDef {
    /// Column whose missing-field substitute is `Null`.
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        ColumnDef {
            name: name.into(),
            kind,
            default: Value::Null,
        }
    }

    /// Column with an explicit missing-field substitute.
    pub fn with_default(name: impl Into<String>, kind: ColumnKind, default: Value) -> Self {
        ColumnDef {
            name: name.into(),
            kind,
            default,
        }
    }
}

/// Ordered column set for one entity type.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub entity: Entity,
    pub columns: Vec<ColumnDef>,
}

impl Schema {
    pub fn new(entity: Entity, columns: Vec<ColumnDef>) -> Self {
        Schema { entity, columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Schema for the marketing `lists` entity.
    pub fn lists() -> Self {
        use ColumnKind::*;
        Schema::new(
            Entity::Lists,
            vec![
                ColumnDef::new("list_id", Str),
                ColumnDef::new("list_name", Str),
                ColumnDef::with_default("member_count", Int, Value::Int(0)),
                ColumnDef::with_default("unsubscribe_count", Int, Value::Int(0)),
                ColumnDef::with_default("open_rate", Float, Value::Float(0.0)),
                ColumnDef::with_default("click_rate", Float, Value::Float(0.0)),
                ColumnDef::new("date_created", DateTime),
                ColumnDef::with_default("visibility", Str, Value::Str("private".into())),
                ColumnDef::with_default("unsubscribe_rate", Float, Value::Float(0.0)),
                ColumnDef::new("extracted_at", DateTime),
                ColumnDef::new("data_source", Str),
            ],
        )
    }

    /// Schema for the marketing `campaigns` entity.
    pub fn campaigns() -> Self {
        use ColumnKind::*;
        Schema::new(
            Entity::Campaigns,
            vec![
                ColumnDef::new("campaign_id", Str),
                ColumnDef::with_default("campaign_name", Str, Value::Str("Unknown".into())),
                ColumnDef::new("list_id", Str),
                ColumnDef::new("send_time", DateTime),
                ColumnDef::new("send_date", Date),
                ColumnDef::new("send_hour", Int),
                ColumnDef::with_default("emails_sent", Int, Value::Int(0)),
                ColumnDef::with_default("opens", Int, Value::Int(0)),
                ColumnDef::with_default("unique_opens", Int, Value::Int(0)),
                ColumnDef::with_default("open_rate", Float, Value::Float(0.0)),
                ColumnDef::with_default("clicks", Int, Value::Int(0)),
                ColumnDef::with_default("unique_clicks", Int, Value::Int(0)),
                ColumnDef::with_default("click_rate", Float, Value::Float(0.0)),
                ColumnDef::with_default("unsubscribes", Int, Value::Int(0)),
                ColumnDef::with_default("bounces", Int, Value::Int(0)),
                ColumnDef::with_default("campaign_type", Str, Value::Str("regular".into())),
                ColumnDef::new("status", Str),
                ColumnDef::with_default("engagement_rate", Float, Value::Float(0.0)),
                ColumnDef::new("performance_category", Str),
                ColumnDef::new("extracted_at", DateTime),
                ColumnDef::new("data_source", Str),
            ],
        )
    }

    /// Schema for the marketing `members` entity.
    pub fn members() -> Self {
        use ColumnKind::*;
        Schema::new(
            Entity::Members,
            vec![
                ColumnDef::new("member_id", Str),
                ColumnDef::new("email", Str),
                ColumnDef::new("status", Str),
                ColumnDef::new("list_id", Str),
                ColumnDef::new("timestamp_signup", DateTime),
                ColumnDef::new("timestamp_opt", DateTime),
                ColumnDef::new("country_code", Str),
                ColumnDef::new("timezone", Str),
                ColumnDef::new("latitude", Float),
                ColumnDef::new("longitude", Float),
                ColumnDef::new("ip_signup", Str),
                ColumnDef::new("ip_opt", Str),
                ColumnDef::new("language", Str),
                ColumnDef::with_default("member_rating", Int, Value::Int(0)),
                ColumnDef::new("email_client", Str),
                ColumnDef::with_default("tags_count", Int, Value::Int(0)),
                ColumnDef::new("country_name", Str),
                ColumnDef::new("days_since_signup", Int),
                ColumnDef::new("extracted_at", DateTime),
                ColumnDef::new("data_source", Str),
            ],
        )
    }

    /// Schema for the analytics top-countries summary.
    pub fn analytics_summary() -> Self {
        use ColumnKind::*;
        Schema::new(
            Entity::Summary,
            vec![
                ColumnDef::new("metric", Str),
                ColumnDef::with_default("sessions", Int, Value::Int(0)),
                ColumnDef::with_default("totalUsers", Int, Value::Int(0)),
                ColumnDef::with_default("screenPageViews", Int, Value::Int(0)),
            ],
        )
    }

    /// Schema for the marketing metric/value dashboard.
    pub fn dashboard() -> Self {
        use ColumnKind::*;
        Schema::new(
            Entity::Dashboard,
            vec![
                ColumnDef::new("metric", Str),
                ColumnDef::new("value", Str),
            ],
        )
    }
}

/// Builds one row against a schema. Cells that are never set (or set to
/// `None`) fall back to the column's declared default, which is how missing
/// vendor fields are absorbed without failing the run.
pub struct RowBuilder<'a> {
    schema: &'a Schema,
    cells: Vec<Option<Value>>,
}

impl<'a> RowBuilder<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        RowBuilder {
            cells: vec![None; schema.len()],
            schema,
        }
    }

    /// Set a cell by column name. Unknown names are ignored with a debug log
    /// so a vendor payload growing a field never breaks a run.
    pub fn set(&mut self, name: &str, value: Value) -> &mut Self {
        match self.schema.index_of(name) {
            Some(i) => self.cells[i] = Some(value),
            None => debug!(column = name, entity = self.schema.entity.name(), "no such column"),
        }
        self
    }

    /// Set a cell from an optional extraction; `None` leaves the default.
    pub fn set_opt(&mut self, name: &str, value: Option<Value>) -> &mut Self {
        if let Some(v) = value {
            self.set(name, v);
        }
        self
    }

    /// Produce the finished row, substituting defaults for unset cells.
    pub fn finish(self) -> Vec<Value> {
        let mut defaulted: Vec<&str> = Vec::new();
        let row: Vec<Value> = self
            .cells
            .into_iter()
            .zip(self.schema.columns.iter())
            .map(|(cell, col)| match cell {
                Some(v) => v,
                None => {
                    defaulted.push(col.name.as_str());
                    col.default.clone()
                }
            })
            .collect();
        if !defaulted.is_empty() {
            debug!(
                entity = self.schema.entity.name(),
                columns = ?defaulted,
                "substituted defaults for missing fields"
            );
        }
        row
    }
}
