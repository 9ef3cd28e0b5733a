//! Click-log schema, declared as data.
//!
//! Table definitions are ordered lists of typed column descriptors. The
//! same descriptors generate the DDL run by
//! [`run_migrations`](crate::migrate::run_migrations) and drive row
//! encoding and decoding in the SQLite store, so no code depends on a
//! column's position.

use crate::models::Suggestion;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Text,
    Integer,
}

impl SqlType {
    fn as_sql(self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Integer => "INTEGER",
        }
    }
}

#[derive(Debug)]
pub struct Column {
    pub name: &'static str,
    pub ty: SqlType,
    /// Column constraint appended after the type, e.g. `NOT NULL`.
    pub constraint: &'static str,
}

const fn col(name: &'static str, ty: SqlType, constraint: &'static str) -> Column {
    Column {
        name,
        ty,
        constraint,
    }
}

#[derive(Debug)]
pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column],
}

impl Table {
    pub fn create_sql(&self) -> String {
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                if c.constraint.is_empty() {
                    format!("{} {}", c.name, c.ty.as_sql())
                } else {
                    format!("{} {} {}", c.name, c.ty.as_sql(), c.constraint)
                }
            })
            .collect();
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.name,
            columns.join(", ")
        )
    }

    /// Comma-separated column names, optionally qualified with the table.
    pub fn column_list(&self, qualified: bool) -> String {
        self.columns
            .iter()
            .map(|c| {
                if qualified {
                    format!("{}.{}", self.name, c.name)
                } else {
                    c.name.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn placeholders(&self) -> String {
        vec!["?"; self.columns.len()].join(", ")
    }

    pub fn column(&self, name: &str) -> Option<&'static Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

pub const SHORTCUTS: Table = Table {
    name: "shortcuts",
    columns: &[
        col("intent_key", SqlType::Text, "PRIMARY KEY"),
        col("source", SqlType::Text, "NOT NULL"),
        col("source_version", SqlType::Integer, "NOT NULL DEFAULT 0"),
        col("text1", SqlType::Text, "NOT NULL"),
        col("text2", SqlType::Text, ""),
        col("text2_url", SqlType::Text, ""),
        col("icon1", SqlType::Text, ""),
        col("icon2", SqlType::Text, ""),
        col("intent_action", SqlType::Text, "NOT NULL"),
        col("intent_data", SqlType::Text, ""),
        col("intent_extra_data", SqlType::Text, ""),
        col("intent_query", SqlType::Text, ""),
        col("shortcut_id", SqlType::Text, ""),
        col("log_type", SqlType::Text, ""),
    ],
};

pub const CLICKLOG: Table = Table {
    name: "clicklog",
    columns: &[
        col("id", SqlType::Integer, "PRIMARY KEY AUTOINCREMENT"),
        col("intent_key", SqlType::Text, "NOT NULL"),
        col("query", SqlType::Text, "NOT NULL"),
        col("hit_time", SqlType::Integer, "NOT NULL"),
        col("corpus", SqlType::Text, "NOT NULL"),
    ],
};

pub const SOURCETOTALS: Table = Table {
    name: "sourcetotals",
    columns: &[
        col("corpus", SqlType::Text, "PRIMARY KEY"),
        col("total_clicks", SqlType::Integer, "NOT NULL DEFAULT 0"),
    ],
};

pub const TABLES: &[&Table] = &[&SHORTCUTS, &CLICKLOG, &SOURCETOTALS];

/// Maintains per-corpus click totals on every click insert.
pub const CLICKLOG_INSERT_TRIGGER: &str = r#"
CREATE TRIGGER IF NOT EXISTS clicklog_count_insert AFTER INSERT ON clicklog
BEGIN
    INSERT OR IGNORE INTO sourcetotals (corpus, total_clicks) VALUES (new.corpus, 0);
    UPDATE sourcetotals SET total_clicks = total_clicks + 1 WHERE corpus = new.corpus;
END
"#;

/// Removes click rows of a deleted shortcut.
pub const SHORTCUTS_DELETE_TRIGGER: &str = r#"
CREATE TRIGGER IF NOT EXISTS shortcuts_delete AFTER DELETE ON shortcuts
BEGIN
    DELETE FROM clicklog WHERE intent_key = old.intent_key;
END
"#;

pub const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_clicklog_query ON clicklog(query)",
    "CREATE INDEX IF NOT EXISTS idx_clicklog_hit_time ON clicklog(hit_time)",
    "CREATE INDEX IF NOT EXISTS idx_clicklog_intent_key ON clicklog(intent_key)",
    "CREATE INDEX IF NOT EXISTS idx_shortcuts_source_id ON shortcuts(source, shortcut_id)",
];

/// A column value, typed per [`SqlType`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(Option<String>),
    Integer(i64),
}

impl Value {
    pub fn into_text(self) -> Option<String> {
        match self {
            Value::Text(t) => t,
            Value::Integer(i) => Some(i.to_string()),
        }
    }

    pub fn into_integer(self) -> i64 {
        match self {
            Value::Integer(i) => i,
            Value::Text(t) => t.and_then(|t| t.parse().ok()).unwrap_or(0),
        }
    }
}

/// Maps one `shortcuts` column to a [`Suggestion`] field.
pub struct Field {
    pub column: &'static str,
    pub get: fn(&Suggestion) -> Value,
    pub set: fn(&mut Suggestion, Value),
}

fn text(v: &Option<String>) -> Value {
    Value::Text(v.clone())
}

pub const SHORTCUT_FIELDS: &[Field] = &[
    Field {
        column: "intent_key",
        get: |s| Value::Text(Some(s.intent_key())),
        set: |_, _| {},
    },
    Field {
        column: "source",
        get: |s| Value::Text(Some(s.source.clone())),
        set: |s, v| s.source = v.into_text().unwrap_or_default(),
    },
    Field {
        column: "source_version",
        get: |s| Value::Integer(s.source_version),
        set: |s, v| s.source_version = v.into_integer(),
    },
    Field {
        column: "text1",
        get: |s| Value::Text(Some(s.text1.clone())),
        set: |s, v| s.text1 = v.into_text().unwrap_or_default(),
    },
    Field {
        column: "text2",
        get: |s| text(&s.text2),
        set: |s, v| s.text2 = v.into_text(),
    },
    Field {
        column: "text2_url",
        get: |s| text(&s.text2_url),
        set: |s, v| s.text2_url = v.into_text(),
    },
    Field {
        column: "icon1",
        get: |s| text(&s.icon1),
        set: |s, v| s.icon1 = v.into_text(),
    },
    Field {
        column: "icon2",
        get: |s| text(&s.icon2),
        set: |s, v| s.icon2 = v.into_text(),
    },
    Field {
        column: "intent_action",
        get: |s| Value::Text(Some(s.intent.action.clone())),
        set: |s, v| {
            if let Some(action) = v.into_text() {
                s.intent.action = action;
            }
        },
    },
    Field {
        column: "intent_data",
        get: |s| text(&s.intent.data),
        set: |s, v| s.intent.data = v.into_text(),
    },
    Field {
        column: "intent_extra_data",
        get: |s| text(&s.intent.extra_data),
        set: |s, v| s.intent.extra_data = v.into_text(),
    },
    Field {
        column: "intent_query",
        get: |s| text(&s.intent.query),
        set: |s, v| s.intent.query = v.into_text(),
    },
    Field {
        column: "shortcut_id",
        get: |s| text(&s.shortcut_id),
        set: |s, v| s.shortcut_id = v.into_text(),
    },
    Field {
        column: "log_type",
        get: |s| text(&s.log_type),
        set: |s, v| s.log_type = v.into_text(),
    },
];

/// Columns a refresh may overwrite: everything except identity.
pub const REFRESHABLE_COLUMNS: &[&str] = &[
    "source_version",
    "text1",
    "text2",
    "text2_url",
    "icon1",
    "icon2",
    "log_type",
];

pub fn field(column: &str) -> Option<&'static Field> {
    SHORTCUT_FIELDS.iter().find(|f| f.column == column)
}

/// Encode a suggestion as `shortcuts` values, in table column order.
pub fn encode_shortcut(suggestion: &Suggestion) -> Vec<Value> {
    SHORTCUTS
        .columns
        .iter()
        .map(|c| match field(c.name) {
            Some(f) => (f.get)(suggestion),
            None => Value::Text(None),
        })
        .collect()
}

/// Rebuild a suggestion from `(column, value)` pairs of a `shortcuts` row.
pub fn decode_shortcut<I>(values: I) -> Suggestion
where
    I: IntoIterator<Item = (&'static str, Value)>,
{
    let mut suggestion = Suggestion::new("", "").as_shortcut();
    for (column, value) in values {
        if let Some(f) = field(column) {
            (f.set)(&mut suggestion, value);
        }
    }
    suggestion
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_shortcut_column_has_a_field() {
        for column in SHORTCUTS.columns {
            assert!(field(column.name).is_some(), "{} unmapped", column.name);
        }
        for name in REFRESHABLE_COLUMNS {
            assert!(SHORTCUTS.column(name).is_some());
        }
    }

    #[test]
    fn test_create_sql_lists_columns_with_constraints() {
        let sql = SOURCETOTALS.create_sql();
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS sourcetotals (corpus TEXT PRIMARY KEY, total_clicks INTEGER NOT NULL DEFAULT 0)"
        );
        assert_eq!(CLICKLOG.placeholders(), "?, ?, ?, ?, ?");
        assert_eq!(
            SOURCETOTALS.column_list(true),
            "sourcetotals.corpus, sourcetotals.total_clicks"
        );
    }

    #[test]
    fn test_encode_decode_by_column_name() {
        let original = Suggestion::new("apps", "Maps")
            .with_text2("navigation")
            .with_data("app://maps")
            .with_shortcut_id("maps")
            .with_version(3);
        let values = encode_shortcut(&original);
        let pairs = SHORTCUTS
            .columns
            .iter()
            .map(|c| c.name)
            .zip(values)
            .rev();
        let decoded = decode_shortcut(pairs);
        assert_eq!(decoded, original.clone().as_shortcut());
        assert_eq!(decoded.intent_key(), original.intent_key());
    }
}
