use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::ToSql;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mood {
    #[default]
    Unknown,
    Happy,
    Grumpy,
}

impl ToSql for Mood {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(match self {
            Self::Unknown => "<nil>",
            Self::Happy => "happy",
            Self::Grumpy => "grumpy",
        }))
    }
}

impl FromSql for Mood {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Null => Ok(Self::Unknown),
            other => match other.as_str()? {
                "happy" => Ok(Self::Happy),
                "grumpy" => Ok(Self::Grumpy),
                _ => Err(FromSqlError::InvalidType),
            },
        }
    }
}
