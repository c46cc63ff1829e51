//! Storage mapping and field visibility for the account resource.
//!
//! The Postgres store builds its column lists from [`ACCOUNT_COLUMNS`], the
//! validators read their length limits from it, and the DTOs are checked
//! against [`ACCOUNT_FIELDS`] in tests.

pub const TABLE: &str = "accounts";

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub sql_type: &'static str,
    pub nullable: bool,
    pub unique: bool,
    pub max_length: Option<usize>,
}

const fn col(name: &'static str, sql_type: &'static str) -> Column {
    Column { name, sql_type, nullable: false, unique: false, max_length: None }
}

impl Column {
    const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    const fn max(mut self, n: usize) -> Self {
        self.max_length = Some(n);
        self
    }
}

pub const ACCOUNT_COLUMNS: &[Column] = &[
    col("id", "UUID").unique(),
    col("name", "VARCHAR").max(255),
    col("email", "VARCHAR").max(180).unique(),
    col("phone_number", "VARCHAR").max(30).nullable(),
    col("roles", "JSONB"),
    col("password_hash", "TEXT"),
    col("created_at", "TIMESTAMPTZ"),
    col("activated_at", "TIMESTAMPTZ").nullable(),
    col("deactivated_at", "TIMESTAMPTZ").nullable(),
    col("last_seen_at", "TIMESTAMPTZ").nullable(),
    col("confirmation_token", "UUID").nullable().unique(),
];

pub fn column(name: &str) -> Option<&'static Column> {
    ACCOUNT_COLUMNS.iter().find(|c| c.name == name)
}

pub fn max_length(name: &str) -> Option<usize> {
    column(name).and_then(|c| c.max_length)
}

/// Name Postgres gives the inline `UNIQUE` constraint on `column`.
pub fn unique_constraint(column: &str) -> String {
    format!("{}_{}_key", TABLE, column)
}

/// `id, name, email, ...` in table order.
pub fn select_list() -> String {
    ACCOUNT_COLUMNS
        .iter()
        .map(|c| c.name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// `$1, $2, ...` matching [`select_list`].
pub fn placeholders() -> String {
    (1..=ACCOUNT_COLUMNS.len())
        .map(|i| format!("${}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Columns an update may touch: everything but `id` and `created_at`.
pub fn is_mutable(c: &Column) -> bool {
    c.name != "id" && c.name != "created_at"
}

/// `name = $2, email = $3, ...` over the mutable columns; `$1` is left for
/// the `WHERE id = $1` key.
pub fn update_assignments() -> String {
    ACCOUNT_COLUMNS
        .iter()
        .filter(|c| is_mutable(c))
        .enumerate()
        .map(|(i, c)| format!("{} = ${}", c.name, i + 2))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub read: bool,
    pub write: bool,
}

const fn field(name: &'static str, read: bool, write: bool) -> Field {
    Field { name, read, write }
}

/// Which attributes are exposed on output and accepted on input.
/// `has_password` is the read-side stand-in for the credential: only its
/// presence is ever shown.
pub const ACCOUNT_FIELDS: &[Field] = &[
    field("id", true, false),
    field("name", true, true),
    field("email", true, true),
    field("phone_number", true, true),
    field("roles", true, false),
    field("password", false, true),
    field("has_password", true, false),
    field("created_at", true, false),
    field("activated_at", true, false),
    field("deactivated_at", true, false),
    field("last_seen_at", true, false),
    field("confirmation_token", true, false),
];

pub fn fields_for(profile: Profile) -> impl Iterator<Item = &'static str> {
    ACCOUNT_FIELDS
        .iter()
        .filter(move |f| match profile {
            Profile::Read => f.read,
            Profile::Write => f.write,
        })
        .map(|f| f.name)
}
