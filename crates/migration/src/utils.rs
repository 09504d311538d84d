//! SQL builders for row-level security

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RlsCommand {
    Select,
    Insert,
    Update,
    Delete,
    All,
}

impl RlsCommand {
    fn as_sql(self) -> &'static str {
        match self {
            RlsCommand::Select => "SELECT",
            RlsCommand::Insert => "INSERT",
            RlsCommand::Update => "UPDATE",
            RlsCommand::Delete => "DELETE",
            RlsCommand::All => "ALL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RlsRole {
    Public,
    Authenticated,
    Anon,
    CustomRole(String),
}

impl RlsRole {
    fn as_sql(&self) -> &str {
        match self {
            RlsRole::Public => "PUBLIC",
            RlsRole::Authenticated => "authenticated",
            RlsRole::Anon => "anon",
            RlsRole::CustomRole(role_name) => role_name,
        }
    }
}

/// A single `CREATE POLICY` definition
#[derive(Debug, Clone)]
pub struct RlsPolicy {
    pub name: String,
    pub table: String,
    pub command: RlsCommand,
    pub role: RlsRole,
    pub using: Option<String>,
    pub check: Option<String>,
    pub schema: Option<String>,
}

impl RlsPolicy {
    /// Policy letting authenticated users do everything with rows that
    /// satisfy `predicate`, both when reading and when writing.
    pub fn owner_only(table: &str, schema: &str, predicate: &str) -> Self {
        Self {
            name: format!("{} owner access", table),
            table: table.to_string(),
            command: RlsCommand::All,
            role: RlsRole::Authenticated,
            using: Some(predicate.to_string()),
            check: Some(predicate.to_string()),
            schema: Some(schema.to_string()),
        }
    }

    pub fn create_policy_sql(&self) -> String {
        // Postgres rejects USING on insert policies
        let using_clause = match (&self.using, self.command) {
            (Some(expr), command) if command != RlsCommand::Insert => {
                format!(" USING ({})", expr)
            }
            _ => String::new(),
        };

        let check_clause = match &self.check {
            Some(check_expr) => format!(" WITH CHECK ({})", check_expr),
            None => String::new(),
        };

        format!(
            "CREATE POLICY \"{}\" ON {} FOR {} TO {}{}{};",
            self.name,
            qualified(&self.table, self.schema.as_deref()),
            self.command.as_sql(),
            self.role.as_sql(),
            using_clause,
            check_clause
        )
    }

    pub fn drop_policy_sql(&self) -> String {
        format!(
            "DROP POLICY IF EXISTS \"{}\" ON {};",
            self.name,
            qualified(&self.table, self.schema.as_deref())
        )
    }
}

pub fn enable_rls_sql(table: &str, schema: Option<&str>) -> String {
    format!(
        "ALTER TABLE {} ENABLE ROW LEVEL SECURITY;",
        qualified(table, schema)
    )
}

pub fn disable_rls_sql(table: &str, schema: Option<&str>) -> String {
    format!(
        "ALTER TABLE {} DISABLE ROW LEVEL SECURITY;",
        qualified(table, schema)
    )
}

fn qualified(table: &str, schema: Option<&str>) -> String {
    match schema {
        Some(schema) => format!("{}.{}", schema, table),
        None => table.to_string(),
    }
}
