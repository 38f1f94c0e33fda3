/// Table holding one row per cash closing.
pub const CIERRES_TABLE: &str = "cierres";

/// A nullable column added to `cierres` by the patch.
#[derive(Debug, PartialEq, Eq)]
pub struct PatchColumn {
    pub name: &'static str,
    pub sql_type: &'static str,
    pub add_sql: &'static str,
}

/// Columns added by the patch, in the order their statements are executed.
///
/// Existing rows read NULL for each of them once the patch is applied.
pub const PATCH_COLUMNS: [PatchColumn; 3] = [
    PatchColumn {
        name: "balance_sin_justificar",
        sql_type: "REAL",
        add_sql: "ALTER TABLE cierres ADD COLUMN balance_sin_justificar REAL;",
    },
    PatchColumn {
        name: "responsable",
        sql_type: "TEXT",
        add_sql: "ALTER TABLE cierres ADD COLUMN responsable TEXT;",
    },
    PatchColumn {
        name: "comentarios",
        sql_type: "TEXT",
        add_sql: "ALTER TABLE cierres ADD COLUMN comentarios TEXT;",
    },
];
