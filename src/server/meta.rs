//! Interception of client-tool meta-queries.
//!
//! `psql` answers backslash commands (`\l`, `\dt`, ...) by sending fixed
//! catalog queries against `pg_catalog`. Those tables don't exist in the
//! MySQL-dialect engine, so each known query text is rewritten to an
//! equivalent information-schema query and executed in its place. Matching
//! is done on the lower-cased statement; exact matches win over
//! prefix/suffix matches. Anything unrecognized falls through to normal
//! translation.

/// How a matched meta-query is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaQuery {
    /// Execute this replacement query against the engine instead.
    Rewrite(&'static str),
    /// Recognized but not implementable; answer with an error.
    Unsupported,
}

#[derive(Clone, Copy)]
enum Pattern {
    Exact(&'static str),
    Affix {
        prefix: &'static str,
        suffix: &'static str,
    },
}

struct MetaEntry {
    pattern: Pattern,
    response: MetaQuery,
}

// Command: \l
const LIST_DATABASES: &str = concat!(
    "select d.datname as \"name\",\n",
    "       pg_catalog.pg_get_userbyid(d.datdba) as \"owner\",\n",
    "       pg_catalog.pg_encoding_to_char(d.encoding) as \"encoding\",\n",
    "       d.datcollate as \"collate\",\n",
    "       d.datctype as \"ctype\",\n",
    "       d.daticulocale as \"icu locale\",\n",
    "       case d.datlocprovider when 'c' then 'libc' when 'i' then 'icu' end as \"locale provider\",\n",
    "       pg_catalog.array_to_string(d.datacl, e'\\n') as \"access privileges\"\n",
    "from pg_catalog.pg_database d\n",
    "order by 1;"
);

// Command: \dt
const LIST_TABLES: &str = concat!(
    "select n.nspname as \"schema\",\n",
    "  c.relname as \"name\",\n",
    "  case c.relkind when 'r' then 'table' when 'v' then 'view' when 'm' then 'materialized view' when 'i' then 'index' when 's' then 'sequence' when 't' then 'toast table' when 'f' then 'foreign table' when 'p' then 'partitioned table' when 'i' then 'partitioned index' end as \"type\",\n",
    "  pg_catalog.pg_get_userbyid(c.relowner) as \"owner\"\n",
    "from pg_catalog.pg_class c\n",
    "     left join pg_catalog.pg_namespace n on n.oid = c.relnamespace\n",
    "     left join pg_catalog.pg_am am on am.oid = c.relam\n",
    "where c.relkind in ('r','p','')\n",
    "      and n.nspname <> 'pg_catalog'\n",
    "      and n.nspname !~ '^pg_toast'\n",
    "      and n.nspname <> 'information_schema'\n",
    "  and pg_catalog.pg_table_is_visible(c.oid)\n",
    "order by 1,2;"
);

// Command: \d
const LIST_RELATIONS: &str = concat!(
    "select n.nspname as \"schema\",\n",
    "  c.relname as \"name\",\n",
    "  case c.relkind when 'r' then 'table' when 'v' then 'view' when 'm' then 'materialized view' when 'i' then 'index' when 's' then 'sequence' when 't' then 'toast table' when 'f' then 'foreign table' when 'p' then 'partitioned table' when 'i' then 'partitioned index' end as \"type\",\n",
    "  pg_catalog.pg_get_userbyid(c.relowner) as \"owner\"\n",
    "from pg_catalog.pg_class c\n",
    "     left join pg_catalog.pg_namespace n on n.oid = c.relnamespace\n",
    "     left join pg_catalog.pg_am am on am.oid = c.relam\n",
    "where c.relkind in ('r','p','v','m','s','f','')\n",
    "      and n.nspname <> 'pg_catalog'\n",
    "      and n.nspname !~ '^pg_toast'\n",
    "      and n.nspname <> 'information_schema'\n",
    "  and pg_catalog.pg_table_is_visible(c.oid)\n",
    "order by 1,2;"
);

// Command: \d table_name (first of many statements psql sends)
const DESCRIBE_TABLE_PREFIX: &str = concat!(
    "select c.oid,\n",
    "  n.nspname,\n",
    "  c.relname\n",
    "from pg_catalog.pg_class c\n",
    "     left join pg_catalog.pg_namespace n on n.oid = c.relnamespace\n",
    "where c.relname operator(pg_catalog.~) '^("
);
const DESCRIBE_TABLE_SUFFIX: &str = concat!(
    ")$' collate pg_catalog.default\n",
    "  and pg_catalog.pg_table_is_visible(c.oid)\n",
    "order by 2, 3;"
);

// Command: \dn
const LIST_SCHEMAS: &str = concat!(
    "select n.nspname as \"name\",\n",
    "  pg_catalog.pg_get_userbyid(n.nspowner) as \"owner\"\n",
    "from pg_catalog.pg_namespace n\n",
    "where n.nspname !~ '^pg_' and n.nspname <> 'information_schema'\n",
    "order by 1;"
);

// Command: \df
const LIST_FUNCTIONS: &str = concat!(
    "select n.nspname as \"schema\",\n",
    "  p.proname as \"name\",\n",
    "  pg_catalog.pg_get_function_result(p.oid) as \"result data type\",\n",
    "  pg_catalog.pg_get_function_arguments(p.oid) as \"argument data types\",\n",
    " case p.prokind\n",
    "  when 'a' then 'agg'\n",
    "  when 'w' then 'window'\n",
    "  when 'p' then 'proc'\n",
    "  else 'func'\n",
    " end as \"type\"\n",
    "from pg_catalog.pg_proc p\n",
    "     left join pg_catalog.pg_namespace n on n.oid = p.pronamespace\n",
    "where pg_catalog.pg_function_is_visible(p.oid)\n",
    "      and n.nspname <> 'pg_catalog'\n",
    "      and n.nspname <> 'information_schema'\n",
    "order by 1, 2, 4;"
);

// Command: \dv
const LIST_VIEWS: &str = concat!(
    "select n.nspname as \"schema\",\n",
    "  c.relname as \"name\",\n",
    "  case c.relkind when 'r' then 'table' when 'v' then 'view' when 'm' then 'materialized view' when 'i' then 'index' when 's' then 'sequence' when 't' then 'toast table' when 'f' then 'foreign table' when 'p' then 'partitioned table' when 'i' then 'partitioned index' end as \"type\",\n",
    "  pg_catalog.pg_get_userbyid(c.relowner) as \"owner\"\n",
    "from pg_catalog.pg_class c\n",
    "     left join pg_catalog.pg_namespace n on n.oid = c.relnamespace\n",
    "where c.relkind in ('v','')\n",
    "      and n.nspname <> 'pg_catalog'\n",
    "      and n.nspname !~ '^pg_toast'\n",
    "      and n.nspname <> 'information_schema'\n",
    "  and pg_catalog.pg_table_is_visible(c.oid)\n",
    "order by 1,2;"
);

// Command: \du
const LIST_ROLES: &str = concat!(
    "select r.rolname, r.rolsuper, r.rolinherit,\n",
    "  r.rolcreaterole, r.rolcreatedb, r.rolcanlogin,\n",
    "  r.rolconnlimit, r.rolvaliduntil,\n",
    "  array(select b.rolname\n",
    "        from pg_catalog.pg_auth_members m\n",
    "        join pg_catalog.pg_roles b on (m.roleid = b.oid)\n",
    "        where m.member = r.oid) as memberof\n",
    ", r.rolreplication\n",
    ", r.rolbypassrls\n",
    "from pg_catalog.pg_roles r\n",
    "where r.rolname !~ '^pg_'\n",
    "order by 1;"
);

const LIST_DATABASES_REWRITE: &str = "SELECT SCHEMA_NAME AS 'Name', 'postgres' AS 'Owner', 'UTF8' AS 'Encoding', 'English_United States.1252' AS 'Collate', 'English_United States.1252' AS 'Ctype', '' AS 'ICU Locale', 'libc' AS 'Locale Provider', '' AS 'Access privileges' FROM INFORMATION_SCHEMA.SCHEMATA ORDER BY 1;";
const LIST_TABLES_REWRITE: &str = "SELECT 'public' AS 'Schema', TABLE_NAME AS 'Name', 'table' AS 'Type', 'postgres' AS 'Owner' FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_SCHEMA = database() AND TABLE_TYPE = 'BASE TABLE' ORDER BY 2;";
const LIST_SCHEMAS_REWRITE: &str = "SELECT 'public' AS 'Name', 'pg_database_owner' AS 'Owner';";
const LIST_FUNCTIONS_REWRITE: &str = "SELECT '' AS 'Schema', '' AS 'Name', '' AS 'Result data type', '' AS 'Argument data types', '' AS 'Type' FROM dual LIMIT 0;";
const LIST_VIEWS_REWRITE: &str = "SELECT 'public' AS 'Schema', TABLE_NAME AS 'Name', 'view' AS 'Type', 'postgres' AS 'Owner' FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_SCHEMA = database() AND TABLE_TYPE = 'VIEW' ORDER BY 2;";
const LIST_ROLES_REWRITE: &str = "SELECT '' FROM dual LIMIT 0;";

static META_QUERIES: &[MetaEntry] = &[
    MetaEntry {
        pattern: Pattern::Exact(LIST_DATABASES),
        response: MetaQuery::Rewrite(LIST_DATABASES_REWRITE),
    },
    MetaEntry {
        pattern: Pattern::Exact(LIST_TABLES),
        response: MetaQuery::Rewrite(LIST_TABLES_REWRITE),
    },
    MetaEntry {
        pattern: Pattern::Exact(LIST_RELATIONS),
        response: MetaQuery::Rewrite(LIST_TABLES_REWRITE),
    },
    MetaEntry {
        // Describing a single table expands to well over a dozen separate
        // statements; answered with an error until they are implemented.
        pattern: Pattern::Affix {
            prefix: DESCRIBE_TABLE_PREFIX,
            suffix: DESCRIBE_TABLE_SUFFIX,
        },
        response: MetaQuery::Unsupported,
    },
    MetaEntry {
        pattern: Pattern::Exact(LIST_SCHEMAS),
        response: MetaQuery::Rewrite(LIST_SCHEMAS_REWRITE),
    },
    MetaEntry {
        pattern: Pattern::Exact(LIST_FUNCTIONS),
        response: MetaQuery::Rewrite(LIST_FUNCTIONS_REWRITE),
    },
    MetaEntry {
        pattern: Pattern::Exact(LIST_VIEWS),
        response: MetaQuery::Rewrite(LIST_VIEWS_REWRITE),
    },
    MetaEntry {
        pattern: Pattern::Exact(LIST_ROLES),
        response: MetaQuery::Rewrite(LIST_ROLES_REWRITE),
    },
];

/// Look up a statement in the meta-query table. Returns `None` when the
/// statement is not a known client-tool query.
pub fn intercept(statement: &str) -> Option<MetaQuery> {
    let lowered = statement.to_lowercase();

    // Exact matches take precedence over prefix matches.
    for entry in META_QUERIES {
        if let Pattern::Exact(text) = entry.pattern
            && lowered == text
        {
            return Some(entry.response);
        }
    }
    for entry in META_QUERIES {
        if let Pattern::Affix { prefix, suffix } = entry.pattern
            && lowered.starts_with(prefix)
            && lowered.ends_with(suffix)
        {
            return Some(entry.response);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_tables_is_rewritten() {
        let response = intercept(LIST_TABLES).unwrap();
        assert_eq!(response, MetaQuery::Rewrite(LIST_TABLES_REWRITE));
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let upper = LIST_SCHEMAS.to_uppercase();
        let response = intercept(&upper).unwrap();
        assert_eq!(response, MetaQuery::Rewrite(LIST_SCHEMAS_REWRITE));
    }

    #[test]
    fn test_describe_table_matches_by_affix() {
        let statement = format!("{}my_table{}", DESCRIBE_TABLE_PREFIX, DESCRIBE_TABLE_SUFFIX);
        assert_eq!(intercept(&statement), Some(MetaQuery::Unsupported));
    }

    #[test]
    fn test_ordinary_queries_fall_through() {
        assert_eq!(intercept("SELECT 1"), None);
        assert_eq!(intercept("select * from pg_catalog.pg_class"), None);
    }

    #[test]
    fn test_truncated_meta_query_falls_through() {
        let truncated = &LIST_TABLES[..LIST_TABLES.len() - 1];
        assert_eq!(intercept(truncated), None);
    }
}
